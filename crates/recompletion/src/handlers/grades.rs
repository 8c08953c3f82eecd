use std::sync::Arc;

use crate::error::HandlerError;
use crate::host::GradeStore;

use super::{ResetContext, ResetHandler};

/// Erases the user's course grades when `deletegradedata` is set.
pub struct GradeDataHandler {
    store: Arc<dyn GradeStore>,
}

impl GradeDataHandler {
    pub fn new(store: Arc<dyn GradeStore>) -> Self {
        Self { store }
    }
}

impl ResetHandler for GradeDataHandler {
    fn name(&self) -> &str {
        "grades"
    }

    fn on_reset(&self, ctx: &ResetContext<'_>) -> Result<(), HandlerError> {
        if !ctx.config.delete_grade_data {
            return Ok(());
        }
        self.store.delete_course_grades(ctx.user.id, ctx.course())?;
        log::debug!(
            "Deleted grades of user {} in course {}",
            ctx.user.id,
            ctx.course()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CourseConfig, PluginSettings};
    use crate::host::{CompletionRecord, MemoryHost};

    fn reset(host: &Arc<MemoryHost>, delete: bool) {
        let handler = GradeDataHandler::new(host.clone());
        let mut config = CourseConfig::defaults(3, &PluginSettings::default());
        config.delete_grade_data = delete;
        let user = host.add_user(1, "Grace", "Hopper");
        let completion = CompletionRecord::new(1, 3);
        let ctx = ResetContext {
            config: &config,
            user: &user,
            completion: &completion,
            now: 0,
        };
        handler.before_reset(&ctx).unwrap();
        handler.on_reset(&ctx).unwrap();
    }

    #[test]
    fn test_deletes_grades_when_enabled() {
        let host = Arc::new(MemoryHost::new());
        host.set_grade(1, 3, 75.0);
        host.set_grade(1, 4, 60.0);
        reset(&host, true);
        assert_eq!(host.grade(1, 3), None);
        assert_eq!(host.grade(1, 4), Some(60.0));
    }

    #[test]
    fn test_keeps_grades_when_disabled() {
        let host = Arc::new(MemoryHost::new());
        host.set_grade(1, 3, 75.0);
        reset(&host, false);
        assert_eq!(host.grade(1, 3), Some(75.0));
    }
}
