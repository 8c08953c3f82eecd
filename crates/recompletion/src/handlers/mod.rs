//! Extensions that run as part of a user's reset.
//!
//! Handlers are registered explicitly on a [`HandlerRegistry`] and run in
//! registration order: every `before_reset` runs before the completion is
//! cleared, every `on_reset` right after the user's data is reset. The
//! first failure stops the chain.

use std::sync::Arc;

use crate::config::CourseConfig;
use crate::error::HandlerError;
use crate::host::{ArchiveStore, AttemptStore, CompletionRecord, GradeStore, Timestamp, UserRecord};

pub mod archive;
pub mod attempts;
pub mod grades;

pub use archive::CompletionArchiveHandler;
pub use attempts::{ActivityAttemptsHandler, AttemptPolicy};
pub use grades::GradeDataHandler;

/// Everything a handler knows about the reset in progress.
#[derive(Debug, Clone, Copy)]
pub struct ResetContext<'a> {
    pub config: &'a CourseConfig,
    pub user: &'a UserRecord,
    /// The completion as it was before the reset.
    pub completion: &'a CompletionRecord,
    pub now: Timestamp,
}

impl ResetContext<'_> {
    pub fn course(&self) -> i64 {
        self.config.course
    }
}

pub trait ResetHandler: Send + Sync {
    fn name(&self) -> &str;

    fn before_reset(&self, _ctx: &ResetContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_reset(&self, _ctx: &ResetContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn ResetHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive, grade and attempt handlers for quizzes and assignments.
    pub fn standard(
        archive: Arc<dyn ArchiveStore>,
        grades: Arc<dyn GradeStore>,
        attempts: Arc<dyn AttemptStore>,
    ) -> Self {
        Self::new()
            .with(CompletionArchiveHandler::new(archive))
            .with(GradeDataHandler::new(grades))
            .with(ActivityAttemptsHandler::new("quiz", attempts.clone()))
            .with(ActivityAttemptsHandler::new("assign", attempts))
    }

    pub fn register(&mut self, handler: Arc<dyn ResetHandler>) {
        log::debug!("Registered reset handler '{}'", handler.name());
        self.handlers.push(handler);
    }

    pub fn with<H: ResetHandler + 'static>(mut self, handler: H) -> Self {
        self.register(Arc::new(handler));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn before_reset(&self, ctx: &ResetContext<'_>) -> Result<(), HandlerError> {
        for handler in &self.handlers {
            handler.before_reset(ctx).map_err(|e| named(handler.name(), e))?;
        }
        Ok(())
    }

    pub fn on_reset(&self, ctx: &ResetContext<'_>) -> Result<(), HandlerError> {
        for handler in &self.handlers {
            handler.on_reset(ctx).map_err(|e| named(handler.name(), e))?;
        }
        Ok(())
    }
}

/// Attributes port failures to the handler that hit them.
fn named(handler: &str, err: HandlerError) -> HandlerError {
    match err {
        HandlerError::Host(e) => HandlerError::Failed {
            handler: handler.to_string(),
            reason: e.to_string(),
        },
        HandlerError::Database(e) => HandlerError::Failed {
            handler: handler.to_string(),
            reason: e.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::PluginSettings;
    use crate::host::MemoryHost;

    struct Recording {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
        fail_on_reset: bool,
    }

    impl ResetHandler for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn before_reset(&self, _ctx: &ResetContext<'_>) -> Result<(), HandlerError> {
            self.calls.lock().unwrap().push(format!("{}:before", self.name));
            Ok(())
        }

        fn on_reset(&self, _ctx: &ResetContext<'_>) -> Result<(), HandlerError> {
            self.calls.lock().unwrap().push(format!("{}:on", self.name));
            if self.fail_on_reset {
                return Err(HandlerError::Host(crate::error::HostError::Other(
                    "boom".to_string(),
                )));
            }
            Ok(())
        }
    }

    struct Silent;

    impl ResetHandler for Silent {
        fn name(&self) -> &str {
            "silent"
        }
    }

    fn fixture() -> (CourseConfig, UserRecord, CompletionRecord) {
        let config = CourseConfig::defaults(1, &PluginSettings::default());
        let user = UserRecord {
            id: 2,
            email: "u@example.com".to_string(),
            firstname: "U".to_string(),
            lastname: "Ser".to_string(),
        };
        (config, user, CompletionRecord::new(2, 1))
    }

    #[test]
    fn test_handlers_run_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new()
            .with(Recording {
                name: "a",
                calls: calls.clone(),
                fail_on_reset: false,
            })
            .with(Silent)
            .with(Recording {
                name: "b",
                calls: calls.clone(),
                fail_on_reset: false,
            });
        assert_eq!(registry.names(), vec!["a", "silent", "b"]);

        let (config, user, completion) = fixture();
        let ctx = ResetContext {
            config: &config,
            user: &user,
            completion: &completion,
            now: 100,
        };
        registry.before_reset(&ctx).unwrap();
        registry.on_reset(&ctx).unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["a:before", "b:before", "a:on", "b:on"]
        );
    }

    #[test]
    fn test_first_failure_stops_chain() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new()
            .with(Recording {
                name: "a",
                calls: calls.clone(),
                fail_on_reset: true,
            })
            .with(Recording {
                name: "b",
                calls: calls.clone(),
                fail_on_reset: false,
            });

        let (config, user, completion) = fixture();
        let ctx = ResetContext {
            config: &config,
            user: &user,
            completion: &completion,
            now: 100,
        };
        let err = registry.on_reset(&ctx).unwrap_err();
        assert!(matches!(err, HandlerError::Failed { ref handler, .. } if handler == "a"));
        assert_eq!(*calls.lock().unwrap(), vec!["a:on"]);
    }

    #[test]
    fn test_standard_registry() {
        let host = Arc::new(MemoryHost::new());
        let db = Arc::new(crate::db::Database::open_in_memory().unwrap());
        let registry = HandlerRegistry::standard(db, host.clone(), host);
        assert_eq!(
            registry.names(),
            vec!["archive", "grades", "quiz", "assign"]
        );
        assert_eq!(registry.len(), 4);
        assert!(HandlerRegistry::new().is_empty());
    }
}
