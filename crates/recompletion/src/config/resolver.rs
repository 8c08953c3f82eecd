use std::sync::Arc;

use crate::config::course::{keys, CourseConfig};
use crate::config::schema::PluginSettings;
use crate::error::Result;
use crate::host::{ConfigStore, CourseId, Timestamp};

/// Reads and writes per-course configuration, filling gaps from the
/// plugin-wide settings.
#[derive(Clone)]
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
    settings: Arc<PluginSettings>,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ConfigStore>, settings: Arc<PluginSettings>) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// Effective configuration of a course. A course without stored rows
    /// resolves to a disabled config.
    pub fn resolve_config(&self, course: CourseId) -> Result<CourseConfig> {
        let pairs = self.store.load_course_config(course)?;
        if pairs.is_empty() {
            return Ok(CourseConfig::defaults(course, &self.settings));
        }
        Ok(CourseConfig::from_pairs(course, pairs, &self.settings)?)
    }

    pub fn save_config(&self, config: &CourseConfig) -> Result<()> {
        self.store
            .replace_course_config(config.course, &config.to_pairs())?;
        log::debug!(
            "Saved recompletion config for course {} (type {})",
            config.course,
            config.recompletion_type
        );
        Ok(())
    }

    pub fn set_next_reset_time(&self, course: CourseId, time: Timestamp) -> Result<()> {
        self.store
            .set_course_value(course, keys::NEXT_RESET_TIME, &time.to_string())?;
        Ok(())
    }

    pub fn enabled_courses(&self) -> Result<Vec<CourseId>> {
        Ok(self.store.enabled_courses()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::course::RecompletionType;
    use crate::db::Database;

    fn resolver(settings: PluginSettings) -> ConfigResolver {
        let db = Database::open_in_memory().unwrap();
        ConfigResolver::new(Arc::new(db), Arc::new(settings))
    }

    #[test]
    fn test_course_without_rows_is_disabled() {
        let resolver = resolver(PluginSettings::default());
        let config = resolver.resolve_config(42).unwrap();
        assert_eq!(config.recompletion_type, RecompletionType::Disabled);
        assert_eq!(config.course, 42);
        assert!(resolver.enabled_courses().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_resolve() {
        let resolver = resolver(PluginSettings::default());
        let mut config = CourseConfig::defaults(7, resolver.settings());
        config.recompletion_type = RecompletionType::Schedule;
        config.schedule = "first day of next month".to_string();
        resolver.save_config(&config).unwrap();

        let loaded = resolver.resolve_config(7).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(resolver.enabled_courses().unwrap(), vec![7]);

        resolver.set_next_reset_time(7, 1_900_000_000).unwrap();
        assert_eq!(
            resolver.resolve_config(7).unwrap().next_reset_time,
            1_900_000_000
        );
    }

    #[test]
    fn test_forced_archive_applies_on_resolve() {
        let db = Database::open_in_memory().unwrap();
        let store: Arc<dyn ConfigStore> = Arc::new(db);
        let plain = ConfigResolver::new(store.clone(), Arc::new(PluginSettings::default()));
        let mut config = CourseConfig::defaults(3, plain.settings());
        config.recompletion_type = RecompletionType::Period;
        config.archive_completion_data = false;
        plain.save_config(&config).unwrap();
        assert!(!plain.resolve_config(3).unwrap().archive_completion_data);

        let forced = ConfigResolver::new(
            store,
            Arc::new(PluginSettings {
                force_archive_completion_data: true,
                ..PluginSettings::default()
            }),
        );
        assert!(forced.resolve_config(3).unwrap().archive_completion_data);
    }
}
