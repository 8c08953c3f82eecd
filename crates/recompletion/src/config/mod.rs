pub mod course;
pub mod form;
pub mod loader;
pub mod resolver;
pub mod schema;

pub use course::{keys, BodyFormat, CourseConfig, EmailBody, RecompletionType};
pub use form::{FormData, FormErrors, FormValue, RecompletionForm};
pub use loader::{
    default_settings_path, load_settings, load_settings_from_str, load_settings_or_default,
};
pub use resolver::ConfigResolver;
pub use schema::{PluginSettings, TaskSettings, DAY_SECS, MAX_DURATION_SECS, YEAR_SECS};
