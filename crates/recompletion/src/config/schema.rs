use serde::{Deserialize, Serialize};

pub const DAY_SECS: i64 = 86_400;
pub const YEAR_SECS: i64 = 365 * DAY_SECS;
/// Upper bound for stored durations and reminder lead times.
pub const MAX_DURATION_SECS: i64 = 100 * YEAR_SECS;

/// Plugin-wide settings. Course configs fall back to these values and the
/// settings form uses them as field defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSettings {
    pub version: String,
    #[serde(default)]
    pub recompletion_email_enable: bool,
    #[serde(default)]
    pub reminder_email_enable: bool,
    #[serde(default)]
    pub recompletion_unenrol_enable: bool,
    /// Seconds after completion before a `period` reset is due.
    #[serde(default = "default_duration")]
    pub recompletion_duration: i64,
    #[serde(default)]
    pub recompletion_schedule: String,
    #[serde(default = "default_email_subject")]
    pub recompletion_email_subject: String,
    #[serde(default = "default_email_body")]
    pub recompletion_email_body: String,
    /// Seconds before the reset at which the reminder becomes due.
    #[serde(default = "default_reminder_days")]
    pub reminder_email_days: i64,
    #[serde(default = "default_reminder_subject")]
    pub reminder_email_subject: String,
    #[serde(default = "default_reminder_body")]
    pub reminder_email_body: String,
    #[serde(default)]
    pub reset_unenrols_user: bool,
    #[serde(default)]
    pub delete_grade_data: bool,
    #[serde(default = "default_true")]
    pub archive_completion_data: bool,
    /// Archive completion data on every reset, whatever the course says.
    #[serde(default)]
    pub force_archive_completion_data: bool,
    #[serde(default)]
    pub task: TaskSettings,
}

fn default_true() -> bool {
    true
}

fn default_duration() -> i64 {
    YEAR_SECS
}

fn default_reminder_days() -> i64 {
    14 * DAY_SECS
}

fn default_email_subject() -> String {
    "Course completion reset: {coursename}".to_string()
}

fn default_email_body() -> String {
    "Hi {fullname},\n\nYour completion of {coursename} has expired and has been reset. \
     Please complete the course again."
        .to_string()
}

fn default_reminder_subject() -> String {
    "Course completion expiring soon: {coursename}".to_string()
}

fn default_reminder_body() -> String {
    "Hi {fullname},\n\nYour completion of {coursename} will expire on {resetdate}. \
     Please plan to complete the course again."
        .to_string()
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            recompletion_email_enable: false,
            reminder_email_enable: false,
            recompletion_unenrol_enable: false,
            recompletion_duration: default_duration(),
            recompletion_schedule: String::new(),
            recompletion_email_subject: default_email_subject(),
            recompletion_email_body: default_email_body(),
            reminder_email_days: default_reminder_days(),
            reminder_email_subject: default_reminder_subject(),
            reminder_email_body: default_reminder_body(),
            reset_unenrols_user: false,
            delete_grade_data: false,
            archive_completion_data: true,
            force_archive_completion_data: false,
            task: TaskSettings::default(),
        }
    }
}

/// Settings for the periodic check task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSettings {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// SQLite file holding the plugin tables. Defaults to
    /// `~/.recompletion/data/recompletion.db`.
    #[serde(default)]
    pub database_path: Option<String>,
}

fn default_interval() -> u64 {
    3_600
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            database_path: None,
        }
    }
}
