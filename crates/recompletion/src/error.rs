use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecompletionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Reset handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Task error: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Settings validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid value '{value}' for '{key}' in course {course}")]
    InvalidValue {
        course: i64,
        key: String,
        value: String,
    },

    #[error("Invalid schedule expression '{0}'")]
    InvalidSchedule(String),
}

/// Errors reported by the host platform behind one of the port traits.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to send email to user {user}: {reason}")]
    EmailFailed { user: i64, reason: String },

    #[error("Failed to unenrol user {user} from enrolment {instance}: {reason}")]
    UnenrolFailed {
        instance: i64,
        user: i64,
        reason: String,
    },

    #[error("Completion update failed for user {user} in course {course}: {reason}")]
    CompletionFailed {
        user: i64,
        course: i64,
        reason: String,
    },

    #[error("Course {0} not found")]
    CourseNotFound(i64),

    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("Host state lock poisoned")]
    LockPoisoned,

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Handler '{handler}' failed: {reason}")]
    Failed { handler: String, reason: String },

    #[error("Invalid attempt policy '{value}' for activity '{activity}'")]
    InvalidPolicy { activity: String, value: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, RecompletionError>;
