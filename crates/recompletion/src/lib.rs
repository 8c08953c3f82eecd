pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod host;
pub mod reconciler;
pub mod schedule;
pub mod task;
pub mod telemetry;
pub mod tracker;

pub use config::{
    load_settings, ConfigResolver, CourseConfig, PluginSettings, RecompletionForm,
    RecompletionType,
};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, HandlerError, HostError, RecompletionError, Result};
pub use handlers::{HandlerRegistry, ResetContext, ResetHandler};
pub use host::MemoryHost;
pub use reconciler::{update_course_completion, HostPorts, Reconciler, RunFailure, RunSummary};
pub use schedule::{calculate_schedule_time, parse_schedule, try_parse_schedule};
pub use task::{CheckRecompletionTask, TaskScheduler};
pub use telemetry::{init_logging, LogFormat};
pub use tracker::ReminderTracker;
