//! Reminder dedup over the action log.
//!
//! A completion cycle starts at the user's `time_completed`. A reminder
//! logged at or after that time belongs to the current cycle, so at most
//! one reminder goes out per cycle.

use std::sync::Arc;

use log::debug;

use crate::db::DatabaseError;
use crate::host::{CourseId, LogAction, LogEntry, LogStore, Timestamp, UserId};

#[derive(Clone)]
pub struct ReminderTracker {
    log: Arc<dyn LogStore>,
}

impl ReminderTracker {
    pub fn new(log: Arc<dyn LogStore>) -> Self {
        Self { log }
    }

    /// Whether a reminder was already sent in the cycle that started at
    /// `time_completed`.
    pub fn already_reminded(
        &self,
        course: CourseId,
        user: UserId,
        time_completed: Timestamp,
    ) -> Result<bool, DatabaseError> {
        self.log
            .logged_since(course, user, LogAction::Reminder, time_completed)
    }

    pub fn record_reminder(
        &self,
        course: CourseId,
        user: UserId,
        now: Timestamp,
    ) -> Result<(), DatabaseError> {
        self.record(LogEntry::new(course, user, LogAction::Reminder, now))
    }

    pub fn record_reset(
        &self,
        course: CourseId,
        user: UserId,
        now: Timestamp,
    ) -> Result<(), DatabaseError> {
        self.record(LogEntry::new(course, user, LogAction::Reset, now))
    }

    fn record(&self, entry: LogEntry) -> Result<(), DatabaseError> {
        self.log.append(&entry)?;
        debug!(
            "Logged {} for user {} in course {} at {}",
            entry.action.as_str(),
            entry.user_id,
            entry.course_id,
            entry.time
        );
        Ok(())
    }
}
