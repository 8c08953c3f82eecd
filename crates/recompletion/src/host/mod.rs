//! Boundary between the recompletion engine and the learning platform.
//!
//! The host owns users, enrolments, completion state, grades and email
//! delivery; the engine only talks to it through the traits below. The
//! plugin's own tables (course config, log, completion archive) sit behind
//! [`ConfigStore`], [`LogStore`] and [`ArchiveStore`], which
//! [`crate::db::Database`] implements.

pub mod memory;

use serde::Serialize;

use crate::config::EmailBody;
use crate::db::DatabaseError;
use crate::error::HostError;

pub use memory::MemoryHost;

pub type CourseId = i64;
pub type UserId = i64;
/// Unix seconds.
pub type Timestamp = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
}

impl UserRecord {
    pub fn fullname(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }
}

/// A user's completion state for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub time_enrolled: Option<Timestamp>,
    pub time_started: Option<Timestamp>,
    /// `Some` while the course counts as completed.
    pub time_completed: Option<Timestamp>,
}

impl CompletionRecord {
    pub fn new(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            time_enrolled: None,
            time_started: None,
            time_completed: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.time_completed.is_some()
    }
}

/// One enrolment method instance of a course (manual, self, cohort...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolInstance {
    pub id: i64,
    pub course_id: CourseId,
    pub method: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailKind {
    Reminder,
    Reset,
}

/// A notification handed to the host for delivery. Placeholder
/// substitution in subject/body is up to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEmail {
    pub kind: EmailKind,
    pub course_id: CourseId,
    pub to: UserRecord,
    pub subject: String,
    pub body: EmailBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    Reminder,
    Reset,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Reminder => "reminder",
            LogAction::Reset => "reset",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reminder" => Some(LogAction::Reminder),
            "reset" => Some(LogAction::Reset),
            _ => None,
        }
    }
}

/// Append-only record of an action the job took for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub course_id: CourseId,
    pub user_id: UserId,
    pub action: LogAction,
    pub time: Timestamp,
}

impl LogEntry {
    pub fn new(course_id: CourseId, user_id: UserId, action: LogAction, time: Timestamp) -> Self {
        Self {
            course_id,
            user_id,
            action,
            time,
        }
    }
}

pub trait CompletionStore: Send + Sync {
    /// All completion records for a course, completed or not.
    fn completions(&self, course: CourseId) -> Result<Vec<CompletionRecord>, HostError>;

    fn completion(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<CompletionRecord>, HostError>;

    fn is_complete(&self, user: UserId, course: CourseId) -> Result<bool, HostError> {
        Ok(self
            .completion(user, course)?
            .is_some_and(|record| record.is_complete()))
    }

    /// Marks the course complete at `time`. Has no effect on a record that
    /// is already complete; clear it first.
    fn mark_complete(&self, user: UserId, course: CourseId, time: Timestamp)
        -> Result<(), HostError>;

    /// Clears `time_completed` so the course is no longer complete.
    fn clear_completion(&self, user: UserId, course: CourseId) -> Result<(), HostError>;

    /// Re-evaluates completion from the underlying criteria and drops any
    /// cached completion state.
    fn reaggregate(&self, user: UserId, course: CourseId) -> Result<(), HostError>;
}

pub trait EnrolmentStore: Send + Sync {
    /// Users with an active enrolment in the course.
    fn enrolled_users(&self, course: CourseId) -> Result<Vec<UserRecord>, HostError>;

    fn is_enrolled(&self, user: UserId, course: CourseId) -> Result<bool, HostError>;

    fn user_enrolments(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Vec<EnrolInstance>, HostError>;

    fn unenrol_user(&self, instance: &EnrolInstance, user: UserId) -> Result<(), HostError>;
}

pub trait EmailSender: Send + Sync {
    fn send_email(&self, email: &OutgoingEmail) -> Result<(), HostError>;
}

pub trait GradeStore: Send + Sync {
    fn delete_course_grades(&self, user: UserId, course: CourseId) -> Result<(), HostError>;
}

/// Attempts on gradable activities (quizzes, assignments...).
pub trait AttemptStore: Send + Sync {
    /// Returns the number of attempts removed.
    fn delete_attempts(
        &self,
        activity: &str,
        user: UserId,
        course: CourseId,
    ) -> Result<u32, HostError>;

    fn grant_extra_attempt(
        &self,
        activity: &str,
        user: UserId,
        course: CourseId,
    ) -> Result<(), HostError>;
}

/// Name/value configuration rows per course.
pub trait ConfigStore: Send + Sync {
    fn load_course_config(&self, course: CourseId) -> Result<Vec<(String, String)>, DatabaseError>;

    /// Replaces every row of the course with `pairs`.
    fn replace_course_config(
        &self,
        course: CourseId,
        pairs: &[(String, String)],
    ) -> Result<(), DatabaseError>;

    fn set_course_value(&self, course: CourseId, name: &str, value: &str)
        -> Result<(), DatabaseError>;

    /// Courses whose stored recompletion type is not disabled.
    fn enabled_courses(&self) -> Result<Vec<CourseId>, DatabaseError>;
}

pub trait LogStore: Send + Sync {
    fn append(&self, entry: &LogEntry) -> Result<(), DatabaseError>;

    /// Whether the user has an entry for the action at or after `since`.
    fn logged_since(
        &self,
        course: CourseId,
        user: UserId,
        action: LogAction,
        since: Timestamp,
    ) -> Result<bool, DatabaseError>;

    fn course_entries(&self, course: CourseId) -> Result<Vec<LogEntry>, DatabaseError>;
}

pub trait ArchiveStore: Send + Sync {
    fn archive_completion(
        &self,
        record: &CompletionRecord,
        archived_at: Timestamp,
    ) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fullname_trims_missing_parts() {
        let user = UserRecord {
            id: 1,
            email: "a@example.com".to_string(),
            firstname: "Ada".to_string(),
            lastname: String::new(),
        };
        assert_eq!(user.fullname(), "Ada");
    }

    #[test]
    fn test_log_action_round_trip() {
        for action in [LogAction::Reminder, LogAction::Reset] {
            assert_eq!(LogAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(LogAction::parse("unknown"), None);
    }

    #[test]
    fn test_completion_record_state() {
        let mut record = CompletionRecord::new(3, 7);
        assert!(!record.is_complete());
        record.time_completed = Some(1_700_000_000);
        assert!(record.is_complete());
    }
}
