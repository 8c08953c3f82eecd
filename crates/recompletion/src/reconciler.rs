//! The recompletion job: decides per enrolled, completed user whether a
//! reminder or a reset is due and carries it out.
//!
//! Each run re-evaluates everything from persisted state, so a user whose
//! reset failed half-way is simply picked up again by the next run.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tracing::{debug_span, info_span};

use crate::config::{ConfigResolver, CourseConfig, EmailBody, PluginSettings, RecompletionType};
use crate::db::Database;
use crate::error::{HostError, Result};
use crate::handlers::{HandlerRegistry, ResetContext};
use crate::host::{
    AttemptStore, CompletionRecord, CompletionStore, CourseId, EmailKind, EmailSender,
    EnrolmentStore, GradeStore, LogStore, OutgoingEmail, Timestamp, UserId, UserRecord,
};
use crate::schedule::{parse_schedule, UNPARSEABLE};
use crate::tracker::ReminderTracker;

/// Host services the job calls into.
#[derive(Clone)]
pub struct HostPorts {
    pub completions: Arc<dyn CompletionStore>,
    pub enrolments: Arc<dyn EnrolmentStore>,
    pub mailer: Arc<dyn EmailSender>,
    pub grades: Arc<dyn GradeStore>,
    pub attempts: Arc<dyn AttemptStore>,
}

impl HostPorts {
    /// Uses one host object for every port.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: CompletionStore + EnrolmentStore + EmailSender + GradeStore + AttemptStore + 'static,
    {
        Self {
            completions: host.clone(),
            enrolments: host.clone(),
            mailer: host.clone(),
            grades: host.clone(),
            attempts: host,
        }
    }
}

/// A failure isolated to one course or one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    pub course: CourseId,
    /// `None` when the whole course failed.
    pub user: Option<UserId>,
    pub error: String,
}

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub courses_processed: u32,
    pub courses_skipped: u32,
    pub courses_failed: u32,
    pub reminders_sent: u32,
    pub resets: u32,
    pub unenrolments: u32,
    pub failures: Vec<RunFailure>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn user_failed(&mut self, course: CourseId, user: UserId, error: impl ToString) {
        self.failures.push(RunFailure {
            course,
            user: Some(user),
            error: error.to_string(),
        });
    }
}

enum CourseOutcome {
    Processed,
    Skipped,
}

/// Reset time of a `schedule` course for this run.
#[derive(Debug, Clone, Copy)]
struct ScheduledReset {
    /// Stored `nextresettime`.
    due_at: Timestamp,
    /// The expression resolved against now; replaces `due_at` once it passes.
    following: Timestamp,
}

impl ScheduledReset {
    /// Whether a completion at `time_completed` is reset now, and when its
    /// next reset is otherwise. Completions at or after a passed reset time
    /// belong to the following one.
    fn for_completion(&self, time_completed: Timestamp, now: Timestamp) -> (bool, Timestamp) {
        if now < self.due_at {
            (false, self.due_at)
        } else if time_completed < self.due_at {
            (true, self.due_at)
        } else {
            (false, self.following)
        }
    }
}

/// Side effects of one user's reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOutcome {
    pub email_sent: bool,
    pub unenrolments: u32,
}

pub struct Reconciler {
    resolver: ConfigResolver,
    ports: HostPorts,
    tracker: ReminderTracker,
    handlers: HandlerRegistry,
}

impl Reconciler {
    pub fn new(
        resolver: ConfigResolver,
        ports: HostPorts,
        log: Arc<dyn LogStore>,
        handlers: HandlerRegistry,
    ) -> Self {
        Self {
            resolver,
            ports,
            tracker: ReminderTracker::new(log),
            handlers,
        }
    }

    /// Reconciler over the plugin database with the standard handlers.
    pub fn standard(db: Database, settings: PluginSettings, ports: HostPorts) -> Self {
        let db = Arc::new(db);
        let resolver = ConfigResolver::new(db.clone(), Arc::new(settings));
        let handlers =
            HandlerRegistry::standard(db.clone(), ports.grades.clone(), ports.attempts.clone());
        Self::new(resolver, ports, db, handlers)
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Processes every enabled course. Fails only when the course list
    /// cannot be read; everything else is recorded in the summary.
    pub fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let _span = info_span!("recompletion_run", now = now.timestamp()).entered();

        let courses = self.resolver.enabled_courses()?;
        let mut summary = RunSummary::default();

        for course in courses {
            match self.process_course(course, now, &mut summary) {
                Ok(CourseOutcome::Processed) => summary.courses_processed += 1,
                Ok(CourseOutcome::Skipped) => summary.courses_skipped += 1,
                Err(e) => {
                    warn!("Recompletion failed for course {}: {}", course, e);
                    summary.courses_failed += 1;
                    summary.failures.push(RunFailure {
                        course,
                        user: None,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Recompletion run finished: {} course(s) processed, {} skipped, {} failed, \
             {} reminder(s), {} reset(s)",
            summary.courses_processed,
            summary.courses_skipped,
            summary.courses_failed,
            summary.reminders_sent,
            summary.resets
        );
        Ok(summary)
    }

    fn process_course(
        &self,
        course: CourseId,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<CourseOutcome> {
        let _span = info_span!("course", course).entered();
        let config = self.resolver.resolve_config(course)?;

        // `schedule` courses share one reset time; `period` derives it per user.
        let scheduled = match config.recompletion_type {
            RecompletionType::Disabled => return Ok(CourseOutcome::Skipped),
            RecompletionType::OnDemand => {
                debug!("Course {} resets on demand only", course);
                return Ok(CourseOutcome::Skipped);
            }
            RecompletionType::Period => {
                if config.duration <= 0 {
                    warn!(
                        "Course {} has no recompletion duration, skipping",
                        course
                    );
                    return Ok(CourseOutcome::Skipped);
                }
                None
            }
            RecompletionType::Schedule => {
                let parsed = parse_schedule(&config.schedule, now);
                if parsed == UNPARSEABLE {
                    warn!(
                        "Course {} has an invalid recompletion schedule '{}', skipping",
                        course, config.schedule
                    );
                    return Ok(CourseOutcome::Skipped);
                }
                let due_at = if config.next_reset_time > 0 {
                    config.next_reset_time
                } else {
                    self.resolver.set_next_reset_time(course, parsed)?;
                    parsed
                };
                Some(ScheduledReset {
                    due_at,
                    following: parsed,
                })
            }
        };

        let now_ts = now.timestamp();
        let mut reset_failures = 0;

        for (user, completion) in self.eligible_users(course)? {
            let Some(time_completed) = completion.time_completed else {
                continue;
            };
            let _user_span = debug_span!("user", user = user.id).entered();
            let (reset_due, next_reset) = match &scheduled {
                Some(schedule) => schedule.for_completion(time_completed, now_ts),
                None => {
                    let next_reset = time_completed.saturating_add(config.duration);
                    (now_ts >= next_reset, next_reset)
                }
            };

            if reset_due {
                match self.reset_user(&config, &user, &completion, now_ts) {
                    Ok(outcome) => {
                        summary.resets += 1;
                        summary.unenrolments += outcome.unenrolments;
                    }
                    Err(e) => {
                        warn!(
                            "Reset failed for user {} in course {}: {}",
                            user.id, course, e
                        );
                        reset_failures += 1;
                        summary.user_failed(course, user.id, e);
                    }
                }
            } else if self.reminder_due(&config, next_reset, now_ts) {
                match self.remind_user(&config, &user, time_completed, now_ts) {
                    Ok(true) => summary.reminders_sent += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(
                            "Reminder failed for user {} in course {}: {}",
                            user.id, course, e
                        );
                        summary.user_failed(course, user.id, e);
                    }
                }
            }
        }

        if let Some(schedule) = scheduled.filter(|s| now_ts >= s.due_at) {
            if reset_failures > 0 {
                // Keep the due time so the failed users are retried.
                warn!(
                    "Course {} keeps its reset time after {} failure(s)",
                    course, reset_failures
                );
            } else {
                self.resolver.set_next_reset_time(course, schedule.following)?;
                info!(
                    "Course {} next reset time set to {}",
                    course, schedule.following
                );
            }
        }

        Ok(CourseOutcome::Processed)
    }

    /// Enrolled users holding a completion record for the course.
    fn eligible_users(&self, course: CourseId) -> Result<Vec<(UserRecord, CompletionRecord)>> {
        let mut enrolled: BTreeMap<UserId, UserRecord> = self
            .ports
            .enrolments
            .enrolled_users(course)?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(self
            .ports
            .completions
            .completions(course)?
            .into_iter()
            .filter_map(|c| enrolled.remove(&c.user_id).map(|u| (u, c)))
            .collect())
    }

    /// The reminder window opens `reminder_seconds` before the reset and
    /// includes its first second.
    fn reminder_due(&self, config: &CourseConfig, next_reset: Timestamp, now: Timestamp) -> bool {
        config.reminder_enable && now >= next_reset.saturating_sub(config.reminder_seconds)
    }

    /// Sends the reminder unless one went out this cycle. Returns whether
    /// an email was sent.
    fn remind_user(
        &self,
        config: &CourseConfig,
        user: &UserRecord,
        time_completed: Timestamp,
        now: Timestamp,
    ) -> Result<bool> {
        if self
            .tracker
            .already_reminded(config.course, user.id, time_completed)?
        {
            return Ok(false);
        }

        self.send(
            EmailKind::Reminder,
            config,
            user,
            &config.reminder_subject,
            &config.reminder_body,
        )?;
        self.tracker.record_reminder(config.course, user.id, now)?;
        info!(
            "Sent recompletion reminder to user {} in course {}",
            user.id, config.course
        );
        Ok(true)
    }

    /// Resets one user. The first failing step aborts the rest.
    pub fn reset_user(
        &self,
        config: &CourseConfig,
        user: &UserRecord,
        completion: &CompletionRecord,
        now: Timestamp,
    ) -> Result<ResetOutcome> {
        let course = config.course;
        let mut outcome = ResetOutcome::default();

        if config.email_enable {
            self.send(
                EmailKind::Reset,
                config,
                user,
                &config.email_subject,
                &config.email_body,
            )?;
            outcome.email_sent = true;
        }

        let ctx = ResetContext {
            config,
            user,
            completion,
            now,
        };
        self.handlers.before_reset(&ctx)?;
        self.handlers.on_reset(&ctx)?;

        self.ports.completions.clear_completion(user.id, course)?;
        self.ports.completions.reaggregate(user.id, course)?;

        if config.unenrols_on_reset() {
            for instance in self.ports.enrolments.user_enrolments(user.id, course)? {
                self.ports.enrolments.unenrol_user(&instance, user.id)?;
                outcome.unenrolments += 1;
            }
        }

        self.tracker.record_reset(course, user.id, now)?;
        info!(
            "Reset completion of user {} in course {} ({} unenrolment(s))",
            user.id, course, outcome.unenrolments
        );
        Ok(outcome)
    }

    /// Resets the given users of a course now, whatever the course type
    /// and their completion state.
    pub fn reset_users(
        &self,
        course: CourseId,
        users: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<RunSummary> {
        let _span = info_span!("manual_reset", course, users = users.len()).entered();
        let config = self.resolver.resolve_config(course)?;
        let enrolled: BTreeMap<UserId, UserRecord> = self
            .ports
            .enrolments
            .enrolled_users(course)?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut summary = RunSummary::default();
        for &user_id in users {
            let result: Result<ResetOutcome> = match enrolled.get(&user_id) {
                Some(user) => self
                    .ports
                    .completions
                    .completion(user_id, course)
                    .map_err(Into::into)
                    .and_then(|completion| {
                        let completion =
                            completion.unwrap_or_else(|| CompletionRecord::new(user_id, course));
                        self.reset_user(&config, user, &completion, now.timestamp())
                    }),
                None => Err(HostError::UserNotFound(user_id).into()),
            };

            match result {
                Ok(outcome) => {
                    summary.resets += 1;
                    summary.unenrolments += outcome.unenrolments;
                }
                Err(e) => {
                    warn!(
                        "Manual reset failed for user {} in course {}: {}",
                        user_id, course, e
                    );
                    summary.user_failed(course, user_id, e);
                }
            }
        }
        summary.courses_processed = 1;
        Ok(summary)
    }

    fn send(
        &self,
        kind: EmailKind,
        config: &CourseConfig,
        user: &UserRecord,
        subject: &str,
        body: &EmailBody,
    ) -> Result<()> {
        let email = OutgoingEmail {
            kind,
            course_id: config.course,
            to: user.clone(),
            subject: subject.to_string(),
            body: body.clone(),
        };
        self.ports.mailer.send_email(&email)?;
        Ok(())
    }
}

/// Sets the completion date of the given users. A completed record is
/// cleared first, since marking complete never overwrites a completion.
pub fn update_course_completion(
    store: &dyn CompletionStore,
    course: CourseId,
    users: &[UserId],
    time_completed: Timestamp,
) -> std::result::Result<(), HostError> {
    for &user in users {
        if store.is_complete(user, course)? {
            store.clear_completion(user, course)?;
        }
        store.mark_complete(user, course, time_completed)?;
    }
    debug!(
        "Updated completion date of {} user(s) in course {}",
        users.len(),
        course
    );
    Ok(())
}
