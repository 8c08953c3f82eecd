//! In-process host used by tests and dry runs.
//!
//! Holds users, enrolments, completions, grades, activity attempts and an
//! outbox of sent emails behind a single mutex. Mirrors the host behaviour
//! the engine relies on: `mark_complete` does not overwrite an existing
//! completion, and un-enrolment removes the user from `enrolled_users`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::{
    AttemptStore, CompletionRecord, CompletionStore, CourseId, EmailSender, EnrolInstance,
    EnrolmentStore, GradeStore, OutgoingEmail, Timestamp, UserId, UserRecord,
};
use crate::error::HostError;

#[derive(Default)]
struct HostState {
    users: BTreeMap<UserId, UserRecord>,
    instances: Vec<EnrolInstance>,
    /// (instance id, user id)
    enrolments: BTreeSet<(i64, UserId)>,
    completions: BTreeMap<(UserId, CourseId), CompletionRecord>,
    grades: BTreeMap<(UserId, CourseId), f64>,
    attempts: BTreeMap<(String, UserId, CourseId), u32>,
    extra_attempts: BTreeMap<(String, UserId, CourseId), u32>,
    outbox: Vec<OutgoingEmail>,
}

#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HostState>, HostError> {
        self.state.lock().map_err(|_| HostError::LockPoisoned)
    }

    /// Lock for fixture helpers, which have no error channel.
    fn guard(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a user and returns it.
    pub fn add_user(&self, id: UserId, firstname: &str, lastname: &str) -> UserRecord {
        let user = UserRecord {
            id,
            email: format!(
                "{}.{}@example.com",
                firstname.to_lowercase(),
                lastname.to_lowercase()
            ),
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
        };
        self.guard().users.insert(id, user.clone());
        user
    }

    /// Enrols a user through the given method, creating the course's
    /// instance for that method on first use.
    pub fn enrol_user(&self, user: UserId, course: CourseId, method: &str) -> EnrolInstance {
        let mut state = self.guard();
        let existing = state
            .instances
            .iter()
            .find(|i| i.course_id == course && i.method == method)
            .cloned();
        let instance = match existing {
            Some(instance) => instance,
            None => {
                let created = EnrolInstance {
                    id: state.instances.len() as i64 + 1,
                    course_id: course,
                    method: method.to_string(),
                };
                state.instances.push(created.clone());
                created
            }
        };
        state.enrolments.insert((instance.id, user));
        state
            .completions
            .entry((user, course))
            .or_insert_with(|| CompletionRecord::new(user, course));
        instance
    }

    pub fn set_grade(&self, user: UserId, course: CourseId, grade: f64) {
        self.guard().grades.insert((user, course), grade);
    }

    pub fn grade(&self, user: UserId, course: CourseId) -> Option<f64> {
        self.guard().grades.get(&(user, course)).copied()
    }

    pub fn record_attempt(&self, activity: &str, user: UserId, course: CourseId) {
        *self
            .guard()
            .attempts
            .entry((activity.to_string(), user, course))
            .or_insert(0) += 1;
    }

    pub fn attempts(&self, activity: &str, user: UserId, course: CourseId) -> u32 {
        self.guard()
            .attempts
            .get(&(activity.to_string(), user, course))
            .copied()
            .unwrap_or(0)
    }

    pub fn extra_attempts(&self, activity: &str, user: UserId, course: CourseId) -> u32 {
        self.guard()
            .extra_attempts
            .get(&(activity.to_string(), user, course))
            .copied()
            .unwrap_or(0)
    }

    /// Emails delivered so far, oldest first.
    pub fn sent_emails(&self) -> Vec<OutgoingEmail> {
        self.guard().outbox.clone()
    }

    pub fn email_count(&self) -> usize {
        self.guard().outbox.len()
    }

    pub fn clear_emails(&self) {
        self.guard().outbox.clear();
    }
}

impl CompletionStore for MemoryHost {
    fn completions(&self, course: CourseId) -> Result<Vec<CompletionRecord>, HostError> {
        let state = self.lock()?;
        Ok(state
            .completions
            .values()
            .filter(|c| c.course_id == course)
            .cloned()
            .collect())
    }

    fn completion(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<CompletionRecord>, HostError> {
        Ok(self.lock()?.completions.get(&(user, course)).cloned())
    }

    fn mark_complete(
        &self,
        user: UserId,
        course: CourseId,
        time: Timestamp,
    ) -> Result<(), HostError> {
        let mut state = self.lock()?;
        let record = state
            .completions
            .entry((user, course))
            .or_insert_with(|| CompletionRecord::new(user, course));
        if record.time_completed.is_none() {
            record.time_completed = Some(time);
        }
        Ok(())
    }

    fn clear_completion(&self, user: UserId, course: CourseId) -> Result<(), HostError> {
        let mut state = self.lock()?;
        if let Some(record) = state.completions.get_mut(&(user, course)) {
            record.time_completed = None;
        }
        Ok(())
    }

    fn reaggregate(&self, user: UserId, course: CourseId) -> Result<(), HostError> {
        // No completion criteria are modelled: a cleared record stays incomplete.
        if !self.lock()?.completions.contains_key(&(user, course)) {
            return Err(HostError::CompletionFailed {
                user,
                course,
                reason: "no completion record".to_string(),
            });
        }
        Ok(())
    }
}

impl EnrolmentStore for MemoryHost {
    fn enrolled_users(&self, course: CourseId) -> Result<Vec<UserRecord>, HostError> {
        let state = self.lock()?;
        let instance_ids: BTreeSet<i64> = state
            .instances
            .iter()
            .filter(|i| i.course_id == course)
            .map(|i| i.id)
            .collect();
        let user_ids: BTreeSet<UserId> = state
            .enrolments
            .iter()
            .filter(|(instance, _)| instance_ids.contains(instance))
            .map(|(_, user)| *user)
            .collect();
        Ok(user_ids
            .into_iter()
            .filter_map(|id| state.users.get(&id).cloned())
            .collect())
    }

    fn is_enrolled(&self, user: UserId, course: CourseId) -> Result<bool, HostError> {
        Ok(!self.user_enrolments(user, course)?.is_empty())
    }

    fn user_enrolments(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Vec<EnrolInstance>, HostError> {
        let state = self.lock()?;
        Ok(state
            .instances
            .iter()
            .filter(|i| i.course_id == course && state.enrolments.contains(&(i.id, user)))
            .cloned()
            .collect())
    }

    fn unenrol_user(&self, instance: &EnrolInstance, user: UserId) -> Result<(), HostError> {
        let mut state = self.lock()?;
        if !state.enrolments.remove(&(instance.id, user)) {
            return Err(HostError::UnenrolFailed {
                instance: instance.id,
                user,
                reason: "user is not enrolled through this instance".to_string(),
            });
        }
        Ok(())
    }
}

impl EmailSender for MemoryHost {
    fn send_email(&self, email: &OutgoingEmail) -> Result<(), HostError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&email.to.id) {
            return Err(HostError::UserNotFound(email.to.id));
        }
        state.outbox.push(email.clone());
        Ok(())
    }
}

impl GradeStore for MemoryHost {
    fn delete_course_grades(&self, user: UserId, course: CourseId) -> Result<(), HostError> {
        self.lock()?.grades.remove(&(user, course));
        Ok(())
    }
}

impl AttemptStore for MemoryHost {
    fn delete_attempts(
        &self,
        activity: &str,
        user: UserId,
        course: CourseId,
    ) -> Result<u32, HostError> {
        Ok(self
            .lock()?
            .attempts
            .remove(&(activity.to_string(), user, course))
            .unwrap_or(0))
    }

    fn grant_extra_attempt(
        &self,
        activity: &str,
        user: UserId,
        course: CourseId,
    ) -> Result<(), HostError> {
        *self
            .lock()?
            .extra_attempts
            .entry((activity.to_string(), user, course))
            .or_insert(0) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailBody;
    use crate::host::EmailKind;

    #[test]
    fn test_mark_complete_does_not_overwrite() {
        let host = MemoryHost::new();
        host.mark_complete(1, 10, 100).unwrap();
        host.mark_complete(1, 10, 200).unwrap();
        assert_eq!(
            host.completion(1, 10).unwrap().unwrap().time_completed,
            Some(100)
        );

        host.clear_completion(1, 10).unwrap();
        assert!(!host.is_complete(1, 10).unwrap());
        host.mark_complete(1, 10, 200).unwrap();
        assert_eq!(
            host.completion(1, 10).unwrap().unwrap().time_completed,
            Some(200)
        );
    }

    #[test]
    fn test_enrol_and_unenrol() {
        let host = MemoryHost::new();
        host.add_user(1, "Ada", "Lovelace");
        let manual = host.enrol_user(1, 10, "manual");
        let again = host.enrol_user(1, 10, "manual");
        assert_eq!(manual, again);
        host.enrol_user(1, 10, "self");

        assert!(host.is_enrolled(1, 10).unwrap());
        assert_eq!(host.user_enrolments(1, 10).unwrap().len(), 2);
        assert_eq!(host.enrolled_users(10).unwrap().len(), 1);

        for instance in host.user_enrolments(1, 10).unwrap() {
            host.unenrol_user(&instance, 1).unwrap();
        }
        assert!(!host.is_enrolled(1, 10).unwrap());
        assert!(host.enrolled_users(10).unwrap().is_empty());
        assert!(host.unenrol_user(&manual, 1).is_err());
    }

    #[test]
    fn test_outbox_and_unknown_recipient() {
        let host = MemoryHost::new();
        let user = host.add_user(1, "Ada", "Lovelace");
        let mut email = OutgoingEmail {
            kind: EmailKind::Reminder,
            course_id: 10,
            to: user,
            subject: "Hello".to_string(),
            body: EmailBody::html("Body"),
        };
        host.send_email(&email).unwrap();
        assert_eq!(host.email_count(), 1);
        assert_eq!(host.sent_emails()[0].to.email, "ada.lovelace@example.com");

        email.to.id = 99;
        assert!(matches!(
            host.send_email(&email),
            Err(HostError::UserNotFound(99))
        ));
        host.clear_emails();
        assert_eq!(host.email_count(), 0);
    }

    #[test]
    fn test_grades_and_attempts() {
        let host = MemoryHost::new();
        host.set_grade(1, 10, 87.5);
        host.delete_course_grades(1, 10).unwrap();
        assert_eq!(host.grade(1, 10), None);

        host.record_attempt("quiz", 1, 10);
        host.record_attempt("quiz", 1, 10);
        assert_eq!(host.delete_attempts("quiz", 1, 10).unwrap(), 2);
        assert_eq!(host.attempts("quiz", 1, 10), 0);

        host.grant_extra_attempt("quiz", 1, 10).unwrap();
        assert_eq!(host.extra_attempts("quiz", 1, 10), 1);
    }
}
