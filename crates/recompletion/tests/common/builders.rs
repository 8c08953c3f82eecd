//! Builders for course configurations used across integration tests.

#![allow(dead_code)]

use recompletion::config::{BodyFormat, CourseConfig, EmailBody, PluginSettings, RecompletionType};
use recompletion::host::{CourseId, Timestamp};

pub struct CourseConfigBuilder {
    config: CourseConfig,
}

impl CourseConfigBuilder {
    /// Starts from the plugin defaults with archiving and grade deletion off.
    pub fn new(course: CourseId) -> Self {
        let mut config = CourseConfig::defaults(course, &PluginSettings::default());
        config.archive_completion_data = false;
        config.delete_grade_data = false;
        Self { config }
    }

    pub fn period(mut self, duration: i64) -> Self {
        self.config.recompletion_type = RecompletionType::Period;
        self.config.duration = duration;
        self
    }

    pub fn schedule(mut self, expression: &str, next_reset_time: Timestamp) -> Self {
        self.config.recompletion_type = RecompletionType::Schedule;
        self.config.schedule = expression.to_string();
        self.config.next_reset_time = next_reset_time;
        self
    }

    pub fn ondemand(mut self) -> Self {
        self.config.recompletion_type = RecompletionType::OnDemand;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.config.recompletion_type = RecompletionType::Disabled;
        self
    }

    pub fn reminder(mut self, seconds: i64, subject: &str, body: &str) -> Self {
        self.config.reminder_enable = true;
        self.config.reminder_seconds = seconds;
        self.config.reminder_subject = subject.to_string();
        self.config.reminder_body = EmailBody {
            text: body.to_string(),
            format: BodyFormat::Html,
        };
        self
    }

    pub fn reset_email(mut self, subject: &str, body: &str) -> Self {
        self.config.email_enable = true;
        self.config.email_subject = subject.to_string();
        self.config.email_body = EmailBody::html(body);
        self
    }

    pub fn unenrol(mut self, unenrol: bool, reset_unenrols_user: bool) -> Self {
        self.config.unenrol_enable = unenrol;
        self.config.reset_unenrol_user = reset_unenrols_user;
        self
    }

    pub fn delete_grades(mut self) -> Self {
        self.config.delete_grade_data = true;
        self
    }

    pub fn archive(mut self) -> Self {
        self.config.archive_completion_data = true;
        self
    }

    pub fn activity_policy(mut self, activity: &str, policy: u8) -> Self {
        self.config
            .extra
            .insert(activity.to_string(), policy.to_string());
        self
    }

    pub fn build(self) -> CourseConfig {
        self.config
    }
}
