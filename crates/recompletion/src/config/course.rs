//! Per-course recompletion configuration and its name/value representation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::schema::{PluginSettings, MAX_DURATION_SECS};
use crate::error::ConfigError;
use crate::host::{CourseId, Timestamp};

/// Names of the stored configuration rows.
pub mod keys {
    pub const RECOMPLETION_TYPE: &str = "recompletiontype";
    pub const DURATION: &str = "recompletionduration";
    pub const SCHEDULE: &str = "recompletionschedule";
    pub const NEXT_RESET_TIME: &str = "nextresettime";
    pub const EMAIL_ENABLE: &str = "recompletionemailenable";
    pub const EMAIL_SUBJECT: &str = "recompletionemailsubject";
    pub const EMAIL_BODY: &str = "recompletionemailbody";
    pub const EMAIL_BODY_FORMAT: &str = "recompletionemailbody_format";
    pub const REMINDER_ENABLE: &str = "reminderemailenable";
    pub const REMINDER_DAYS: &str = "reminderemaildays";
    pub const REMINDER_SUBJECT: &str = "reminderemailsubject";
    pub const REMINDER_BODY: &str = "reminderemailbody";
    pub const REMINDER_BODY_FORMAT: &str = "reminderemailbody_format";
    pub const UNENROL_ENABLE: &str = "recompletionunenrolenable";
    pub const RESET_UNENROLS_USER: &str = "resetunenrolsuser";
    pub const DELETE_GRADE_DATA: &str = "deletegradedata";
    pub const ARCHIVE_COMPLETION_DATA: &str = "archivecompletiondata";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecompletionType {
    #[default]
    #[serde(rename = "")]
    Disabled,
    #[serde(rename = "period")]
    Period,
    #[serde(rename = "ondemand")]
    OnDemand,
    #[serde(rename = "schedule")]
    Schedule,
}

impl RecompletionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecompletionType::Disabled => "",
            RecompletionType::Period => "period",
            RecompletionType::OnDemand => "ondemand",
            RecompletionType::Schedule => "schedule",
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, RecompletionType::Disabled)
    }
}

impl fmt::Display for RecompletionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecompletionType::Disabled => write!(f, "disabled"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl FromStr for RecompletionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "0" | "disabled" => Ok(RecompletionType::Disabled),
            "period" => Ok(RecompletionType::Period),
            "ondemand" => Ok(RecompletionType::OnDemand),
            "schedule" => Ok(RecompletionType::Schedule),
            other => Err(format!("unknown recompletion type '{}'", other)),
        }
    }
}

/// Text format of an email body, persisted as its numeric code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    Moodle,
    #[default]
    Html,
    Plain,
    Markdown,
}

impl BodyFormat {
    pub fn code(&self) -> u8 {
        match self {
            BodyFormat::Moodle => 0,
            BodyFormat::Html => 1,
            BodyFormat::Plain => 2,
            BodyFormat::Markdown => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(BodyFormat::Moodle),
            1 => Some(BodyFormat::Html),
            2 => Some(BodyFormat::Plain),
            4 => Some(BodyFormat::Markdown),
            _ => None,
        }
    }
}

/// Email body as edited in the settings form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailBody {
    pub text: String,
    pub format: BodyFormat,
}

impl EmailBody {
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: BodyFormat::Html,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseConfig {
    pub course: CourseId,
    pub recompletion_type: RecompletionType,
    /// Seconds, used by `period`.
    pub duration: i64,
    /// Date expression, used by `schedule`.
    pub schedule: String,
    /// Derived by the job for `schedule` courses; 0 when not yet computed.
    pub next_reset_time: Timestamp,
    pub email_enable: bool,
    pub email_subject: String,
    pub email_body: EmailBody,
    pub reminder_enable: bool,
    /// Seconds before the reset at which the reminder is due.
    pub reminder_seconds: i64,
    pub reminder_subject: String,
    pub reminder_body: EmailBody,
    pub unenrol_enable: bool,
    pub reset_unenrol_user: bool,
    pub delete_grade_data: bool,
    pub archive_completion_data: bool,
    /// Rows owned by registered reset handlers, keyed by name.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl CourseConfig {
    /// Configuration of a course without stored rows: disabled, with the
    /// plugin-wide values filled in for display.
    pub fn defaults(course: CourseId, settings: &PluginSettings) -> Self {
        Self {
            course,
            recompletion_type: RecompletionType::Disabled,
            duration: settings.recompletion_duration,
            schedule: settings.recompletion_schedule.clone(),
            next_reset_time: 0,
            email_enable: settings.recompletion_email_enable,
            email_subject: settings.recompletion_email_subject.clone(),
            email_body: EmailBody::html(settings.recompletion_email_body.clone()),
            reminder_enable: settings.reminder_email_enable,
            reminder_seconds: settings.reminder_email_days,
            reminder_subject: settings.reminder_email_subject.clone(),
            reminder_body: EmailBody::html(settings.reminder_email_body.clone()),
            unenrol_enable: settings.recompletion_unenrol_enable,
            reset_unenrol_user: settings.reset_unenrols_user,
            delete_grade_data: settings.delete_grade_data,
            archive_completion_data: settings.archive_completion_data
                || settings.force_archive_completion_data,
            extra: BTreeMap::new(),
        }
    }

    /// Builds a config from stored rows. Keys that are absent keep the
    /// plugin-wide default; unknown keys are kept in `extra`.
    pub fn from_pairs<I>(
        course: CourseId,
        pairs: I,
        settings: &PluginSettings,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::defaults(course, settings);
        let invalid = |key: &str, value: &str| ConfigError::InvalidValue {
            course,
            key: key.to_string(),
            value: value.to_string(),
        };

        for (name, value) in pairs {
            match name.as_str() {
                keys::RECOMPLETION_TYPE => {
                    config.recompletion_type = value.parse().map_err(|_| invalid(&name, &value))?
                }
                keys::DURATION => {
                    config.duration = parse_duration(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::SCHEDULE => config.schedule = value,
                keys::NEXT_RESET_TIME => {
                    config.next_reset_time =
                        parse_int(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::EMAIL_ENABLE => {
                    config.email_enable =
                        parse_bool(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::EMAIL_SUBJECT => config.email_subject = value,
                keys::EMAIL_BODY => config.email_body.text = value,
                keys::EMAIL_BODY_FORMAT => {
                    config.email_body.format =
                        parse_format(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::REMINDER_ENABLE => {
                    config.reminder_enable =
                        parse_bool(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::REMINDER_DAYS => {
                    config.reminder_seconds =
                        parse_duration(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::REMINDER_SUBJECT => config.reminder_subject = value,
                keys::REMINDER_BODY => config.reminder_body.text = value,
                keys::REMINDER_BODY_FORMAT => {
                    config.reminder_body.format =
                        parse_format(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::UNENROL_ENABLE => {
                    config.unenrol_enable =
                        parse_bool(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::RESET_UNENROLS_USER => {
                    config.reset_unenrol_user =
                        parse_bool(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::DELETE_GRADE_DATA => {
                    config.delete_grade_data =
                        parse_bool(&value).ok_or_else(|| invalid(&name, &value))?
                }
                keys::ARCHIVE_COMPLETION_DATA => {
                    config.archive_completion_data =
                        parse_bool(&value).ok_or_else(|| invalid(&name, &value))?
                }
                _ => {
                    config.extra.insert(name, value);
                }
            }
        }

        if settings.force_archive_completion_data {
            config.archive_completion_data = true;
        }
        Ok(config)
    }

    /// Flattens the config into stored rows, booleans as `0`/`1`.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let flag = |b: bool| if b { "1" } else { "0" }.to_string();
        let mut pairs = vec![
            (keys::RECOMPLETION_TYPE, self.recompletion_type.as_str().to_string()),
            (keys::DURATION, self.duration.to_string()),
            (keys::SCHEDULE, self.schedule.clone()),
            (keys::NEXT_RESET_TIME, self.next_reset_time.to_string()),
            (keys::EMAIL_ENABLE, flag(self.email_enable)),
            (keys::EMAIL_SUBJECT, self.email_subject.clone()),
            (keys::EMAIL_BODY, self.email_body.text.clone()),
            (keys::EMAIL_BODY_FORMAT, self.email_body.format.code().to_string()),
            (keys::REMINDER_ENABLE, flag(self.reminder_enable)),
            (keys::REMINDER_DAYS, self.reminder_seconds.to_string()),
            (keys::REMINDER_SUBJECT, self.reminder_subject.clone()),
            (keys::REMINDER_BODY, self.reminder_body.text.clone()),
            (keys::REMINDER_BODY_FORMAT, self.reminder_body.format.code().to_string()),
            (keys::UNENROL_ENABLE, flag(self.unenrol_enable)),
            (keys::RESET_UNENROLS_USER, flag(self.reset_unenrol_user)),
            (keys::DELETE_GRADE_DATA, flag(self.delete_grade_data)),
            (keys::ARCHIVE_COMPLETION_DATA, flag(self.archive_completion_data)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect::<Vec<_>>();

        pairs.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }

    /// Whether un-enrolment is part of a reset.
    pub fn unenrols_on_reset(&self) -> bool {
        self.unenrol_enable || self.reset_unenrol_user
    }
}

/// Accepts the forms a checkbox or an admin setting may have been stored in.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return Some(0);
    }
    value.parse().ok()
}

/// Durations are whole seconds between zero and [`MAX_DURATION_SECS`].
fn parse_duration(value: &str) -> Option<i64> {
    parse_int(value).filter(|secs| (0..=MAX_DURATION_SECS).contains(secs))
}

fn parse_format(value: &str) -> Option<BodyFormat> {
    if value.trim().is_empty() {
        return Some(BodyFormat::Html);
    }
    value.trim().parse().ok().and_then(BodyFormat::from_code)
}
