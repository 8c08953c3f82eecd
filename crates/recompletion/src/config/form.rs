//! Model behind the course recompletion settings page.
//!
//! Rendering is left to the host; this module supplies the field defaults,
//! the validation rule, the schedule preview and the conversion between
//! stored name/value rows and editor-shaped form values.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::course::{keys, BodyFormat, CourseConfig, EmailBody, RecompletionType};
use crate::config::resolver::ConfigResolver;
use crate::config::schema::PluginSettings;
use crate::error::{ConfigError, Result};
use crate::host::{CourseId, Timestamp};
use crate::schedule::{parse_schedule, UNPARSEABLE};

pub const INVALID_SCHEDULE_DATE: &str = "Invalid schedule date";

const PREVIEW_FORMAT: &str = "%A, %-d %B %Y, %I:%M %p";

/// Fields rendered as rich-text editors, stored as `<name>` + `<name>_format`.
const EDITOR_FIELDS: &[&str] = &[keys::EMAIL_BODY, keys::REMINDER_BODY];

/// Checkbox fields. A browser omits unchecked boxes from a submission.
const CHECKBOX_FIELDS: &[&str] = &[
    keys::EMAIL_ENABLE,
    keys::REMINDER_ENABLE,
    keys::UNENROL_ENABLE,
    keys::RESET_UNENROLS_USER,
    keys::DELETE_GRADE_DATA,
    keys::ARCHIVE_COMPLETION_DATA,
];

/// Field name to error message.
pub type FormErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Editor(EmailBody),
    Text(String),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            FormValue::Editor(_) => None,
        }
    }
}

/// Values of the settings form keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData {
    fields: BTreeMap<String, FormValue>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds form values from stored rows, folding `<body>_format` into
    /// the editor value. A body stored without a format is HTML.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut raw: BTreeMap<String, String> = pairs.into_iter().collect();
        let mut fields = BTreeMap::new();

        for editor in EDITOR_FIELDS {
            let format_key = format!("{}_format", editor);
            let format = raw.remove(&format_key);
            if let Some(text) = raw.remove(*editor) {
                let format = format
                    .and_then(|code| code.trim().parse().ok())
                    .and_then(BodyFormat::from_code)
                    .unwrap_or_default();
                fields.insert(
                    editor.to_string(),
                    FormValue::Editor(EmailBody { text, format }),
                );
            }
        }

        fields.extend(raw.into_iter().map(|(k, v)| (k, FormValue::Text(v))));
        Self { fields }
    }

    /// Flattens editor values back into `<body>` and `<body>_format` rows.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.fields.len() + EDITOR_FIELDS.len());
        for (name, value) in &self.fields {
            match value {
                FormValue::Text(text) => pairs.push((name.clone(), text.clone())),
                FormValue::Editor(body) => {
                    pairs.push((name.clone(), body.text.clone()));
                    pairs.push((format!("{}_format", name), body.format.code().to_string()));
                }
            }
        }
        pairs
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FormValue::as_text)
    }

    pub fn set_text(&mut self, name: &str, value: impl Into<String>) {
        self.fields
            .insert(name.to_string(), FormValue::Text(value.into()));
    }

    pub fn set_editor(&mut self, name: &str, body: EmailBody) {
        self.fields.insert(name.to_string(), FormValue::Editor(body));
    }

    pub fn remove(&mut self, name: &str) -> Option<FormValue> {
        self.fields.remove(name)
    }

    fn overlay(&mut self, other: FormData) {
        self.fields.extend(other.fields);
    }
}

/// Settings form of one course.
pub struct RecompletionForm {
    course: CourseId,
    settings: PluginSettings,
    values: FormData,
}

impl RecompletionForm {
    /// Form for `course` with defaults from `settings`, overlaid with the
    /// course's stored rows when it has any.
    pub fn new(course: CourseId, settings: &PluginSettings, instance: &[(String, String)]) -> Self {
        let mut values = FormData::from_pairs(CourseConfig::defaults(course, settings).to_pairs());
        // Derived by the job, never edited.
        values.remove(keys::NEXT_RESET_TIME);
        values.overlay(FormData::from_pairs(instance.iter().cloned()));

        Self {
            course,
            settings: settings.clone(),
            values,
        }
    }

    pub fn course(&self) -> CourseId {
        self.course
    }

    /// Current values, ready for display.
    pub fn values(&self) -> &FormData {
        &self.values
    }

    /// Whether the archive checkbox is locked on by the plugin settings.
    pub fn archive_forced(&self) -> bool {
        self.settings.force_archive_completion_data
    }

    /// Checks a submission. A non-empty schedule must resolve to a time.
    pub fn validate(&self, data: &FormData, now: DateTime<Utc>) -> FormErrors {
        let mut errors = FormErrors::new();
        if let Some(schedule) = data.text(keys::SCHEDULE) {
            if !schedule.trim().is_empty() && parse_schedule(schedule, now) == UNPARSEABLE {
                errors.insert(keys::SCHEDULE.to_string(), INVALID_SCHEDULE_DATE.to_string());
            }
        }
        errors
    }

    /// Preview of when the stored schedule next fires, if it parses.
    pub fn calculated_time(&self, now: DateTime<Utc>) -> Option<String> {
        let schedule = self.values.text(keys::SCHEDULE)?;
        if schedule.trim().is_empty() {
            return None;
        }
        format_timestamp(parse_schedule(schedule, now))
    }

    /// Validates and stores a submission, returning the saved config. For
    /// `schedule` courses the next reset time is recomputed against `now`.
    pub fn submit(
        &mut self,
        resolver: &ConfigResolver,
        data: &FormData,
        now: DateTime<Utc>,
    ) -> Result<CourseConfig> {
        if !self.validate(data, now).is_empty() {
            let schedule = data.text(keys::SCHEDULE).unwrap_or_default();
            return Err(ConfigError::InvalidSchedule(schedule.to_string()).into());
        }

        let mut pairs = data.to_pairs();
        for checkbox in CHECKBOX_FIELDS {
            if data.get(checkbox).is_none() {
                pairs.push((checkbox.to_string(), "0".to_string()));
            }
        }

        let mut config = CourseConfig::from_pairs(self.course, pairs, &self.settings)?;
        config.next_reset_time = match config.recompletion_type {
            RecompletionType::Schedule => parse_schedule(&config.schedule, now),
            _ => 0,
        };
        resolver.save_config(&config)?;

        log::info!(
            "Recompletion settings updated for course {} (type {})",
            self.course,
            config.recompletion_type
        );

        let mut values = FormData::from_pairs(config.to_pairs());
        values.remove(keys::NEXT_RESET_TIME);
        self.values = values;
        Ok(config)
    }
}

fn format_timestamp(timestamp: Timestamp) -> Option<String> {
    if timestamp == UNPARSEABLE {
        return None;
    }
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|time| time.format(PREVIEW_FORMAT).to_string())
}
