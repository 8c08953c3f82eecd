use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::schema::PluginSettings;
use crate::error::ConfigError;
use crate::schedule::{parse_schedule, UNPARSEABLE};

const SCHEMA_JSON: &str = include_str!("../../schema/settings-v1.json");

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<PluginSettings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

/// Loads settings from `path` when it exists, otherwise returns defaults.
pub fn load_settings_or_default<P: AsRef<Path>>(path: P) -> Result<PluginSettings, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!(
            "No settings file at {}, using plugin defaults",
            path.display()
        );
        return Ok(PluginSettings::default());
    }
    load_settings(path)
}

pub fn load_settings_from_str(content: &str) -> Result<PluginSettings, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let settings: PluginSettings = serde_json::from_value(json_value)?;

    validate_settings(&settings)?;

    Ok(settings)
}

/// Returns the canonical settings path: `~/.recompletion/settings.json`.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".recompletion").join("settings.json"))
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_settings(settings: &PluginSettings) -> Result<(), ConfigError> {
    if settings.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported settings version: {}", settings.version),
        });
    }

    if !settings.recompletion_schedule.trim().is_empty()
        && parse_schedule(&settings.recompletion_schedule, Utc::now()) == UNPARSEABLE
    {
        return Err(ConfigError::InvalidSchedule(
            settings.recompletion_schedule.clone(),
        ));
    }

    if settings.reminder_email_enable && settings.reminder_email_days <= 0 {
        return Err(ConfigError::Validation {
            message: "reminder_email_days must be positive when reminders are enabled"
                .to_string(),
        });
    }

    Ok(())
}
