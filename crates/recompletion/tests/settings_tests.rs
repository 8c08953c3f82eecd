//! Plugin settings files and the course settings form, end to end.

mod common;

use std::fs;

use chrono::Duration;

use common::harness::DAY;
use common::TestHarness;
use recompletion::config::{
    keys, load_settings, load_settings_or_default, FormData, RecompletionForm, RecompletionType,
    MAX_DURATION_SECS,
};
use recompletion::{parse_schedule, ConfigError, RecompletionError};

#[test]
fn test_settings_file_drives_course_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(
        &path,
        r#"{
            "version": "1.0",
            "recompletion_duration": 2592000,
            "reminder_email_enable": true,
            "force_archive_completion_data": true,
            "task": { "interval_secs": 300 }
        }"#,
    )
    .unwrap();

    let settings = load_settings(&path).unwrap();
    assert_eq!(settings.recompletion_duration, 30 * DAY);
    assert_eq!(settings.task.interval_secs, 300);

    let h = TestHarness::with_settings(settings);
    let config = h.config(5);
    assert_eq!(config.recompletion_type, RecompletionType::Disabled);
    assert_eq!(config.duration, 30 * DAY);
    assert!(config.reminder_enable);
    assert!(config.archive_completion_data);
}

#[test]
fn test_rejected_settings_files() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        load_settings(&missing),
        Err(ConfigError::ReadFile { .. })
    ));
    assert_eq!(
        load_settings_or_default(&missing).unwrap().version,
        "1.0".to_string()
    );

    let unknown = dir.path().join("unknown.json");
    fs::write(&unknown, r#"{ "version": "1.0", "colour": "blue" }"#).unwrap();
    assert!(load_settings(&unknown).is_err());

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    assert!(matches!(
        load_settings(&broken),
        Err(ConfigError::ParseJson(_))
    ));
}

#[test]
fn test_form_submission_feeds_the_job() {
    let h = TestHarness::new();
    let mut form = RecompletionForm::new(1, h.reconciler.resolver().settings(), &[]);

    let mut data = form.values().clone();
    data.set_text(keys::RECOMPLETION_TYPE, "schedule");
    data.set_text(keys::SCHEDULE, "1 week");
    data.set_text(keys::EMAIL_ENABLE, "1");
    data.set_text(keys::EMAIL_SUBJECT, "Time to recertify");
    // Unchecked boxes are absent from a submission.
    data.remove(keys::ARCHIVE_COMPLETION_DATA);
    data.remove(keys::UNENROL_ENABLE);

    // Saved eight days ago, so the first reset is a day overdue.
    let saved_at = h.now - Duration::days(8);
    let saved = form.submit(h.reconciler.resolver(), &data, saved_at).unwrap();
    assert_eq!(saved.recompletion_type, RecompletionType::Schedule);
    assert_eq!(saved.next_reset_time, h.now_ts() - DAY);
    assert!(!saved.archive_completion_data);
    assert!(!saved.unenrol_enable);
    assert_eq!(h.config(1), saved);

    h.enrol(1, 1);
    h.complete(1, 1, h.now_ts() - 3 * DAY);
    let summary = h.run();
    assert_eq!(summary.resets, 1);
    let emails = h.host.sent_emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, "Time to recertify");

    // The job moved the reset time forward; the form never shows it.
    assert_eq!(h.config(1).next_reset_time, parse_schedule("1 week", h.now));
    let reloaded = RecompletionForm::new(
        1,
        h.reconciler.resolver().settings(),
        &h.config(1).to_pairs(),
    );
    assert!(reloaded.values().get(keys::NEXT_RESET_TIME).is_none());
    assert_eq!(
        reloaded.values().text(keys::EMAIL_SUBJECT),
        Some("Time to recertify")
    );
}

#[test]
fn test_invalid_schedule_is_not_saved() {
    let h = TestHarness::new();
    let mut form = RecompletionForm::new(2, h.reconciler.resolver().settings(), &[]);

    let mut data = FormData::new();
    data.set_text(keys::RECOMPLETION_TYPE, "schedule");
    data.set_text(keys::SCHEDULE, "whenever it suits");

    let errors = form.validate(&data, h.now);
    assert_eq!(
        errors.get(keys::SCHEDULE).map(String::as_str),
        Some("Invalid schedule date")
    );
    assert!(matches!(
        form.submit(h.reconciler.resolver(), &data, h.now),
        Err(RecompletionError::Config(ConfigError::InvalidSchedule(_)))
    ));
    assert_eq!(h.config(2).recompletion_type, RecompletionType::Disabled);
    assert_eq!(h.run().courses_processed, 0);
}

#[test]
fn test_out_of_range_durations_are_rejected() {
    let h = TestHarness::new();
    let mut form = RecompletionForm::new(3, h.reconciler.resolver().settings(), &[]);

    for (key, value) in [
        (keys::DURATION, i64::MAX.to_string()),
        (keys::DURATION, "-1".to_string()),
        (keys::REMINDER_DAYS, (MAX_DURATION_SECS + 1).to_string()),
    ] {
        let mut data = form.values().clone();
        data.set_text(keys::RECOMPLETION_TYPE, "period");
        data.set_text(key, &value);
        assert!(
            matches!(
                form.submit(h.reconciler.resolver(), &data, h.now),
                Err(RecompletionError::Config(ConfigError::InvalidValue { course: 3, .. }))
            ),
            "{} = {}",
            key,
            value
        );
    }
    assert_eq!(h.config(3).recompletion_type, RecompletionType::Disabled);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(
        &path,
        format!(
            r#"{{ "version": "1.0", "recompletion_duration": {} }}"#,
            MAX_DURATION_SECS + 1
        ),
    )
    .unwrap();
    assert!(load_settings(&path).is_err());
}
