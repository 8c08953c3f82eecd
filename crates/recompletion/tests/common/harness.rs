//! Test harness for isolated reconciler runs.
//!
//! The `TestHarness` owns a temporary plugin database, an in-memory host and
//! a reconciler wired with the standard reset handlers. Time is fixed so
//! runs are repeatable.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use recompletion::config::{CourseConfig, PluginSettings};
use recompletion::host::{CompletionStore, CourseId, EnrolInstance, MemoryHost, Timestamp, UserId};
use recompletion::reconciler::{HostPorts, Reconciler, RunSummary};
use recompletion::Database;

pub const DAY: i64 = 86_400;
pub const WEEK: i64 = 7 * DAY;
pub const YEAR: i64 = 365 * DAY;

pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub db: Database,
    pub host: Arc<MemoryHost>,
    pub reconciler: Reconciler,
    pub now: DateTime<Utc>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(PluginSettings::default())
    }

    pub fn with_settings(settings: PluginSettings) -> Self {
        Self::with_ports(settings, |host| HostPorts::from_host(host))
    }

    /// Harness whose reconciler talks to ports built from the shared host,
    /// for tests that wrap a port.
    pub fn with_ports<F>(settings: PluginSettings, ports: F) -> Self
    where
        F: FnOnce(Arc<MemoryHost>) -> HostPorts,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("recompletion.db");
        let db = Database::open(&db_path).expect("Failed to open database");
        let host = Arc::new(MemoryHost::new());
        let reconciler = Reconciler::standard(db.clone(), settings, ports(host.clone()));

        Self {
            temp_dir,
            db_path,
            db,
            host,
            reconciler,
            now: Utc.with_ymd_and_hms(2026, 3, 18, 10, 30, 0).unwrap(),
        }
    }

    pub fn now_ts(&self) -> Timestamp {
        self.now.timestamp()
    }

    pub fn configure(&self, config: &CourseConfig) {
        self.reconciler
            .resolver()
            .save_config(config)
            .expect("Failed to save course config");
    }

    pub fn config(&self, course: CourseId) -> CourseConfig {
        self.reconciler
            .resolver()
            .resolve_config(course)
            .expect("Failed to resolve course config")
    }

    /// Creates and enrols a user through self enrolment.
    pub fn enrol(&self, user: UserId, course: CourseId) -> EnrolInstance {
        self.host
            .add_user(user, &format!("Learner{}", user), "Test");
        self.host.enrol_user(user, course, "self")
    }

    pub fn complete(&self, user: UserId, course: CourseId, at: Timestamp) {
        self.host
            .mark_complete(user, course, at)
            .expect("Failed to mark complete");
        assert!(self.host.is_complete(user, course).unwrap());
    }

    pub fn run(&self) -> RunSummary {
        self.reconciler.run(self.now).expect("Run failed")
    }
}
