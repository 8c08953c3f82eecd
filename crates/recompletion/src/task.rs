//! Scheduled entry point and the loop that drives it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::config::PluginSettings;
use crate::db::{default_database_path, Database};
use crate::error::{RecompletionError, Result};
use crate::reconciler::{HostPorts, Reconciler, RunSummary};

/// The periodic recompletion check.
pub struct CheckRecompletionTask {
    reconciler: Arc<Reconciler>,
}

impl CheckRecompletionTask {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }

    /// Opens the plugin database named by the settings (or the default
    /// location) and wires the standard reconciler.
    pub fn from_settings(settings: PluginSettings, ports: HostPorts) -> Result<Self> {
        let path = match &settings.task.database_path {
            Some(path) => PathBuf::from(path),
            None => default_database_path().ok_or_else(|| {
                RecompletionError::Task("cannot determine home directory".to_string())
            })?,
        };
        let db = Database::open(&path)?;
        Ok(Self::new(Arc::new(Reconciler::standard(db, settings, ports))))
    }

    pub fn name(&self) -> &'static str {
        "check_recompletion"
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn execute(&self) -> Result<RunSummary> {
        self.execute_at(Utc::now())
    }

    pub fn execute_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        self.reconciler.run(now)
    }
}

/// Runs the task on an interval in a background thread.
pub struct TaskScheduler {
    task: Arc<CheckRecompletionTask>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    runs: Arc<AtomicU64>,
}

impl TaskScheduler {
    pub fn new(task: Arc<CheckRecompletionTask>, interval: Duration) -> Self {
        Self {
            task,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            runs: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_settings(task: Arc<CheckRecompletionTask>, settings: &PluginSettings) -> Self {
        Self::new(task, Duration::from_secs(settings.task.interval_secs.max(1)))
    }

    /// Number of runs finished so far, successful or not.
    pub fn completed_runs(&self) -> u64 {
        self.runs.load(Ordering::Acquire)
    }

    /// Start the loop in a background thread. A message on `trigger_rx`
    /// runs the task immediately.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let task = Arc::clone(&self.task);
        let shutdown = Arc::clone(&self.shutdown);
        let runs = Arc::clone(&self.runs);
        let interval = self.interval;

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start {} scheduler: {}", task.name(), e);
                    return;
                }
            };

            rt.block_on(async {
                let mut interval_timer = tokio::time::interval(interval);
                interval_timer.tick().await; // skip immediate first tick

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = interval_timer.tick() => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Manual {} run triggered", task.name());
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    match task.execute() {
                        Ok(summary) if summary.has_failures() => log::warn!(
                            "{} finished with {} failure(s)",
                            task.name(),
                            summary.failures.len()
                        ),
                        Ok(_) => {}
                        Err(e) => log::error!("{} failed: {}", task.name(), e),
                    }
                    runs.fetch_add(1, Ordering::AcqRel);
                }
            });
        })
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
