//! Process-wide logging setup.
//!
//! Installs a `tracing` fmt subscriber filtered by `RECOMPLETION_LOG`
//! (falling back to the given directive) and forwards `log` records into
//! it, so the crate's `log` macros and `tracing` spans end up in one stream.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RECOMPLETION_LOG";
pub const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Installs the global subscriber. Returns `false` when one was already
/// installed, in which case nothing changes.
pub fn init_logging(default_directive: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let installed = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .finish(),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(true)
                .finish(),
        ),
    };
    if installed.is_err() {
        return false;
    }

    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log records already routed elsewhere: {}", e);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_logging_is_idempotent() {
        assert!(init_logging(DEFAULT_DIRECTIVE, LogFormat::Text));
        assert!(!init_logging("debug", LogFormat::Json));
        log::info!("logging initialised");
    }
}
