//! Logging infrastructure for Subledger.
//!
//! Structured logging using the `tracing` ecosystem:
//!
//! - JSON lines written to `~/.subledger/logs/subledger.log` (daily rolling)
//! - Compact human-readable output on stderr
//! - `RUST_LOG` takes precedence over the built-in default filter
//!
//! ## Example
//!
//! ```no_run
//! use subledger_core::logging;
//!
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("subledger started");
//! tracing::debug!(service = "Yandex Plus", "looking up subscription");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{LedgerError, Result};

/// Base name of the rolling log file.
pub const LOG_FILE_NAME: &str = "subledger.log";

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the Subledger logging system.
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.subledger/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
///
/// # Returns
///
/// A [`LogGuard`] that must be held for the application lifetime so buffered
/// file output is flushed on exit.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| LedgerError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("subledger={default_level}")));

    // JSON layer for file output
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    // Human-readable layer for console output
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| LedgerError::internal(format!("failed to install subscriber: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for tests.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Root directory for Subledger state: `~/.subledger/`.
pub fn data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LedgerError::internal("home directory could not be determined"))?;
    Ok(home.join(".subledger"))
}

/// Get the default log directory path: `~/.subledger/logs/`.
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("logs"))
}

/// Convenience macro for logging ledger mutations.
///
/// # Example
///
/// ```ignore
/// log_ledger_event!("created", id = %sub.id, service = %sub.service_name);
/// ```
#[macro_export]
macro_rules! log_ledger_event {
    ($event:expr) => {
        tracing::info!(
            target: "subledger::ledger",
            event = $event,
            "ledger event"
        )
    };
    ($event:expr, $($field:tt)*) => {
        tracing::info!(
            target: "subledger::ledger",
            event = $event,
            $($field)*,
            "ledger event"
        )
    };
}
