//! Tracing subscriber setup: stdout plus an optional log file.
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LEVEL: &str = "info";
const DEFAULT_LOG_FILE: &str = "logfile.log";

/// Where and how much to log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set, e.g. `debug` or `sim_runtime=trace`.
    pub level: String,
    /// Log file; `None` logs to stdout only.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_owned(),
            file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}

impl LoggingConfig {
    /// Reads `SIMULATION_LOG_LEVEL` and `SIMULATION_LOG_FILE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// An empty `SIMULATION_LOG_FILE` disables the file output.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(level) =
            lookup("SIMULATION_LOG_LEVEL").filter(|level| !level.trim().is_empty())
        {
            config.level = level.trim().to_lowercase();
        }
        if let Some(file) = lookup("SIMULATION_LOG_FILE") {
            config.file = (!file.trim().is_empty()).then(|| PathBuf::from(file.trim()));
        }
        config
    }
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for as long as the process logs.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log level '{}'", config.level))?,
    };

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    let stdout_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(level = %config.level, file = ?config.file, "logging initialized");
    Ok(guard)
}

/// Non-blocking appender for `path`, creating its directory when missing.
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("log file path '{}' has no file name", path.display()))?;
    fs::create_dir_all(&directory)
        .with_context(|| format!("failed to create log directory {}", directory.display()))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_log_to_file_at_info() {
        let config = LoggingConfig::from_lookup(|_| None);
        assert_eq!(config.level, "info");
        assert_eq!(config.file, Some(PathBuf::from("logfile.log")));
    }

    #[test]
    fn empty_file_disables_file_output() {
        let config = LoggingConfig::from_lookup(|name| match name {
            "SIMULATION_LOG_LEVEL" => Some("DEBUG".to_owned()),
            "SIMULATION_LOG_FILE" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.level, "debug");
        assert_eq!(config.file, None);
    }

    #[test]
    fn file_writer_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run").join("simulation.log");

        let (mut writer, guard) = file_writer(&path).unwrap();
        writer.write_all(b"epoch 1 ready\n").unwrap();
        // Dropping the guard flushes the background writer.
        drop(guard);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "epoch 1 ready\n");
    }
}
