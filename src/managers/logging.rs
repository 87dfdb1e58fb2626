//! Logging setup
//!
//! Console output always goes to stderr so stdout stays free for command
//! output. When a log file is configured, a second layer writes to it with
//! daily rotation.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{expand_tilde, LogFormat, LoggingSettings};

/// Resolved logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log file; `None` means console only
    pub file: Option<PathBuf>,
    pub level: Level,
    pub json: bool,
    /// Maximum number of rotated log files to keep
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: Level::INFO,
            json: false,
            max_files: 10,
        }
    }
}

impl LoggingConfig {
    /// Create from the `[logging]` section
    pub fn from_config(settings: &LoggingSettings) -> Self {
        Self {
            file: settings.file.as_deref().map(expand_tilde),
            level: parse_level(&settings.level),
            json: settings.format == LogFormat::Json,
            max_files: settings.max_files,
        }
    }

    /// Directory and file-name prefix for the rolling appender
    fn file_parts(&self) -> Option<(PathBuf, String)> {
        let file = self.file.as_ref()?;
        let name = file.file_name()?.to_string_lossy().to_string();
        let dir = match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Some((dir, name))
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber: stderr always, plus the rolling file when configured
///
/// Hold the returned guard until exit or buffered file output is lost.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let console_layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(level_filter(config.level))
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .with_level(true)
            .with_filter(level_filter(config.level))
            .boxed()
    };

    let mut file_guard = None;
    let file_layer = match config.file_parts() {
        Some((dir, name)) => {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory: {:?}", dir))?;

            let appender = RollingFileAppender::new(Rotation::DAILY, &dir, &name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);

            cleanup_old_logs(&dir, &name, config.max_files)?;

            let layer = if config.json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_filter(level_filter(config.level))
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true)
                    .with_filter(level_filter(config.level))
                    .boxed()
            };
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Stderr-only logging at `RUST_LOG` or info, for use before a config is loaded
pub fn init_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
}

/// Level filter; `RUST_LOG` wins when set
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Delete rotated `<prefix>*` files beyond the newest `max_files`
fn cleanup_old_logs(log_dir: &Path, prefix: &str, max_files: u32) -> Result<()> {
    let mut rotated: Vec<(Option<SystemTime>, PathBuf)> = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to list log directory: {:?}", log_dir))?
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| (entry.metadata().and_then(|m| m.modified()).ok(), entry.path()))
        .collect();

    rotated.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, path) in rotated.into_iter().skip(max_files as usize) {
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Pruned rotated log {:?}", path),
            Err(e) => tracing::warn!("Could not prune rotated log {:?}: {}", path, e),
        }
    }
    Ok(())
}

/// Owns the non-blocking file writer; dropping it flushes pending lines
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}
