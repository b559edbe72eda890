use crate::error::CoreError;
use crate::models::LoggingConfig;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::time::Instant;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Resolved file-output policy derived from [`LoggingConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct FileLogPolicy {
    pub directory: Utf8PathBuf,
    pub file_prefix: String,
    pub rotation: RotationPolicy,
    pub max_files: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl From<RotationPolicy> for Rotation {
    fn from(policy: RotationPolicy) -> Self {
        match policy {
            RotationPolicy::Minutely => Rotation::MINUTELY,
            RotationPolicy::Hourly => Rotation::HOURLY,
            RotationPolicy::Daily => Rotation::DAILY,
            RotationPolicy::Never => Rotation::NEVER,
        }
    }
}

/// Parse a rotation setting.
///
/// Time keywords map directly. Size-based values such as `100 MB` have no
/// equivalent in the rolling appender and fall back to daily rotation.
pub fn parse_rotation(rotation: &str) -> RotationPolicy {
    match rotation.trim().to_ascii_lowercase().as_str() {
        "minutely" | "1 minute" => RotationPolicy::Minutely,
        "hourly" | "1 hour" => RotationPolicy::Hourly,
        "never" | "none" | "" => RotationPolicy::Never,
        _ => RotationPolicy::Daily,
    }
}

/// Parse a retention setting such as `30 days` or `12 files` into a file count.
pub fn parse_retention(retention: &str) -> Option<usize> {
    let mut parts = retention.split_whitespace();
    let count: usize = parts.next()?.parse().ok()?;
    let files = match parts.next().map(|unit| unit.to_ascii_lowercase()) {
        None => count,
        Some(unit) if unit.starts_with("day") || unit.starts_with("file") => count,
        Some(unit) if unit.starts_with("week") => count.checked_mul(7)?,
        _ => return None,
    };
    (files > 0).then_some(files)
}

impl FileLogPolicy {
    pub fn from_config(config: &LoggingConfig) -> Self {
        let path = Utf8PathBuf::from(&config.file);
        let directory = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        let file_prefix = path
            .file_stem()
            .filter(|stem| !stem.is_empty())
            .unwrap_or("jdflows")
            .to_string();

        Self {
            directory,
            file_prefix,
            rotation: parse_rotation(&config.rotation),
            max_files: parse_retention(&config.retention),
        }
    }
}

fn create_log_dir(log_dir: &Utf8Path) -> Result<(), CoreError> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir).map_err(|e| {
            CoreError::Logging(format!("Failed to create log directory {}: {}", log_dir, e))
        })?;
    }
    Ok(())
}

/// Setup logging from the configuration's logging policy.
///
/// Logs go to a rolling file under the configured directory and, if
/// `console_output` is set, to stderr with ANSI colours. `RUST_LOG` overrides
/// the configured level.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep file
/// logging active, or `None` if a global subscriber was already installed
/// (the existing subscriber is left in place).
pub fn setup_logging_from_config(
    config: &LoggingConfig,
    console_output: bool,
) -> Result<Option<WorkerGuard>, CoreError> {
    let policy = FileLogPolicy::from_config(config);
    create_log_dir(&policy.directory)?;

    if !config.compression.is_empty() {
        tracing::debug!(
            "Log compression '{}' is not applied to rotated files",
            config.compression
        );
    }

    let mut builder = RollingFileAppender::builder()
        .rotation(policy.rotation.into())
        .filename_prefix(&policy.file_prefix)
        .filename_suffix("log");
    if let Some(max_files) = policy.max_files {
        builder = builder.max_log_files(max_files);
    }
    let file_appender = builder
        .build(policy.directory.as_std_path())
        .map_err(|e| CoreError::Logging(format!("Failed to create log file appender: {}", e)))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed; keeping existing logging setup");
        return Ok(None);
    }

    tracing::info!(
        "Logging initialized: level={}, dir={}, prefix={}, rotation={:?}, console={}",
        config.level,
        policy.directory,
        policy.file_prefix,
        policy.rotation,
        console_output
    );

    Ok(Some(guard))
}

/// Times a scope and logs how long it took when dropped.
///
/// Durations at or above `threshold_secs` are logged as warnings, the rest at
/// debug level.
///
/// # Example
/// ```ignore
/// let _perf = PerformanceLogger::new("config load", 1.0);
/// ```
pub struct PerformanceLogger {
    name: String,
    threshold_secs: f64,
    start: Instant,
}

impl PerformanceLogger {
    pub fn new(name: impl Into<String>, threshold_secs: f64) -> Self {
        let name = name.into();
        tracing::debug!("[PERF] Starting: {}", name);
        Self {
            name,
            threshold_secs,
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for PerformanceLogger {
    fn drop(&mut self) {
        let elapsed = self.elapsed_secs();
        if elapsed >= self.threshold_secs {
            tracing::warn!(
                "[PERF] {} took {:.3}s (threshold: {}s)",
                self.name,
                elapsed,
                self.threshold_secs
            );
        } else {
            tracing::debug!("[PERF] {} took {:.3}s", self.name, elapsed);
        }
    }
}
