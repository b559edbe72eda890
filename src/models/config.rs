use crate::error::ConfigError;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

// ===== Validation bounds =====

pub const WINDOW_WIDTH_RANGE: (u32, u32) = (800, 3840);
pub const WINDOW_HEIGHT_RANGE: (u32, u32) = (600, 2160);
pub const WINDOW_MIN_WIDTH_FLOOR: u32 = 640;
pub const WINDOW_MIN_HEIGHT_FLOOR: u32 = 480;
pub const DB_POOL_SIZE_RANGE: (u32, u32) = (1, 50);
/// Browser timeout bounds in milliseconds
pub const BROWSER_TIMEOUT_RANGE: (u32, u32) = (1_000, 300_000);
pub const VIEWPORT_WIDTH_FLOOR: u32 = 800;
pub const VIEWPORT_HEIGHT_FLOOR: u32 = 600;

/// Complete application configuration.
///
/// Persisted as two documents by [`crate::config::ConfigManager`]:
/// - `app.json`: the `app` and `window` sections
/// - `system.json`: the `system` section at its root
///
/// Every section rejects unknown keys and fills missing keys with defaults.
/// Bounds are not enforced by deserialization; call [`validate()`](Self::validate).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplicationConfig {
    pub app: AppConfig,
    pub window: WindowConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "JDFlows".to_string(),
            version: "0.1.0".to_string(),
            debug: false,
        }
    }
}

/// Main window geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "JDFlows".to_string(),
            width: 1280,
            height: 800,
            min_width: 1024,
            min_height: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub echo: bool,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:///data/jdflows.db".to_string(),
            echo: false,
            pool_size: 5,
        }
    }
}

/// Logging policy applied by [`crate::logging::setup_logging_from_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: String,
    /// Rotation policy: `minutely`, `hourly`, `daily`, `never`, or a size such as `100 MB`
    pub rotation: String,
    /// Retention such as `30 days`
    pub retention: String,
    pub compression: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: "logs/jdflows.log".to_string(),
            rotation: "100 MB".to_string(),
            retention: "30 days".to_string(),
            compression: "zip".to_string(),
        }
    }
}

/// Browser defaults for the collection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Navigation timeout in milliseconds
    pub timeout: u32,
    pub user_agent: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: 30_000,
            user_agent: None,
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }
}

/// Log level accepted in `system.logging.level`.
///
/// Input is case-insensitive; output is always upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// The `tracing` filter directive for this level.
    ///
    /// `tracing` has no critical level, so CRITICAL maps onto `error`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == upper)
            .ok_or_else(|| {
                format!(
                    "Invalid log level: {}. Must be one of DEBUG, INFO, WARNING, ERROR, CRITICAL",
                    s
                )
            })
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, <LogLevel as TryFrom<String>>::Error> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

fn check_range(errors: &mut Vec<String>, field: &str, value: u32, (min, max): (u32, u32)) {
    if value < min || value > max {
        errors.push(format!(
            "{} must be between {} and {} (got {})",
            field, min, max, value
        ));
    }
}

fn check_floor(errors: &mut Vec<String>, field: &str, value: u32, min: u32) {
    if value < min {
        errors.push(format!("{} must be at least {} (got {})", field, min, value));
    }
}

impl AppConfig {
    pub(crate) fn collect_violations(&self, errors: &mut Vec<String>) {
        if self.name.trim().is_empty() {
            errors.push("app.name must not be empty".to_string());
        }
    }
}

impl WindowConfig {
    pub(crate) fn collect_violations(&self, errors: &mut Vec<String>) {
        check_range(errors, "window.width", self.width, WINDOW_WIDTH_RANGE);
        check_range(errors, "window.height", self.height, WINDOW_HEIGHT_RANGE);
        check_floor(errors, "window.min_width", self.min_width, WINDOW_MIN_WIDTH_FLOOR);
        check_floor(errors, "window.min_height", self.min_height, WINDOW_MIN_HEIGHT_FLOOR);
    }
}

impl SystemConfig {
    pub(crate) fn collect_violations(&self, errors: &mut Vec<String>) {
        check_range(
            errors,
            "system.database.pool_size",
            self.database.pool_size,
            DB_POOL_SIZE_RANGE,
        );
        check_range(
            errors,
            "system.browser.timeout",
            self.browser.timeout,
            BROWSER_TIMEOUT_RANGE,
        );
        check_floor(
            errors,
            "system.browser.viewport_width",
            self.browser.viewport_width,
            VIEWPORT_WIDTH_FLOOR,
        );
        check_floor(
            errors,
            "system.browser.viewport_height",
            self.browser.viewport_height,
            VIEWPORT_HEIGHT_FLOOR,
        );
    }
}

impl ApplicationConfig {
    /// Check every declared bound.
    ///
    /// # Errors
    /// [`ConfigError::Validation`] listing all violations, not just the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        self.app.collect_violations(&mut errors);
        self.window.collect_violations(&mut errors);
        self.system.collect_violations(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Get the log file path.
    pub fn log_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.system.logging.file)
    }

    /// Get the database file path if using SQLite.
    pub fn db_path(&self) -> Option<Utf8PathBuf> {
        self.system
            .database
            .url
            .strip_prefix("sqlite:///")
            .map(Utf8PathBuf::from)
    }
}
