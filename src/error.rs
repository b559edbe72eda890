//! Error types for JDFlows.
//!
//! Each subsystem owns a `thiserror` enum; [`JdFlowsError`] aggregates them for
//! callers that cross subsystem boundaries (the application shell, the GUI).

use crate::core::ApplicationState;
use camino::Utf8PathBuf;

/// Configuration load, validation and persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid JSON in configuration file {path}: {source}")]
    InvalidJson {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Configuration not loaded. Call load() first.")]
    NotLoaded,

    #[error("No configuration to save")]
    NothingToSave,

    #[error("Failed to access configuration file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// State container failures.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid {scope} state: {reason}")]
    Invariant { scope: String, reason: String },

    #[error("Failed to import state: {0}")]
    Import(#[source] serde_json::Error),

    #[error("Failed to export state: {0}")]
    Export(#[source] serde_json::Error),
}

/// Application lifecycle failures.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Cannot {operation}: application is in {state} state")]
    InvalidState {
        operation: &'static str,
        state: ApplicationState,
    },

    #[error("Initialization failed: {0}")]
    Initialization(#[source] anyhow::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Failed to prepare error log {path}: {source}")]
    ErrorLog {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// GUI construction and event loop failures.
#[derive(Debug, thiserror::Error)]
pub enum GuiError {
    #[error("Failed to create window: {0}")]
    Platform(#[from] slint::PlatformError),

    #[error("Settings could not be applied: {0}")]
    Settings(#[from] ConfigError),
}

/// Top-level error for the application shell.
#[derive(Debug, thiserror::Error)]
pub enum JdFlowsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Gui(#[from] GuiError),
}
