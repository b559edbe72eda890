// JDFlows - Desktop shell for JD.com product data collection
//
// This is the library crate containing the application core, configuration,
// state management and the Slint GUI layer. The binary crate (main.rs) parses
// the command line and runs the application.

pub mod app;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
pub mod ui;
pub mod utils;

// Re-export commonly used types for convenience
pub use app::{AppOptions, JdFlowsApplication, create_application};
pub use config::ConfigManager;
pub use crate::core::{ApplicationCore, ApplicationState};
pub use error::{ConfigError, CoreError, GuiError, JdFlowsError, StateError};
pub use models::{ApplicationConfig, GlobalState, TaskState, TaskStatus};
pub use state::{StateChange, StateManager, WeakStateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application display name
pub const APP_NAME: &str = "JDFlows";
