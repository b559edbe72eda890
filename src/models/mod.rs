//! Data models for the JDFlows application.
//!
//! - [`ApplicationConfig`]: the validated configuration tree persisted as `app.json` + `system.json`
//! - [`GlobalState`]: the observable runtime state (collection progress, UI state, task map)
//! - [`TaskState`] / [`TaskStatus`]: a single unit of collection work
//!
//! # Architecture Note
//!
//! Config structs are plain serde records validated after parsing. `GlobalState` is
//! wrapped by [`StateManager`](crate::state::StateManager); mutate it only through the
//! manager so observers are notified.

pub mod config;
pub mod state;

pub use config::{
    AppConfig, ApplicationConfig, BrowserConfig, DatabaseConfig, LogLevel, LoggingConfig,
    SystemConfig, WindowConfig,
};
pub use state::{
    CollectionState, CollectionStatus, GlobalState, TaskMetadata, TaskState, TaskStatus, UiState,
};
