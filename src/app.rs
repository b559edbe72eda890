//! Top-level application object.
//!
//! [`JdFlowsApplication`] owns the [`ApplicationCore`], the [`StateManager`] and,
//! while the window is open, the tokio runtime used by the GUI. `run()` starts
//! the core, drives the Slint event loop (or returns straight away in headless
//! mode) and always shuts the core down afterwards.

use crate::config::ConfigManager;
use crate::core::{ApplicationCore, ApplicationState};
use crate::error::JdFlowsError;
use crate::state::StateManager;
use crate::ui::GuiController;
use anyhow::Context;
use camino::Utf8PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Worker threads for the GUI's background runtime
const WORKER_THREADS: usize = 4;

/// How long to wait for background tasks after the window closes
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for [`JdFlowsApplication::new`].
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Directory holding `app.json` and `system.json`
    pub config_dir: Utf8PathBuf,
    /// Skip the window; `run()` returns 0 once the core has started
    pub headless: bool,
    /// Error log for the panic hook; `logs/errors.log` when unset
    pub error_log: Option<Utf8PathBuf>,
    /// Watch SIGINT/SIGTERM and exit on them
    pub signal_handlers: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            config_dir: Utf8PathBuf::from("config"),
            headless: false,
            error_log: None,
            signal_handlers: true,
        }
    }
}

pub struct JdFlowsApplication {
    options: AppOptions,
    core: ApplicationCore,
    state_manager: StateManager,
    gui_active: Arc<AtomicBool>,
}

impl JdFlowsApplication {
    pub fn new(options: AppOptions) -> Self {
        let mut core = ApplicationCore::new(crate::APP_NAME, options.config_dir.clone())
            .with_signal_handlers(options.signal_handlers);
        if let Some(error_log) = &options.error_log {
            core = core.with_error_log(error_log.clone());
        }

        Self {
            options,
            core,
            state_manager: StateManager::new(),
            gui_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Initialize the core and register the application's lifecycle callbacks
    ///
    /// # Errors
    /// [`JdFlowsError::Core`] if the core is not `Initializing` or any
    /// initialization step fails.
    pub fn initialize(&self) -> Result<(), JdFlowsError> {
        self.core.initialize().inspect_err(|e| {
            tracing::error!("Application initialization failed: {}", e);
        })?;
        tracing::info!("Application core initialized");

        self.core.register_startup_callback("app.startup", || {
            tracing::info!("Application startup callback executed");
            Ok(())
        });

        let gui_active = Arc::clone(&self.gui_active);
        self.core.register_shutdown_callback("app.shutdown", move || {
            tracing::info!("Application shutdown callback executed");
            if gui_active.load(Ordering::SeqCst) {
                tracing::info!("Closing main window...");
                slint::quit_event_loop().context("Failed to quit GUI event loop")?;
            }
            Ok(())
        });

        Ok(())
    }

    /// Run the application and return the process exit code
    ///
    /// Returns 1 if the application is not `Ready` or the GUI fails, 0 otherwise.
    /// The core is shut down before returning in every case.
    pub fn run(&self) -> i32 {
        let state = self.core.state();
        let code = if state != ApplicationState::Ready {
            tracing::error!(
                "Application must be initialized before running (state: {})",
                state
            );
            1
        } else {
            match self.run_until_closed() {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!("Application run failed: {:#}", e);
                    if let Some(handler) = self.core.exception_handler() {
                        handler.report(&e);
                    }
                    1
                }
            }
        };

        self.shutdown();
        code
    }

    fn run_until_closed(&self) -> anyhow::Result<()> {
        self.core.start()?;

        if self.options.headless {
            tracing::warn!("Running in headless mode, no window will be shown");
            return Ok(());
        }

        let config_manager = self
            .core
            .config_manager()
            .context("Configuration manager is not available")?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(WORKER_THREADS)
            .thread_name("jdflows-worker")
            .build()
            .context("Failed to create tokio runtime")?;
        tracing::info!("Tokio runtime initialized with {} worker threads", WORKER_THREADS);

        let controller = GuiController::new(
            self.state_manager.clone(),
            config_manager,
            runtime.handle().clone(),
        )?;

        tracing::info!("Starting GUI event loop...");
        self.gui_active.store(true, Ordering::SeqCst);
        let result = controller.run();
        self.gui_active.store(false, Ordering::SeqCst);
        tracing::info!("GUI closed");

        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
        result?;
        Ok(())
    }

    /// Stop the core unless it has already stopped. Safe to call repeatedly.
    pub fn shutdown(&self) {
        if self.core.state() != ApplicationState::Stopped {
            tracing::info!("Shutting down application...");
            self.core.stop();
        }
    }

    pub fn config_manager(&self) -> Option<Arc<ConfigManager>> {
        self.core.config_manager()
    }

    pub fn state(&self) -> ApplicationState {
        self.core.state()
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    pub fn core(&self) -> &ApplicationCore {
        &self.core
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }
}

/// Create and initialize an application.
pub fn create_application(options: AppOptions) -> Result<JdFlowsApplication, JdFlowsError> {
    let app = JdFlowsApplication::new(options);
    app.initialize()?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = AppOptions::default();
        assert_eq!(options.config_dir, Utf8PathBuf::from("config"));
        assert!(!options.headless);
        assert!(options.error_log.is_none());
        assert!(options.signal_handlers);
    }

    #[test]
    fn test_run_before_initialize_returns_error_code() {
        let app = JdFlowsApplication::new(AppOptions {
            headless: true,
            signal_handlers: false,
            ..Default::default()
        });

        assert_eq!(app.state(), ApplicationState::Initializing);
        assert_eq!(app.run(), 1);
        assert_eq!(app.state(), ApplicationState::Stopped);
        assert!(app.config_manager().is_none());
    }
}
