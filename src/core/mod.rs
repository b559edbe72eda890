// Application core
//
// ApplicationCore owns the lifecycle state machine, the configuration manager,
// the process panic hook and OS signal watching. It runs named startup and
// shutdown callbacks in registration order.

pub mod exception_handler;
pub mod lifecycle;

pub use exception_handler::{
    ExceptionHandler, exception_handler, install_exception_handler, uninstall_exception_handler,
};
pub use lifecycle::ApplicationState;

use crate::config::ConfigManager;
use crate::error::CoreError;
use crate::logging::setup_logging_from_config;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing_appender::non_blocking::WorkerGuard;

/// A named lifecycle callback. Errors are logged and do not stop the sequence.
pub type LifecycleCallback = dyn Fn() -> anyhow::Result<()> + Send + Sync;

type NamedCallback = (String, Arc<LifecycleCallback>);

/// Background thread waiting for SIGINT/SIGTERM.
struct SignalWatcher {
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    fn stop(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            // stop() may be running on the watcher thread itself
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

struct CoreShared {
    app_name: String,
    config_dir: Utf8PathBuf,
    state: Mutex<ApplicationState>,
    config_manager: Mutex<Option<Arc<ConfigManager>>>,
    exception_handler: Mutex<Option<Arc<ExceptionHandler>>>,
    startup_callbacks: Mutex<Vec<NamedCallback>>,
    shutdown_callbacks: Mutex<Vec<NamedCallback>>,
    signal_watcher: Mutex<Option<SignalWatcher>>,
    log_guard: Mutex<Option<WorkerGuard>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle-managed application core
///
/// Clones share the same lifecycle; the signal watcher holds one to stop the
/// application from its own thread.
///
/// # Example
/// ```ignore
/// let core = ApplicationCore::new("JDFlows", "config").with_signal_handlers(false);
/// core.initialize()?;
/// core.start()?;
/// core.stop();
/// ```
#[derive(Clone)]
pub struct ApplicationCore {
    error_log: Utf8PathBuf,
    signal_handlers: bool,
    shared: Arc<CoreShared>,
}

impl ApplicationCore {
    pub fn new(app_name: impl Into<String>, config_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            error_log: Utf8PathBuf::from(exception_handler::DEFAULT_ERROR_LOG),
            signal_handlers: true,
            shared: Arc::new(CoreShared {
                app_name: app_name.into(),
                config_dir: config_dir.into(),
                state: Mutex::new(ApplicationState::Initializing),
                config_manager: Mutex::new(None),
                exception_handler: Mutex::new(None),
                startup_callbacks: Mutex::new(Vec::new()),
                shutdown_callbacks: Mutex::new(Vec::new()),
                signal_watcher: Mutex::new(None),
                log_guard: Mutex::new(None),
            }),
        }
    }

    /// Error log written by the panic hook (`logs/errors.log` by default).
    pub fn with_error_log(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.error_log = path.into();
        self
    }

    /// Whether `initialize()` starts watching SIGINT/SIGTERM (on by default).
    pub fn with_signal_handlers(mut self, enabled: bool) -> Self {
        self.signal_handlers = enabled;
        self
    }

    pub fn app_name(&self) -> &str {
        &self.shared.app_name
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.shared.config_dir
    }

    pub fn state(&self) -> ApplicationState {
        *lock(&self.shared.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == ApplicationState::Running
    }

    /// The configuration manager, available once `initialize()` succeeded.
    pub fn config_manager(&self) -> Option<Arc<ConfigManager>> {
        lock(&self.shared.config_manager).clone()
    }

    pub fn exception_handler(&self) -> Option<Arc<ExceptionHandler>> {
        lock(&self.shared.exception_handler).clone()
    }

    /// Initialize configuration, logging, the panic hook and signal watching
    ///
    /// # Errors
    /// - [`CoreError::InvalidState`] unless the core is `Initializing`
    /// - [`CoreError::Initialization`] if any step fails; the core moves to `Error`
    pub fn initialize(&self) -> Result<(), CoreError> {
        let current = self.state();
        if current != ApplicationState::Initializing {
            return Err(CoreError::InvalidState {
                operation: "initialize",
                state: current,
            });
        }

        tracing::info!("Initializing {}...", self.shared.app_name);
        match self.initialize_components() {
            Ok(()) => {
                *lock(&self.shared.state) = ApplicationState::Ready;
                tracing::info!("{} core initialized successfully", self.shared.app_name);
                Ok(())
            }
            Err(e) => {
                *lock(&self.shared.state) = ApplicationState::Error;
                tracing::error!("Failed to initialize application core: {:#}", e);
                Err(CoreError::Initialization(e))
            }
        }
    }

    fn initialize_components(&self) -> anyhow::Result<()> {
        let config_manager = ConfigManager::new(&self.shared.config_dir)
            .context("Failed to create configuration manager")?;
        let config = config_manager
            .get_or_create_default()
            .context("Failed to load configuration")?;
        *lock(&self.shared.config_manager) = Some(Arc::new(config_manager));

        let guard = setup_logging_from_config(&config.system.logging, true)?;
        if guard.is_some() {
            *lock(&self.shared.log_guard) = guard;
        }
        tracing::info!("Logging system initialized: {}", config.system.logging.file);

        let handler = install_exception_handler(Some(self.error_log.as_path()))?;
        *lock(&self.shared.exception_handler) = Some(handler);
        tracing::info!("Exception handler installed");

        if self.signal_handlers {
            let watcher = spawn_signal_watcher(Arc::clone(&self.shared))
                .context("Failed to start signal watcher")?;
            *lock(&self.shared.signal_watcher) = Some(watcher);
            tracing::info!("Signal handlers installed");
        }

        Ok(())
    }

    /// Start the application and run startup callbacks in registration order
    ///
    /// # Errors
    /// [`CoreError::InvalidState`] unless the core is `Ready`.
    pub fn start(&self) -> Result<(), CoreError> {
        {
            let mut state = lock(&self.shared.state);
            if *state != ApplicationState::Ready {
                return Err(CoreError::InvalidState {
                    operation: "start",
                    state: *state,
                });
            }
            *state = ApplicationState::Running;
        }

        tracing::info!("Starting {}...", self.shared.app_name);
        run_callbacks("Startup", &self.shared.startup_callbacks);
        tracing::info!("{} started successfully", self.shared.app_name);
        Ok(())
    }

    /// Stop the application gracefully
    ///
    /// Runs shutdown callbacks, stops signal watching and moves to `Stopped`.
    /// Stopping a stopped core only logs a warning.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn register_startup_callback<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!("Registered startup callback: {}", name);
        lock(&self.shared.startup_callbacks).push((name, Arc::new(callback)));
    }

    pub fn register_shutdown_callback<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!("Registered shutdown callback: {}", name);
        lock(&self.shared.shutdown_callbacks).push((name, Arc::new(callback)));
    }
}

impl CoreShared {
    fn stop(&self) {
        {
            let mut state = lock(&self.state);
            match *state {
                ApplicationState::Stopped => {
                    tracing::warn!("Application is already stopped");
                    return;
                }
                ApplicationState::Stopping => {
                    tracing::warn!("Application is already stopping");
                    return;
                }
                _ => *state = ApplicationState::Stopping,
            }
        }

        tracing::info!("Stopping {}...", self.app_name);
        run_callbacks("Shutdown", &self.shutdown_callbacks);

        let watcher = lock(&self.signal_watcher).take();
        if let Some(watcher) = watcher {
            watcher.stop();
        }

        *lock(&self.state) = ApplicationState::Stopped;
        tracing::info!("{} stopped successfully", self.app_name);
    }
}

fn run_callbacks(phase: &str, callbacks: &Mutex<Vec<NamedCallback>>) {
    // Snapshot so callbacks may register further callbacks
    let snapshot: Vec<NamedCallback> = lock(callbacks).clone();

    for (name, callback) in snapshot {
        match catch_unwind(AssertUnwindSafe(|| callback())) {
            Ok(Ok(())) => tracing::debug!("{} callback '{}' completed", phase, name),
            Ok(Err(e)) => tracing::error!("{} callback '{}' failed: {:#}", phase, name, e),
            Err(_) => tracing::error!("{} callback '{}' panicked", phase, name),
        }
    }
}

fn spawn_signal_watcher(shared: Arc<CoreShared>) -> std::io::Result<SignalWatcher> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    let handle = std::thread::Builder::new()
        .name("jdflows-signals".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                tokio::select! {
                    signal = shutdown_signal() => {
                        tracing::warn!("Received signal {}, initiating graceful shutdown...", signal);
                        shared.stop();
                        std::process::exit(0);
                    }
                    _ = cancel_rx => {
                        tracing::debug!("Signal watcher stopped");
                    }
                }
            });
        })?;

    Ok(SignalWatcher {
        cancel: Some(cancel_tx),
        handle: Some(handle),
    })
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for SIGINT: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = ctrl_c() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        },
        Err(e) => {
            tracing::warn!("Failed to listen for SIGTERM: {}", e);
            ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    ctrl_c().await;
    "SIGINT"
}
