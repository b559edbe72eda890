// GUI Controller - Bridges the Slint main window with application state
//
// This module contains the GuiController which coordinates between:
// - Slint UI (MainWindow, SettingsDialog)
// - StateManager (collection progress, UI state)
// - ConfigManager (window geometry, settings persistence)
// - EventLoopBridge (tokio/GUI coordination)

use super::{MainWindow, Palette, SettingsDialog};
use crate::config::ConfigManager;
use crate::error::GuiError;
use crate::models::{
    AppConfig, ApplicationConfig, CollectionStatus, GlobalState, TaskStatus, WindowConfig,
};
use crate::state::{StateChange, StateManager, WeakStateManager};
use crate::ui::bridge::EventLoopBridge;
use crate::ui::settings::open_settings_dialog;
use crate::ui::style::{StyleManager, Theme};
use crate::utils::formatters::format_percentage;
use slint::ComponentHandle;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};

type SharedStyle = Arc<Mutex<StyleManager>>;

/// GUI Controller that wires the main window to state and configuration
///
/// - Applies title and geometry from [`WindowConfig`] and the theme from the `ui` state key
/// - Wires menu actions, the start-collection and settings buttons
/// - Subscribes to [`StateChange`] events and mirrors collection progress in the window
///
/// # Example
/// ```ignore
/// let controller = GuiController::new(state_manager, config_manager, runtime.handle().clone())?;
/// controller.run()?;  // Blocks until the window is closed
/// ```
pub struct GuiController {
    ui: MainWindow,
    _bridge: EventLoopBridge<MainWindow>,
    style: SharedStyle,
}

impl GuiController {
    /// Create the main window and wire it up
    ///
    /// # Errors
    /// [`GuiError::Settings`] if the configuration has not been loaded,
    /// [`GuiError::Platform`] if the window cannot be created.
    pub fn new(
        state_manager: StateManager,
        config_manager: Arc<ConfigManager>,
        tokio_handle: tokio::runtime::Handle,
    ) -> Result<Self, GuiError> {
        let config = config_manager.get_config()?;
        let ui = MainWindow::new()?;
        let bridge = EventLoopBridge::new(&ui, tokio_handle.clone());

        let theme = state_manager
            .get_ui_state()
            .theme
            .parse::<Theme>()
            .unwrap_or_else(|e| {
                tracing::warn!("{}, falling back to light theme", e);
                Theme::Light
            });
        let style = Arc::new(Mutex::new(StyleManager::new(theme)));

        Self::apply_window_config(&ui, &config.app, &config.window);
        Self::sync_ui_with_state(&ui, &state_manager.get_state(), &style);
        Self::setup_callbacks(&ui, &state_manager, &config_manager, &style, tokio_handle);
        Self::setup_state_subscription(&bridge, &state_manager, &style);

        tracing::info!("GUI controller initialized");

        Ok(Self {
            ui,
            _bridge: bridge,
            style,
        })
    }

    /// Run the GUI (blocks until the window is closed or the app exits)
    pub fn run(self) -> Result<(), GuiError> {
        tracing::info!("Starting GUI event loop");
        self.ui.run()?;
        tracing::info!("GUI event loop finished");
        Ok(())
    }

    pub fn update_status(&self, message: &str) {
        self.ui.set_status_text(message.into());
    }

    pub fn theme(&self) -> Theme {
        self.style.lock().unwrap_or_else(PoisonError::into_inner).theme()
    }

    fn apply_window_config(ui: &MainWindow, app: &AppConfig, window: &WindowConfig) {
        ui.set_window_title(window.title.clone().into());
        ui.set_initial_width(window.width as f32);
        ui.set_initial_height(window.height as f32);
        ui.set_min_window_width(window.min_width as f32);
        ui.set_min_window_height(window.min_height as f32);
        ui.set_app_name(app.name.clone().into());
        ui.set_version_text(format!("v{}", app.version).into());
    }

    /// Initialize the window from the current state snapshot.
    fn sync_ui_with_state(ui: &MainWindow, state: &GlobalState, style: &SharedStyle) {
        style
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(&ui.global::<Palette>());

        let collection = &state.collection;
        ui.set_collection_progress((collection.progress() / 100.0) as f32);
        ui.set_collection_summary(
            collection_summary(
                collection.status,
                collection.completed_tasks,
                collection.total_tasks,
                collection.progress(),
            )
            .into(),
        );
        ui.set_status_text("Ready".into());
    }

    /// Switch theme, repaint the open windows and record it under the `ui` state key.
    fn toggle_theme(
        ui: &MainWindow,
        settings: &Option<SettingsDialog>,
        style: &SharedStyle,
        state_manager: &StateManager,
    ) {
        let theme = {
            let mut style = style.lock().unwrap_or_else(PoisonError::into_inner);
            let theme = style.toggle_theme();
            style.apply(&ui.global::<Palette>());
            if let Some(dialog) = settings {
                style.apply(&dialog.global::<Palette>());
            }
            theme
        };

        if let Err(e) = state_manager.update_ui_state(|ui| ui.theme = theme.as_str().to_string()) {
            tracing::error!("Failed to record theme change: {}", e);
        }
        tracing::info!("Window theme changed to: {}", theme);
    }

    fn setup_callbacks(
        ui: &MainWindow,
        state_manager: &StateManager,
        config_manager: &Arc<ConfigManager>,
        style: &SharedStyle,
        tokio_handle: tokio::runtime::Handle,
    ) {
        // Keeps the open settings window alive; GUI thread only
        let settings_slot: Rc<RefCell<Option<SettingsDialog>>> = Rc::new(RefCell::new(None));

        ui.on_exit_app(|| {
            tracing::info!("Exit requested from menu");
            if let Err(e) = slint::quit_event_loop() {
                tracing::error!("Failed to quit event loop: {}", e);
            }
        });

        ui.window().on_close_requested(|| {
            tracing::info!("Main window closing");
            if let Err(e) = slint::quit_event_loop() {
                tracing::error!("Failed to quit event loop: {}", e);
            }
            slint::CloseRequestResponse::HideWindow
        });

        let ui_weak = ui.as_weak();
        let style_for_toggle = Arc::clone(style);
        let state_for_toggle = state_manager.clone();
        let slot_for_toggle = Rc::clone(&settings_slot);
        ui.on_toggle_theme(move || {
            if let Some(ui) = ui_weak.upgrade() {
                Self::toggle_theme(
                    &ui,
                    &slot_for_toggle.borrow(),
                    &style_for_toggle,
                    &state_for_toggle,
                );
            }
        });

        let ui_weak = ui.as_weak();
        let config_for_about = Arc::clone(config_manager);
        ui.on_show_about(move || {
            tracing::info!("About dialog requested");
            let Some(ui) = ui_weak.upgrade() else {
                return;
            };
            let text = match config_for_about.get_config() {
                Ok(config) => format!(
                    "{} v{} - JD product data collection",
                    config.app.name, config.app.version
                ),
                Err(_) => format!("{} v{}", crate::APP_NAME, crate::VERSION),
            };
            ui.set_status_text(text.into());
        });

        let ui_weak = ui.as_weak();
        ui.on_start_collection(move || {
            tracing::info!("Start collection requested");
            if let Some(ui) = ui_weak.upgrade() {
                ui.set_status_text("Collection is not available in this build".into());
            }
        });

        let ui_weak = ui.as_weak();
        let config_for_settings = Arc::clone(config_manager);
        let style_for_settings = Arc::clone(style);
        ui.on_open_settings(move || {
            tracing::info!("Settings dialog requested");
            let Some(ui) = ui_weak.upgrade() else {
                return;
            };

            let main_weak = ui.as_weak();
            let on_saved = move |config: &ApplicationConfig| {
                if let Some(ui) = main_weak.upgrade() {
                    Self::apply_window_config(&ui, &config.app, &config.window);
                    ui.window().set_size(slint::LogicalSize::new(
                        config.window.width as f32,
                        config.window.height as f32,
                    ));
                    ui.set_status_text("Settings saved".into());
                }
            };

            let style_now = style_for_settings
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            match open_settings_dialog(
                Arc::clone(&config_for_settings),
                &style_now,
                tokio_handle.clone(),
                on_saved,
            ) {
                Ok(dialog) => {
                    if let Err(e) = dialog.show() {
                        tracing::error!("Failed to show settings dialog: {}", e);
                        return;
                    }
                    *settings_slot.borrow_mut() = Some(dialog);
                }
                Err(e) => {
                    tracing::error!("Failed to open settings dialog: {}", e);
                    ui.set_status_text(format!("Settings unavailable: {}", e).into());
                }
            }
        });
    }

    /// Subscribe to state changes and update the window accordingly
    ///
    /// Spawns a background thread that receives broadcast events and forwards
    /// window updates through the bridge. The thread only holds a weak handle,
    /// so it stops (and drops its bridge clone) once the last manager is gone.
    fn setup_state_subscription(
        bridge: &EventLoopBridge<MainWindow>,
        state_manager: &StateManager,
        style: &SharedStyle,
    ) {
        let bridge = bridge.clone();
        let weak_state = state_manager.downgrade();
        let style = Arc::clone(style);
        let rx = state_manager.subscribe();

        std::thread::spawn(move || {
            tracing::debug!("State subscription thread started");
            forward_state_changes(rx, |change| {
                Self::handle_state_change(&bridge, &weak_state, &style, change);
            });
            tracing::debug!("State subscription thread stopped");
        });
    }

    fn handle_state_change(
        bridge: &EventLoopBridge<MainWindow>,
        weak_state: &WeakStateManager,
        style: &SharedStyle,
        change: StateChange,
    ) {
        match change {
            StateChange::CollectionUpdated {
                status,
                completed,
                total,
                progress,
            } => {
                let summary = collection_summary(status, completed, total, progress);
                bridge.update_ui(move |ui| {
                    ui.set_collection_progress((progress / 100.0) as f32);
                    ui.set_collection_summary(summary.into());
                });
            }
            StateChange::UiUpdated { theme, .. } => {
                let Ok(theme) = theme.parse::<Theme>() else {
                    tracing::warn!("Ignoring unknown theme in UI state: {}", theme);
                    return;
                };
                let style = Arc::clone(style);
                bridge.update_ui(move |ui| {
                    let mut style = style.lock().unwrap_or_else(PoisonError::into_inner);
                    if style.theme() != theme {
                        style.set_theme(theme);
                        style.apply(&ui.global::<Palette>());
                    }
                });
            }
            StateChange::TaskUpdated {
                task_id,
                status: TaskStatus::Failed,
                ..
            } => {
                bridge.update_ui(move |ui| {
                    ui.set_status_text(format!("Task {} failed", task_id).into());
                });
            }
            StateChange::StateReset | StateChange::StateImported => {
                let Some(state) = weak_state.get_state() else {
                    return;
                };
                let style = Arc::clone(style);
                bridge.update_ui(move |ui| {
                    if let Ok(theme) = state.ui.theme.parse::<Theme>() {
                        style
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .set_theme(theme);
                    }
                    Self::sync_ui_with_state(ui, &state, &style);
                });
            }
            _ => {}
        }
    }
}

/// Feed broadcast state changes to `handle` until the channel closes.
fn forward_state_changes(
    mut rx: broadcast::Receiver<StateChange>,
    mut handle: impl FnMut(StateChange),
) {
    loop {
        match rx.blocking_recv() {
            Ok(change) => {
                tracing::trace!("State change received: {:?}", change);
                handle(change);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("State subscription lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Status line for the collection progress area.
pub fn collection_summary(
    status: CollectionStatus,
    completed: usize,
    total: usize,
    progress: f64,
) -> String {
    let percent = format_percentage(progress / 100.0, 1);
    match status {
        CollectionStatus::Idle if total == 0 => "No collection tasks".to_string(),
        CollectionStatus::Idle => format!("{} tasks ready", total),
        CollectionStatus::Collecting => {
            format!("Collecting: {}/{} tasks ({})", completed, total, percent)
        }
        CollectionStatus::Paused => format!("Paused: {}/{} tasks ({})", completed, total, percent),
        CollectionStatus::Stopped => format!("Stopped: {}/{} tasks completed", completed, total),
    }
}
