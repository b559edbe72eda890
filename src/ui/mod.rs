// UI module - Slint windows and the glue around them
//
// This module contains:
// - Generated components from ui/app.slint (MainWindow, SettingsDialog, Palette)
// - EventLoopBridge: Coordinates between tokio async runtime and Slint event loop
// - GuiController: Wires the main window to state and configuration
// - Settings dialog form mapping and the theme/style manager

slint::include_modules!();

pub mod bridge;
pub mod controller;
pub mod settings;
pub mod style;

pub use bridge::EventLoopBridge;
pub use controller::GuiController;
pub use settings::{SettingsForm, open_settings_dialog};
pub use style::{StyleManager, Theme};
