// Settings dialog
//
// SettingsForm is the editable projection of ApplicationConfig shown in the
// dialog. Saving validates and persists through ConfigManager on the tokio
// runtime, then reports back to the dialog through the event loop bridge.

use super::{Palette, SettingsDialog};
use crate::config::ConfigManager;
use crate::error::{ConfigError, GuiError};
use crate::models::{ApplicationConfig, LogLevel};
use crate::ui::bridge::EventLoopBridge;
use crate::ui::style::StyleManager;
use crate::utils::validators::{is_non_empty_string, sanitize_filename, validate_string_length};
use camino::Utf8PathBuf;
use slint::ComponentHandle;
use std::sync::Arc;

const MAX_TITLE_CHARS: usize = 200;

/// Editable settings, one field per dialog control.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsForm {
    pub app_name: String,
    /// Shown read-only
    pub app_version: String,
    pub app_debug: bool,

    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub window_min_width: u32,
    pub window_min_height: u32,

    pub browser_headless: bool,
    pub browser_timeout: u32,
    /// Empty means the browser default
    pub browser_user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,

    pub log_level: LogLevel,
    pub log_file: String,
    pub log_rotation: String,
    pub log_retention: String,
    pub log_compression: String,
}

impl SettingsForm {
    pub fn from_config(config: &ApplicationConfig) -> Self {
        let browser = &config.system.browser;
        let logging = &config.system.logging;

        Self {
            app_name: config.app.name.clone(),
            app_version: config.app.version.clone(),
            app_debug: config.app.debug,
            window_title: config.window.title.clone(),
            window_width: config.window.width,
            window_height: config.window.height,
            window_min_width: config.window.min_width,
            window_min_height: config.window.min_height,
            browser_headless: browser.headless,
            browser_timeout: browser.timeout,
            browser_user_agent: browser.user_agent.clone().unwrap_or_default(),
            viewport_width: browser.viewport_width,
            viewport_height: browser.viewport_height,
            log_level: logging.level,
            log_file: logging.file.clone(),
            log_rotation: logging.rotation.clone(),
            log_retention: logging.retention.clone(),
            log_compression: logging.compression.clone(),
        }
    }

    /// Copy the form onto `config`. The version and database section are left untouched.
    pub fn apply_to(&self, config: &mut ApplicationConfig) {
        config.app.name = self.app_name.clone();
        config.app.debug = self.app_debug;

        config.window.title = self.window_title.clone();
        config.window.width = self.window_width;
        config.window.height = self.window_height;
        config.window.min_width = self.window_min_width;
        config.window.min_height = self.window_min_height;

        let browser = &mut config.system.browser;
        browser.headless = self.browser_headless;
        browser.timeout = self.browser_timeout;
        let user_agent = self.browser_user_agent.trim();
        browser.user_agent = (!user_agent.is_empty()).then(|| user_agent.to_string());
        browser.viewport_width = self.viewport_width;
        browser.viewport_height = self.viewport_height;

        let logging = &mut config.system.logging;
        logging.level = self.log_level;
        logging.file = self.log_file.clone();
        logging.rotation = self.log_rotation.clone();
        logging.retention = self.log_retention.clone();
        logging.compression = self.log_compression.clone();
    }

    /// Checks on free-text fields that the configuration bounds do not cover.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !validate_string_length(&self.window_title, None, Some(MAX_TITLE_CHARS)) {
            errors.push(format!(
                "window.title must be at most {} characters",
                MAX_TITLE_CHARS
            ));
        }

        let log_file = Utf8PathBuf::from(self.log_file.trim());
        match log_file.file_name() {
            Some(name) if sanitize_filename(name) != name => {
                errors.push(format!(
                    "system.logging.file name contains invalid characters: {}",
                    name
                ));
            }
            Some(name) if is_non_empty_string(name) => {}
            _ => errors.push("system.logging.file must name a file".to_string()),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Apply the form to the manager's current configuration, validate and persist it
    ///
    /// # Errors
    /// [`ConfigError::Validation`] leaves both the files and the cached config unchanged.
    pub fn save(&self, manager: &ConfigManager) -> Result<ApplicationConfig, ConfigError> {
        self.validate()?;
        let mut config = match manager.get_config() {
            Ok(config) => config,
            Err(ConfigError::NotLoaded) => ApplicationConfig::default(),
            Err(e) => return Err(e),
        };
        self.apply_to(&mut config);
        manager.save(Some(&config))?;

        tracing::info!("Settings saved successfully");
        Ok(config)
    }

    fn level_index(&self) -> i32 {
        LogLevel::ALL
            .iter()
            .position(|level| *level == self.log_level)
            .unwrap_or(1) as i32
    }

    fn level_from_index(index: i32) -> LogLevel {
        usize::try_from(index)
            .ok()
            .and_then(|i| LogLevel::ALL.get(i).copied())
            .unwrap_or(LogLevel::Info)
    }

    fn write_to(&self, dialog: &SettingsDialog) {
        dialog.set_app_name(self.app_name.clone().into());
        dialog.set_app_version(self.app_version.clone().into());
        dialog.set_app_debug(self.app_debug);

        dialog.set_window_title(self.window_title.clone().into());
        dialog.set_window_width(to_spin(self.window_width));
        dialog.set_window_height(to_spin(self.window_height));
        dialog.set_window_min_width(to_spin(self.window_min_width));
        dialog.set_window_min_height(to_spin(self.window_min_height));

        dialog.set_browser_headless(self.browser_headless);
        dialog.set_browser_timeout(to_spin(self.browser_timeout));
        dialog.set_browser_user_agent(self.browser_user_agent.clone().into());
        dialog.set_viewport_width(to_spin(self.viewport_width));
        dialog.set_viewport_height(to_spin(self.viewport_height));

        dialog.set_log_level_index(self.level_index());
        dialog.set_log_file(self.log_file.clone().into());
        dialog.set_log_rotation(self.log_rotation.clone().into());
        dialog.set_log_retention(self.log_retention.clone().into());
        dialog.set_log_compression(self.log_compression.clone().into());
    }

    fn read_from(dialog: &SettingsDialog) -> Self {
        Self {
            app_name: dialog.get_app_name().to_string(),
            app_version: dialog.get_app_version().to_string(),
            app_debug: dialog.get_app_debug(),
            window_title: dialog.get_window_title().to_string(),
            window_width: from_spin(dialog.get_window_width()),
            window_height: from_spin(dialog.get_window_height()),
            window_min_width: from_spin(dialog.get_window_min_width()),
            window_min_height: from_spin(dialog.get_window_min_height()),
            browser_headless: dialog.get_browser_headless(),
            browser_timeout: from_spin(dialog.get_browser_timeout()),
            browser_user_agent: dialog.get_browser_user_agent().to_string(),
            viewport_width: from_spin(dialog.get_viewport_width()),
            viewport_height: from_spin(dialog.get_viewport_height()),
            log_level: Self::level_from_index(dialog.get_log_level_index()),
            log_file: dialog.get_log_file().to_string(),
            log_rotation: dialog.get_log_rotation().to_string(),
            log_retention: dialog.get_log_retention().to_string(),
            log_compression: dialog.get_log_compression().to_string(),
        }
    }
}

fn to_spin(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn from_spin(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Show a native save dialog for the log file, starting from `current`.
fn pick_log_file(current: &str) -> Option<Utf8PathBuf> {
    use rfd::FileDialog;

    let mut dialog = FileDialog::new()
        .set_title("Select log file")
        .add_filter("Log files", &["log"])
        .add_filter("All files", &["*"]);

    let current = Utf8PathBuf::from(current);
    if let Some(parent) = current.parent().filter(|p| p.exists()) {
        dialog = dialog.set_directory(parent.as_std_path());
    }
    if let Some(name) = current.file_name() {
        dialog = dialog.set_file_name(name);
    }

    dialog.save_file().and_then(|path| {
        Utf8PathBuf::try_from(path)
            .map_err(|e| {
                tracing::error!("Failed to convert path to UTF-8: {}", e);
                e
            })
            .ok()
    })
}

/// Create the settings window, fill it from the cached configuration and wire
/// its callbacks. `on_saved` runs on the GUI thread after a successful save.
pub fn open_settings_dialog<F>(
    config_manager: Arc<ConfigManager>,
    style: &StyleManager,
    tokio_handle: tokio::runtime::Handle,
    on_saved: F,
) -> Result<SettingsDialog, GuiError>
where
    F: Fn(&ApplicationConfig) + Send + Sync + 'static,
{
    let config = config_manager.get_config()?;
    let dialog = SettingsDialog::new()?;
    style.apply(&dialog.global::<Palette>());
    SettingsForm::from_config(&config).write_to(&dialog);

    let bridge = EventLoopBridge::new(&dialog, tokio_handle);
    let on_saved = Arc::new(on_saved);

    let dialog_weak = dialog.as_weak();
    dialog.on_save(move || {
        let Some(dialog) = dialog_weak.upgrade() else {
            return;
        };
        let form = SettingsForm::read_from(&dialog);
        dialog.set_error_text("".into());

        let manager = Arc::clone(&config_manager);
        let on_saved = Arc::clone(&on_saved);
        let bridge_for_result = bridge.clone();
        bridge.spawn_async(move || async move {
            let result = form.save(&manager);
            bridge_for_result.update_ui(move |dialog| match result {
                Ok(config) => {
                    on_saved(&config);
                    if let Err(e) = dialog.hide() {
                        tracing::warn!("Failed to hide settings dialog: {}", e);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to save settings: {}", e);
                    dialog.set_error_text(e.to_string().into());
                }
            });
        });
    });

    let dialog_weak = dialog.as_weak();
    dialog.on_cancel(move || {
        if let Some(dialog) = dialog_weak.upgrade() {
            tracing::debug!("Settings dialog cancelled");
            if let Err(e) = dialog.hide() {
                tracing::warn!("Failed to hide settings dialog: {}", e);
            }
        }
    });

    let dialog_weak = dialog.as_weak();
    dialog.on_browse_log_file(move || {
        let Some(dialog) = dialog_weak.upgrade() else {
            return;
        };
        if let Some(path) = pick_log_file(&dialog.get_log_file()) {
            tracing::info!("Log file selected: {}", path);
            dialog.set_log_file(path.as_str().into());
        }
    });

    tracing::info!("Settings dialog initialized");
    Ok(dialog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&dir).unwrap();
        (temp_dir, manager)
    }

    #[test]
    fn test_form_mirrors_config() {
        let config = ApplicationConfig::default();
        let form = SettingsForm::from_config(&config);

        assert_eq!(form.app_name, "JDFlows");
        assert_eq!(form.window_width, 1280);
        assert_eq!(form.browser_user_agent, "");
        assert_eq!(form.log_level, LogLevel::Info);
        assert_eq!(form.level_index(), 1);

        let mut round_trip = ApplicationConfig::default();
        form.apply_to(&mut round_trip);
        assert_eq!(round_trip, config);
    }

    #[test]
    fn test_blank_user_agent_becomes_none() {
        let mut form = SettingsForm::from_config(&ApplicationConfig::default());
        let mut config = ApplicationConfig::default();

        form.browser_user_agent = "  Mozilla/5.0  ".to_string();
        form.apply_to(&mut config);
        assert_eq!(config.system.browser.user_agent.as_deref(), Some("Mozilla/5.0"));

        form.browser_user_agent = "   ".to_string();
        form.apply_to(&mut config);
        assert!(config.system.browser.user_agent.is_none());
    }

    #[test]
    fn test_level_index_mapping() {
        assert_eq!(SettingsForm::level_from_index(0), LogLevel::Debug);
        assert_eq!(SettingsForm::level_from_index(4), LogLevel::Critical);
        assert_eq!(SettingsForm::level_from_index(-1), LogLevel::Info);
        assert_eq!(SettingsForm::level_from_index(9), LogLevel::Info);
    }

    #[test]
    fn test_save_persists() {
        let (_temp_dir, manager) = temp_manager();
        manager.get_or_create_default().unwrap();

        let mut form = SettingsForm::from_config(&manager.get_config().unwrap());
        form.app_debug = true;
        form.log_level = LogLevel::Warning;
        form.save(&manager).unwrap();

        let reloaded = manager.reload().unwrap();
        assert!(reloaded.app.debug);
        assert_eq!(reloaded.system.logging.level, LogLevel::Warning);
    }

    #[test]
    fn test_invalid_save_keeps_config() {
        let (_temp_dir, manager) = temp_manager();
        manager.get_or_create_default().unwrap();

        let mut form = SettingsForm::from_config(&manager.get_config().unwrap());
        form.window_width = 100;
        let result = form.save(&manager);

        assert!(matches!(result, Err(ConfigError::Validation(_))));
        assert_eq!(manager.get_config().unwrap().window.width, 1280);
        assert_eq!(manager.reload().unwrap().window.width, 1280);
    }

    #[test]
    fn test_validate_free_text_fields() {
        let mut form = SettingsForm::from_config(&ApplicationConfig::default());
        assert!(form.validate().is_ok());

        form.log_file = "logs/bad|name.log".to_string();
        form.window_title = "x".repeat(MAX_TITLE_CHARS + 1);
        match form.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 2, "{:?}", errors);
                assert!(errors[0].starts_with("window.title"));
                assert!(errors[1].contains("bad|name.log"));
            }
            other => panic!("expected Validation, got {:?}", other),
        }

        form.window_title = "JDFlows".to_string();
        form.log_file = "   ".to_string();
        assert!(form.validate().is_err());
    }
}
