use crate::error::ConfigError;
use crate::logging::PerformanceLogger;
use crate::models::{AppConfig, ApplicationConfig, SystemConfig, WindowConfig};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::sync::{PoisonError, RwLock};

pub const APP_CONFIG_FILE: &str = "app.json";
pub const SYSTEM_CONFIG_FILE: &str = "system.json";

/// Named-field patch for [`AppConfig`]. Only `Some` fields are applied.
#[derive(Debug, Clone, Default)]
pub struct AppConfigUpdate {
    pub name: Option<String>,
    pub version: Option<String>,
    pub debug: Option<bool>,
}

/// Named-field patch for [`WindowConfig`]. Only `Some` fields are applied.
#[derive(Debug, Clone, Default)]
pub struct WindowConfigUpdate {
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
}

impl AppConfigUpdate {
    fn apply(self, app: &mut AppConfig) {
        if let Some(name) = self.name {
            app.name = name;
        }
        if let Some(version) = self.version {
            app.version = version;
        }
        if let Some(debug) = self.debug {
            app.debug = debug;
        }
    }
}

impl WindowConfigUpdate {
    fn apply(self, window: &mut WindowConfig) {
        if let Some(title) = self.title {
            window.title = title;
        }
        if let Some(width) = self.width {
            window.width = width;
        }
        if let Some(height) = self.height {
            window.height = height;
        }
        if let Some(min_width) = self.min_width {
            window.min_width = min_width;
        }
        if let Some(min_height) = self.min_height {
            window.min_height = min_height;
        }
    }
}

/// On-disk shape of `app.json`.
#[derive(Serialize)]
struct AppDocument<'a> {
    app: &'a AppConfig,
    window: &'a WindowConfig,
}

/// Configuration manager for loading and saving JSON configuration files.
///
/// Manages two files under the configuration directory:
/// - `app.json`: application identity and window geometry
/// - `system.json`: database, logging and browser settings
///
/// The most recently loaded or saved configuration is cached; [`get_config()`](Self::get_config)
/// hands out clones of it.
#[derive(Debug)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    app_config_path: Utf8PathBuf,
    system_config_path: Utf8PathBuf,
    config: RwLock<Option<ApplicationConfig>>,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "config")
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the directory cannot be created.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Io {
                path: config_dir.clone(),
                source,
            })?;
        }

        Ok(Self {
            app_config_path: config_dir.join(APP_CONFIG_FILE),
            system_config_path: config_dir.join(SYSTEM_CONFIG_FILE),
            config_dir,
            config: RwLock::new(None),
        })
    }

    /// Load configuration from the JSON files.
    ///
    /// Missing files contribute defaults. The merged document is parsed strictly
    /// (unknown keys rejected) and validated before it is cached.
    pub fn load(&self) -> Result<ApplicationConfig, ConfigError> {
        let _perf = PerformanceLogger::new("config load", 1.0);
        let mut document = Map::new();

        if let Some(Value::Object(app_data)) = self.read_document(&self.app_config_path)? {
            document.extend(app_data);
        } else if self.app_config_path.exists() {
            return Err(ConfigError::Validation(vec![format!(
                "{} must contain a JSON object",
                self.app_config_path
            )]));
        }

        if let Some(system_data) = self.read_document(&self.system_config_path)? {
            document.insert("system".to_string(), system_data);
        }

        let config: ApplicationConfig = serde_json::from_value(Value::Object(document))
            .map_err(|e| ConfigError::Validation(vec![e.to_string()]))?;
        config.validate()?;

        tracing::info!("Loaded configuration from {}", self.config_dir);
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());
        Ok(config)
    }

    /// Save configuration to the JSON files.
    ///
    /// # Arguments
    /// * `config` - Configuration to save; `None` saves the cached configuration
    pub fn save(&self, config: Option<&ApplicationConfig>) -> Result<(), ConfigError> {
        let config = match config {
            Some(config) => config.clone(),
            None => self.cached().ok_or(ConfigError::NothingToSave)?,
        };
        config.validate()?;

        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Io {
                path: self.config_dir.clone(),
                source,
            })?;
        }

        let app_document = AppDocument {
            app: &config.app,
            window: &config.window,
        };
        self.write_document(&self.app_config_path, &app_document)?;
        self.write_document(&self.system_config_path, &config.system)?;

        tracing::info!("Saved configuration to {}", self.config_dir);
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
        Ok(())
    }

    /// Get the current configuration.
    ///
    /// # Errors
    /// [`ConfigError::NotLoaded`] before the first successful load or save.
    pub fn get_config(&self) -> Result<ApplicationConfig, ConfigError> {
        self.cached().ok_or(ConfigError::NotLoaded)
    }

    /// Reload configuration from the files.
    pub fn reload(&self) -> Result<ApplicationConfig, ConfigError> {
        self.load()
    }

    /// Load existing configuration or write and return defaults if none exists.
    pub fn get_or_create_default(&self) -> Result<ApplicationConfig, ConfigError> {
        if self.app_config_path.exists() || self.system_config_path.exists() {
            return self.load();
        }

        tracing::warn!(
            "No configuration found in {}, creating defaults",
            self.config_dir
        );
        let config = ApplicationConfig::default();
        self.save(Some(&config))?;
        Ok(config)
    }

    /// Apply a named-field patch to the `app` section.
    ///
    /// The cached configuration is only replaced when the patched section validates.
    pub fn update_app_config(&self, update: AppConfigUpdate) -> Result<(), ConfigError> {
        self.modify(|config| {
            update.apply(&mut config.app);
            let mut errors = Vec::new();
            config.app.collect_violations(&mut errors);
            errors
        })?;
        tracing::debug!("App configuration updated");
        Ok(())
    }

    /// Apply a named-field patch to the `window` section.
    pub fn update_window_config(&self, update: WindowConfigUpdate) -> Result<(), ConfigError> {
        self.modify(|config| {
            update.apply(&mut config.window);
            let mut errors = Vec::new();
            config.window.collect_violations(&mut errors);
            errors
        })?;
        tracing::debug!("Window configuration updated");
        Ok(())
    }

    /// Mutate the `system` section; rolled back if the result is invalid.
    pub fn update_system_config<F>(&self, update_fn: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut SystemConfig),
    {
        self.modify(|config| {
            update_fn(&mut config.system);
            let mut errors = Vec::new();
            config.system.collect_violations(&mut errors);
            errors
        })?;
        tracing::debug!("System configuration updated");
        Ok(())
    }

    pub fn app_name(&self) -> Result<String, ConfigError> {
        Ok(self.get_config()?.app.name)
    }

    pub fn app_version(&self) -> Result<String, ConfigError> {
        Ok(self.get_config()?.app.version)
    }

    pub fn is_debug_mode(&self) -> Result<bool, ConfigError> {
        Ok(self.get_config()?.app.debug)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    fn cached(&self) -> Option<ApplicationConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `patch` to a copy of the cached config and commit it if `patch`
    /// reports no violations.
    fn modify<F>(&self, patch: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut ApplicationConfig) -> Vec<String>,
    {
        let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let current = guard.as_ref().ok_or(ConfigError::NotLoaded)?;

        let mut candidate = current.clone();
        let errors = patch(&mut candidate);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        *guard = Some(candidate);
        Ok(())
    }

    fn read_document(&self, path: &Utf8Path) -> Result<Option<Value>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value = serde_json::from_str(&contents).map_err(|source| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(value))
    }

    fn write_document<T: Serialize>(&self, path: &Utf8Path, value: &T) -> Result<(), ConfigError> {
        let mut json = serde_json::to_string_pretty(value).map_err(ConfigError::Serialize)?;
        json.push('\n');

        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogLevel;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = Utf8PathBuf::try_from(temp_dir.path().join("a").join("config")).unwrap();

        let manager = ConfigManager::new(&nested).unwrap();
        assert!(nested.exists());
        assert_eq!(manager.config_dir(), &nested);
    }

    #[test]
    fn test_get_config_before_load() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(matches!(manager.get_config(), Err(ConfigError::NotLoaded)));
        assert!(matches!(manager.save(None), Err(ConfigError::NothingToSave)));
    }

    #[test]
    fn test_save_writes_both_documents() {
        let (manager, _temp_dir) = create_test_config_manager();
        manager.save(Some(&ApplicationConfig::default())).unwrap();

        let app: Value = serde_json::from_str(
            &fs::read_to_string(manager.config_dir().join(APP_CONFIG_FILE)).unwrap(),
        )
        .unwrap();
        assert!(app.get("app").is_some());
        assert!(app.get("window").is_some());
        assert!(app.get("system").is_none());

        let system: Value = serde_json::from_str(
            &fs::read_to_string(manager.config_dir().join(SYSTEM_CONFIG_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(system["logging"]["level"], "INFO");
        assert!(system["browser"]["user_agent"].is_null());
    }

    #[test]
    fn test_round_trip() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = ApplicationConfig::default();
        config.app.name = "京东采集".to_string();
        config.window.width = 1920;
        config.system.logging.level = LogLevel::Debug;
        config.system.browser.user_agent = Some("Mozilla/5.0".to_string());

        manager.save(Some(&config)).unwrap();
        let loaded = manager.load().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_get_or_create_default() {
        let (manager, _temp_dir) = create_test_config_manager();

        let config = manager.get_or_create_default().unwrap();
        assert_eq!(config, ApplicationConfig::default());
        assert!(manager.config_dir().join(APP_CONFIG_FILE).exists());
        assert!(manager.config_dir().join(SYSTEM_CONFIG_FILE).exists());
    }

    #[test]
    fn test_update_app_config() {
        let (manager, _temp_dir) = create_test_config_manager();
        manager.get_or_create_default().unwrap();

        manager
            .update_app_config(AppConfigUpdate {
                debug: Some(true),
                ..Default::default()
            })
            .unwrap();

        assert!(manager.is_debug_mode().unwrap());
        assert_eq!(manager.app_name().unwrap(), "JDFlows");
    }

    #[test]
    fn test_invalid_window_update_leaves_cache() {
        let (manager, _temp_dir) = create_test_config_manager();
        manager.get_or_create_default().unwrap();

        let result = manager.update_window_config(WindowConfigUpdate {
            width: Some(10),
            ..Default::default()
        });

        assert!(matches!(result, Err(ConfigError::Validation(_))));
        assert_eq!(manager.get_config().unwrap().window.width, 1280);
    }

    #[test]
    fn test_update_before_load() {
        let (manager, _temp_dir) = create_test_config_manager();
        let result = manager.update_app_config(AppConfigUpdate::default());
        assert!(matches!(result, Err(ConfigError::NotLoaded)));
    }
}
