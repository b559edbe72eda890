//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Default configuration generation on first run
//! - Save/load round trips through `app.json` and `system.json`
//! - Strict parsing (unknown keys rejected) and bounds validation
//! - Named-field patches and their rollback on invalid input

use camino::Utf8PathBuf;
use jdflows::config::{APP_CONFIG_FILE, AppConfigUpdate, SYSTEM_CONFIG_FILE, WindowConfigUpdate};
use jdflows::models::LogLevel;
use jdflows::{ApplicationConfig, ConfigError, ConfigManager};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert!(matches!(manager.get_config(), Err(ConfigError::NotLoaded)));
}

#[test]
fn test_first_run_writes_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let config = manager.get_or_create_default().unwrap();
    assert_eq!(config, ApplicationConfig::default());
    assert!(config_path.join(APP_CONFIG_FILE).exists());
    assert!(config_path.join(SYSTEM_CONFIG_FILE).exists());

    // app.json carries app + window, system.json carries the system section at its root
    let app_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(config_path.join(APP_CONFIG_FILE)).unwrap())
            .unwrap();
    assert_eq!(app_json["app"]["name"], "JDFlows");
    assert_eq!(app_json["window"]["width"], 1280);
    assert!(app_json.get("system").is_none());

    let system_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(config_path.join(SYSTEM_CONFIG_FILE)).unwrap())
            .unwrap();
    assert_eq!(system_json["logging"]["level"], "INFO");
    assert_eq!(system_json["browser"]["timeout"], 30000);
}

#[test]
fn test_round_trip_through_files() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = ApplicationConfig::default();
    config.app.name = "Collector".to_string();
    config.app.debug = true;
    config.window.width = 1920;
    config.window.height = 1080;
    config.system.logging.level = LogLevel::Warning;
    config.system.browser.user_agent = Some("Mozilla/5.0 Test".to_string());
    manager.save(Some(&config)).unwrap();

    // A fresh manager sees exactly what was written
    let other = ConfigManager::new(&config_path).unwrap();
    let loaded = other.load().unwrap();
    assert_eq!(loaded, config);
    assert_eq!(other.get_config().unwrap(), config);
}

#[test]
fn test_partial_documents_fill_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join(APP_CONFIG_FILE),
        r#"{"app": {"name": "Partial"}}"#,
    )
    .unwrap();

    let manager = ConfigManager::new(&config_path).unwrap();
    let config = manager.get_or_create_default().unwrap();

    assert_eq!(config.app.name, "Partial");
    assert_eq!(config.app.version, "0.1.0");
    assert_eq!(config.window, Default::default());
    assert_eq!(config.system, Default::default());
}

#[test]
fn test_unknown_keys_rejected() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join(SYSTEM_CONFIG_FILE),
        r#"{"logging": {"level": "DEBUG", "colour": true}}"#,
    )
    .unwrap();

    let manager = ConfigManager::new(&config_path).unwrap();
    let err = manager.load().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "got {:?}", err);
    assert!(matches!(manager.get_config(), Err(ConfigError::NotLoaded)));
}

#[test]
fn test_malformed_json_reports_path() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join(APP_CONFIG_FILE), "{ not json").unwrap();

    let manager = ConfigManager::new(&config_path).unwrap();
    match manager.load() {
        Err(ConfigError::InvalidJson { path, .. }) => {
            assert_eq!(path, config_path.join(APP_CONFIG_FILE));
        }
        other => panic!("expected InvalidJson, got {:?}", other),
    }
}

#[test]
fn test_out_of_range_values_rejected_on_load() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join(APP_CONFIG_FILE),
        r#"{"window": {"width": 100, "height": 5000}}"#,
    )
    .unwrap();

    let manager = ConfigManager::new(&config_path).unwrap();
    match manager.load() {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 2, "{:?}", errors);
            assert!(errors.iter().any(|e| e.contains("window.width")));
            assert!(errors.iter().any(|e| e.contains("window.height")));
        }
        other => panic!("expected Validation, got {:?}", other),
    }
}

#[test]
fn test_invalid_save_leaves_files_untouched() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager.get_or_create_default().unwrap();
    let before = fs::read_to_string(config_path.join(APP_CONFIG_FILE)).unwrap();

    let mut config = ApplicationConfig::default();
    config.app.name = String::new();
    assert!(manager.save(Some(&config)).is_err());

    let after = fs::read_to_string(config_path.join(APP_CONFIG_FILE)).unwrap();
    assert_eq!(before, after);
    assert_eq!(manager.get_config().unwrap().app.name, "JDFlows");
}

#[test]
fn test_patches_then_save_persist() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager.get_or_create_default().unwrap();

    manager
        .update_app_config(AppConfigUpdate {
            debug: Some(true),
            ..Default::default()
        })
        .unwrap();
    manager
        .update_window_config(WindowConfigUpdate {
            title: Some("JDFlows - Test".to_string()),
            ..Default::default()
        })
        .unwrap();
    manager
        .update_system_config(|system| system.browser.headless = false)
        .unwrap();

    // Patches only touch the cache until saved
    let on_disk = ConfigManager::new(&config_path).unwrap().load().unwrap();
    assert!(!on_disk.app.debug);

    manager.save(None).unwrap();
    let reloaded = manager.reload().unwrap();
    assert!(reloaded.app.debug);
    assert_eq!(reloaded.window.title, "JDFlows - Test");
    assert!(!reloaded.system.browser.headless);
}

#[test]
fn test_invalid_system_patch_rolled_back() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager.get_or_create_default().unwrap();

    let result = manager.update_system_config(|system| system.browser.timeout = 10);
    assert!(matches!(result, Err(ConfigError::Validation(_))));
    assert_eq!(manager.get_config().unwrap().system.browser.timeout, 30_000);
}
