//! Integration tests for ApplicationCore and JdFlowsApplication lifecycles
//!
//! These tests verify:
//! - INITIALIZING → READY → RUNNING → STOPPED ordering
//! - Startup/shutdown callbacks run in registration order
//! - Configuration failures move the core to ERROR
//! - Headless runs start and stop the core and return exit code 0
//!
//! Initialization installs the process-wide panic hook, so tests are
//! serialized and uninstall it when done.

use camino::Utf8PathBuf;
use jdflows::core::uninstall_exception_handler;
use jdflows::{
    AppOptions, ApplicationCore, ApplicationState, CoreError, JdFlowsError, create_application,
};
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempDir;

static LIFECYCLE_LOCK: Mutex<()> = Mutex::new(());

struct TestEnv {
    _temp_dir: TempDir,
    _guard: MutexGuard<'static, ()>,
    config_dir: Utf8PathBuf,
    error_log: Utf8PathBuf,
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        uninstall_exception_handler();
    }
}

/// Temp config directory whose logs also land in the temp directory.
fn setup() -> TestEnv {
    let guard = LIFECYCLE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let system = serde_json::json!({
        "logging": {
            "level": "DEBUG",
            "file": root.join("logs").join("jdflows.log").as_str(),
            "rotation": "never",
        }
    });
    fs::write(
        config_dir.join("system.json"),
        serde_json::to_string_pretty(&system).unwrap(),
    )
    .unwrap();

    TestEnv {
        error_log: root.join("logs").join("errors.log"),
        config_dir,
        _temp_dir: temp_dir,
        _guard: guard,
    }
}

fn test_core(env: &TestEnv) -> ApplicationCore {
    ApplicationCore::new("JDFlows", env.config_dir.clone())
        .with_error_log(env.error_log.clone())
        .with_signal_handlers(false)
}

#[test]
fn test_full_lifecycle_order() {
    let env = setup();
    let core = test_core(&env);
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        core.register_startup_callback(name, move || {
            order.lock().unwrap().push(format!("start:{}", name));
            Ok(())
        });
    }
    let shutdown_order = Arc::clone(&order);
    core.register_shutdown_callback("cleanup", move || {
        shutdown_order.lock().unwrap().push("stop:cleanup".to_string());
        Ok(())
    });

    core.initialize().unwrap();
    assert_eq!(core.state(), ApplicationState::Ready);
    let config = core.config_manager().unwrap().get_config().unwrap();
    assert_eq!(config.system.logging.rotation, "never");
    assert!(core.exception_handler().is_some());

    core.start().unwrap();
    assert_eq!(core.state(), ApplicationState::Running);
    assert!(core.is_running());

    core.stop();
    assert_eq!(core.state(), ApplicationState::Stopped);
    assert_eq!(
        *order.lock().unwrap(),
        vec!["start:first", "start:second", "start:third", "stop:cleanup"]
    );

    // Stopped cores cannot be restarted
    assert!(matches!(
        core.start(),
        Err(CoreError::InvalidState {
            operation: "start",
            state: ApplicationState::Stopped
        })
    ));
}

#[test]
fn test_initialize_twice_fails() {
    let env = setup();
    let core = test_core(&env);

    core.initialize().unwrap();
    let err = core.initialize().unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidState {
            operation: "initialize",
            state: ApplicationState::Ready
        }
    ));
    assert_eq!(core.state(), ApplicationState::Ready);
    core.stop();
}

#[test]
fn test_invalid_configuration_moves_core_to_error() {
    let env = setup();
    fs::write(
        env.config_dir.join("app.json"),
        r#"{"window": {"width": 10}}"#,
    )
    .unwrap();
    let core = test_core(&env);

    let err = core.initialize().unwrap_err();
    assert!(matches!(err, CoreError::Initialization(_)), "got {:?}", err);
    assert_eq!(core.state(), ApplicationState::Error);
    assert!(core.start().is_err());
}

#[test]
fn test_headless_application_run() {
    let env = setup();
    let app = create_application(AppOptions {
        config_dir: env.config_dir.clone(),
        headless: true,
        error_log: Some(env.error_log.clone()),
        signal_handlers: false,
    })
    .unwrap();

    assert_eq!(app.state(), ApplicationState::Ready);
    let started = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&started);
    app.core().register_startup_callback("test.started", move || {
        *flag.lock().unwrap() = true;
        Ok(())
    });

    assert_eq!(app.run(), 0);
    assert!(*started.lock().unwrap());
    assert_eq!(app.state(), ApplicationState::Stopped);

    // shutdown() and a second run are both safe after the first run
    app.shutdown();
    assert_eq!(app.run(), 1);
    assert_eq!(app.state(), ApplicationState::Stopped);
}

#[test]
fn test_create_application_with_invalid_configuration() {
    let env = setup();
    fs::write(env.config_dir.join("app.json"), r#"{"app": {"name": ""}}"#).unwrap();

    let result = create_application(AppOptions {
        config_dir: env.config_dir.clone(),
        headless: true,
        error_log: Some(env.error_log.clone()),
        signal_handlers: false,
    });

    assert!(matches!(
        result,
        Err(JdFlowsError::Core(CoreError::Initialization(_)))
    ));
}
