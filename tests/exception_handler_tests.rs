//! Integration tests for the process-wide panic hook
//!
//! The panic hook is global to the test process, so every test here takes
//! `HOOK_LOCK` before touching it.

use camino::Utf8PathBuf;
use jdflows::core::{exception_handler, install_exception_handler, uninstall_exception_handler};
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

static HOOK_LOCK: Mutex<()> = Mutex::new(());

fn temp_log(temp_dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::try_from(temp_dir.path().join("logs").join("errors.log")).unwrap()
}

#[test]
fn test_uncaught_panic_written_to_error_log() {
    let _guard = HOOK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_log(&temp_dir);

    let handler = install_exception_handler(Some(&log_file)).unwrap();
    assert!(handler.is_installed());

    let result = std::thread::Builder::new()
        .name("collector".to_string())
        .spawn(|| panic!("selector not found"))
        .unwrap()
        .join();
    assert!(result.is_err());

    uninstall_exception_handler();
    assert!(exception_handler().is_none());

    let content = fs::read_to_string(&log_file).unwrap();
    let rule = "=".repeat(80);
    assert!(content.starts_with(&format!("\n{}\nException: Panic\n", rule)));
    assert!(content.contains("Message: selector not found"));
    assert!(content.contains("thread 'collector' panicked at"));
    assert!(content.contains("stack backtrace:"));
    assert!(content.ends_with(&format!("{}\n\n", rule)));
}

#[test]
fn test_second_install_returns_existing_handler() {
    let _guard = HOOK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let first_log = temp_log(&temp_dir);
    let second_log = Utf8PathBuf::try_from(temp_dir.path().join("other.log")).unwrap();

    let first = install_exception_handler(Some(&first_log)).unwrap();
    let second = install_exception_handler(Some(&second_log)).unwrap();

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(second.log_file(), first_log.as_path());
    assert!(exception_handler().is_some());

    uninstall_exception_handler();
    assert!(!first.is_installed());
    // Uninstalling twice is harmless
    uninstall_exception_handler();
}

#[test]
fn test_no_record_after_uninstall() {
    let _guard = HOOK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_log(&temp_dir);

    install_exception_handler(Some(&log_file)).unwrap();
    uninstall_exception_handler();

    let result = std::thread::spawn(|| panic!("after uninstall")).join();
    assert!(result.is_err());

    let content = fs::read_to_string(&log_file).unwrap_or_default();
    assert!(!content.contains("after uninstall"));
}
