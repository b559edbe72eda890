//! Process-wide panic hook and error report log.
//!
//! An installed [`ExceptionHandler`] replaces the panic hook: every uncaught
//! panic is logged through `tracing` and appended to a plain-text error log as a
//! delimited record. [`ExceptionHandler::report`] writes the same record for an
//! application error that was handled but should be kept for diagnosis.

use crate::error::CoreError;
use camino::{Utf8Path, Utf8PathBuf};
use std::backtrace::Backtrace;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::panic::{self, PanicHookInfo};
use std::sync::{Arc, Mutex, PoisonError};

/// Default error log location, relative to the working directory.
pub const DEFAULT_ERROR_LOG: &str = "logs/errors.log";

const RULE_WIDTH: usize = 80;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

static GLOBAL_HANDLER: Mutex<Option<Arc<ExceptionHandler>>> = Mutex::new(None);

pub struct ExceptionHandler {
    log_file: Utf8PathBuf,
    previous_hook: Mutex<Option<PanicHook>>,
}

impl ExceptionHandler {
    /// Create a handler writing to `log_file`, creating its parent directory.
    pub fn new(log_file: impl Into<Utf8PathBuf>) -> Result<Self, CoreError> {
        let log_file = log_file.into();
        if let Some(parent) = log_file.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CoreError::ErrorLog {
                path: log_file.clone(),
                source,
            })?;
        }

        Ok(Self {
            log_file,
            previous_hook: Mutex::new(None),
        })
    }

    pub fn log_file(&self) -> &Utf8Path {
        &self.log_file
    }

    pub fn is_installed(&self) -> bool {
        self.previous_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replace the process panic hook. Installing an installed handler is a no-op.
    pub fn install(self: &Arc<Self>) {
        let mut previous = self
            .previous_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if previous.is_some() {
            return;
        }

        *previous = Some(panic::take_hook());
        let handler = Arc::clone(self);
        panic::set_hook(Box::new(move |info| handler.handle_panic(info)));
        tracing::debug!("Panic hook installed, error log: {}", self.log_file);
    }

    /// Restore the panic hook that was active before [`install`](Self::install).
    pub fn uninstall(&self) {
        let previous = self
            .previous_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = previous {
            panic::set_hook(hook);
            tracing::debug!("Panic hook restored");
        }
    }

    /// Log an application error and append it to the error log.
    pub fn report(&self, error: &anyhow::Error) {
        tracing::error!("Application error: {:#}", error);
        self.append_record("ApplicationError", &error.to_string(), &format!("{:?}", error));
    }

    fn handle_panic(&self, info: &PanicHookInfo<'_>) {
        let message = panic_message(info);
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("<unnamed>");
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "<unknown>".to_string());
        let backtrace = Backtrace::force_capture();

        let trace = format!(
            "thread '{}' panicked at {}:\n{}\n\nstack backtrace:\n{}",
            thread_name, location, message, backtrace
        );
        tracing::error!("Uncaught panic:\n{}", trace);
        self.append_record("Panic", &message, &trace);
    }

    fn append_record(&self, kind: &str, message: &str, trace: &str) {
        let record = format_record(kind, message, trace);
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .and_then(|mut file| file.write_all(record.as_bytes()));

        if let Err(e) = written {
            tracing::error!("Failed to write to error log {}: {}", self.log_file, e);
        }
    }
}

/// Render one delimited error log record.
pub fn format_record(kind: &str, message: &str, trace: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!(
        "\n{rule}\nException: {kind}\nMessage: {message}\n{rule}\n{trace}\n{rule}\n\n"
    )
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Install the process-wide handler, or return the one already installed.
pub fn install_exception_handler(
    log_file: Option<&Utf8Path>,
) -> Result<Arc<ExceptionHandler>, CoreError> {
    let mut global = GLOBAL_HANDLER.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = global.as_ref() {
        return Ok(Arc::clone(existing));
    }

    let path = log_file.unwrap_or(Utf8Path::new(DEFAULT_ERROR_LOG));
    let handler = Arc::new(ExceptionHandler::new(path)?);
    handler.install();
    *global = Some(Arc::clone(&handler));
    Ok(handler)
}

/// Uninstall and drop the process-wide handler, if any.
pub fn uninstall_exception_handler() {
    let handler = GLOBAL_HANDLER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(handler) = handler {
        handler.uninstall();
    }
}

pub fn exception_handler() -> Option<Arc<ExceptionHandler>> {
    GLOBAL_HANDLER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
