//! JDFlows - Desktop shell for JD.com product data collection
//!
//! Main entry point for the GUI application.
//!
//! # Overview
//!
//! This binary parses the command line and hands over to [`JdFlowsApplication`]:
//! - Configuration loading ([`ConfigManager`](jdflows::ConfigManager)), creating defaults on first run
//! - Logging infrastructure (rolling file + console output, from `system.json`)
//! - Panic hook writing delimited records to `logs/errors.log`
//! - SIGINT/SIGTERM watching for graceful shutdown
//! - GUI controller ([`GuiController`](jdflows::ui::GuiController)) on a tokio runtime
//!
//! The application uses a hybrid threading model:
//! - **Main thread**: Runs the Slint event loop (blocking, synchronous)
//! - **Tokio workers**: Handle async operations (settings persistence)
//! - **State listener**: Background std::thread for reactive UI updates
//! - **Signal watcher**: Background std::thread running a current-thread runtime
//!
//! # Configuration Files
//!
//! Expected in the `--config-dir` directory (`config` by default):
//! - `app.json`: application and window settings
//! - `system.json`: database, logging and browser settings
//!
//! Missing files are created with defaults.

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use jdflows::{APP_NAME, AppOptions, JdFlowsApplication, VERSION, create_application};

#[derive(Debug, Parser)]
#[command(name = "jdflows", version, about = "JD.com product data collection")]
struct Cli {
    /// Directory holding app.json and system.json
    #[arg(long, default_value = "config")]
    config_dir: Utf8PathBuf,

    /// Start the application core without opening a window
    #[arg(long)]
    headless: bool,

    /// Error log written by the panic hook
    #[arg(long)]
    error_log: Option<Utf8PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = AppOptions {
        config_dir: cli.config_dir,
        headless: cli.headless,
        error_log: cli.error_log,
        signal_handlers: true,
    };

    let app: JdFlowsApplication = create_application(options).map_err(|e| {
        eprintln!("{} v{} failed to start: {}", APP_NAME, VERSION, e);
        anyhow::anyhow!("Initialization failed: {}", e)
    })?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    let code = app.run();
    tracing::info!("Application exited with code {}", code);

    std::process::exit(code);
}
