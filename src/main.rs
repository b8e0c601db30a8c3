//! PT-BR Installer - Installs the Brazilian Portuguese translation of Until Then
//!
//! Main entry point for the installer.
//!
//! # Overview
//!
//! This binary crate wires the library together. It initializes:
//! - Logging infrastructure (file rotation + optional console output)
//! - Administrator elevation on Windows
//! - Configuration loading ([`ConfigManager`])
//! - Tokio async runtime (worker threads for the archive tool subprocess)
//! - The installer controller ([`InstallerController`]) with a dialog or console operator
//!
//! The application uses a hybrid threading model:
//! - **Main thread**: Runs the installer event loop (blocking, synchronous)
//! - **Tokio workers**: Run the archive tool, the file swap and the progress ticker
//!
//! # Execution Flow
//!
//! 1. Parse the command line
//! 2. Relaunch elevated if needed (Windows), exiting this process
//! 3. Initialize logging → `<app dir>/logs/ptbr-installer.<date>`, or the
//!    temp folder when the app folder is not writable
//! 4. Load `installer.yaml` and `PTBR_INSTALLER__*` overrides
//! 5. Create tokio runtime with 4 worker threads
//! 6. Report missing components and locate the game folder
//! 7. Run the event loop until the apply request settles
//! 8. Shutdown tokio runtime with 5s timeout

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ptbr_installer::services::elevation::{self, ElevationStatus};
use ptbr_installer::services::game_locator::GameLocator;
use ptbr_installer::ui::{
    ConsoleOperator, DialogOperator, InstallerController, InstallerEvent, Operator,
};
use ptbr_installer::{APP_NAME, ConfigManager, InstallerConfig, Metrics, VERSION};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "ptbr-installer")]
#[command(about = "Installs the PT-BR translation of Until Then")]
#[command(version)]
struct Cli {
    /// Game installation folder (skips Steam auto-detection)
    #[arg(long)]
    game_dir: Option<Utf8PathBuf>,

    /// Keep a copy of the original archive next to it
    #[arg(long)]
    keep_backup: bool,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    yes: bool,

    /// Use the terminal instead of native dialogs
    #[arg(long)]
    console: bool,

    /// Folder holding the archive tool and the translation files
    #[arg(long)]
    app_dir: Option<Utf8PathBuf>,

    /// Folder holding installer.yaml (defaults to the app folder)
    #[arg(long)]
    config_dir: Option<Utf8PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Do not request administrator rights
    #[arg(long)]
    no_elevate: bool,
}

/// Directory the installer ships from: next to the executable
fn default_app_dir() -> Result<Utf8PathBuf> {
    let exe = std::env::current_exe().context("Failed to resolve the current executable")?;
    let exe = Utf8PathBuf::from_path_buf(exe)
        .map_err(|p| anyhow::anyhow!("Executable path is not valid UTF-8: {}", p.display()))?;

    exe.parent()
        .map(Utf8Path::to_path_buf)
        .context("Executable has no parent directory")
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Fatal error: {:#}", e);
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let app_dir = match cli.app_dir.clone() {
        Some(dir) => dir,
        None => default_app_dir()?,
    };

    if cli.console {
        launch(ConsoleOperator::stdio(cli.yes), cli, app_dir)
    } else {
        launch(DialogOperator::new(cli.yes), cli, app_dir)
    }
}

fn launch<O: Operator>(mut operator: O, cli: Cli, app_dir: Utf8PathBuf) -> Result<ExitCode> {
    if !cli.no_elevate {
        match elevation::ensure_elevated(std::env::args().skip(1)) {
            Ok(ElevationStatus::Elevated) => {}
            Ok(ElevationStatus::Relaunched) => return Ok(ExitCode::SUCCESS),
            Err(e) => {
                // Logging is not initialized before elevation
                eprintln!("ERROR: Elevation failed: {:#}", e);
                operator.alert(
                    "Permission Error",
                    &format!("Could not restart with administrator rights:\n{e}"),
                );
                return Ok(ExitCode::SUCCESS);
            }
        }
    }

    // Guard must live until shutdown or buffered log lines are lost
    let log_dir =
        ptbr_installer::logging::writable_log_dir(&app_dir.join("logs"), "ptbr-installer");
    let _log_guard = ptbr_installer::logging::setup_logging_with_console(
        &log_dir,
        "ptbr-installer",
        cli.debug,
        cli.console,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::debug!("Command line: {:?}", cli);

    let config_dir = cli.config_dir.clone().unwrap_or_else(|| app_dir.clone());
    let config_manager = ConfigManager::new(&config_dir)?;
    let config = Arc::new(config_manager.load_config()?);

    tracing::info!(
        "Loaded configuration - archive: {}, tool: {}, timeout: {}s",
        config.archive_filename,
        config.tool_name,
        config.patch_timeout_secs
    );

    // Create tokio runtime for async operations
    // This will handle subprocess execution and the file swap
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("ptbr-installer-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 4);

    // Native dialogs reach the desktop portal through the runtime
    let runtime_guard = runtime.enter();

    let metrics = Arc::new(Metrics::new());
    let mut controller = InstallerController::new(
        operator,
        Arc::clone(&config),
        &app_dir,
        runtime.handle().clone(),
        Arc::clone(&metrics),
    )
    .with_keep_backup(cli.keep_backup)
    .exit_when_done(true);

    controller.startup(cli.game_dir.clone(), Some(&locator_for(&config)));

    let handle = controller.bridge_handle();
    let state = controller.state();
    if !state.read(|s| s.can_apply()) {
        handle.try_post(InstallerEvent::BrowseRequested);
    }
    handle.try_post(InstallerEvent::ApplyRequested);

    // Blocks until the apply request settles
    let outcome = controller.run();

    tracing::info!("Event loop finished, shutting down");
    metrics.log_summary();

    drop(runtime_guard);
    runtime.shutdown_timeout(Duration::from_secs(5));

    tracing::info!("Application shutdown complete");

    Ok(if outcome.is_some_and(|o| o.success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn locator_for(config: &InstallerConfig) -> GameLocator {
    GameLocator::new(
        config.steam_game_dir.clone(),
        config.steam_demo_dir.clone(),
        config.steam_root.as_deref().map(Utf8PathBuf::from),
    )
}
