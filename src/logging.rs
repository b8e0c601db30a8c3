use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the level filter: `debug` or `info`, unless `RUST_LOG` says otherwise
fn env_filter(debug_mode: bool) -> EnvFilter {
    let default_level = if debug_mode { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Pick a log directory that can actually be created.
///
/// Falls back to `<temp>/<log_prefix>-logs` when `preferred` is not
/// writable, e.g. an install folder under a protected location.
pub fn writable_log_dir(preferred: &Utf8Path, log_prefix: &str) -> Utf8PathBuf {
    match fs::create_dir_all(preferred) {
        Ok(()) => preferred.to_path_buf(),
        Err(e) => {
            let fallback = std::env::temp_dir().join(format!("{log_prefix}-logs"));
            let fallback = Utf8PathBuf::from_path_buf(fallback)
                .unwrap_or_else(|p| Utf8PathBuf::from(p.to_string_lossy().into_owned()));
            eprintln!(
                "WARNING: Cannot write logs to {} ({}), using {}",
                preferred, e, fallback
            );
            fallback
        }
    }
}

/// Setup logging with a daily rotating file appender and optional console output.
///
/// # Arguments
/// * `log_dir` - Directory for log files; created if missing
/// * `log_prefix` - Prefix for log files (e.g., "ptbr-installer")
/// * `debug_mode` - If true, use debug level; otherwise use info level
/// * `console_output` - If true, also log to the console
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging_with_console(
    log_dir: &Utf8Path,
    log_prefix: &str,
    debug_mode: bool,
    console_output: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }

    let file_appender = rolling::daily(log_dir, log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Console output goes to stderr so it never mixes with operator status lines
    let console_layer = console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        log_dir,
        log_prefix,
        debug_mode,
        console_output
    );

    Ok(guard)
}
