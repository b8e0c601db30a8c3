use crate::models::InstallerConfig;
use crate::services::edition::DetectedArchive;
use crate::services::file_swap::{self, BackupDisposition, SwapError};
use camino::{Utf8Path, Utf8PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// Lines of tool output kept in failure details
const OUTPUT_TAIL_LINES: usize = 20;

/// Phase of a patch attempt
///
/// `Idle -> Running -> {Succeeded, Failed}`; once the outcome has been
/// reported the session is dropped and the phase returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchPhase {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed(FailureKind),
}

impl PatchPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, PatchPhase::Running)
    }
}

/// Error taxonomy shared by the whole installer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Game not found automatically; silent, manual selection follows
    LocatorMiss,
    /// A readiness fact is unmet; blocks the apply action
    Readiness,
    /// Archive missing or unreadable; recoverable by re-selecting the path
    Validation,
    /// Tool exited non-zero; apply re-enabled for retry
    Subprocess,
    /// Tool exceeded the timeout; temp file state unknown
    Timeout,
    /// Swap failed part-way; needs manual recovery
    Finalization,
}

/// Everything one patch attempt needs, built fresh per run and moved into the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSession {
    pub tool_path: Utf8PathBuf,
    pub archive_path: Utf8PathBuf,
    pub asset_bundle: Utf8PathBuf,
    pub temp_output: Utf8PathBuf,
    pub keep_backup: bool,
    pub engine_version: String,
    pub path_prefix: String,
    pub timeout: Duration,
}

impl PatchSession {
    pub fn new(
        tool_path: &Utf8Path,
        archive: &DetectedArchive,
        keep_backup: bool,
        config: &InstallerConfig,
    ) -> Self {
        Self {
            tool_path: tool_path.to_path_buf(),
            archive_path: archive.path.clone(),
            asset_bundle: archive.asset_bundle.clone(),
            temp_output: file_swap::temp_path_for(&archive.path),
            keep_backup,
            engine_version: config.engine_version.clone(),
            path_prefix: config.path_prefix.clone(),
            timeout: config.patch_timeout(),
        }
    }

    pub fn backup_path(&self) -> Utf8PathBuf {
        file_swap::backup_path_for(&self.archive_path)
    }

    /// Tool arguments: `-pc <archive> <bundle> <temp> <engine version> <path prefix>`
    pub fn command_args(&self) -> Vec<String> {
        vec![
            "-pc".to_string(),
            self.archive_path.to_string(),
            self.asset_bundle.to_string(),
            self.temp_output.to_string(),
            self.engine_version.clone(),
            self.path_prefix.clone(),
        ]
    }

    fn tool_name(&self) -> String {
        self.tool_path
            .file_name()
            .unwrap_or(self.tool_path.as_str())
            .to_string()
    }

    fn archive_name(&self) -> &str {
        self.archive_path
            .file_name()
            .unwrap_or(self.archive_path.as_str())
    }
}

/// Captured result of one tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Last lines of stderr, or of stdout when stderr is empty
    pub fn diagnostic_tail(&self) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source.trim().lines().collect();
        let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
        lines[start..].join("\n")
    }
}

/// Ways a patch attempt can fail
#[derive(Error, Debug)]
pub enum PatchFailure {
    #[error("Game archive \"{0}\" is no longer a regular file")]
    ArchiveMissing(Utf8PathBuf),

    #[error("\"{tool}\" failed (exit code: {exit_code})")]
    Subprocess {
        tool: String,
        exit_code: i32,
        diagnostics: String,
        temp_removed: bool,
    },

    #[error("Timeout after {}s", .timeout.as_secs())]
    Timeout { timeout: Duration, temp: Utf8PathBuf },

    #[error("Failed to run \"{tool}\": {message}")]
    Launch { tool: String, message: String },

    #[error("Finalization failed: {source}")]
    Finalization {
        archive_name: String,
        #[source]
        source: SwapError,
    },

    #[error("Finalization was interrupted: {message}")]
    Interrupted {
        archive_name: String,
        temp: Utf8PathBuf,
        message: String,
    },
}

impl PatchFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            PatchFailure::ArchiveMissing(_) => FailureKind::Validation,
            PatchFailure::Subprocess { .. } => FailureKind::Subprocess,
            PatchFailure::Timeout { .. } => FailureKind::Timeout,
            PatchFailure::Launch { .. } => FailureKind::Subprocess,
            PatchFailure::Finalization { .. } | PatchFailure::Interrupted { .. } => {
                FailureKind::Finalization
            }
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PatchFailure::ArchiveMissing(_) => "Validation Error",
            PatchFailure::Subprocess { .. } => "Patch Error",
            PatchFailure::Timeout { .. } => "Timeout Error",
            PatchFailure::Launch { .. } => "Unexpected Error",
            PatchFailure::Finalization { .. } | PatchFailure::Interrupted { .. } => {
                "Finalization Error"
            }
        }
    }

    /// Multi-line detail with everything needed for manual recovery
    pub fn detail(&self) -> String {
        match self {
            PatchFailure::ArchiveMissing(path) => format!(
                "The game archive \"{path}\" disappeared before the patch could start.\n\n\
                 Select the game folder again and retry."
            ),
            PatchFailure::Subprocess {
                tool,
                exit_code,
                diagnostics,
                ..
            } => format!("\"{tool}\" failed (exit code: {exit_code}).\n\nDetails:\n{diagnostics}"),
            PatchFailure::Timeout { timeout, temp } => format!(
                "The operation took longer than {} minutes (timeout after {}s).\n\n\
                 The archive tool was abandoned and may still be running.\n\
                 The temporary file \"{temp}\" may have been left behind and need manual cleanup.",
                timeout.as_secs() / 60,
                timeout.as_secs()
            ),
            PatchFailure::Launch { message, .. } => {
                format!("Something went wrong while applying the translation: {message}")
            }
            PatchFailure::Finalization {
                archive_name,
                source,
            } => finalization_detail(archive_name, source.temp_path(), &source.to_string()),
            PatchFailure::Interrupted {
                archive_name,
                temp,
                message,
            } => finalization_detail(archive_name, temp, message),
        }
    }
}

fn finalization_detail(archive_name: &str, temp: &Utf8Path, error: &str) -> String {
    format!(
        "The translation was processed, but finalizing the files failed:\n{error}\n\n\
         Please fix it manually:\n\
         ▪ Rename \"{temp}\" to \"{archive_name}\" in the game folder."
    )
}

/// What the operator sees at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub success: bool,
    pub title: String,
    pub detail: String,
}

/// A successfully installed translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSuccess {
    pub archive_path: Utf8PathBuf,
    pub disposition: BackupDisposition,
}

/// Final report posted back by the patch worker
#[derive(Debug)]
pub struct PatchReport {
    pub result: Result<PatchSuccess, PatchFailure>,
    pub duration: Duration,
}

impl PatchReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn phase(&self) -> PatchPhase {
        match &self.result {
            Ok(_) => PatchPhase::Succeeded,
            Err(failure) => PatchPhase::Failed(failure.kind()),
        }
    }

    pub fn outcome(&self) -> PatchOutcome {
        match &self.result {
            Ok(success) => {
                let archive_name = success
                    .archive_path
                    .file_name()
                    .unwrap_or(success.archive_path.as_str());
                let backup_line = match &success.disposition {
                    BackupDisposition::Created(backup) => format!(
                        "▪ Backup of the original archive: \"{}\"\n",
                        backup.file_name().unwrap_or(backup.as_str())
                    ),
                    BackupDisposition::PreservedExisting(backup) => format!(
                        "▪ Previous backup preserved: \"{}\"\n",
                        backup.file_name().unwrap_or(backup.as_str())
                    ),
                    BackupDisposition::Replaced => "▪ Original archive replaced.\n".to_string(),
                };
                PatchOutcome {
                    success: true,
                    title: "Installation Complete!".to_string(),
                    detail: format!(
                        "Translation installed successfully!\n\n{backup_line}\
                         ▪ Archive with the active translation: \"{archive_name}\""
                    ),
                }
            }
            Err(failure) => PatchOutcome {
                success: false,
                title: failure.title().to_string(),
                detail: failure.detail(),
            },
        }
    }
}

/// Drives the archive tool for one [`PatchSession`]
///
/// Stateless: every input lives in the session, so one executor can serve
/// any number of sequential attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchExecutor;

impl PatchExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Build the tool command with piped output and no console window
    pub fn build_command(&self, session: &PatchSession) -> Command {
        let mut command = Command::new(session.tool_path.as_std_path());
        command
            .args(session.command_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Best-effort kill when the wait is abandoned on timeout
            .kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(0x08000000); // CREATE_NO_WINDOW

        command
    }

    /// Run the tool and capture its output, bounded by the session timeout.
    ///
    /// # Errors
    /// - [`PatchFailure::ArchiveMissing`] if the archive is not a regular file at launch
    /// - [`PatchFailure::Launch`] if the process cannot be spawned or awaited
    /// - [`PatchFailure::Timeout`] if it outlives `session.timeout`
    pub async fn run_tool(&self, session: &PatchSession) -> Result<ToolOutput, PatchFailure> {
        if !session.archive_path.is_file() {
            return Err(PatchFailure::ArchiveMissing(session.archive_path.clone()));
        }

        tracing::info!(
            "Executing: {} {}",
            session.tool_path,
            session.command_args().join(" ")
        );

        let start = Instant::now();
        let child = self
            .build_command(session)
            .spawn()
            .map_err(|e| PatchFailure::Launch {
                tool: session.tool_name(),
                message: e.to_string(),
            })?;

        let output = timeout(session.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::warn!("Archive tool timed out after {:?}", session.timeout);
                PatchFailure::Timeout {
                    timeout: session.timeout,
                    temp: session.temp_output.clone(),
                }
            })?
            .map_err(|e| PatchFailure::Launch {
                tool: session.tool_name(),
                message: e.to_string(),
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        tracing::info!(
            "Archive tool completed in {:.2}s with exit code {}",
            start.elapsed().as_secs_f32(),
            exit_code
        );

        Ok(ToolOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run a complete patch attempt: the tool, then the file swap.
    ///
    /// Never returns an error; every failure is folded into the report so
    /// the worker can always post exactly one completion event.
    pub async fn execute(&self, session: PatchSession) -> PatchReport {
        let start = Instant::now();

        let result = match self.run_tool(&session).await {
            Ok(output) if output.exit_code == 0 => {
                tracing::info!("Translation applied to temporary archive {}", session.temp_output);
                Self::finalize(&session).await
            }
            Ok(output) => Err(Self::subprocess_failure(&session, &output)),
            Err(failure) => Err(failure),
        };

        if let Err(failure) = &result {
            tracing::error!("Patch failed: {}", failure);
        }

        PatchReport {
            result,
            duration: start.elapsed(),
        }
    }

    fn subprocess_failure(session: &PatchSession, output: &ToolOutput) -> PatchFailure {
        let mut temp_removed = false;
        if session.temp_output.exists() {
            match std::fs::remove_file(&session.temp_output) {
                Ok(()) => {
                    temp_removed = true;
                    tracing::debug!("Removed partial output {}", session.temp_output);
                }
                Err(e) => {
                    tracing::warn!("Failed to remove partial output {}: {}", session.temp_output, e);
                }
            }
        }

        PatchFailure::Subprocess {
            tool: session.tool_name(),
            exit_code: output.exit_code,
            diagnostics: output.diagnostic_tail(),
            temp_removed,
        }
    }

    async fn finalize(session: &PatchSession) -> Result<PatchSuccess, PatchFailure> {
        let original = session.archive_path.clone();
        let temp = session.temp_output.clone();
        let keep_backup = session.keep_backup;
        let archive_name = session.archive_name().to_string();

        let joined = tokio::task::spawn_blocking(move || {
            file_swap::finalize(&original, &temp, keep_backup)
        })
        .await;

        match joined {
            Ok(Ok(disposition)) => Ok(PatchSuccess {
                archive_path: session.archive_path.clone(),
                disposition,
            }),
            Ok(Err(source)) => Err(PatchFailure::Finalization {
                archive_name,
                source,
            }),
            Err(e) => Err(PatchFailure::Interrupted {
                archive_name,
                temp: session.temp_output.clone(),
                message: e.to_string(),
            }),
        }
    }
}
