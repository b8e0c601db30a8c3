//! The operator seam: everything the installer shows to or asks of a person.
//!
//! The controller never talks to a terminal or a dialog directly. It calls an
//! [`Operator`], which is either [`DialogOperator`] (native message boxes and
//! folder picker via `rfd`, status lines on stdout) or [`ConsoleOperator`]
//! (plain text over any reader/writer pair, so it is scriptable and testable).

use crate::services::patching::PatchOutcome;
use camino::Utf8PathBuf;
use std::io::{self, BufRead, Write};

/// Severity of a status log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

/// Presentation callbacks used by the installer controller
#[cfg_attr(test, mockall::automock)]
pub trait Operator {
    /// Append a line to the status log
    fn log(&mut self, level: LogLevel, message: &str);

    /// Clear the status log
    fn clear_log(&mut self);

    /// Modal error notification
    fn alert(&mut self, title: &str, message: &str);

    /// Modal yes/no question; `true` means yes
    fn confirm(&mut self, title: &str, message: &str) -> bool;

    /// Modal notification of a finished patch session
    fn notify(&mut self, outcome: &PatchOutcome);

    /// Ask for the game folder; `None` when cancelled
    fn pick_folder(&mut self) -> Option<Utf8PathBuf>;

    /// Show the cosmetic progress percentage
    fn show_progress(&mut self, percent: u8);

    /// Enable or disable the folder selection controls
    fn set_controls_enabled(&mut self, enabled: bool);

    /// Enable or disable the apply action
    fn set_apply_enabled(&mut self, enabled: bool);
}

/// Line-oriented status output shared by both operators
struct StatusWriter<W: Write> {
    out: W,
    last_progress: Option<u8>,
}

impl<W: Write> StatusWriter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            last_progress: None,
        }
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            tracing::debug!("Failed to write status line: {}", e);
        }
    }

    fn log(&mut self, level: LogLevel, message: &str) {
        match level {
            // Most error messages already carry their own severity wording
            LogLevel::Error if !message.contains("ERROR") => {
                self.line(&format!("ERROR: {message}"));
            }
            _ => self.line(message),
        }
    }

    /// Print every tenth percent and the final 100
    fn progress(&mut self, percent: u8) {
        let bucket = percent / 10;
        if self.last_progress.map(|last| last / 10) == Some(bucket) {
            return;
        }
        self.last_progress = Some(percent);
        self.line(&format!("Progress: {percent}%"));
        if percent >= 100 {
            self.last_progress = None;
        }
    }
}

/// Plain-text operator for terminals and scripted runs
pub struct ConsoleOperator<R: BufRead, W: Write> {
    input: R,
    status: StatusWriter<W>,
    auto_confirm: bool,
}

impl ConsoleOperator<io::StdinLock<'static>, io::Stdout> {
    /// Operator bound to the process's stdin and stdout
    pub fn stdio(auto_confirm: bool) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), auto_confirm)
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W, auto_confirm: bool) -> Self {
        Self {
            input,
            status: StatusWriter::new(output),
            auto_confirm,
        }
    }

    fn prompt(&mut self, text: &str) -> Option<String> {
        if let Err(e) = write!(self.status.out, "{text}").and_then(|()| self.status.out.flush()) {
            tracing::debug!("Failed to write prompt: {}", e);
        }

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) => None,
            Ok(_) => Some(answer.trim().to_string()),
            Err(e) => {
                tracing::warn!("Failed to read operator input: {}", e);
                None
            }
        }
    }

    /// Consume the operator and return the output sink
    pub fn into_output(self) -> W {
        self.status.out
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn log(&mut self, level: LogLevel, message: &str) {
        self.status.log(level, message);
    }

    fn clear_log(&mut self) {
        self.status.line("");
    }

    fn alert(&mut self, title: &str, message: &str) {
        self.status.line(&format!("[{title}] {message}"));
    }

    fn confirm(&mut self, title: &str, message: &str) -> bool {
        self.status.line(&format!("[{title}] {message}"));
        if self.auto_confirm {
            self.status.line("Confirmed automatically (--yes).");
            return true;
        }

        matches!(
            self.prompt("Continue? [y/N] ")
                .map(|answer| answer.to_lowercase())
                .as_deref(),
            Some("y" | "yes" | "s" | "sim")
        )
    }

    fn notify(&mut self, outcome: &PatchOutcome) {
        self.status.line(&format!("[{}]", outcome.title));
        self.status.line(&outcome.detail);
    }

    fn pick_folder(&mut self) -> Option<Utf8PathBuf> {
        self.prompt("Game folder: ")
            .filter(|answer| !answer.is_empty())
            .map(Utf8PathBuf::from)
    }

    fn show_progress(&mut self, percent: u8) {
        self.status.progress(percent);
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        tracing::debug!("Folder controls enabled: {}", enabled);
    }

    fn set_apply_enabled(&mut self, enabled: bool) {
        tracing::debug!("Apply enabled: {}", enabled);
    }
}

/// Native dialogs for modal interaction, stdout for the status log
pub struct DialogOperator {
    status: StatusWriter<io::Stdout>,
    auto_confirm: bool,
}

impl DialogOperator {
    pub fn new(auto_confirm: bool) -> Self {
        Self {
            status: StatusWriter::new(io::stdout()),
            auto_confirm,
        }
    }

    fn message(level: rfd::MessageLevel, title: &str, description: &str) {
        rfd::MessageDialog::new()
            .set_level(level)
            .set_title(title)
            .set_description(description)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }
}

impl Operator for DialogOperator {
    fn log(&mut self, level: LogLevel, message: &str) {
        self.status.log(level, message);
    }

    fn clear_log(&mut self) {
        self.status.line("");
    }

    fn alert(&mut self, title: &str, message: &str) {
        Self::message(rfd::MessageLevel::Error, title, message);
    }

    fn confirm(&mut self, title: &str, message: &str) -> bool {
        if self.auto_confirm {
            return true;
        }

        let result = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Warning)
            .set_title(title)
            .set_description(message)
            .set_buttons(rfd::MessageButtons::YesNo)
            .show();
        matches!(result, rfd::MessageDialogResult::Yes)
    }

    fn notify(&mut self, outcome: &PatchOutcome) {
        let level = if outcome.success {
            rfd::MessageLevel::Info
        } else {
            rfd::MessageLevel::Error
        };
        Self::message(level, &outcome.title, &outcome.detail);
    }

    fn pick_folder(&mut self) -> Option<Utf8PathBuf> {
        rfd::FileDialog::new()
            .set_title("Select the game installation folder")
            .pick_folder()
            .and_then(|path| {
                Utf8PathBuf::try_from(path)
                    .map_err(|e| {
                        tracing::error!("Failed to convert path to UTF-8: {}", e);
                        e
                    })
                    .ok()
            })
    }

    fn show_progress(&mut self, percent: u8) {
        self.status.progress(percent);
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        tracing::debug!("Folder controls enabled: {}", enabled);
    }

    fn set_apply_enabled(&mut self, enabled: bool) {
        tracing::debug!("Apply enabled: {}", enabled);
    }
}
