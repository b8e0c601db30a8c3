// Installer Controller - The single interactive context
//
// The controller owns the operator and is the only writer of installer state.
// It consumes InstallerEvents one at a time on its own thread:
// - Operator input (path selection, keep-backup toggle, apply)
// - Cosmetic progress ticks from the ProgressTicker
// - The completion report from the patch worker
//
// Long-running work (the archive tool and the file swap) runs on the tokio
// runtime and reports back through the bridge, so handling an event never
// blocks on subprocess or filesystem I/O of the patch itself.

use crate::metrics::Metrics;
use crate::models::{InstallerConfig, InstallerState};
use crate::services::edition::{self, DetectError, EditionDetector, TranslationLayout};
use crate::services::file_swap;
use crate::services::game_locator::GameLocator;
use crate::services::patching::{
    FailureKind, PatchExecutor, PatchOutcome, PatchPhase, PatchReport, PatchSession,
};
use crate::services::readiness::{self, StaticFacts};
use crate::state::{StateChange, StateManager};
use crate::ui::bridge::{EventLoopBridge, EventLoopBridgeHandle, InstallerEvent};
use crate::ui::operator::{LogLevel, Operator};
use crate::ui::progress::{self, PROGRESS_TICK_INTERVAL, ProgressTicker};
use camino::{Utf8Path, Utf8PathBuf};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

/// Interactive controller driving one installer session
///
/// # Example
/// ```ignore
/// let mut controller = InstallerController::new(operator, config, &app_dir, runtime.handle().clone(), metrics);
/// controller.startup(None, Some(&locator));
///
/// let handle = controller.bridge_handle();
/// handle.try_post(InstallerEvent::ApplyRequested);
///
/// let outcome = controller.run(); // Blocks until Shutdown (or completion in one-shot mode)
/// ```
pub struct InstallerController<O: Operator> {
    operator: O,

    /// Shared installer state
    state_manager: Arc<StateManager>,

    config: Arc<InstallerConfig>,
    detector: EditionDetector,
    tool_path: Option<Utf8PathBuf>,

    /// Event queue; the controller holds the receiving end
    bridge: EventLoopBridge,

    executor: PatchExecutor,
    metrics: Arc<Metrics>,

    /// Running progress animation, if any
    ticker: Option<ProgressTicker>,
    tick_interval: Duration,

    /// Stop after the first completed, rejected or cancelled apply
    exit_when_done: bool,

    last_outcome: Option<PatchOutcome>,
}

impl<O: Operator> InstallerController<O> {
    /// Create a new controller
    ///
    /// Resolves the archive tool and checks the startup readiness facts
    /// against `app_dir`, where the tool and the translation tree ship.
    pub fn new(
        operator: O,
        config: Arc<InstallerConfig>,
        app_dir: &Utf8Path,
        tokio_handle: tokio::runtime::Handle,
        metrics: Arc<Metrics>,
    ) -> Self {
        let layout = TranslationLayout {
            base: app_dir.join(&config.translation_dir),
            demo_subdir: config.demo_subdir.clone(),
            full_subdir: config.full_subdir.clone(),
            main_subdir: config.main_subdir.clone(),
        };

        let explicit_tool = config.tool_path.as_deref().map(|p| Utf8Path::new(p));
        let tool_path = readiness::find_tool(app_dir, &config.tool_name, explicit_tool);
        let static_facts = readiness::check_static(
            tool_path.as_deref(),
            &config.tool_dependency_dir,
            &layout.base,
        );

        tracing::debug!(
            "Static readiness: tool={:?}, facts={:?}",
            tool_path,
            static_facts
        );

        let detector = EditionDetector::new(
            config.archive_filename.clone(),
            config.demo_threshold_mb,
            layout,
        );
        let state_manager = Arc::new(StateManager::with_state(InstallerState::new(
            static_facts,
            false,
        )));
        let bridge = EventLoopBridge::new(tokio_handle, metrics.clone());

        Self {
            operator,
            state_manager,
            config,
            detector,
            tool_path,
            bridge,
            executor: PatchExecutor::new(),
            metrics,
            ticker: None,
            tick_interval: PROGRESS_TICK_INTERVAL,
            exit_when_done: false,
            last_outcome: None,
        }
    }

    pub fn with_keep_backup(self, keep_backup: bool) -> Self {
        self.state_manager.set_keep_backup(keep_backup);
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Stop the event loop once an apply request has been settled
    pub fn exit_when_done(mut self, exit: bool) -> Self {
        self.exit_when_done = exit;
        self
    }

    pub fn bridge_handle(&self) -> EventLoopBridgeHandle {
        self.bridge.clone_handle()
    }

    pub fn state(&self) -> Arc<StateManager> {
        Arc::clone(&self.state_manager)
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    pub fn last_outcome(&self) -> Option<&PatchOutcome> {
        self.last_outcome.as_ref()
    }

    /// Report missing components, then select the initial game folder.
    ///
    /// An explicit `initial_path` wins over auto-detection. When neither
    /// yields a folder the operator is asked to pick one by hand.
    pub fn startup(&mut self, initial_path: Option<Utf8PathBuf>, locator: Option<&GameLocator>) {
        let statics = self.state_manager.read(|s| s.static_facts);
        self.report_static_facts(statics);

        let detected = initial_path.or_else(|| locator.and_then(GameLocator::locate));
        match detected {
            Some(path) => self.on_path_selected(Some(path)),
            None => {
                self.log(
                    LogLevel::Info,
                    "Game folder not found automatically. Please select it manually.",
                );
                self.state_manager.update(|s| s.autodetect_failed = true);
            }
        }
    }

    /// Process events until the loop is told to stop.
    ///
    /// Must run outside the tokio runtime; this is the interactive thread.
    ///
    /// # Returns
    /// The outcome of the last finished patch session, if any
    pub fn run(&mut self) -> Option<PatchOutcome> {
        tracing::info!("Installer event loop started");

        while let Some(event) = self.bridge.blocking_next_event() {
            if self.handle_event(event).is_break() {
                break;
            }
        }

        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }

        tracing::info!("Installer event loop stopped");
        self.last_outcome.clone()
    }

    /// Handle a single event
    pub fn handle_event(&mut self, event: InstallerEvent) -> ControlFlow<()> {
        tracing::trace!("Handling {}", event.name());

        match event {
            InstallerEvent::PathSelected(path) => {
                self.on_path_selected(path);
                ControlFlow::Continue(())
            }
            InstallerEvent::BrowseRequested => {
                if self.controls_locked() {
                    return ControlFlow::Continue(());
                }
                if let Some(path) = self.operator.pick_folder() {
                    self.on_path_selected(Some(path));
                }
                ControlFlow::Continue(())
            }
            InstallerEvent::KeepBackupToggled(keep_backup) => {
                if !self.controls_locked() {
                    self.state_manager.set_keep_backup(keep_backup);
                }
                ControlFlow::Continue(())
            }
            InstallerEvent::ApplyRequested => self.on_apply_requested(),
            InstallerEvent::ProgressTick => {
                self.on_progress_tick();
                ControlFlow::Continue(())
            }
            InstallerEvent::PatchFinished(report) => self.on_patch_finished(report),
            InstallerEvent::Shutdown => {
                if self.state_manager.read(|s| s.is_patching()) {
                    tracing::warn!("Shutdown requested while a patch is running");
                }
                ControlFlow::Break(())
            }
        }
    }

    // ===== Readiness =====

    fn report_static_facts(&mut self, statics: StaticFacts) {
        if !statics.tool_present {
            let message = format!(
                "CRITICAL ERROR: \"{}\" was not found or is not executable.",
                self.config.tool_name
            );
            self.log_with_alert("Missing Essential Component", &message);
        } else if !statics.tool_dependency_present {
            let message = format!(
                "ERROR: Folder \"{}\" not found. It is a dependency of \"{}\".",
                self.config.tool_dependency_dir, self.config.tool_name
            );
            self.log_with_alert("Missing Dependency", &message);
        }

        if !statics.asset_tree_present {
            let message = format!(
                "ERROR: Translation folder \"{}\" not found!",
                self.config.translation_dir
            );
            self.log_with_alert("Critical File Error", &message);
        }
    }

    fn on_path_selected(&mut self, path: Option<Utf8PathBuf>) {
        if self.controls_locked() {
            tracing::debug!("Ignoring path change while controls are locked");
            return;
        }

        if self.state_manager.read(|s| s.autodetect_failed) {
            self.operator.clear_log();
            self.state_manager.update(|s| s.autodetect_failed = false);
        }

        let path = path.filter(|p| !p.as_str().trim().is_empty());
        let changes = self.state_manager.set_game_path(path);
        self.project(&changes);
        self.revalidate();
    }

    /// Recompute readiness for the current folder and tell the operator
    fn revalidate(&mut self) {
        let snapshot = self.state_manager.snapshot();
        if snapshot.already_patched() {
            return;
        }

        self.operator.set_apply_enabled(false);

        let path = snapshot.game_path.clone();
        let validation = readiness::validate(path.as_deref(), &snapshot.static_facts, &self.detector);

        let statics = snapshot.static_facts;
        let statics_ok =
            statics.tool_present && statics.tool_dependency_present && statics.asset_tree_present;

        match (&path, &validation.archive, &validation.detect_error) {
            (Some(dir), Some(archive), _) if statics_ok => {
                if snapshot.is_new_path(dir) {
                    self.log(LogLevel::Info, &format!("Selected game folder: \"{dir}\"."));
                }
                self.log(
                    LogLevel::Info,
                    &format!("Archive \"{}\" found.", self.detector.archive_filename()),
                );
                self.log(LogLevel::Info, &format!("Game edition: {}.", archive.edition));
            }
            (_, _, Some(DetectError::ArchiveNotFound { filename, dir })) if statics_ok => {
                self.log(
                    LogLevel::Error,
                    &format!("ERROR: Archive \"{filename}\" not found in \"{dir}\"."),
                );
            }
            (_, _, Some(err @ DetectError::Unreadable { .. })) if statics_ok => {
                let message = format!("Unexpected ERROR reading the archive: {err}");
                self.log_with_alert("Validation Error", &message);
            }
            _ => {}
        }

        let changes = self.state_manager.apply_validation(&validation);
        self.project(&changes);

        if self.state_manager.read(|s| s.can_apply()) {
            self.operator.set_apply_enabled(true);
            self.log(
                LogLevel::Info,
                "\nThe installer is ready. Press \"Apply\" to continue.\n",
            );
        }
    }

    // ===== Patch orchestration =====

    fn on_apply_requested(&mut self) -> ControlFlow<()> {
        let snapshot = self.state_manager.snapshot();

        if snapshot.is_patching() {
            tracing::debug!("Apply ignored: a patch is already running");
            return ControlFlow::Continue(());
        }

        if snapshot.already_patched() {
            self.log(
                LogLevel::Info,
                "The translation is already installed in this folder.",
            );
            return self.settled();
        }

        let (Some(archive), Some(tool)) = (snapshot.detected.clone(), self.tool_path.clone())
        else {
            return self.reject_incomplete(&snapshot);
        };
        if !snapshot.can_apply() {
            return self.reject_incomplete(&snapshot);
        }

        let backup = file_swap::backup_path_for(&archive.path);
        if snapshot.keep_backup && !backup.exists() {
            // Fall back to the size seen at validation time
            let size = archive
                .path
                .metadata()
                .map(|m| m.len())
                .unwrap_or(archive.size_bytes);
            let message = format!(
                "Are you sure you want to keep a backup of the original archive?\n\
                 It will take about {:.2} GB of additional space.",
                edition::size_in_gb(size)
            );
            if !self.operator.confirm("Confirm Backup", &message) {
                self.log(LogLevel::Info, "Installation cancelled by the user.");
                self.metrics.record_patch_cancelled();
                return self.settled();
            }
        }

        let session = PatchSession::new(&tool, &archive, snapshot.keep_backup, &self.config);
        self.metrics.record_patch_attempt();

        let changes = self.state_manager.start_patch();
        self.project(&changes);
        self.log(
            LogLevel::Info,
            &format!(
                "Applying the {} edition translation. This may take a few minutes...",
                archive.edition
            ),
        );

        let handle = self.bridge.clone_handle();
        self.ticker = Some(ProgressTicker::start(&handle, self.tick_interval));

        let executor = self.executor;
        let poster = handle.clone();
        handle.spawn_async(move || async move {
            let report = executor.execute(session).await;
            if let Err(e) = poster.post(InstallerEvent::PatchFinished(report)).await {
                tracing::warn!("Patch finished after the installer stopped: {}", e);
            }
        });

        ControlFlow::Continue(())
    }

    fn reject_incomplete(&mut self, snapshot: &InstallerState) -> ControlFlow<()> {
        for fact in snapshot.readiness.unmet() {
            tracing::debug!("Unmet readiness fact: {}", fact);
        }
        self.log_with_alert(
            "Notice",
            "ERROR: Incomplete setup. Check the previous error messages.",
        );
        self.settled()
    }

    fn on_progress_tick(&mut self) {
        let Some(current) = self
            .state_manager
            .read(|s| s.is_patching().then_some(s.progress))
        else {
            return;
        };

        let changes = self.state_manager.set_progress(progress::advance(current));
        self.project(&changes);
    }

    fn on_patch_finished(&mut self, report: PatchReport) -> ControlFlow<()> {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }

        let outcome = report.outcome();
        self.metrics
            .record_patch_finished(outcome.success, report.duration);

        let changes = self.state_manager.finish_patch(report.phase());
        self.project(&changes);

        if outcome.success {
            tracing::info!("Patch completed in {:.2}s", report.duration.as_secs_f32());
            self.log(LogLevel::Info, "Process completed successfully. Congratulations!\n");
        } else {
            let first_line = outcome.detail.lines().next().unwrap_or_default();
            self.log(
                LogLevel::Error,
                &format!("ERROR: {} - {}", outcome.title, first_line),
            );
        }

        self.operator.notify(&outcome);

        if report.phase() == PatchPhase::Failed(FailureKind::Finalization) {
            self.log(
                LogLevel::Info,
                "Check the game folder, then select it again before retrying.",
            );
        } else if !outcome.success && self.state_manager.read(|s| s.can_apply()) {
            self.operator.set_apply_enabled(true);
        }

        self.state_manager.reset_session();
        self.last_outcome = Some(outcome);
        self.settled()
    }

    // ===== Helpers =====

    fn settled(&self) -> ControlFlow<()> {
        if self.exit_when_done {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn controls_locked(&self) -> bool {
        self.state_manager.read(|s| s.controls_locked)
    }

    /// Project state changes onto the operator
    fn project(&mut self, changes: &[StateChange]) {
        for change in changes {
            match change {
                StateChange::ProgressUpdated { percent } if *percent > 0 => {
                    self.operator.show_progress(*percent);
                }
                StateChange::ControlsLockChanged { locked } => {
                    self.operator.set_controls_enabled(!locked);
                    if *locked {
                        self.operator.set_apply_enabled(false);
                    }
                }
                StateChange::ReadinessChanged { ready: false, unmet } => {
                    tracing::debug!("Not ready: {:?}", unmet);
                    self.operator.set_apply_enabled(false);
                }
                other => tracing::trace!("State change: {:?}", other),
            }
        }
    }

    fn log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => tracing::info!("{}", message.trim()),
            LogLevel::Error => tracing::error!("{}", message.trim()),
        }
        self.operator.log(level, message);
    }

    fn log_with_alert(&mut self, title: &str, message: &str) {
        self.log(LogLevel::Error, message);
        self.operator.alert(title, message);
    }
}
