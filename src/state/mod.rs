// State management module
//
// This module provides the StateManager which wraps InstallerState with thread-safe
// access using Arc<RwLock<T>> and emits change events for the presentation layer.

use crate::models::InstallerState;
use crate::services::patching::{FailureKind, PatchPhase};
use crate::services::readiness::{ReadinessFact, Validation};
use camino::Utf8PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These events tell the presentation layer what to redraw without it
/// having to poll the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The selected game folder changed
    PathChanged { path: Option<Utf8PathBuf> },

    /// Readiness was recomputed and its outcome changed
    ReadinessChanged {
        ready: bool,
        unmet: Vec<ReadinessFact>,
    },

    /// A patch session has started
    PatchStarted,

    /// Cosmetic progress moved
    ProgressUpdated { percent: u8 },

    /// A patch session has finished
    PatchFinished { phase: PatchPhase },

    /// Interactive controls were locked or unlocked
    ControlsLockChanged { locked: bool },

    /// Settings have been updated
    SettingsChanged,

    /// Session state has been reset
    StateReset,
}

/// Thread-safe state manager with event emission
///
/// - Provides thread-safe access to [`InstallerState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Related Types
///
/// - [`crate::models::InstallerState`]: The underlying state structure
/// - [`crate::ui::controller::InstallerController`]: Its only writer
pub struct StateManager {
    state: Arc<RwLock<InstallerState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        Self::with_state(InstallerState::default())
    }

    /// Create a StateManager seeded with `state`
    pub fn with_state(state: InstallerState) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(state)),
            state_tx,
        }
    }

    /// Get a read-only snapshot of the current state
    pub fn snapshot(&self) -> InstallerState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let ready = state_manager.read(|state| state.can_apply());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&InstallerState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// # Returns
    /// The StateChange events that were emitted, in detection order
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut InstallerState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(&self, old: &InstallerState, new: &InstallerState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.game_path != new.game_path {
            changes.push(StateChange::PathChanged {
                path: new.game_path.clone(),
            });
        }

        if old.readiness != new.readiness {
            changes.push(StateChange::ReadinessChanged {
                ready: new.readiness.is_ready(),
                unmet: new.readiness.unmet(),
            });
        }

        if old.phase != new.phase {
            match new.phase {
                PatchPhase::Running => changes.push(StateChange::PatchStarted),
                PatchPhase::Succeeded | PatchPhase::Failed(_) => {
                    changes.push(StateChange::PatchFinished { phase: new.phase });
                }
                PatchPhase::Idle => {}
            }
        }

        if old.progress != new.progress {
            changes.push(StateChange::ProgressUpdated {
                percent: new.progress,
            });
        }

        if old.controls_locked != new.controls_locked {
            changes.push(StateChange::ControlsLockChanged {
                locked: new.controls_locked,
            });
        }

        if old.keep_backup != new.keep_backup {
            changes.push(StateChange::SettingsChanged);
        }

        changes
    }

    // Convenience methods for common state updates

    /// Select a game folder.
    ///
    /// Moving away from a patched folder lifts the "already patched" guard.
    pub fn set_game_path(&self, path: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| {
            if state.patch_applied_to_path.is_some() && state.patch_applied_to_path != path {
                state.patch_applied_to_path = None;
            }
            state.game_path = path;
        })
    }

    /// Store the outcome of validating the current folder.
    ///
    /// The folder counts as validated only when its archive was detected.
    pub fn apply_validation(&self, validation: &Validation) -> Vec<StateChange> {
        self.update(|state| {
            state.readiness = validation.readiness;
            state.detected = validation.archive.clone();
            state.last_validated_path = if validation.archive.is_some() {
                state.game_path.clone()
            } else {
                None
            };
        })
    }

    pub fn set_keep_backup(&self, keep_backup: bool) -> Vec<StateChange> {
        self.update(|state| state.keep_backup = keep_backup)
    }

    /// Enter `Running`: lock every control and restart progress
    pub fn start_patch(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.phase = PatchPhase::Running;
            state.progress = 0;
            state.controls_locked = true;
        })
    }

    /// Advance cosmetic progress; ignored outside a running session
    pub fn set_progress(&self, percent: u8) -> Vec<StateChange> {
        self.update(|state| {
            if state.is_patching() {
                state.progress = percent.min(100);
            }
        })
    }

    /// Leave `Running` with the final phase.
    ///
    /// Progress snaps to 100. On success the folder is marked as patched
    /// and controls stay locked; on failure they are released for a retry.
    /// A finalization failure also forgets the detected archive: the game
    /// folder may be half swapped, so apply stays off until the folder is
    /// selected and validated again.
    pub fn finish_patch(&self, phase: PatchPhase) -> Vec<StateChange> {
        self.update(|state| {
            state.phase = phase;
            state.progress = 100;
            match phase {
                PatchPhase::Succeeded => {
                    state.patch_applied_to_path = state.last_validated_path.clone();
                }
                PatchPhase::Failed(FailureKind::Finalization) => {
                    state.controls_locked = false;
                    state.detected = None;
                    state.last_validated_path = None;
                    state.readiness.archive_located = false;
                    state.readiness.edition_detected = false;
                }
                _ => state.controls_locked = false,
            }
        })
    }

    /// Drop the finished session, returning the phase to `Idle`
    pub fn reset_session(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| state.reset_session());

        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
