use crate::services::edition::DetectedArchive;
use crate::services::patching::PatchPhase;
use crate::services::readiness::{ReadinessState, StaticFacts};
use camino::{Utf8Path, Utf8PathBuf};

/// Single source of truth for the interactive installer.
///
/// # Thread Safety
///
/// `InstallerState` is wrapped in `Arc<RwLock<InstallerState>>` by
/// [`crate::state::StateManager`]. Never mutate it directly; go through
/// [`update()`](crate::state::StateManager::update) so change events are
/// emitted.
///
/// # Related Types
///
/// - [`crate::state::StateChange`]: Event types for state mutations
/// - [`crate::ui::controller::InstallerController`]: The only writer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstallerState {
    // Paths
    pub game_path: Option<Utf8PathBuf>,
    pub last_validated_path: Option<Utf8PathBuf>,
    /// Set after a successful install; cleared when the path changes
    pub patch_applied_to_path: Option<Utf8PathBuf>,
    pub autodetect_failed: bool,

    // Readiness
    pub static_facts: StaticFacts,
    pub readiness: ReadinessState,
    pub detected: Option<DetectedArchive>,

    // Runtime state
    pub phase: PatchPhase,
    pub progress: u8,
    pub controls_locked: bool,

    // Settings
    pub keep_backup: bool,
}

impl InstallerState {
    pub fn new(static_facts: StaticFacts, keep_backup: bool) -> Self {
        Self {
            static_facts,
            readiness: ReadinessState::from_static(static_facts),
            keep_backup,
            ..Self::default()
        }
    }

    pub fn is_patching(&self) -> bool {
        self.phase.is_running()
    }

    /// Whether the translation was already installed into the selected folder
    pub fn already_patched(&self) -> bool {
        self.game_path.is_some() && self.patch_applied_to_path == self.game_path
    }

    /// Whether `path` differs from the folder the last validation ran on
    pub fn is_new_path(&self, path: &Utf8Path) -> bool {
        self.last_validated_path.as_deref() != Some(path)
    }

    /// The apply action is available only when every readiness fact holds,
    /// no session is running, and the folder has not been patched already.
    pub fn can_apply(&self) -> bool {
        self.readiness.is_ready()
            && self.detected.is_some()
            && !self.is_patching()
            && !self.controls_locked
            && !self.already_patched()
    }

    /// Drop any finished session and its progress
    pub fn reset_session(&mut self) {
        self.phase = PatchPhase::Idle;
        self.progress = 0;
    }
}
