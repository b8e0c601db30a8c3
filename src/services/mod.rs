//! Services module - Pure business logic for installing the translation.
//!
//! Everything in here is **framework-agnostic**: no dialogs, no event loop,
//! only filesystem inspection and the archive tool subprocess. The
//! controller in [`crate::ui`] composes these pieces and owns all operator
//! interaction.
//!
//! # Components
//!
//! - [`GameLocator`]: Finds the game under any Steam library (full release first, then demo)
//! - [`EditionDetector`]: Locates the archive and classifies it by size
//! - [`readiness`]: The five preconditions gating the patch action
//! - [`PatchExecutor`]: Runs the archive tool with a hard timeout, then swaps files
//! - [`file_swap`]: Temp/backup naming and promotion of the patched archive
//! - [`elevation`]: Administrator relaunch on Windows
//!
//! # Usage Example
//!
//! ```ignore
//! use ptbr_installer::services::{PatchExecutor, PatchSession};
//!
//! let session = PatchSession::new(&tool, &detected, keep_backup, &config);
//! let report = PatchExecutor::new().execute(session).await;
//! println!("{}", report.outcome().detail);
//! ```

pub mod edition;
pub mod elevation;
pub mod file_swap;
pub mod game_locator;
pub mod patching;
pub mod readiness;

pub use edition::{DetectError, DetectedArchive, Edition, EditionDetector, TranslationLayout};
pub use elevation::ElevationStatus;
pub use file_swap::{BackupDisposition, SwapError};
pub use game_locator::GameLocator;
pub use patching::{
    FailureKind, PatchExecutor, PatchFailure, PatchOutcome, PatchPhase, PatchReport,
    PatchSession, PatchSuccess,
};
pub use readiness::{ReadinessFact, ReadinessState, StaticFacts, Validation};
