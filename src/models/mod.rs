//! Data models for the installer.
//!
//! - [`InstallerState`]: The central state container: selected folder, readiness, patch phase, progress
//! - [`InstallerConfig`]: Archive names, tool location, edition threshold and timeout from `installer.yaml`
//!
//! # Architecture Note
//!
//! - **Serializable**: the config derives `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: `InstallerState` is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager)

pub mod app_state;
pub mod config;

pub use app_state::InstallerState;
pub use config::{
    DEFAULT_ARCHIVE_FILENAME, DEFAULT_PATCH_TIMEOUT_SECS, DEFAULT_TOOL_NAME, InstallerConfig,
};
