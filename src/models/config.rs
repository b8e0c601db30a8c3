use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default name of the game's packaged asset archive.
pub const DEFAULT_ARCHIVE_FILENAME: &str = "UntilThen.pck";

/// Default name of the GodotPCKExplorer console executable.
#[cfg(windows)]
pub const DEFAULT_TOOL_NAME: &str = "GodotPCKExplorer.Console.exe";
#[cfg(not(windows))]
pub const DEFAULT_TOOL_NAME: &str = "GodotPCKExplorer.Console";

/// Hard ceiling on how long the archive tool may run.
pub const DEFAULT_PATCH_TIMEOUT_SECS: u64 = 1800;

/// Installer configuration from `installer.yaml`
///
/// Every field has a default, so an empty or missing file yields a working
/// configuration for the Steam release of the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Archive filename expected directly under the game directory
    pub archive_filename: String,

    /// Tool executable name, looked up in the application directory
    pub tool_name: String,

    /// Explicit tool path; overrides the application directory lookup
    pub tool_path: Option<String>,

    /// Runtime-dependency directory that must sit next to the tool
    pub tool_dependency_dir: String,

    /// Translation asset tree, relative to the application directory
    pub translation_dir: String,

    pub demo_subdir: String,
    pub full_subdir: String,
    pub main_subdir: String,

    /// Archives smaller than this many megabytes are the demo
    pub demo_threshold_mb: u64,

    /// Pack version string handed to the tool (`pack.major.minor.patch`)
    pub engine_version: String,

    /// Prefix applied to every injected file inside the archive
    pub path_prefix: String,

    pub patch_timeout_secs: u64,

    /// Directory names under `steamapps/common`
    pub steam_game_dir: String,
    pub steam_demo_dir: String,

    /// Steam install root; skips registry/home discovery when set
    pub steam_root: Option<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            archive_filename: DEFAULT_ARCHIVE_FILENAME.to_string(),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            tool_path: None,
            tool_dependency_dir: "mbedtls".to_string(),
            translation_dir: "translation".to_string(),
            demo_subdir: "Demo".to_string(),
            full_subdir: "Full".to_string(),
            main_subdir: "main".to_string(),
            demo_threshold_mb: 1500,
            engine_version: "2.4.2.2".to_string(),
            path_prefix: String::new(),
            patch_timeout_secs: DEFAULT_PATCH_TIMEOUT_SECS,
            steam_game_dir: "Until Then".to_string(),
            steam_demo_dir: "Until Then Demo".to_string(),
            steam_root: None,
        }
    }
}

impl InstallerConfig {
    /// Timeout for a single tool run
    pub fn patch_timeout(&self) -> Duration {
        Duration::from_secs(self.patch_timeout_secs)
    }
}
