//! Game location utilities for finding the Steam install of the game.
//!
//! This module resolves the game directory from:
//! - The Steam install root (configured override, then `steamlocate`, which
//!   reads the Valve registry keys on Windows and the usual home locations elsewhere)
//! - `steamapps/libraryfolders.vdf`, which lists every additional Steam library
//!
//! Every failure here is swallowed and logged at debug level. A miss is not an
//! error for the installer: the operator simply picks the folder by hand.
//!
//! # Examples
//!
//! ```ignore
//! use ptbr_installer::services::game_locator::GameLocator;
//!
//! let locator = GameLocator::new("Until Then", "Until Then Demo", None);
//! if let Some(dir) = locator.locate() {
//!     println!("Found game at {}", dir);
//! }
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;

static LIBRARY_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""path"[ \t]+"([^"\r\n]+)""#).expect("Invalid library path regex"));

/// Extracts library paths from the contents of a `libraryfolders.vdf` file.
///
/// Only well-formed `"path" "<value>"` entries are returned, in file order.
/// Escaped backslashes (`\\`) are un-escaped so the values can be used as
/// filesystem paths directly. Malformed lines are ignored.
///
/// # Examples
///
/// ```ignore
/// let paths = parse_library_manifest(r#""path"		"D:\\SteamLibrary""#);
/// assert_eq!(paths[0].as_str(), r"D:\SteamLibrary");
/// ```
pub fn parse_library_manifest(content: &str) -> Vec<Utf8PathBuf> {
    LIBRARY_PATH_PATTERN
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|value| Utf8PathBuf::from(value.as_str().replace("\\\\", "\\")))
        .collect()
}

/// Lists the `steamapps` directories reachable from a Steam install root.
///
/// The primary `<root>/steamapps` always comes first, followed by one entry
/// per library declared in its `libraryfolders.vdf`. A missing or unreadable
/// manifest just leaves the primary library.
pub fn library_dirs(steam_root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let main_library = steam_root.join("steamapps");
    let manifest = main_library.join("libraryfolders.vdf");

    let mut libraries = vec![main_library];

    if manifest.exists() {
        match fs::read_to_string(&manifest) {
            Ok(content) => {
                libraries.extend(
                    parse_library_manifest(&content)
                        .into_iter()
                        .map(|path| path.join("steamapps")),
                );
            }
            Err(e) => {
                tracing::debug!("Ignoring unreadable library manifest {}: {}", manifest, e);
            }
        }
    }

    libraries
}

/// Finds the first game directory among the given libraries.
///
/// All libraries are checked for the full release before any is checked for
/// the demo, so a full install anywhere wins over a demo in the primary library.
pub fn find_game_dir(
    libraries: &[Utf8PathBuf],
    full_dir_name: &str,
    demo_dir_name: &str,
) -> Option<Utf8PathBuf> {
    [full_dir_name, demo_dir_name].into_iter().find_map(|name| {
        libraries
            .iter()
            .map(|library| library.join("common").join(name))
            .find(|candidate| candidate.is_dir())
    })
}

/// Locates the Steam install root via `steamlocate`
fn steamlocate_root() -> Option<Utf8PathBuf> {
    let steam_dir = match steamlocate::SteamDir::locate() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::debug!("Steam install not found: {}", e);
            return None;
        }
    };

    match Utf8PathBuf::from_path_buf(steam_dir.path().to_path_buf()) {
        Ok(path) => Some(path),
        Err(path) => {
            tracing::debug!("Ignoring non UTF-8 Steam path: {}", path.display());
            None
        }
    }
}

/// Resolves the game installation directory from Steam
#[derive(Debug, Clone)]
pub struct GameLocator {
    full_dir_name: String,
    demo_dir_name: String,
    steam_root_override: Option<Utf8PathBuf>,
}

impl GameLocator {
    pub fn new(
        full_dir_name: impl Into<String>,
        demo_dir_name: impl Into<String>,
        steam_root_override: Option<Utf8PathBuf>,
    ) -> Self {
        Self {
            full_dir_name: full_dir_name.into(),
            demo_dir_name: demo_dir_name.into(),
            steam_root_override,
        }
    }

    /// The Steam install root: the configured override when it exists,
    /// otherwise whatever `steamlocate` finds.
    pub fn steam_root(&self) -> Option<Utf8PathBuf> {
        if let Some(root) = &self.steam_root_override {
            if root.is_dir() {
                return Some(root.clone());
            }
            tracing::debug!("Configured Steam root {} does not exist", root);
        }
        steamlocate_root()
    }

    /// Search a specific Steam root for the game
    pub fn locate_in(&self, steam_root: &Utf8Path) -> Option<Utf8PathBuf> {
        let libraries = library_dirs(steam_root);
        tracing::debug!("Searching {} Steam libraries", libraries.len());
        find_game_dir(&libraries, &self.full_dir_name, &self.demo_dir_name)
    }

    /// Locate the game directory, or `None` when it cannot be found
    pub fn locate(&self) -> Option<Utf8PathBuf> {
        let root = self.steam_root()?;
        let found = self.locate_in(&root);

        match &found {
            Some(dir) => tracing::info!("Detected game directory: {}", dir),
            None => tracing::debug!("Game not found in any library under {}", root),
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_temp_dir() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_parse_unescapes_backslashes() {
        let content = "\"libraryfolders\"\n{\n\t\"1\"\n\t{\n\t\t\"path\"\t\t\"D:\\\\Games\\\\SteamLibrary\"\n\t}\n}\n";
        let paths = parse_library_manifest(content);
        assert_eq!(paths, vec![Utf8PathBuf::from("D:\\Games\\SteamLibrary")]);
    }

    #[test]
    fn test_parse_ignores_malformed_lines() {
        let content = concat!(
            "\"path\"\t\t\"/mnt/games\"\n",
            "\"path\"\n",
            "\"path\" \"\"\n",
            "path \"/not/quoted/key\"\n",
            "\"label\"\t\t\"Games\"\n",
            "\"path\"   \"/srv/steam\"\n",
        );
        let paths = parse_library_manifest(content);
        assert_eq!(
            paths,
            vec![Utf8PathBuf::from("/mnt/games"), Utf8PathBuf::from("/srv/steam")]
        );
    }

    #[test]
    fn test_library_dirs_without_manifest() {
        let (_temp, root) = utf8_temp_dir();
        assert_eq!(library_dirs(&root), vec![root.join("steamapps")]);
    }

    #[test]
    fn test_full_edition_preferred_over_demo() {
        let (_temp, root) = utf8_temp_dir();
        let primary = root.join("primary").join("steamapps");
        let secondary = root.join("secondary").join("steamapps");
        fs::create_dir_all(primary.join("common").join("Until Then Demo")).unwrap();
        fs::create_dir_all(secondary.join("common").join("Until Then")).unwrap();

        let found = find_game_dir(&[primary, secondary.clone()], "Until Then", "Until Then Demo");
        assert_eq!(found, Some(secondary.join("common").join("Until Then")));
    }

    #[test]
    fn test_demo_found_when_no_full() {
        let (_temp, root) = utf8_temp_dir();
        let library = root.join("steamapps");
        fs::create_dir_all(library.join("common").join("Until Then Demo")).unwrap();

        let found = find_game_dir(&[library.clone()], "Until Then", "Until Then Demo");
        assert_eq!(found, Some(library.join("common").join("Until Then Demo")));
    }

    #[test]
    fn test_nothing_found() {
        let (_temp, root) = utf8_temp_dir();
        assert_eq!(
            find_game_dir(&[root.join("steamapps")], "Until Then", "Until Then Demo"),
            None
        );
    }
}
