//! Preconditions gating the patch action.
//!
//! Three facts are static for the lifetime of the process and are checked
//! once at startup ([`check_static`]); the other two depend on the selected
//! game directory and are recomputed on every path change ([`validate`]).
//! Validation is pure: it only reads the filesystem and returns what it
//! found. Projecting the result onto the operator is the controller's job.

use crate::services::edition::{DetectError, DetectedArchive, EditionDetector};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::ffi::OsStr;
use std::fmt;

/// A single precondition of the patch action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadinessFact {
    ToolPresent,
    ToolDependencyPresent,
    AssetTreePresent,
    ArchiveLocated,
    EditionDetected,
}

impl ReadinessFact {
    pub const ALL: [ReadinessFact; 5] = [
        ReadinessFact::ToolPresent,
        ReadinessFact::ToolDependencyPresent,
        ReadinessFact::AssetTreePresent,
        ReadinessFact::ArchiveLocated,
        ReadinessFact::EditionDetected,
    ];
}

impl fmt::Display for ReadinessFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReadinessFact::ToolPresent => "archive tool present and executable",
            ReadinessFact::ToolDependencyPresent => "archive tool dependency folder present",
            ReadinessFact::AssetTreePresent => "translation asset folder present",
            ReadinessFact::ArchiveLocated => "game archive located",
            ReadinessFact::EditionDetected => "game edition detected",
        };
        f.write_str(label)
    }
}

/// Facts that do not depend on the selected game directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticFacts {
    pub tool_present: bool,
    pub tool_dependency_present: bool,
    pub asset_tree_present: bool,
}

/// Aggregate of all five preconditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessState {
    pub tool_present: bool,
    pub tool_dependency_present: bool,
    pub asset_tree_present: bool,
    pub archive_located: bool,
    pub edition_detected: bool,
}

impl ReadinessState {
    pub fn from_static(facts: StaticFacts) -> Self {
        Self {
            tool_present: facts.tool_present,
            tool_dependency_present: facts.tool_dependency_present,
            asset_tree_present: facts.asset_tree_present,
            archive_located: false,
            edition_detected: false,
        }
    }

    /// Value of each fact, in check order
    pub fn facts(&self) -> IndexMap<ReadinessFact, bool> {
        ReadinessFact::ALL
            .into_iter()
            .map(|fact| (fact, self.get(fact)))
            .collect()
    }

    pub fn get(&self, fact: ReadinessFact) -> bool {
        match fact {
            ReadinessFact::ToolPresent => self.tool_present,
            ReadinessFact::ToolDependencyPresent => self.tool_dependency_present,
            ReadinessFact::AssetTreePresent => self.asset_tree_present,
            ReadinessFact::ArchiveLocated => self.archive_located,
            ReadinessFact::EditionDetected => self.edition_detected,
        }
    }

    /// The patch action may run only when every fact holds
    pub fn is_ready(&self) -> bool {
        self.tool_present
            && self.tool_dependency_present
            && self.asset_tree_present
            && self.archive_located
            && self.edition_detected
    }

    /// Facts that currently fail, in check order
    pub fn unmet(&self) -> Vec<ReadinessFact> {
        self.facts()
            .into_iter()
            .filter(|(_, held)| !held)
            .map(|(fact, _)| fact)
            .collect()
    }
}

/// Whether `path` is a file the current user could execute
pub fn is_executable(path: &Utf8Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    let executable = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    };
    #[cfg(not(unix))]
    let executable = true;

    executable
}

/// Resolve the archive tool: an explicit path wins, then the application
/// directory, then the directories on `PATH`.
pub fn find_tool(app_dir: &Utf8Path, tool_name: &str, explicit: Option<&Utf8Path>) -> Option<Utf8PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    let candidate = app_dir.join(tool_name);
    if candidate.is_file() {
        return Some(candidate);
    }

    std::env::var_os("PATH").and_then(|path_var| search_path(tool_name, &path_var))
}

/// First `dir/tool_name` that is a file, walking a `PATH`-style list in order.
/// Entries that are not valid UTF-8 are skipped.
pub fn search_path(tool_name: &str, path_var: &OsStr) -> Option<Utf8PathBuf> {
    std::env::split_paths(path_var)
        .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .filter(|dir| !dir.as_str().is_empty())
        .map(|dir| dir.join(tool_name))
        .find(|candidate| candidate.is_file())
}

/// Check the startup facts.
///
/// # Arguments
/// * `tool` - Resolved tool path, if any
/// * `dependency_dir_name` - Folder that must sit next to the tool
/// * `asset_base` - Root of the shipped translation tree
pub fn check_static(tool: Option<&Utf8Path>, dependency_dir_name: &str, asset_base: &Utf8Path) -> StaticFacts {
    let tool_present = tool.is_some_and(is_executable);
    let tool_dependency_present = tool
        .and_then(|path| path.parent())
        .is_some_and(|dir| dir.join(dependency_dir_name).is_dir());

    StaticFacts {
        tool_present,
        tool_dependency_present,
        asset_tree_present: asset_base.is_dir(),
    }
}

/// Result of validating a candidate game directory
#[derive(Debug)]
pub struct Validation {
    pub readiness: ReadinessState,
    pub archive: Option<DetectedArchive>,
    pub detect_error: Option<DetectError>,
}

/// Recompute readiness for a candidate game directory.
///
/// A missing, empty, or non-directory path simply leaves both
/// path-dependent facts false with no detection error.
pub fn validate(path: Option<&Utf8Path>, statics: &StaticFacts, detector: &EditionDetector) -> Validation {
    let mut readiness = ReadinessState::from_static(*statics);

    let Some(dir) = path.filter(|p| !p.as_str().is_empty() && p.is_dir()) else {
        return Validation {
            readiness,
            archive: None,
            detect_error: None,
        };
    };

    match detector.detect(dir) {
        Ok(archive) => {
            readiness.archive_located = true;
            readiness.edition_detected = true;
            Validation {
                readiness,
                archive: Some(archive),
                detect_error: None,
            }
        }
        Err(e) => {
            // Found but unreadable still counts as located
            readiness.archive_located = matches!(e, DetectError::Unreadable { .. });
            Validation {
                readiness,
                archive: None,
                detect_error: Some(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::edition::TranslationLayout;
    use std::fs;
    use tempfile::TempDir;

    fn state_from_bits(bits: u8) -> ReadinessState {
        ReadinessState {
            tool_present: bits & 1 != 0,
            tool_dependency_present: bits & 2 != 0,
            asset_tree_present: bits & 4 != 0,
            archive_located: bits & 8 != 0,
            edition_detected: bits & 16 != 0,
        }
    }

    #[test]
    fn test_every_partial_combination_is_not_ready() {
        for bits in 0u8..31 {
            let state = state_from_bits(bits);
            assert!(!state.is_ready(), "combination {bits:05b} should not be ready");
            assert!(!state.unmet().is_empty());
        }
        assert!(state_from_bits(31).is_ready());
        assert!(state_from_bits(31).unmet().is_empty());
    }

    #[test]
    fn test_unmet_names_failing_facts_in_order() {
        let state = ReadinessState {
            tool_present: true,
            tool_dependency_present: false,
            asset_tree_present: true,
            archive_located: false,
            edition_detected: true,
        };
        assert_eq!(
            state.unmet(),
            vec![ReadinessFact::ToolDependencyPresent, ReadinessFact::ArchiveLocated]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_check_static_requires_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        let tool = dir.join("GodotPCKExplorer.Console");
        fs::write(&tool, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o644)).unwrap();
        fs::create_dir(dir.join("mbedtls")).unwrap();
        fs::create_dir(dir.join("translation")).unwrap();

        let facts = check_static(Some(tool.as_path()), "mbedtls", &dir.join("translation"));
        assert!(!facts.tool_present);
        assert!(facts.tool_dependency_present);
        assert!(facts.asset_tree_present);

        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        let facts = check_static(Some(tool.as_path()), "mbedtls", &dir.join("translation"));
        assert!(facts.tool_present);
    }

    #[test]
    fn test_check_static_without_tool() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();

        let facts = check_static(None, "mbedtls", &dir.join("translation"));
        assert_eq!(facts, StaticFacts::default());
    }

    #[test]
    fn test_find_tool_prefers_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        let explicit = dir.join("custom-tool");
        fs::write(dir.join("tool"), b"").unwrap();

        assert_eq!(find_tool(dir, "tool", None), Some(dir.join("tool")));
        assert_eq!(find_tool(dir, "tool", Some(explicit.as_path())), None);

        fs::write(&explicit, b"").unwrap();
        assert_eq!(find_tool(dir, "tool", Some(explicit.as_path())), Some(explicit.clone()));
    }

    #[test]
    fn test_search_path_walks_entries_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        let (first, second, empty) = (dir.join("first"), dir.join("second"), dir.join("empty"));
        for d in [&first, &second, &empty] {
            fs::create_dir_all(d).unwrap();
        }
        fs::write(first.join("tool"), b"").unwrap();
        fs::write(second.join("tool"), b"").unwrap();
        // A directory with the tool's name is not a match
        fs::create_dir_all(empty.join("tool")).unwrap();

        let path_var = std::env::join_paths([&empty, &second, &first]).unwrap();
        assert_eq!(search_path("tool", &path_var), Some(second.join("tool")));

        let path_var = std::env::join_paths([&empty]).unwrap();
        assert_eq!(search_path("tool", &path_var), None);
        assert_eq!(search_path("tool", OsStr::new("")), None);
    }

    #[test]
    fn test_validate_path_dependent_facts() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        let detector = EditionDetector::new(
            "UntilThen.pck",
            1,
            TranslationLayout {
                base: dir.join("translation"),
                demo_subdir: "Demo".to_string(),
                full_subdir: "Full".to_string(),
                main_subdir: "main".to_string(),
            },
        );
        let statics = StaticFacts {
            tool_present: true,
            tool_dependency_present: true,
            asset_tree_present: true,
        };

        let none = validate(None, &statics, &detector);
        assert!(!none.readiness.is_ready());
        assert!(none.detect_error.is_none());

        let missing = validate(Some(dir), &statics, &detector);
        assert!(!missing.readiness.archive_located);
        assert!(matches!(missing.detect_error, Some(DetectError::ArchiveNotFound { .. })));

        fs::write(dir.join("UntilThen.pck"), b"tiny").unwrap();
        let found = validate(Some(dir), &statics, &detector);
        assert!(found.readiness.is_ready());
        assert!(found.archive.is_some());
    }
}
