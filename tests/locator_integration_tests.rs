//! Integration tests for Steam library discovery
//!
//! These tests verify:
//! - Manifest parsing keeps well-formed entries and skips malformed ones
//! - Libraries declared in the manifest are searched after the primary one
//! - The full release wins over the demo across every library

use camino::{Utf8Path, Utf8PathBuf};
use proptest::prelude::*;
use ptbr_installer::services::game_locator::{self, GameLocator};
use std::fs;
use tempfile::TempDir;

fn create_steam_root() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    fs::create_dir_all(root.join("steamapps/common")).unwrap();
    (temp_dir, root)
}

fn write_manifest(root: &Utf8Path, libraries: &[&Utf8Path]) {
    let mut content = String::from("\"libraryfolders\"\n{\n");
    for (i, library) in libraries.iter().enumerate() {
        let escaped = library.as_str().replace('\\', "\\\\");
        content.push_str(&format!(
            "\t\"{i}\"\n\t{{\n\t\t\"path\"\t\t\"{escaped}\"\n\t\t\"label\"\t\t\"\"\n\t}}\n"
        ));
    }
    content.push_str("}\n");
    fs::write(root.join("steamapps/libraryfolders.vdf"), content).unwrap();
}

#[test]
fn test_parse_real_world_manifest() {
    let manifest = r#"
"libraryfolders"
{
	"0"
	{
		"path"		"C:\\Program Files (x86)\\Steam"
		"label"		""
		"contentid"		"1234567890"
		"apps"
		{
			"228980"		"1234"
		}
	}
	"1"
	{
		"path"		"D:\\SteamLibrary"
	}
}
"#;

    let paths = game_locator::parse_library_manifest(manifest);

    assert_eq!(
        paths,
        vec![
            Utf8PathBuf::from(r"C:\Program Files (x86)\Steam"),
            Utf8PathBuf::from(r"D:\SteamLibrary"),
        ]
    );
}

#[test]
fn test_secondary_library_is_searched() {
    let (_root_dir, root) = create_steam_root();
    let secondary_dir = TempDir::new().unwrap();
    let secondary = Utf8PathBuf::try_from(secondary_dir.path().to_path_buf()).unwrap();
    fs::create_dir_all(secondary.join("steamapps/common/Until Then")).unwrap();

    write_manifest(&root, &[&secondary]);

    let locator = GameLocator::new("Until Then", "Until Then Demo", None);
    let found = locator.locate_in(&root).unwrap();

    assert_eq!(found, secondary.join("steamapps/common/Until Then"));
}

#[test]
fn test_full_in_secondary_wins_over_demo_in_primary() {
    let (_root_dir, root) = create_steam_root();
    fs::create_dir_all(root.join("steamapps/common/Until Then Demo")).unwrap();

    let secondary_dir = TempDir::new().unwrap();
    let secondary = Utf8PathBuf::try_from(secondary_dir.path().to_path_buf()).unwrap();
    fs::create_dir_all(secondary.join("steamapps/common/Until Then")).unwrap();

    write_manifest(&root, &[&secondary]);

    let locator = GameLocator::new("Until Then", "Until Then Demo", None);
    assert_eq!(
        locator.locate_in(&root),
        Some(secondary.join("steamapps/common/Until Then"))
    );
}

#[test]
fn test_missing_library_entries_are_skipped() {
    let (_root_dir, root) = create_steam_root();
    fs::create_dir_all(root.join("steamapps/common/Until Then Demo")).unwrap();
    write_manifest(&root, &[Utf8Path::new("/definitely/not/a/library")]);

    let libraries = game_locator::library_dirs(&root);
    assert_eq!(libraries.len(), 2);
    assert_eq!(libraries[0], root.join("steamapps"));

    let locator = GameLocator::new("Until Then", "Until Then Demo", None);
    assert_eq!(
        locator.locate_in(&root),
        Some(root.join("steamapps/common/Until Then Demo"))
    );
}

#[test]
fn test_configured_steam_root_is_used() {
    let (_root_dir, root) = create_steam_root();
    fs::create_dir_all(root.join("steamapps/common/Until Then")).unwrap();

    let locator = GameLocator::new("Until Then", "Until Then Demo", Some(root.clone()));

    assert_eq!(locator.steam_root(), Some(root.clone()));
    assert_eq!(locator.locate(), Some(root.join("steamapps/common/Until Then")));
}

#[test]
fn test_game_not_installed() {
    let (_root_dir, root) = create_steam_root();

    let locator = GameLocator::new("Until Then", "Until Then Demo", Some(root.clone()));
    assert_eq!(locator.locate(), None);
}

fn library_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 _:/.-]{1,24}"
}

fn malformed_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("\"path\"".to_string()),
        Just("\"path\"\t\t\"unterminated".to_string()),
        Just("path\t\t\"missing quotes on key\"".to_string()),
        Just("\"label\"\t\t\"\"".to_string()),
        Just("{".to_string()),
        "[a-z ]{0,16}",
    ]
}

proptest! {
    #[test]
    fn prop_parser_counts_only_valid_entries(
        valid in prop::collection::vec(library_value(), 0..8),
        malformed in prop::collection::vec(malformed_line(), 0..8),
    ) {
        let mut lines: Vec<String> = valid
            .iter()
            .map(|value| format!("\t\t\"path\"\t\t\"{value}\""))
            .collect();
        // Interleave malformed lines between the valid ones
        for (i, line) in malformed.iter().enumerate() {
            let at = (i * 2).min(lines.len());
            lines.insert(at, line.clone());
        }

        let parsed = game_locator::parse_library_manifest(&lines.join("\n"));

        prop_assert_eq!(parsed.len(), valid.len());
        for (parsed, expected) in parsed.iter().zip(&valid) {
            prop_assert_eq!(parsed.as_str(), expected.as_str());
        }
    }
}
