//! Edition detection from the size of the game's packaged archive.
//!
//! The demo and the full release ship the same archive filename, so the only
//! reliable signal is the archive size: anything under the configured
//! threshold is the demo. The detected edition selects which translation
//! asset bundle gets injected.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs;
use thiserror::Error;

const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Release variant of the installed game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edition {
    Demo,
    Full,
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edition::Demo => write!(f, "Demo"),
            Edition::Full => write!(f, "Full"),
        }
    }
}

/// Classify an archive by size.
///
/// Sizes strictly below `threshold_mb` megabytes are the demo; the
/// threshold itself and everything above it is the full game.
pub fn classify(size_bytes: u64, threshold_mb: u64) -> Edition {
    if size_bytes < threshold_mb.saturating_mul(BYTES_PER_MB) {
        Edition::Demo
    } else {
        Edition::Full
    }
}

/// Archive size in gigabytes, for the backup confirmation prompt
pub fn size_in_gb(size_bytes: u64) -> f64 {
    size_bytes as f64 / BYTES_PER_GB as f64
}

/// Where the translation asset bundles live inside the shipped tree.
///
/// Layout: `<base>/<edition-subdir>/<main-subdir>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationLayout {
    pub base: Utf8PathBuf,
    pub demo_subdir: String,
    pub full_subdir: String,
    pub main_subdir: String,
}

impl TranslationLayout {
    /// Asset bundle directory for an edition (not checked for existence)
    pub fn bundle_for(&self, edition: Edition) -> Utf8PathBuf {
        let edition_dir = match edition {
            Edition::Demo => &self.demo_subdir,
            Edition::Full => &self.full_subdir,
        };
        self.base.join(edition_dir).join(&self.main_subdir)
    }
}

/// A located archive together with its classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedArchive {
    pub path: Utf8PathBuf,
    pub size_bytes: u64,
    pub edition: Edition,
    pub asset_bundle: Utf8PathBuf,
}

/// Errors that can occur while inspecting a game directory
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Archive \"{filename}\" not found in \"{dir}\"")]
    ArchiveNotFound { filename: String, dir: Utf8PathBuf },

    #[error("Unexpected error reading \"{path}\": {source}")]
    Unreadable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Finds the archive inside a game directory and works out the edition
#[derive(Debug, Clone)]
pub struct EditionDetector {
    archive_filename: String,
    threshold_mb: u64,
    layout: TranslationLayout,
}

impl EditionDetector {
    pub fn new(archive_filename: impl Into<String>, threshold_mb: u64, layout: TranslationLayout) -> Self {
        Self {
            archive_filename: archive_filename.into(),
            threshold_mb,
            layout,
        }
    }

    pub fn archive_filename(&self) -> &str {
        &self.archive_filename
    }

    pub fn layout(&self) -> &TranslationLayout {
        &self.layout
    }

    /// Detect the archive and edition installed in `install_dir`
    ///
    /// # Errors
    ///
    /// - [`DetectError::ArchiveNotFound`] when there is no regular file with
    ///   the archive name directly under `install_dir`
    /// - [`DetectError::Unreadable`] when its metadata cannot be read
    pub fn detect(&self, install_dir: &Utf8Path) -> Result<DetectedArchive, DetectError> {
        let path = install_dir.join(&self.archive_filename);
        if !path.is_file() {
            return Err(DetectError::ArchiveNotFound {
                filename: self.archive_filename.clone(),
                dir: install_dir.to_path_buf(),
            });
        }

        let size_bytes = fs::metadata(&path)
            .map_err(|source| DetectError::Unreadable {
                path: path.clone(),
                source,
            })?
            .len();

        let edition = classify(size_bytes, self.threshold_mb);
        let asset_bundle = self.layout.bundle_for(edition);

        tracing::debug!(
            "Detected {} edition: {} ({} bytes), bundle {}",
            edition,
            path,
            size_bytes,
            asset_bundle
        );

        Ok(DetectedArchive {
            path,
            size_bytes,
            edition,
            asset_bundle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn layout() -> TranslationLayout {
        TranslationLayout {
            base: Utf8PathBuf::from("/app/translation"),
            demo_subdir: "Demo".to_string(),
            full_subdir: "Full".to_string(),
            main_subdir: "main".to_string(),
        }
    }

    #[test]
    fn test_classify_boundary_is_full() {
        let threshold = 1500 * BYTES_PER_MB;
        assert_eq!(classify(threshold - 1, 1500), Edition::Demo);
        assert_eq!(classify(threshold, 1500), Edition::Full);
        assert_eq!(classify(threshold + 1, 1500), Edition::Full);
        assert_eq!(classify(0, 1500), Edition::Demo);
    }

    #[test]
    fn test_bundle_for_edition() {
        let layout = layout();
        assert_eq!(
            layout.bundle_for(Edition::Demo),
            Utf8PathBuf::from("/app/translation/Demo/main")
        );
        assert_eq!(
            layout.bundle_for(Edition::Full),
            Utf8PathBuf::from("/app/translation/Full/main")
        );
    }

    #[test]
    fn test_detect_missing_archive() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        let detector = EditionDetector::new("UntilThen.pck", 1, layout());

        let err = detector.detect(dir).unwrap_err();
        assert!(matches!(err, DetectError::ArchiveNotFound { .. }));
        assert!(err.to_string().contains("UntilThen.pck"));
    }

    #[test]
    fn test_detect_directory_named_like_archive() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        fs::create_dir(dir.join("UntilThen.pck")).unwrap();
        let detector = EditionDetector::new("UntilThen.pck", 1, layout());

        assert!(matches!(
            detector.detect(dir),
            Err(DetectError::ArchiveNotFound { .. })
        ));
    }

    #[test]
    fn test_detect_demo_and_full() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        let archive = dir.join("UntilThen.pck");
        let detector = EditionDetector::new("UntilThen.pck", 1, layout());

        fs::write(&archive, vec![0u8; 1024]).unwrap();
        let detected = detector.detect(dir).unwrap();
        assert_eq!(detected.edition, Edition::Demo);
        assert_eq!(detected.size_bytes, 1024);
        assert_eq!(detected.path, archive);
        assert!(detected.asset_bundle.as_str().ends_with("main"));

        fs::write(&archive, vec![0u8; BYTES_PER_MB as usize]).unwrap();
        let detected = detector.detect(dir).unwrap();
        assert_eq!(detected.edition, Edition::Full);
        assert_eq!(detected.asset_bundle, layout().bundle_for(Edition::Full));
    }

    #[test]
    fn test_size_in_gb() {
        assert!((size_in_gb(BYTES_PER_GB * 3) - 3.0).abs() < f64::EPSILON);
        assert!((size_in_gb(BYTES_PER_GB / 2) - 0.5).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_classify_matches_threshold(size in 0u64..(1u64 << 40), threshold_mb in 0u64..100_000) {
            let expected = if size < threshold_mb * BYTES_PER_MB { Edition::Demo } else { Edition::Full };
            prop_assert_eq!(classify(size, threshold_mb), expected);
        }
    }
}
