use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{ImageError, RgbaImage};
use thiserror::Error;

use crate::viewport::Viewport;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] ImageError),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to save image: {0}")]
    Save(String),
}

/// Files belonging to one snapshot id at one viewport.
///
/// - reference: `{fixtures_dir}/{id}.{viewport}.png`
/// - candidate: `{results_dir}/{id}{suffix}.{viewport}.png`
/// - diff: `{results_dir}/{id}{suffix}.{viewport}.diff.png`
///
/// `suffix` is `.{regression_suffix}` when one is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub reference: PathBuf,
    pub candidate: PathBuf,
    pub diff: PathBuf,
}

impl SnapshotPaths {
    pub fn new(
        fixtures_dir: &Path,
        results_dir: &Path,
        snapshot_id: &str,
        viewport: &Viewport,
        regression_suffix: Option<&str>,
    ) -> Self {
        let suffix = regression_suffix
            .filter(|s| !s.is_empty())
            .map(|s| format!(".{}", s))
            .unwrap_or_default();
        Self {
            reference: fixtures_dir.join(format!("{}.{}.png", snapshot_id, viewport)),
            candidate: results_dir.join(format!("{}{}.{}.png", snapshot_id, suffix, viewport)),
            diff: results_dir.join(format!("{}{}.{}.diff.png", snapshot_id, suffix, viewport)),
        }
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_file()
    }

    /// Deletes candidate/diff files left by an earlier run.
    pub fn clean_results(&self) -> Result<(), FixtureError> {
        for path in [&self.candidate, &self.diff] {
            match fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed stale result"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Decodes a stored image from disk; never cached between calls.
pub fn load_image(path: &Path) -> Result<RgbaImage, FixtureError> {
    if !path.exists() {
        return Err(FixtureError::NotFound(path.display().to_string()));
    }
    Ok(image::open(path)?.to_rgba8())
}

/// Writes `image` as PNG, creating parent directories as needed.
pub fn save_image(image: &RgbaImage, path: &Path) -> Result<(), FixtureError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| FixtureError::Save(e.to_string()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| FixtureError::Save(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn paths_follow_naming_convention() {
        let paths = SnapshotPaths::new(
            Path::new("vrt/fixtures"),
            Path::new("vrt/results"),
            "page-a",
            &Viewport::new(320),
            None,
        );
        assert_eq!(paths.reference, PathBuf::from("vrt/fixtures/page-a.320.png"));
        assert_eq!(paths.candidate, PathBuf::from("vrt/results/page-a.320.png"));
        assert_eq!(paths.diff, PathBuf::from("vrt/results/page-a.320.diff.png"));
    }

    #[test]
    fn suffix_applies_to_results_only() {
        let paths = SnapshotPaths::new(
            Path::new("f"),
            Path::new("r"),
            "menu",
            &Viewport::new(1300),
            Some("hover"),
        );
        assert_eq!(paths.reference, PathBuf::from("f/menu.1300.png"));
        assert_eq!(paths.candidate, PathBuf::from("r/menu.hover.1300.png"));
        assert_eq!(paths.diff, PathBuf::from("r/menu.hover.1300.diff.png"));

        let empty = SnapshotPaths::new(Path::new("f"), Path::new("r"), "menu", &Viewport::new(1300), Some(""));
        assert_eq!(empty.candidate, PathBuf::from("r/menu.1300.png"));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let result = load_image(Path::new("/nonexistent/path/image.png"));
        assert!(matches!(result, Err(FixtureError::NotFound(_))));
    }

    #[test]
    fn save_creates_directories_and_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested/deeper/snap.320.png");
        let img = RgbaImage::from_pixel(10, 5, Rgba([255, 0, 0, 255]));

        save_image(&img, &path).expect("save image");
        let loaded = load_image(&path).expect("load image");
        assert_eq!(loaded.dimensions(), (10, 5));
        assert_eq!(loaded.as_raw(), img.as_raw());
    }

    #[test]
    fn clean_results_removes_stale_files_and_tolerates_missing_ones() {
        let dir = TempDir::new().expect("tempdir");
        let paths = SnapshotPaths::new(
            &dir.path().join("fixtures"),
            &dir.path().join("results"),
            "page",
            &Viewport::new(480),
            None,
        );
        paths.clean_results().expect("nothing to clean");

        let img = RgbaImage::new(1, 1);
        save_image(&img, &paths.candidate).unwrap();
        save_image(&img, &paths.diff).unwrap();
        save_image(&img, &paths.reference).unwrap();

        paths.clean_results().expect("clean");
        assert!(!paths.candidate.exists());
        assert!(!paths.diff.exists());
        assert!(paths.has_reference());
    }
}
