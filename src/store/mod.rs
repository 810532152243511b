//! Artifact persistence: timestamped screenshots and their listings.

pub mod archive;

pub use archive::ArchiveOutcome;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Subdirectory for captured frames.
const SCREENSHOTS_DIR: &str = "screenshots";
/// Subdirectory for zip archives.
const ARCHIVES_DIR: &str = "zip_archives";

/// Shown in place of a listing when a directory has no artifacts.
pub const NO_SCREENSHOTS: &str = "No screenshots yet";
pub const NO_ARCHIVES: &str = "No archives yet";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// One stored artifact, as shown in the UI listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntry {
    pub name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
}

/// Persists frames to disk and bundles them into archives.
///
/// Both directories are created idempotently at construction, so every
/// later listing or write operation can assume they exist.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    screenshots_dir: PathBuf,
    archives_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        let screenshots_dir = root.join(SCREENSHOTS_DIR);
        let archives_dir = root.join(ARCHIVES_DIR);

        fs::create_dir_all(&screenshots_dir)?;
        fs::create_dir_all(&archives_dir)?;

        Ok(Self {
            screenshots_dir,
            archives_dir,
        })
    }

    pub fn screenshots_dir(&self) -> &Path {
        &self.screenshots_dir
    }

    pub fn archives_dir(&self) -> &Path {
        &self.archives_dir
    }

    /// Write the frame as a JPEG under a fresh timestamped name and return
    /// the generated filename.
    pub fn save_screenshot(&self, frame: &RgbImage) -> Result<String, StoreError> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = unique_path(&self.screenshots_dir, &format!("screenshot_{}", stamp), "jpg");

        frame.save(&path)?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Screenshot saved: {}", filename);
        Ok(filename)
    }

    /// Stored screenshots, newest first.
    pub fn list_screenshots(&self) -> Result<Vec<ArtifactEntry>, StoreError> {
        list_dir(&self.screenshots_dir, "jpg")
    }

    /// Stored archives, newest first.
    pub fn list_archives(&self) -> Result<Vec<ArtifactEntry>, StoreError> {
        list_dir(&self.archives_dir, "zip")
    }

    /// Delete every screenshot, returning the number actually removed.
    pub fn clear_screenshots(&self) -> usize {
        clear_dir(&self.screenshots_dir, "jpg")
    }

    /// Delete every archive, returning the number actually removed.
    pub fn clear_archives(&self) -> usize {
        clear_dir(&self.archives_dir, "zip")
    }
}

/// Render entries for display, one line per artifact, or the placeholder
/// when there are none.
pub fn format_entries(entries: &[ArtifactEntry], empty_placeholder: &str) -> String {
    if entries.is_empty() {
        return empty_placeholder.to_string();
    }

    entries
        .iter()
        .map(|entry| {
            format!(
                "{} ({}) - {}",
                entry.name,
                format_size(entry.size_bytes),
                entry.modified.format("%Y-%m-%d %H:%M:%S")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Pick a path under `dir` that does not exist yet, suffixing a counter on
/// a same-second name collision.
pub(crate) fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut path = dir.join(format!("{}.{}", stem, ext));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.{}", stem, n, ext));
        n += 1;
    }
    path
}

pub(crate) fn matching_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(ext) {
            files.push(path);
        }
    }
    Ok(files)
}

fn list_dir(dir: &Path, ext: &str) -> Result<Vec<ArtifactEntry>, StoreError> {
    let mut entries = Vec::new();
    for path in matching_files(dir, ext)? {
        let meta = fs::metadata(&path)?;
        let modified = DateTime::<Local>::from(meta.modified()?);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        entries.push(ArtifactEntry {
            name,
            size_bytes: meta.len(),
            modified,
        });
    }

    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then(b.name.cmp(&a.name)));
    Ok(entries)
}

fn clear_dir(dir: &Path, ext: &str) -> usize {
    let files = match matching_files(dir, ext) {
        Ok(files) => files,
        Err(e) => {
            warn!("Failed to list {:?} for clearing: {}", dir, e);
            return 0;
        }
    };

    let mut deleted = 0;
    for path in files {
        match fs::remove_file(&path) {
            Ok(()) => deleted += 1,
            Err(e) => warn!("Failed to delete {:?}: {}", path, e),
        }
    }

    info!("Cleared {} file(s) from {:?}", deleted, dir);
    deleted
}
