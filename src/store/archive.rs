//! Zip bundling of stored artifacts.
//!
//! Archives copy file bytes at creation time, so later deletions never
//! invalidate an existing archive.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{matching_files, unique_path, ArtifactStore, StoreError};

/// Result of an archive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Created { path: PathBuf, count: usize },
    /// The source directory had nothing to bundle; no file was created.
    Empty,
}

impl ArtifactStore {
    /// Bundle every current screenshot into one new zip in the archive
    /// directory.
    pub fn archive_screenshots(&self) -> Result<ArchiveOutcome, StoreError> {
        let files = matching_files(self.screenshots_dir(), "jpg")?;
        if files.is_empty() {
            return Ok(ArchiveOutcome::Empty);
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = unique_path(self.archives_dir(), &format!("screenshots_{}", stamp), "zip");
        write_zip(&path, &files)?;

        info!("Archived {} screenshot(s) into {:?}", files.len(), path);
        Ok(ArchiveOutcome::Created {
            path,
            count: files.len(),
        })
    }

    /// Bundle every existing archive into one outer zip in the system temp
    /// directory.
    pub fn archive_all_archives(&self) -> Result<ArchiveOutcome, StoreError> {
        let files = matching_files(self.archives_dir(), "zip")?;
        if files.is_empty() {
            return Ok(ArchiveOutcome::Empty);
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = unique_path(
            &std::env::temp_dir(),
            &format!("all_archives_{}", stamp),
            "zip",
        );
        write_zip(&path, &files)?;

        info!("Bundled {} archive(s) into {:?}", files.len(), path);
        Ok(ArchiveOutcome::Created {
            path,
            count: files.len(),
        })
    }
}

fn write_zip(path: &Path, files: &[PathBuf]) -> Result<(), StoreError> {
    if let Err(e) = copy_into_zip(path, files) {
        // Don't leave a truncated archive behind.
        if let Err(cleanup) = fs::remove_file(path) {
            warn!("Failed to remove partial archive {:?}: {}", path, cleanup);
        }
        return Err(e);
    }
    Ok(())
}

fn copy_into_zip(path: &Path, files: &[PathBuf]) -> Result<(), StoreError> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for source in files {
        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let bytes = fs::read(source)?;
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn store_with_screenshots(count: u8) -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        for value in 0..count {
            let frame = RgbImage::from_pixel(4, 4, Rgb([value * 50, 0, 0]));
            store.save_screenshot(&frame).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn empty_directory_produces_no_archive() {
        let (_dir, store) = store_with_screenshots(0);

        assert_eq!(store.archive_screenshots().unwrap(), ArchiveOutcome::Empty);
        assert!(store.list_archives().unwrap().is_empty());

        assert_eq!(store.archive_all_archives().unwrap(), ArchiveOutcome::Empty);
    }

    #[test]
    fn archive_contains_every_screenshot() {
        let (_dir, store) = store_with_screenshots(3);

        let outcome = store.archive_screenshots().unwrap();
        let ArchiveOutcome::Created { path, count } = outcome else {
            panic!("expected an archive to be created");
        };
        assert_eq!(count, 3);

        let archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn archive_survives_screenshot_deletion() {
        let (_dir, store) = store_with_screenshots(2);

        let ArchiveOutcome::Created { path, .. } = store.archive_screenshots().unwrap() else {
            panic!("expected an archive to be created");
        };
        store.clear_screenshots();

        // Bytes were copied, not referenced.
        let archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn bundle_collects_every_archive() {
        let (_dir, store) = store_with_screenshots(1);

        store.archive_screenshots().unwrap();
        store.save_screenshot(&RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]))).unwrap();
        store.archive_screenshots().unwrap();

        let outcome = store.archive_all_archives().unwrap();
        let ArchiveOutcome::Created { path, count } = outcome else {
            panic!("expected a bundle to be created");
        };
        assert_eq!(count, 2);

        let bundle = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(bundle.len(), 2);

        let _ = fs::remove_file(path);
    }
}
