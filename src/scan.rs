//! Local archive scanning and catalog generation.
//!
//! The published catalog has to come from somewhere: this module walks a
//! local archive tree and derives the per-volume page counts the viewer
//! consumes, producing a [`Catalog`] ready to serialize as
//! `book-viewer.json`.
//!
//! ## Expected layout
//!
//! ```text
//! <root>/
//! └── tipitaka/                # archive_root from the config
//!     ├── ch/
//!     │   ├── 1/               # numeric volume directories
//!     │   │   ├── 1.png        # numeric page images, 1-based
//!     │   │   ├── 2.png
//!     │   │   └── ...
//!     │   └── 2/
//!     └── mc/
//!         └── ...
//! ```
//!
//! A volume's page count is the **highest** numeric page stem found, not the
//! file count — gaps in the scans are display problems, not count problems.
//! Files with non-numeric stems or foreign extensions are ignored. Volumes
//! with no pages at all are skipped (and logged), as are editions without a
//! directory.
//!
//! Scanning knows nothing about titles. To refresh counts without losing
//! curated titles and descriptions, merge the scan into the previously
//! published catalog with [`merge_into`].

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::catalog::{Catalog, EditionEntry, VolumeEntry};
use crate::ident::Edition;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("archive directory not found: {0}")]
    MissingRoot(PathBuf),
}

/// Scan a local archive tree into a catalog of page counts.
pub fn scan_archive(root: &Path, archive_root: &str) -> Result<Catalog, ScanError> {
    let archive_dir = root.join(archive_root);
    if !archive_dir.is_dir() {
        return Err(ScanError::MissingRoot(archive_dir));
    }

    let mut catalog = Catalog::default();
    for edition in Edition::ALL {
        let edition_dir = archive_dir.join(edition.as_str());
        if !edition_dir.is_dir() {
            log::debug!("no directory for {} edition, skipping", edition.label());
            continue;
        }

        let mut entry = EditionEntry {
            title: edition.label(),
            volumes: Default::default(),
        };
        for volume in volume_dirs(&edition_dir)? {
            let pages = highest_page(&edition_dir.join(volume.to_string()))?;
            if pages == 0 {
                log::warn!("volume {volume} of {} has no pages", edition.label());
                continue;
            }
            entry.volumes.insert(
                volume.to_string(),
                VolumeEntry {
                    title: None,
                    desc: None,
                    pages,
                },
            );
        }
        catalog.editions.insert(edition.as_str().to_string(), entry);
    }
    Ok(catalog)
}

/// Numeric volume directories under an edition, ascending.
fn volume_dirs(edition_dir: &Path) -> Result<Vec<u32>, ScanError> {
    let mut volumes = Vec::new();
    for entry in std::fs::read_dir(edition_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(volume) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
            volumes.push(volume);
        }
    }
    volumes.sort_unstable();
    Ok(volumes)
}

/// Highest numeric page stem among the image files of a volume directory.
fn highest_page(volume_dir: &Path) -> Result<u32, ScanError> {
    let mut highest = 0;
    for entry in WalkDir::new(volume_dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        if !is_image {
            continue;
        }
        if let Some(page) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u32>().ok())
        {
            highest = highest.max(page);
        }
    }
    Ok(highest)
}

/// Merge freshly scanned page counts into a previously published catalog.
///
/// Page counts come from the scan; curated titles and descriptions — of
/// editions and of volumes — survive from the existing catalog, as do
/// volumes the scan didn't see.
pub fn merge_into(existing: Catalog, scanned: Catalog) -> Catalog {
    let mut merged = existing;
    for (edition_id, scanned_edition) in scanned.editions {
        let entry = merged
            .editions
            .entry(edition_id)
            .or_insert_with(|| EditionEntry {
                title: scanned_edition.title.clone(),
                volumes: Default::default(),
            });
        for (volume_id, scanned_volume) in scanned_edition.volumes {
            entry
                .volumes
                .entry(volume_id)
                .and_modify(|existing| existing.pages = scanned_volume.pages)
                .or_insert(scanned_volume);
        }
    }
    merged
}
