//! Archive backends: where page images and the catalog actually come from.
//!
//! The engine only ever talks to three capabilities — a page-existence
//! oracle ([`PageProbe`]), an image loader ([`ImageSource`]), and a catalog
//! fetch ([`CatalogFetch`]). This module provides the two real backends:
//!
//! - [`HttpArchive`] — the published archive over HTTP. Existence checks are
//!   `HEAD` requests with a short per-request timeout (a probe that can't
//!   answer in time reports the page as missing); image loads are `GET`
//!   plus a decode, so a 200 with a broken body still counts as a failed
//!   load, the way a browser's `onerror` would fire.
//! - [`DirArchive`] — a local archive directory laid out exactly like the
//!   served site (`<root>/tipitaka/<edition>/<volume>/<page>.png`). Used
//!   for offline reading, for `scan`, and throughout the test suite.
//!
//! Both speak the site-absolute path convention from [`crate::spread`], so
//! a page descriptor's `path` means the same thing against either backend.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::cache::LoadedImage;
use crate::catalog::{Catalog, CatalogError, CatalogFetch};
use crate::config::ViewerConfig;
use crate::ident::Edition;
use crate::prefetch::{ImageLoadError, ImageSource};
use crate::resolve::PageProbe;
use crate::spread::page_image_path;

/// Transfer timeout for image and catalog requests. Probes use the much
/// shorter per-request timeout from the config.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("no archive base URL configured (set base_url or use --local-root)")]
    NoBaseUrl,
    #[error("invalid base URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("archive root not found: {0}")]
    MissingRoot(PathBuf),
}

/// The full capability bundle a viewer needs from an archive.
pub trait ArchiveBackend: PageProbe + ImageSource + CatalogFetch + Send + Sync {}

impl<T: PageProbe + ImageSource + CatalogFetch + Send + Sync> ArchiveBackend for T {}

/// Decode fetched bytes, producing a loaded image only if they really are one.
fn decode_image(path: &str, bytes: Vec<u8>) -> Result<LoadedImage, ImageLoadError> {
    let decoded = image::load_from_memory(&bytes)?;
    Ok(LoadedImage {
        path: path.to_string(),
        width: decoded.width(),
        height: decoded.height(),
        bytes,
    })
}

/// The published archive, over HTTP.
pub struct HttpArchive {
    client: reqwest::blocking::Client,
    base: Url,
    archive_root: String,
    metadata_path: String,
    probe_timeout: Duration,
}

impl HttpArchive {
    pub fn new(
        base_url: &str,
        archive_root: &str,
        metadata_path: &str,
        probe_timeout: Duration,
    ) -> Result<Self, ArchiveError> {
        if base_url.is_empty() {
            return Err(ArchiveError::NoBaseUrl);
        }
        let base = Url::parse(base_url)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base,
            archive_root: archive_root.to_string(),
            metadata_path: metadata_path.to_string(),
            probe_timeout,
        })
    }

    pub fn from_config(config: &ViewerConfig) -> Result<Self, ArchiveError> {
        Self::new(
            &config.base_url,
            &config.archive_root,
            &config.metadata_path,
            config.probe_timeout(),
        )
    }

    fn absolute(&self, path: &str) -> Result<Url, url::ParseError> {
        // Site-absolute paths resolve against the configured origin.
        self.base.join(path)
    }
}

impl PageProbe for HttpArchive {
    fn page_exists(&self, edition: Edition, volume: u32, page: u32) -> bool {
        let path = page_image_path(&self.archive_root, edition, volume, page);
        let Ok(url) = self.absolute(&path) else {
            return false;
        };
        match self.client.head(url).timeout(self.probe_timeout).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                // Timeouts and transport errors all count as "missing".
                log::debug!("existence probe failed for {path}: {e}");
                false
            }
        }
    }
}

impl ImageSource for HttpArchive {
    fn load_image(&self, path: &str) -> Result<LoadedImage, ImageLoadError> {
        let url = self
            .absolute(path)
            .map_err(|e| ImageLoadError::Fetch(e.to_string()))?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ImageLoadError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ImageLoadError::Fetch(format!(
                "GET {path} returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|e| ImageLoadError::Fetch(e.to_string()))?;
        decode_image(path, bytes.to_vec())
    }
}

impl CatalogFetch for HttpArchive {
    fn fetch_catalog(&self) -> Result<Catalog, CatalogError> {
        let url = self
            .absolute(&self.metadata_path)
            .map_err(|e| CatalogError::Fetch(e.to_string()))?;
        log::debug!("fetching catalog from {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| CatalogError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CatalogError::Fetch(format!(
                "GET {} returned {}",
                self.metadata_path,
                response.status()
            )));
        }
        response
            .json()
            .map_err(|e| CatalogError::Fetch(e.to_string()))
    }
}

/// A local archive directory laid out like the served site.
pub struct DirArchive {
    root: PathBuf,
    archive_root: String,
    metadata_path: String,
}

impl DirArchive {
    pub fn new(
        root: &Path,
        archive_root: &str,
        metadata_path: &str,
    ) -> Result<Self, ArchiveError> {
        if !root.is_dir() {
            return Err(ArchiveError::MissingRoot(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            archive_root: archive_root.to_string(),
            metadata_path: metadata_path.to_string(),
        })
    }

    pub fn from_config(root: &Path, config: &ViewerConfig) -> Result<Self, ArchiveError> {
        Self::new(root, &config.archive_root, &config.metadata_path)
    }

    /// Map a site-absolute path onto the local tree.
    fn local(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl PageProbe for DirArchive {
    fn page_exists(&self, edition: Edition, volume: u32, page: u32) -> bool {
        let path = page_image_path(&self.archive_root, edition, volume, page);
        self.local(&path).is_file()
    }
}

impl ImageSource for DirArchive {
    fn load_image(&self, path: &str) -> Result<LoadedImage, ImageLoadError> {
        let bytes = fs::read(self.local(path))?;
        decode_image(path, bytes)
    }
}

impl CatalogFetch for DirArchive {
    fn fetch_catalog(&self) -> Result<Catalog, CatalogError> {
        let content = fs::read_to_string(self.local(&self.metadata_path))?;
        Ok(serde_json::from_str(&content)?)
    }
}
