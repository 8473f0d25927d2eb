//! Shared test utilities for the tipitaka-viewer test suite.
//!
//! Provides the catalog fixture, a filesystem archive builder, and fake
//! implementations of the engine's injected capabilities (existence probe,
//! image source, catalog fetch), so resolution, prefetch, and controller
//! behavior can be exercised deterministically without a network.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use crate::cache::LoadedImage;
use crate::catalog::{Catalog, CatalogError, CatalogFetch, EditionEntry, VolumeEntry};
use crate::ident::Edition;
use crate::prefetch::{ImageLoadError, ImageSource};
use crate::resolve::PageProbe;

/// A valid 1x1 RGBA PNG, byte for byte.
pub const MINIMAL_PNG: [u8; 67] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15,
    0xC4, 0x89, //
    0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, // IDAT
    0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, //
    0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82, // IEND
];

// =========================================================================
// Fixtures
// =========================================================================

fn volume_entry(title: Option<&str>, desc: Option<&str>, pages: u32) -> VolumeEntry {
    VolumeEntry {
        title: title.map(String::from),
        desc: desc.map(String::from),
        pages,
    }
}

/// The standing two-edition catalog used across the suite.
///
/// - `ch`: volumes 1 (150 pages), 2 (200 pages), 3 (0 pages — empty volume)
/// - `mc`: volumes 1 (100 pages), 45 (300 pages)
pub fn catalog_fixture() -> Catalog {
    let mut catalog = Catalog::default();

    let mut ch = EditionEntry {
        title: "Chulachomklao of Siam Edition".to_string(),
        volumes: Default::default(),
    };
    ch.volumes.insert(
        "1".to_string(),
        volume_entry(Some("Vinayapiṭaka I"), Some("Mahāvibhaṅga"), 150),
    );
    ch.volumes
        .insert("2".to_string(), volume_entry(Some("Vinayapiṭaka II"), None, 200));
    ch.volumes.insert("3".to_string(), volume_entry(None, None, 0));
    catalog.editions.insert("ch".to_string(), ch);

    let mut mc = EditionEntry {
        title: "Mahāchulā Edition".to_string(),
        volumes: Default::default(),
    };
    mc.volumes
        .insert("1".to_string(), volume_entry(Some("Vinayapiṭaka I"), None, 100));
    mc.volumes.insert("45".to_string(), volume_entry(None, None, 300));
    catalog.editions.insert("mc".to_string(), mc);

    catalog
}

/// Build a local archive tree: `<tmp>/tipitaka/<edition>/<volume>/<n>.png`
/// for `1..=pages` of each listed volume.
pub fn temp_archive(volumes: &[(Edition, u32, u32)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_archive_tree(tmp.path(), volumes);
    tmp
}

/// Same, into an existing directory.
pub fn write_archive_tree(root: &Path, volumes: &[(Edition, u32, u32)]) {
    for &(edition, volume, pages) in volumes {
        let dir = root
            .join("tipitaka")
            .join(edition.as_str())
            .join(volume.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        for page in 1..=pages {
            std::fs::write(dir.join(format!("{page}.png")), MINIMAL_PNG).unwrap();
        }
    }
}

// =========================================================================
// Fake capabilities
// =========================================================================

/// Existence oracle over a fixed set of volumes, counting every probe.
#[derive(Debug, Default)]
pub struct CountingProbe {
    pages: HashMap<(Edition, u32), u32>,
    calls: AtomicUsize,
    min_probed: Mutex<Option<u32>>,
}

impl CountingProbe {
    /// An archive with no pages at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// An archive where one volume has pages `1..=max_page`.
    pub fn with_volume(edition: Edition, volume: u32, max_page: u32) -> Self {
        let mut pages = HashMap::new();
        pages.insert((edition, volume), max_page);
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Number of existence checks performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Smallest page number ever probed, if any.
    pub fn min_probed(&self) -> Option<u32> {
        *self.min_probed.lock().unwrap()
    }
}

impl PageProbe for CountingProbe {
    fn page_exists(&self, edition: Edition, volume: u32, page: u32) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut min = self.min_probed.lock().unwrap();
        *min = Some(min.map_or(page, |m| m.min(page)));
        self.pages
            .get(&(edition, volume))
            .is_some_and(|&max| page >= 1 && page <= max)
    }
}

/// Image loader that fabricates a 1x1 PNG for any path, with optional
/// designated failures, counting every load.
#[derive(Debug, Default)]
pub struct FakeSource {
    failing: HashSet<String>,
    loads: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// Shared counter of successful-or-not load attempts.
    pub fn load_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl ImageSource for FakeSource {
    fn load_image(&self, path: &str) -> Result<LoadedImage, ImageLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(path) {
            return Err(ImageLoadError::Fetch(format!("fake 404 for {path}")));
        }
        Ok(LoadedImage {
            path: path.to_string(),
            width: 1,
            height: 1,
            bytes: MINIMAL_PNG.to_vec(),
        })
    }
}

/// Catalog source returning a fixed document.
pub struct FixedFetch(pub Catalog);

impl CatalogFetch for FixedFetch {
    fn fetch_catalog(&self) -> Result<Catalog, CatalogError> {
        Ok(self.0.clone())
    }
}

/// Catalog source that always fails, like a dead network.
pub struct FailingFetch;

impl CatalogFetch for FailingFetch {
    fn fetch_catalog(&self) -> Result<Catalog, CatalogError> {
        Err(CatalogError::Fetch("simulated fetch failure".to_string()))
    }
}

/// Complete archive backend for controller tests: catalog (or none), a
/// counting probe, and a fabricating image source.
#[derive(Default)]
pub struct FakeBackend {
    pub catalog: Option<Catalog>,
    pub probe: CountingProbe,
    pub source: FakeSource,
}

impl FakeBackend {
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: Some(catalog),
            ..Self::default()
        }
    }

    pub fn without_catalog() -> Self {
        Self::default()
    }

    /// Give the probe an archive with pages `1..=max_page` in one volume.
    pub fn probing(mut self, edition: Edition, volume: u32, max_page: u32) -> Self {
        self.probe = CountingProbe::with_volume(edition, volume, max_page);
        self
    }
}

impl PageProbe for FakeBackend {
    fn page_exists(&self, edition: Edition, volume: u32, page: u32) -> bool {
        self.probe.page_exists(edition, volume, page)
    }
}

impl ImageSource for FakeBackend {
    fn load_image(&self, path: &str) -> Result<LoadedImage, ImageLoadError> {
        self.source.load_image(path)
    }
}

impl CatalogFetch for FakeBackend {
    fn fetch_catalog(&self) -> Result<Catalog, CatalogError> {
        match &self.catalog {
            Some(catalog) => Ok(catalog.clone()),
            None => Err(CatalogError::Fetch("simulated fetch failure".to_string())),
        }
    }
}
