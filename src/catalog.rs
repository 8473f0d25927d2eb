//! Metadata catalog: per-edition, per-volume page counts and titles.
//!
//! The archive publishes a single JSON document describing every edition and
//! volume it holds. This module owns that document's schema, a time-boxed disk
//! cache of it, and the session-level store that answers "how many pages does
//! this volume have?" for the rest of the viewer.
//!
//! ## Wire shape
//!
//! ```text
//! {
//!   "editions": {
//!     "ch": {
//!       "title": "...",
//!       "volumes": {
//!         "1": { "title": "...", "desc": "...", "pages": 520 },
//!         "2": { "pages": 610 }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Volume keys are canonical (non-zero-padded) numeric strings.
//!
//! ## Cache discipline
//!
//! A fetched catalog is persisted next to a fetch timestamp and reused for up
//! to 24 hours, provided it passes a sanity check (the first `ch` volume
//! carries a title and a non-zero page count — a probe for the truncated
//! documents a bad deploy once produced). A stale or implausible cached copy
//! is discarded and re-fetched.
//!
//! ## Failure mode
//!
//! Everything here fails soft. A fetch failure leaves the store empty and is
//! logged; callers degrade to probing (see [`crate::resolve`]) for page
//! counts and to the numeric fallback range for volume validation.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ident::{Edition, FALLBACK_MAX_VOLUME};
use crate::resolve::{self, PageProbe, ProbeTuning};

/// On-disk filename for the cached catalog, within the viewer cache dir.
const CACHE_FILENAME: &str = "catalog-cache.json";

/// Version of the cache file format. Bump to invalidate existing caches.
const CACHE_VERSION: u32 = 1;

/// Freshness window for a cached catalog, in seconds (24 hours).
const CACHE_MAX_AGE_SECS: u64 = 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog fetch failed: {0}")]
    Fetch(String),
}

/// Source of the remote catalog document.
///
/// Injected so the store can be exercised without a network; the production
/// implementations live in [`crate::archive`].
pub trait CatalogFetch {
    fn fetch_catalog(&self) -> Result<Catalog, CatalogError>;
}

/// The full catalog: edition id → edition entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalog {
    pub editions: BTreeMap<String, EditionEntry>,
}

/// One edition's metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditionEntry {
    pub title: String,
    pub volumes: BTreeMap<String, VolumeEntry>,
}

/// One volume's metadata. Title and description are optional; page count is
/// the field the viewer actually depends on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub pages: u32,
}

impl Catalog {
    pub fn edition(&self, edition: Edition) -> Option<&EditionEntry> {
        self.editions.get(edition.as_str())
    }

    pub fn volume(&self, edition: Edition, volume: u32) -> Option<&VolumeEntry> {
        self.edition(edition)?.volumes.get(&volume.to_string())
    }

    /// Page count for a volume, if the catalog knows it.
    pub fn page_count(&self, edition: Edition, volume: u32) -> Option<u32> {
        self.volume(edition, volume).map(|v| v.pages)
    }

    /// Volume numbers of an edition, in ascending numeric order.
    ///
    /// Keys that are not canonical numeric strings are skipped.
    pub fn volume_ids(&self, edition: Edition) -> Vec<u32> {
        let Some(entry) = self.edition(edition) else {
            return Vec::new();
        };
        let mut ids: Vec<u32> = entry
            .volumes
            .keys()
            .filter_map(|k| k.parse().ok())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Sanity probe for cached copies: the first `ch` volume must carry a
    /// title and a non-zero page count. A catalog that fails this is treated
    /// as corrupt and re-fetched.
    pub fn passes_sanity_check(&self) -> bool {
        self.editions
            .get(Edition::Ch.as_str())
            .and_then(|e| e.volumes.get("1"))
            .is_some_and(|v| v.title.is_some() && v.pages > 0)
    }
}

/// Disk cache wrapper: the catalog plus the moment it was fetched.
#[derive(Debug, Serialize, Deserialize)]
struct CachedCatalog {
    version: u32,
    fetched_at: u64,
    catalog: Catalog,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Load a fresh-enough, plausible cached catalog. Returns `None` for a
/// missing, unreadable, stale, version-mismatched, or implausible cache.
fn load_cached(cache_dir: &Path) -> Option<Catalog> {
    let content = fs::read_to_string(cache_dir.join(CACHE_FILENAME)).ok()?;
    let cached: CachedCatalog = serde_json::from_str(&content).ok()?;
    if cached.version != CACHE_VERSION {
        return None;
    }
    let age = unix_now().saturating_sub(cached.fetched_at);
    if age >= CACHE_MAX_AGE_SECS {
        return None;
    }
    if !cached.catalog.passes_sanity_check() {
        log::warn!("cached catalog failed sanity check, discarding");
        return None;
    }
    Some(cached.catalog)
}

/// Persist a freshly fetched catalog with the current timestamp.
fn store_cached(cache_dir: &Path, catalog: &Catalog) -> Result<(), CatalogError> {
    fs::create_dir_all(cache_dir)?;
    let cached = CachedCatalog {
        version: CACHE_VERSION,
        fetched_at: unix_now(),
        catalog: catalog.clone(),
    };
    let json = serde_json::to_string(&cached)?;
    fs::write(cache_dir.join(CACHE_FILENAME), json)?;
    Ok(())
}

/// Session-scoped catalog store.
///
/// Holds the catalog (if any) for the lifetime of the process and memoizes
/// resolved page counts per `(edition, volume)`, so probing — when it happens
/// at all — happens at most once per volume per session.
#[derive(Debug, Default)]
pub struct CatalogStore {
    catalog: Option<Catalog>,
    page_counts: HashMap<(Edition, u32), u32>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store around an already-loaded catalog (tests, `scan` output).
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: Some(catalog),
            page_counts: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    /// Ensure the catalog is loaded: cached copy first, then a fetch.
    ///
    /// Idempotent — once a catalog is held it is kept for the session. On
    /// fetch failure the store stays empty and the failure is logged; the
    /// viewer keeps working through the probing fallback.
    pub fn load(&mut self, cache_dir: &Path, fetch: &dyn CatalogFetch) -> Option<&Catalog> {
        if self.catalog.is_none() {
            if let Some(cached) = load_cached(cache_dir) {
                log::debug!("using cached catalog");
                self.catalog = Some(cached);
            } else {
                match fetch.fetch_catalog() {
                    Ok(catalog) => {
                        if let Err(e) = store_cached(cache_dir, &catalog) {
                            log::warn!("failed to persist catalog cache: {e}");
                        }
                        self.catalog = Some(catalog);
                    }
                    Err(e) => {
                        log::warn!("catalog fetch failed, degrading to probing: {e}");
                    }
                }
            }
        }
        self.catalog.as_ref()
    }

    /// Total pages for a volume: session memo → catalog → probing fallback.
    ///
    /// The resolved value — including a probed one, and including 0 for an
    /// empty volume — is memoized for the rest of the session.
    pub fn page_count(
        &mut self,
        edition: Edition,
        volume: u32,
        probe: &dyn PageProbe,
        tuning: &ProbeTuning,
    ) -> u32 {
        if let Some(&count) = self.page_counts.get(&(edition, volume)) {
            return count;
        }
        let count =
            resolve::resolve_total_pages(self.catalog.as_ref(), probe, edition, volume, tuning);
        self.page_counts.insert((edition, volume), count);
        count
    }

    /// Volume numbers available for an edition.
    ///
    /// Catalog-driven when possible; otherwise the numeric fallback range, so
    /// the selector is never empty just because the network was down.
    pub fn volume_ids(&self, edition: Edition) -> Vec<u32> {
        match &self.catalog {
            Some(catalog) if catalog.edition(edition).is_some() => catalog.volume_ids(edition),
            _ => (1..=FALLBACK_MAX_VOLUME).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{catalog_fixture, CountingProbe, FailingFetch, FixedFetch};
    use tempfile::TempDir;

    // =========================================================================
    // Schema
    // =========================================================================

    #[test]
    fn parses_wire_shape() {
        let json = r#"{
            "editions": {
                "ch": {
                    "title": "Chulachomklao",
                    "volumes": {
                        "1": { "title": "Vinaya I", "desc": "Pārājika", "pages": 520 },
                        "2": { "pages": 610 }
                    }
                }
            }
        }"#;
        let cat: Catalog = serde_json::from_str(json).unwrap();
        assert_eq!(cat.page_count(Edition::Ch, 1), Some(520));
        assert_eq!(cat.page_count(Edition::Ch, 2), Some(610));
        assert_eq!(cat.volume(Edition::Ch, 2).unwrap().title, None);
        assert_eq!(cat.page_count(Edition::Mc, 1), None);
    }

    #[test]
    fn volume_ids_sort_numerically_not_lexically() {
        let mut cat = Catalog::default();
        let mut entry = EditionEntry::default();
        for id in ["10", "2", "1", "21"] {
            entry.volumes.insert(id.into(), VolumeEntry::default());
        }
        cat.editions.insert("ch".into(), entry);
        assert_eq!(cat.volume_ids(Edition::Ch), vec![1, 2, 10, 21]);
    }

    #[test]
    fn sanity_check_requires_first_ch_volume_title_and_pages() {
        let cat = catalog_fixture();
        assert!(cat.passes_sanity_check());

        let mut no_title = cat.clone();
        no_title
            .editions
            .get_mut("ch")
            .unwrap()
            .volumes
            .get_mut("1")
            .unwrap()
            .title = None;
        assert!(!no_title.passes_sanity_check());

        let mut no_pages = cat.clone();
        no_pages
            .editions
            .get_mut("ch")
            .unwrap()
            .volumes
            .get_mut("1")
            .unwrap()
            .pages = 0;
        assert!(!no_pages.passes_sanity_check());

        assert!(!Catalog::default().passes_sanity_check());
    }

    // =========================================================================
    // Disk cache
    // =========================================================================

    #[test]
    fn store_then_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let cat = catalog_fixture();
        store_cached(tmp.path(), &cat).unwrap();
        assert_eq!(load_cached(tmp.path()), Some(cat));
    }

    #[test]
    fn missing_cache_is_none() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load_cached(tmp.path()), None);
    }

    #[test]
    fn corrupt_cache_is_none() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CACHE_FILENAME), "not json").unwrap();
        assert_eq!(load_cached(tmp.path()), None);
    }

    #[test]
    fn stale_cache_is_none() {
        let tmp = TempDir::new().unwrap();
        let cached = CachedCatalog {
            version: CACHE_VERSION,
            fetched_at: unix_now() - CACHE_MAX_AGE_SECS - 1,
            catalog: catalog_fixture(),
        };
        let json = serde_json::to_string(&cached).unwrap();
        fs::write(tmp.path().join(CACHE_FILENAME), json).unwrap();
        assert_eq!(load_cached(tmp.path()), None);
    }

    #[test]
    fn wrong_version_cache_is_none() {
        let tmp = TempDir::new().unwrap();
        let cached = CachedCatalog {
            version: CACHE_VERSION + 1,
            fetched_at: unix_now(),
            catalog: catalog_fixture(),
        };
        let json = serde_json::to_string(&cached).unwrap();
        fs::write(tmp.path().join(CACHE_FILENAME), json).unwrap();
        assert_eq!(load_cached(tmp.path()), None);
    }

    #[test]
    fn implausible_cache_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let mut cat = catalog_fixture();
        cat.editions.remove("ch");
        store_cached(tmp.path(), &cat).unwrap();
        assert_eq!(load_cached(tmp.path()), None);
    }

    // =========================================================================
    // CatalogStore
    // =========================================================================

    #[test]
    fn load_prefers_cache_over_fetch() {
        let tmp = TempDir::new().unwrap();
        store_cached(tmp.path(), &catalog_fixture()).unwrap();

        let mut store = CatalogStore::new();
        // The fetch would fail; the cached copy must be used instead.
        assert!(store.load(tmp.path(), &FailingFetch).is_some());
    }

    #[test]
    fn load_fetches_and_persists_when_no_cache() {
        let tmp = TempDir::new().unwrap();
        let mut store = CatalogStore::new();
        let fetch = FixedFetch(catalog_fixture());
        assert!(store.load(tmp.path(), &fetch).is_some());
        // A second store starting cold finds the persisted copy.
        let mut second = CatalogStore::new();
        assert!(second.load(tmp.path(), &FailingFetch).is_some());
    }

    #[test]
    fn load_failure_leaves_store_empty() {
        let tmp = TempDir::new().unwrap();
        let mut store = CatalogStore::new();
        assert!(store.load(tmp.path(), &FailingFetch).is_none());
        assert!(store.catalog().is_none());
    }

    #[test]
    fn page_count_from_catalog_never_probes() {
        let mut store = CatalogStore::with_catalog(catalog_fixture());
        let probe = CountingProbe::empty();
        let n = store.page_count(Edition::Ch, 1, &probe, &ProbeTuning::default());
        assert_eq!(n, 150);
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn page_count_memoizes_probed_result() {
        let mut store = CatalogStore::new();
        let probe = CountingProbe::with_volume(Edition::Ch, 9, 87);
        let tuning = ProbeTuning::default();

        let first = store.page_count(Edition::Ch, 9, &probe, &tuning);
        assert_eq!(first, 87);
        let calls_after_first = probe.calls();
        assert!(calls_after_first > 0);

        let second = store.page_count(Edition::Ch, 9, &probe, &tuning);
        assert_eq!(second, 87);
        assert_eq!(probe.calls(), calls_after_first, "second lookup must not re-probe");
    }

    #[test]
    fn volume_ids_fall_back_to_numeric_range() {
        let store = CatalogStore::new();
        let ids = store.volume_ids(Edition::Ch);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&FALLBACK_MAX_VOLUME));
    }

    #[test]
    fn volume_ids_use_catalog_when_present() {
        let store = CatalogStore::with_catalog(catalog_fixture());
        assert_eq!(store.volume_ids(Edition::Ch), vec![1, 2, 3]);
    }
}
