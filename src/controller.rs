//! Viewer controller: the state machine that ties the engine together.
//!
//! The controller owns all viewer state as one value — catalog store, loaded
//! page list, current index, address-bar location — and exposes the
//! transitions: URL-driven initialization, volume selection, and navigation.
//! Rendering stays outside; every operation returns the derived [`Spread`]
//! and any user-facing [`Notice`]s, and the shell decides how to present
//! them.
//!
//! ## Phases
//!
//! ```text
//! Uninitialized → AwaitingEdition → AwaitingVolume → Loading → Ready
//!                       │                               │        │
//!                       ▼                               ▼        ▼
//!                 EditionMissing                  EmptyVolume  Loading (navigation)
//! ```
//!
//! `EditionMissing` is terminal: without a recognized edition there is
//! nothing to show, and the shell renders the instructional screen instead.
//! `EmptyVolume` leaves the viewer usable for picking another volume.
//!
//! ## URL discipline
//!
//! Navigation writes the address bar through [`crate::urlstate`], in the
//! parameter form the inbound URL already used. While an inbound URL is
//! being applied, writes are suppressed (`loading_from_url`), so the
//! just-parsed address is never clobbered by the state it itself produced.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::archive::ArchiveBackend;
use crate::cache::ImageCache;
use crate::catalog::{Catalog, CatalogFetch, CatalogStore, VolumeEntry};
use crate::config::ViewerConfig;
use crate::ident::{self, Edition};
use crate::prefetch::{ImageSource, Prefetcher};
use crate::resolve::{PageProbe, ProbeTuning};
use crate::session::{self, SessionState};
use crate::spread::{resolve_spread, PageList, Spread};
use crate::urlstate::{self, Location, ParamForm};

/// Where the viewer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    AwaitingEdition,
    AwaitingVolume,
    Loading,
    Ready,
    /// Terminal: no recognized edition was supplied.
    EditionMissing,
    /// The selected volume resolved to zero pages.
    EmptyVolume,
}

/// User-facing conditions the shell should surface. Everything else the
/// engine encounters degrades silently (and is logged).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    EditionRequired,
    UnknownVolume { raw: String, edition: Edition },
    EmptyVolume { volume: u32 },
}

/// Keyboard bindings. Bound once by the shell; inert until a volume loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowRight,
    ArrowLeft,
    Space,
    Home,
    End,
}

impl Key {
    pub fn from_name(name: &str) -> Option<Key> {
        match name {
            "right" => Some(Key::ArrowRight),
            "left" => Some(Key::ArrowLeft),
            "space" => Some(Key::Space),
            "home" => Some(Key::Home),
            "end" => Some(Key::End),
            _ => None,
        }
    }
}

/// The viewer: one instance per reading session.
pub struct Viewer {
    archive_root: String,
    cache_dir: PathBuf,
    tuning: ProbeTuning,
    store: CatalogStore,
    probe: Arc<dyn PageProbe>,
    fetch: Arc<dyn CatalogFetch>,
    prefetcher: Prefetcher,
    phase: Phase,
    edition: Option<Edition>,
    volume: Option<u32>,
    pages: Option<PageList>,
    current_index: usize,
    loading_from_url: bool,
    preferred_form: ParamForm,
    location: Location,
}

impl Viewer {
    pub fn new<A>(config: &ViewerConfig, backend: Arc<A>) -> Self
    where
        A: ArchiveBackend + 'static,
    {
        let source: Arc<dyn ImageSource> = backend.clone();
        let probe: Arc<dyn PageProbe> = backend.clone();
        let fetch: Arc<dyn CatalogFetch> = backend;
        let cache = Arc::new(Mutex::new(ImageCache::new(config.images.max_cache_size)));
        let prefetcher = Prefetcher::new(
            source,
            cache,
            config.prefetch_debounce(),
            config.prefetch_stagger(),
        );
        Self {
            archive_root: config.archive_root.clone(),
            cache_dir: config.cache_dir(),
            tuning: config.probe_tuning(),
            store: CatalogStore::new(),
            probe,
            fetch,
            prefetcher,
            phase: Phase::Uninitialized,
            edition: None,
            volume: None,
            pages: None,
            current_index: 0,
            loading_from_url: false,
            preferred_form: ParamForm::default(),
            location: Location::default(),
        }
    }

    // -- accessors -----------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn edition(&self) -> Option<Edition> {
        self.edition
    }

    pub fn volume(&self) -> Option<u32> {
        self.volume
    }

    pub fn total_pages(&self) -> usize {
        self.pages.as_ref().map_or(0, |p| p.total())
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The address bar as the viewer last left it.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Volumes offered by the selector for the active edition.
    pub fn volume_ids(&self) -> Vec<u32> {
        match self.edition {
            Some(edition) => self.store.volume_ids(edition),
            None => Vec::new(),
        }
    }

    pub fn volume_entry(&self, volume: u32) -> Option<&VolumeEntry> {
        let edition = self.edition?;
        self.store.catalog()?.volume(edition, volume)
    }

    /// Display title for the active edition: catalog title, or the bare id.
    pub fn edition_title(&self) -> Option<String> {
        let edition = self.edition?;
        let title = self
            .store
            .catalog()
            .and_then(|c| c.edition(edition))
            .map(|e| e.title.clone())
            .unwrap_or_else(|| edition.label());
        Some(title)
    }

    /// Shared handle to the image cache (for display and inspection).
    pub fn image_cache(&self) -> Arc<Mutex<ImageCache>> {
        self.prefetcher.cache()
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.store.catalog()
    }

    /// Ensure the catalog is loaded (cached copy or fetch), outside of a
    /// URL-driven initialization.
    pub fn load_catalog(&mut self) -> Option<&Catalog> {
        self.store.load(&self.cache_dir, self.fetch.as_ref())
    }

    // -- initialization ------------------------------------------------------

    /// Apply an inbound document location: parse parameters, normalize, and
    /// load the referenced volume and page. Also the `hashchange` entry
    /// point — re-applying a changed location goes through here again.
    pub fn init_from_location(&mut self, location: Location) -> Vec<Notice> {
        self.location = location;
        self.phase = Phase::AwaitingEdition;
        self.store.load(&self.cache_dir, self.fetch.as_ref());

        let (raw, form) = urlstate::parse_params(&self.location);
        self.preferred_form = form;

        let Some(edition) = raw.edition.as_deref().and_then(ident::normalize_edition) else {
            self.phase = Phase::EditionMissing;
            return vec![Notice::EditionRequired];
        };
        self.edition = Some(edition);
        self.phase = Phase::AwaitingVolume;

        let volume = match &raw.volume {
            Some(raw_volume) => {
                match ident::normalize_volume(raw_volume, edition, self.store.catalog()) {
                    Some(volume) => Some(volume),
                    None => {
                        // Surface the bad reference and strip it from the URL,
                        // keeping the edition so the reader can pick again.
                        self.location = urlstate::edition_only(&self.location, edition);
                        return vec![Notice::UnknownVolume {
                            raw: raw_volume.clone(),
                            edition,
                        }];
                    }
                }
            }
            None => None,
        };
        let Some(volume) = volume else {
            return Vec::new();
        };

        self.loading_from_url = true;
        let notices = self.load_volume(volume);
        if self.phase == Phase::Ready
            && let Some(page) = raw.page.as_deref().and_then(|p| p.parse::<u32>().ok())
            && page >= 1
            && page as usize <= self.total_pages()
        {
            self.go_to(page as usize - 1);
        }
        self.loading_from_url = false;
        notices
    }

    // -- volume lifecycle ----------------------------------------------------

    /// Selector-driven volume change.
    pub fn select_volume(&mut self, raw: &str) -> Vec<Notice> {
        let Some(edition) = self.edition else {
            return vec![Notice::EditionRequired];
        };
        match ident::normalize_volume(raw, edition, self.store.catalog()) {
            Some(volume) => self.load_volume(volume),
            None => vec![Notice::UnknownVolume {
                raw: raw.to_string(),
                edition,
            }],
        }
    }

    fn load_volume(&mut self, volume: u32) -> Vec<Notice> {
        let Some(edition) = self.edition else {
            return vec![Notice::EditionRequired];
        };
        self.phase = Phase::Loading;
        self.volume = Some(volume);
        self.prefetcher.cancel_pending();

        let total = self
            .store
            .page_count(edition, volume, self.probe.as_ref(), &self.tuning);
        if total == 0 {
            self.pages = None;
            self.phase = Phase::EmptyVolume;
            return vec![Notice::EmptyVolume { volume }];
        }

        self.pages = Some(PageList::new(&self.archive_root, edition, volume, total));
        self.current_index = 0;
        self.phase = Phase::Ready;
        self.after_move();
        Vec::new()
    }

    /// Deselect the volume: the viewer UI hides, the pending prefetch dies,
    /// viewer parameters leave the URL, and the cache gives memory back.
    pub fn clear_volume(&mut self) {
        self.volume = None;
        self.pages = None;
        self.current_index = 0;
        self.prefetcher.cancel_pending();
        self.phase = match self.edition {
            Some(_) => Phase::AwaitingVolume,
            None => Phase::AwaitingEdition,
        };
        self.location = Location {
            path: self.location.path.clone(),
            query: String::new(),
            hash: String::new(),
        };
        self.viewer_hidden();
    }

    // -- navigation ----------------------------------------------------------

    pub fn next(&mut self) -> Option<Spread> {
        self.ready()?;
        if self.current_index + 2 < self.total_pages() {
            self.current_index += 2;
            self.after_move();
        }
        Some(self.current_spread())
    }

    pub fn prev(&mut self) -> Option<Spread> {
        self.ready()?;
        if self.current_index > 1 {
            self.current_index -= 2;
            self.after_move();
        }
        Some(self.current_spread())
    }

    /// Jump to an absolute 0-based index, clamped to the volume.
    pub fn go_to(&mut self, index: usize) -> Option<Spread> {
        self.ready()?;
        self.current_index = index.min(self.total_pages() - 1);
        self.after_move();
        Some(self.current_spread())
    }

    pub fn first(&mut self) -> Option<Spread> {
        self.go_to(0)
    }

    pub fn last(&mut self) -> Option<Spread> {
        let total = self.total_pages();
        if total == 0 {
            return None;
        }
        self.go_to(total - 1)
    }

    /// Keyboard dispatch. Inert while no volume is loaded.
    pub fn handle_key(&mut self, key: Key) -> Option<Spread> {
        self.pages.as_ref()?;
        match key {
            Key::ArrowRight | Key::Space => self.next(),
            Key::ArrowLeft => self.prev(),
            Key::Home => self.first(),
            Key::End => self.last(),
        }
    }

    /// The visible pair for the current position.
    pub fn current_spread(&mut self) -> Spread {
        match self.pages.as_mut() {
            Some(pages) => resolve_spread(pages, self.current_index),
            None => Spread::default(),
        }
    }

    // -- lifecycle hooks -----------------------------------------------------

    /// The viewer went out of sight: shrink the image cache.
    pub fn viewer_hidden(&mut self) {
        if let Ok(mut cache) = self.prefetcher.cache().lock() {
            cache.trim_to_half();
        }
    }

    /// Final session save and prefetch cancellation before the process ends.
    pub fn shutdown(&mut self) {
        if let (Some(edition), Some(volume)) = (self.edition, self.volume) {
            session::save(
                &self.cache_dir,
                &SessionState::now(edition.as_str(), volume, self.current_index),
            );
        }
        self.prefetcher.cancel_pending();
    }

    // -- internals -----------------------------------------------------------

    fn ready(&self) -> Option<()> {
        (self.phase == Phase::Ready).then_some(())
    }

    /// Everything a completed position change entails: visible images first,
    /// then the address bar, the session record, and the background warm-up.
    fn after_move(&mut self) {
        let index = self.current_index;
        let Some(pages) = self.pages.as_mut() else {
            return;
        };
        self.prefetcher.ensure_visible(pages, index);
        self.prefetcher.schedule_background(pages, index);

        if !self.loading_from_url {
            self.sync_url();
        }
        if let (Some(edition), Some(volume)) = (self.edition, self.volume) {
            session::save(
                &self.cache_dir,
                &SessionState::now(edition.as_str(), volume, index),
            );
        }
    }

    fn sync_url(&mut self) {
        let (Some(edition), Some(volume)) = (self.edition, self.volume) else {
            return;
        };
        let page = self.url_page_reference();
        let encoded = urlstate::encode_params(edition, Some(volume), page, self.preferred_form);
        self.location = urlstate::write_params(&self.location, &encoded);
    }

    /// The page number the URL should reference: the spread's right (odd)
    /// page, or the next index's odd page when the current one is even.
    fn url_page_reference(&self) -> Option<u32> {
        let pages = self.pages.as_ref()?;
        let current = pages.get(self.current_index)?;
        if current.number % 2 == 1 {
            return Some(current.number);
        }
        match pages.get(self.current_index + 1) {
            Some(next) if next.number % 2 == 1 => Some(next.number),
            _ => None,
        }
    }
}
