//! Image loading ahead of need: visible-window loads and background prefetch.
//!
//! Two distinct disciplines share the image cache:
//!
//! - **Ensure-visible** loads the current spread's images (plus one page of
//!   lookahead) synchronously, *before* the display is updated, so the
//!   visible pair never renders with unresolved images. A failed load is
//!   logged and skipped — one missing scan must never block navigation.
//!
//! - **Background prefetch** warms the next few pages after a short debounce,
//!   with staggered starts so a fast reader doesn't trigger request bursts.
//!   It is fire-and-forget: failures are logged, results land in the cache if
//!   they still matter, and a newer navigation supersedes the whole schedule
//!   via a generation counter (the timer-cancellation of the event-loop
//!   original, expressed as "only the latest generation may proceed").
//!
//! Window computation is pure and separately testable; the [`Prefetcher`]
//! owns the thread and the cache handle.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{ImageCache, LoadedImage};
use crate::spread::PageList;

/// Pages loaded synchronously with the current index: the spread itself and
/// one page of lookahead.
pub const VISIBLE_AHEAD: usize = 2;

/// Background window: pages `index + 3 ..= index + 6`.
pub const BACKGROUND_OFFSET: usize = 3;
pub const BACKGROUND_LEN: usize = 4;

/// Pause before a background schedule starts, so rapid paging cancels it.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Gap between successive background loads.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum ImageLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image fetch failed: {0}")]
    Fetch(String),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Loader for page images, keyed by the derived image path.
///
/// A load succeeds only if the bytes arrive *and* decode as an image — the
/// equivalent of an `onload` rather than a mere 200 response. Production
/// implementations live in [`crate::archive`].
pub trait ImageSource: Send + Sync {
    fn load_image(&self, path: &str) -> Result<LoadedImage, ImageLoadError>;
}

/// Indices whose images must be resident before the display updates.
pub fn visible_window(index: usize, total: usize) -> Range<usize> {
    index.min(total)..(index + VISIBLE_AHEAD + 1).min(total)
}

/// Indices worth warming in the background after a navigation.
pub fn background_window(index: usize, total: usize) -> Range<usize> {
    (index + BACKGROUND_OFFSET).min(total)..(index + BACKGROUND_OFFSET + BACKGROUND_LEN).min(total)
}

/// Owns the image cache handle and drives both load disciplines.
pub struct Prefetcher {
    source: Arc<dyn ImageSource>,
    cache: Arc<Mutex<ImageCache>>,
    generation: Arc<AtomicU64>,
    debounce: Duration,
    stagger: Duration,
}

impl Prefetcher {
    pub fn new(
        source: Arc<dyn ImageSource>,
        cache: Arc<Mutex<ImageCache>>,
        debounce: Duration,
        stagger: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            generation: Arc::new(AtomicU64::new(0)),
            debounce,
            stagger,
        }
    }

    pub fn cache(&self) -> Arc<Mutex<ImageCache>> {
        Arc::clone(&self.cache)
    }

    /// Load the visible window synchronously. Descriptors are materialized,
    /// cache hits are skipped, failures are logged and do not propagate.
    pub fn ensure_visible(&self, pages: &mut PageList, index: usize) {
        for idx in visible_window(index, pages.total()) {
            let Some(page) = pages.materialize(idx) else {
                continue;
            };
            let path = page.path.clone();
            let number = page.number;

            if self.cache.lock().is_ok_and(|c| c.contains(&path)) {
                pages.mark_cached(idx);
                continue;
            }
            match self.source.load_image(&path) {
                Ok(img) => {
                    if let Ok(mut cache) = self.cache.lock() {
                        cache.insert(img);
                    }
                    pages.mark_cached(idx);
                }
                Err(e) => log::warn!("failed to load page {number}: {e}"),
            }
        }
    }

    /// Schedule a background warm-up of the pages past the visible window.
    ///
    /// Supersedes any pending schedule. The worker waits out the debounce,
    /// then loads one page per stagger interval, bailing out as soon as a
    /// newer navigation has claimed the generation.
    pub fn schedule_background(&self, pages: &mut PageList, index: usize) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let paths: Vec<String> = background_window(index, pages.total())
            .filter_map(|idx| pages.materialize(idx).map(|p| p.path.clone()))
            .collect();
        if paths.is_empty() {
            return;
        }

        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let latest = Arc::clone(&self.generation);
        let (debounce, stagger) = (self.debounce, self.stagger);

        thread::spawn(move || {
            thread::sleep(debounce);
            for (i, path) in paths.iter().enumerate() {
                if latest.load(Ordering::SeqCst) != generation {
                    return; // superseded by a newer navigation
                }
                if i > 0 {
                    thread::sleep(stagger);
                }
                if cache.lock().is_ok_and(|c| c.contains(path)) {
                    continue;
                }
                match source.load_image(path) {
                    Ok(img) => {
                        if let Ok(mut cache) = cache.lock() {
                            cache.insert(img);
                        }
                    }
                    Err(e) => log::debug!("background prefetch skipped {path}: {e}"),
                }
            }
        });
    }

    /// Invalidate any pending background schedule without starting a new one.
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::Edition;
    use crate::test_helpers::FakeSource;

    fn pages(total: u32) -> PageList {
        PageList::new("tipitaka", Edition::Ch, 1, total)
    }

    fn prefetcher(source: FakeSource, debounce_ms: u64, stagger_ms: u64) -> Prefetcher {
        Prefetcher::new(
            Arc::new(source),
            Arc::new(Mutex::new(ImageCache::new(20))),
            Duration::from_millis(debounce_ms),
            Duration::from_millis(stagger_ms),
        )
    }

    /// Poll the cache until `predicate` holds or a second has passed.
    fn wait_for(cache: &Arc<Mutex<ImageCache>>, predicate: impl Fn(&ImageCache) -> bool) -> bool {
        for _ in 0..100 {
            if predicate(&cache.lock().unwrap()) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    // =========================================================================
    // Window computation
    // =========================================================================

    #[test]
    fn visible_window_covers_spread_plus_lookahead() {
        assert_eq!(visible_window(0, 150), 0..3);
        assert_eq!(visible_window(4, 150), 4..7);
    }

    #[test]
    fn visible_window_clamps_at_volume_end() {
        assert_eq!(visible_window(148, 150), 148..150);
        assert_eq!(visible_window(149, 150), 149..150);
        assert_eq!(visible_window(0, 2), 0..2);
        assert!(visible_window(0, 0).is_empty());
    }

    #[test]
    fn background_window_sits_past_the_visible_one() {
        assert_eq!(background_window(0, 150), 3..7);
        assert_eq!(background_window(10, 150), 13..17);
    }

    #[test]
    fn background_window_clamps_and_empties() {
        assert_eq!(background_window(146, 150), 149..150);
        assert!(background_window(148, 150).is_empty());
        assert!(background_window(0, 3).is_empty());
    }

    // =========================================================================
    // Ensure-visible
    // =========================================================================

    #[test]
    fn ensure_visible_populates_cache_and_marks_pages() {
        let pf = prefetcher(FakeSource::new(), 0, 0);
        let mut list = pages(10);
        pf.ensure_visible(&mut list, 0);

        let cache = pf.cache();
        let cache = cache.lock().unwrap();
        for n in 1..=3 {
            assert!(cache.contains(&format!("/tipitaka/ch/1/{n}.png")));
        }
        drop(cache);
        assert!(list.get(0).unwrap().cached);
        assert!(list.get(2).unwrap().cached);
    }

    #[test]
    fn ensure_visible_skips_already_cached_without_reloading() {
        let source = FakeSource::new();
        let counter = source.load_counter();
        let pf = prefetcher(source, 0, 0);
        let mut list = pages(10);

        pf.ensure_visible(&mut list, 0);
        let first_round = counter.load(Ordering::SeqCst);
        pf.ensure_visible(&mut list, 0);
        assert_eq!(counter.load(Ordering::SeqCst), first_round);
    }

    #[test]
    fn ensure_visible_tolerates_a_missing_page() {
        let source = FakeSource::new().failing_on("/tipitaka/ch/1/2.png");
        let pf = prefetcher(source, 0, 0);
        let mut list = pages(10);
        pf.ensure_visible(&mut list, 0);

        let cache = pf.cache();
        let cache = cache.lock().unwrap();
        assert!(cache.contains("/tipitaka/ch/1/1.png"));
        assert!(!cache.contains("/tipitaka/ch/1/2.png"));
        assert!(cache.contains("/tipitaka/ch/1/3.png"));
    }

    // =========================================================================
    // Background prefetch
    // =========================================================================

    #[test]
    fn background_loads_arrive_after_debounce() {
        let pf = prefetcher(FakeSource::new(), 0, 0);
        let mut list = pages(20);
        pf.schedule_background(&mut list, 0);

        let cache = pf.cache();
        assert!(wait_for(&cache, |c| {
            (4..=7).all(|n| c.contains(&format!("/tipitaka/ch/1/{n}.png")))
        }));
    }

    #[test]
    fn cancelled_schedule_never_loads() {
        let pf = prefetcher(FakeSource::new(), 150, 0);
        let mut list = pages(20);
        pf.schedule_background(&mut list, 0);
        pf.cancel_pending();

        thread::sleep(Duration::from_millis(400));
        assert!(pf.cache().lock().unwrap().is_empty());
    }

    #[test]
    fn newer_schedule_supersedes_pending_one() {
        let pf = prefetcher(FakeSource::new(), 150, 0);
        let mut list = pages(40);
        pf.schedule_background(&mut list, 0);
        pf.schedule_background(&mut list, 20);

        let cache = pf.cache();
        // The newer window (23..27) loads.
        assert!(wait_for(&cache, |c| {
            (24..=27).all(|n| c.contains(&format!("/tipitaka/ch/1/{n}.png")))
        }));
        // The superseded window (3..7) never does.
        thread::sleep(Duration::from_millis(300));
        assert!(!cache.lock().unwrap().contains("/tipitaka/ch/1/4.png"));
    }

    #[test]
    fn background_failures_stay_silent() {
        let source = FakeSource::new().failing_on("/tipitaka/ch/1/5.png");
        let pf = prefetcher(source, 0, 0);
        let mut list = pages(20);
        pf.schedule_background(&mut list, 0);

        let cache = pf.cache();
        assert!(wait_for(&cache, |c| {
            c.contains("/tipitaka/ch/1/4.png") && c.contains("/tipitaka/ch/1/7.png")
        }));
        assert!(!cache.lock().unwrap().contains("/tipitaka/ch/1/5.png"));
    }
}
