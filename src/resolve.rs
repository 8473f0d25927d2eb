//! Page-count resolution: catalog first, network probing as the fallback.
//!
//! The catalog answers "how many pages?" instantly when it has the volume.
//! When it doesn't — metadata fetch failed, or the archive grew a volume the
//! catalog hasn't caught up with — the count is discovered by asking an
//! existence oracle about individual page images.
//!
//! ## Probing strategy
//!
//! 1. **Window scan.** Start from a rough per-volume estimate (a small lookup
//!    table; ~200 by default) and walk a ±50-page window around it, tracking
//!    the highest page that exists and stopping after 5 consecutive misses.
//!    Cheap when the estimate is close, which it usually is.
//! 2. **Bounded binary search.** If the window had nothing, search `[1, 600]`
//!    for the highest existing page, capped at 15 probe rounds. Catches
//!    volumes whose real size is nowhere near the estimate.
//!
//! Both stages are pure functions over an injected [`PageProbe`], so the
//! whole strategy is unit-testable with a fake oracle. Probe timeouts are the
//! oracle's concern: a probe that can't answer in time reports the page as
//! missing (see [`crate::archive`]).
//!
//! A result of 0 means "empty volume". It is a value, not an error — callers
//! decide how to present it.

use crate::catalog::Catalog;
use crate::ident::Edition;

/// Existence oracle for page images.
///
/// Implementations must be total: network failures and timeouts resolve to
/// `false`, never to a panic or a propagated error.
pub trait PageProbe {
    fn page_exists(&self, edition: Edition, volume: u32, page: u32) -> bool;
}

/// Knobs for the probing fallback. Defaults match the archive's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTuning {
    /// Half-width of the window scanned around the estimate.
    pub scan_window: u32,
    /// Consecutive misses that end the window scan early.
    pub miss_streak: u32,
    /// Upper bound of the binary-search range.
    pub search_ceiling: u32,
    /// Probe budget for the binary search.
    pub search_rounds: u32,
    /// Estimate for volumes the lookup table doesn't cover.
    pub default_estimate: u32,
}

impl Default for ProbeTuning {
    fn default() -> Self {
        Self {
            scan_window: 50,
            miss_streak: 5,
            search_ceiling: 600,
            search_rounds: 15,
            default_estimate: 200,
        }
    }
}

/// Rough page-count estimates used to seed the window scan.
///
/// Coarse by design: the scan tolerates ±50 and the binary search catches
/// everything else, so bands per volume range are enough.
fn estimated_pages(edition: Edition, volume: u32, default_estimate: u32) -> u32 {
    match (edition, volume) {
        (Edition::Ch, 1..=8) => 300,
        (Edition::Ch, 9..=25) => 250,
        (Edition::Ch, 26..=39) => 350,
        (Edition::Mc, 1..=15) => 400,
        (Edition::Mc, 16..=45) => 300,
        _ => default_estimate,
    }
}

/// Total pages for a volume.
///
/// Reads the catalog when it has the volume; otherwise runs the probing
/// fallback. Returns 0 when neither path finds any pages.
pub fn resolve_total_pages(
    catalog: Option<&Catalog>,
    probe: &dyn PageProbe,
    edition: Edition,
    volume: u32,
    tuning: &ProbeTuning,
) -> u32 {
    if let Some(count) = catalog.and_then(|c| c.page_count(edition, volume)) {
        return count;
    }
    log::warn!(
        "volume {volume} not in catalog for {} edition, probing for page count",
        edition.label()
    );
    probe_page_count(probe, edition, volume, tuning)
}

/// Discover a volume's page count through the existence oracle alone.
pub fn probe_page_count(
    probe: &dyn PageProbe,
    edition: Edition,
    volume: u32,
    tuning: &ProbeTuning,
) -> u32 {
    let scanned = scan_around_estimate(probe, edition, volume, tuning);
    if scanned > 0 {
        return scanned;
    }
    search_highest_page(probe, edition, volume, tuning)
}

/// Walk the ±window around the estimate, returning the highest existing page
/// seen, or 0. Ends early after `miss_streak` consecutive misses.
fn scan_around_estimate(
    probe: &dyn PageProbe,
    edition: Edition,
    volume: u32,
    tuning: &ProbeTuning,
) -> u32 {
    let estimate = estimated_pages(edition, volume, tuning.default_estimate);
    let lo = estimate.saturating_sub(tuning.scan_window).max(1);
    let hi = estimate + tuning.scan_window;

    let mut highest = 0;
    let mut streak = 0;
    for page in lo..=hi {
        if probe.page_exists(edition, volume, page) {
            highest = page;
            streak = 0;
        } else {
            streak += 1;
            if streak >= tuning.miss_streak {
                break;
            }
        }
    }
    highest
}

/// Binary search for the highest existing page in `[1, search_ceiling]`.
///
/// Invariant: pages at or below `best` exist (once any has been confirmed);
/// a hit raises `low`, a miss lowers `high`. Stops when the bounds cross or
/// the probe budget runs out, returning the last confirmed page, or 0.
fn search_highest_page(
    probe: &dyn PageProbe,
    edition: Edition,
    volume: u32,
    tuning: &ProbeTuning,
) -> u32 {
    let mut low = 1;
    let mut high = tuning.search_ceiling;
    let mut best = 0;
    let mut rounds = 0;

    while low <= high && rounds < tuning.search_rounds {
        let mid = low + (high - low) / 2;
        if probe.page_exists(edition, volume, mid) {
            best = mid;
            low = mid + 1;
        } else {
            high = mid - 1;
        }
        rounds += 1;
    }
    best
}
