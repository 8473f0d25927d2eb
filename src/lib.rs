//! # Tipiṭaka Viewer
//!
//! Page-image viewer engine for scanned Tipiṭaka editions. The archive
//! publishes each edition as folders of page scans
//! (`/tipitaka/<edition>/<volume>/<page>.png`) plus one metadata document;
//! this crate is the machinery that turns an address-bar reference like
//! `?edition=ch&volume=1&page=5` into a correctly paired two-page spread
//! with its images resident, and keeps the address bar, the session record,
//! and the image cache in step as the reader pages through.
//!
//! # Architecture: Pure Engine, Thin Shell
//!
//! All decision-making is pure and synchronous: identifier normalization,
//! page-count resolution over an injected existence oracle, spread
//! derivation, cache eviction, URL parsing and serialization. The pieces
//! that touch the world — HTTP, filesystem, the terminal — live at the
//! edges and are injected as capabilities, so every behavior the viewer
//! promises is testable with fakes.
//!
//! ```text
//! URL/UI input → ident → resolve (consults catalog) → controller state
//!     → spread (visible pair) → prefetch/cache (images resident)
//!     → shell renders → urlstate writes the address bar back
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`ident`] | Edition/volume normalization — untrusted text in, canonical identifiers out |
//! | [`catalog`] | Metadata catalog schema, 24h disk cache, session store with memoized page counts |
//! | [`resolve`] | Page-count resolution: catalog first, window-scan + binary-search probing fallback |
//! | [`spread`] | Left(even)/right(odd) spread derivation and lazy page descriptors |
//! | [`cache`] | Bounded image cache, insertion-order eviction, hidden-viewer trim |
//! | [`prefetch`] | Synchronous visible-window loads and debounced, staggered background warm-up |
//! | [`urlstate`] | Long/short, query/hash URL parameter parsing and its exact-inverse serializer |
//! | [`controller`] | The viewer state machine: phases, navigation, notices, session saves |
//! | [`session`] | Crash/reload session record |
//! | [`archive`] | Real backends: HTTP archive (HEAD probes, GET+decode loads) and local directory |
//! | [`scan`] | Local archive tree → catalog document generation |
//! | [`config`] | `viewer.toml` loading, validation, stock config |
//! | [`output`] | CLI presentation: spread display, volume lists, instructional screens |
//!
//! # Design Decisions
//!
//! ## Catalog First, Probing Second
//!
//! Two generations of this viewer existed: one trusted a metadata document,
//! one discovered page counts by probing the archive. They are consolidated
//! here with metadata as the primary path and probing strictly as the
//! degraded fallback — it only runs when the catalog is unavailable or
//! doesn't know the volume, and its result is memoized for the session.
//!
//! ## The Spread Is Derived, Never Stored
//!
//! The only positional state is a 0-based `current_index`. The left/right
//! pair is recomputed from it on every display, which makes the odd/even
//! convention (odd pages recto, even verso — as the physical books are
//! bound) impossible to desynchronize from the position.
//!
//! ## Failure Means Degrade, Not Stop
//!
//! A dead network downgrades metadata to probing; a probe timeout counts as
//! a missing page; a broken page image logs and leaves a gap. The only
//! conditions a reader is ever confronted with are the three actionable
//! ones: no edition, unknown volume, empty volume.

pub mod archive;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod ident;
pub mod output;
pub mod prefetch;
pub mod resolve;
pub mod scan;
pub mod session;
pub mod spread;
pub mod urlstate;

#[cfg(test)]
pub(crate) mod test_helpers;
