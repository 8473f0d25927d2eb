//! Edition and volume identifier normalization.
//!
//! Everything the viewer knows about "where the reader is" starts as untrusted
//! text — URL parameters, selector values, CLI arguments. This module turns
//! that text into canonical identifiers or rejects it, and nothing downstream
//! ever sees a raw identifier again.
//!
//! ## Contract
//!
//! Both normalizers are pure and total: invalid input yields `None`, never a
//! panic or an error value. Canonical volume numbers carry no zero-padding
//! (`"007"` normalizes to `7`), matching the archive's folder names.
//!
//! ## Volume validity
//!
//! A volume number is only meaningful within an edition. When the metadata
//! catalog is available and lists the edition, membership in its volume map is
//! the single source of truth. When it isn't — first load with no network, or
//! a catalog that doesn't know the edition yet — a hard ceiling of
//! [`FALLBACK_MAX_VOLUME`] keeps obviously bogus numbers out.

use std::fmt;

use crate::catalog::Catalog;

/// Upper bound for volume numbers when no catalog is available to consult.
/// The largest published set (MC) runs to 45 volumes.
pub const FALLBACK_MAX_VOLUME: u32 = 45;

/// A recognized scanned edition of the Tipiṭaka.
///
/// The set is closed: page images only exist for these editions, so an
/// unrecognized identifier is treated as absent rather than passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Edition {
    /// Chulachomklao of Siam edition.
    Ch,
    /// Mahāchulālongkornrājavidyālaya edition.
    Mc,
}

impl Edition {
    pub const ALL: [Edition; 2] = [Edition::Ch, Edition::Mc];

    /// Canonical lowercase identifier, as used in URLs and image paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Edition::Ch => "ch",
            Edition::Mc => "mc",
        }
    }

    /// Display label when the catalog has no title for the edition.
    pub fn label(self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a raw edition identifier.
///
/// Lowercases and trims, then checks membership in the recognized set.
/// Anything else — empty string, unknown edition, stray whitespace-only
/// input — yields `None`.
pub fn normalize_edition(raw: &str) -> Option<Edition> {
    let ed = raw.trim().to_lowercase();
    Edition::ALL.into_iter().find(|e| e.as_str() == ed)
}

/// Normalize a raw volume identifier for an edition.
///
/// Parses as a positive integer, then validates:
/// - catalog available and it knows the edition → the volume must appear in
///   that edition's volume map;
/// - otherwise → the number must not exceed [`FALLBACK_MAX_VOLUME`].
///
/// Returns the canonical number (no zero-padding); `None` for anything
/// non-numeric, zero, negative, or out of range.
pub fn normalize_volume(raw: &str, edition: Edition, catalog: Option<&Catalog>) -> Option<u32> {
    let num: u32 = raw.trim().parse().ok()?;
    if num < 1 {
        return None;
    }

    if let Some(catalog) = catalog
        && let Some(entry) = catalog.edition(edition)
    {
        if entry.volumes.contains_key(&num.to_string()) {
            return Some(num);
        }
        log::warn!("volume {num} not found in {} edition", edition.label());
        return None;
    }

    // No catalog to consult — accept the general range.
    (num <= FALLBACK_MAX_VOLUME).then_some(num)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::catalog_fixture;

    // =========================================================================
    // Edition normalization
    // =========================================================================

    #[test]
    fn recognized_editions_pass() {
        assert_eq!(normalize_edition("ch"), Some(Edition::Ch));
        assert_eq!(normalize_edition("mc"), Some(Edition::Mc));
    }

    #[test]
    fn edition_is_case_insensitive_and_trimmed() {
        assert_eq!(normalize_edition("  CH "), Some(Edition::Ch));
        assert_eq!(normalize_edition("Mc\n"), Some(Edition::Mc));
    }

    #[test]
    fn unknown_edition_is_none() {
        assert_eq!(normalize_edition("zz"), None);
        assert_eq!(normalize_edition(""), None);
        assert_eq!(normalize_edition("chx"), None);
    }

    #[test]
    fn edition_display_matches_canonical_id() {
        assert_eq!(Edition::Ch.to_string(), "ch");
        assert_eq!(Edition::Mc.label(), "MC");
    }

    // =========================================================================
    // Volume normalization — against a catalog
    // =========================================================================

    #[test]
    fn volume_in_catalog_passes() {
        let cat = catalog_fixture();
        assert_eq!(normalize_volume("1", Edition::Ch, Some(&cat)), Some(1));
    }

    #[test]
    fn zero_padded_volume_canonicalizes() {
        let cat = catalog_fixture();
        assert_eq!(normalize_volume("002", Edition::Ch, Some(&cat)), Some(2));
    }

    #[test]
    fn volume_missing_from_edition_is_none() {
        let cat = catalog_fixture();
        // Fixture's ch edition has volumes 1..=3 only.
        assert_eq!(normalize_volume("999", Edition::Ch, Some(&cat)), None);
    }

    #[test]
    fn volume_checked_against_requested_edition_only() {
        let cat = catalog_fixture();
        // Volume 45 exists in mc but not in ch.
        assert_eq!(normalize_volume("45", Edition::Mc, Some(&cat)), Some(45));
        assert_eq!(normalize_volume("45", Edition::Ch, Some(&cat)), None);
    }

    // =========================================================================
    // Volume normalization — fallback range
    // =========================================================================

    #[test]
    fn no_catalog_falls_back_to_ceiling() {
        assert_eq!(normalize_volume("45", Edition::Ch, None), Some(45));
        assert_eq!(normalize_volume("46", Edition::Ch, None), None);
    }

    #[test]
    fn catalog_without_the_edition_falls_back_to_ceiling() {
        let mut cat = catalog_fixture();
        cat.editions.remove("mc");
        assert_eq!(normalize_volume("12", Edition::Mc, Some(&cat)), Some(12));
    }

    #[test]
    fn garbage_volume_is_none_never_a_panic() {
        for raw in ["", "0", "-3", "abc", "1.5", "1e3", " "] {
            assert_eq!(normalize_volume(raw, Edition::Ch, None), None, "raw {raw:?}");
        }
    }
}
