//! Viewer configuration.
//!
//! One flat `viewer.toml` covers everything environment-specific: where the
//! archive lives, where the local cache goes, and the tuning knobs for
//! probing and prefetch. Every field has a working default — a config file
//! is only needed to point at a different archive or to retune.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! base_url = ""                 # Archive origin for remote mode, e.g.
//!                               # "https://tipitaka.example.org"
//! archive_root = "tipitaka"     # First path segment of image locations
//! metadata_path = "/tipitaka/book-viewer.json"
//! cache_dir = ".tipitaka-viewer"
//!
//! [images]
//! max_cache_size = 20           # Resident page images (oldest evicted)
//!
//! [probe]
//! timeout_secs = 4              # Per existence check; timeout = missing
//! scan_window = 50              # ± pages scanned around the estimate
//! miss_streak = 5               # Consecutive misses that end the scan
//! search_ceiling = 600          # Binary-search upper bound
//! search_rounds = 15            # Binary-search probe budget
//! default_estimate = 200        # Seed for volumes outside the lookup table
//!
//! [prefetch]
//! debounce_ms = 1000            # Idle delay before background prefetch
//! stagger_ms = 200              # Gap between background loads
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolve::ProbeTuning;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Viewer configuration loaded from `viewer.toml`.
///
/// All fields have working defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Archive origin for remote mode. Empty means "no remote configured".
    pub base_url: String,
    /// First path segment of every image location.
    pub archive_root: String,
    /// Site-absolute path of the metadata catalog document.
    pub metadata_path: String,
    /// Directory for the catalog cache and the session record.
    pub cache_dir: String,
    pub images: ImagesConfig,
    pub probe: ProbeConfig,
    pub prefetch: PrefetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Cap on resident page images; the oldest is evicted beyond it.
    pub max_cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Per existence check. A timed-out probe counts as a missing page.
    pub timeout_secs: u64,
    pub scan_window: u32,
    pub miss_streak: u32,
    pub search_ceiling: u32,
    pub search_rounds: u32,
    pub default_estimate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrefetchConfig {
    pub debounce_ms: u64,
    pub stagger_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            archive_root: "tipitaka".to_string(),
            metadata_path: "/tipitaka/book-viewer.json".to_string(),
            cache_dir: ".tipitaka-viewer".to_string(),
            images: ImagesConfig::default(),
            probe: ProbeConfig::default(),
            prefetch: PrefetchConfig::default(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_cache_size: crate::cache::DEFAULT_MAX_CACHE_SIZE,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let tuning = ProbeTuning::default();
        Self {
            timeout_secs: 4,
            scan_window: tuning.scan_window,
            miss_streak: tuning.miss_streak,
            search_ceiling: tuning.search_ceiling,
            search_rounds: tuning.search_rounds,
            default_estimate: tuning.default_estimate,
        }
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            stagger_ms: 200,
        }
    }
}

impl ViewerConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file if it exists, otherwise the stock defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.archive_root.is_empty() || self.archive_root.contains('/') {
            return Err(ConfigError::Validation(format!(
                "archive_root must be a single path segment, got {:?}",
                self.archive_root
            )));
        }
        if !self.metadata_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "metadata_path must be site-absolute (start with '/'), got {:?}",
                self.metadata_path
            )));
        }
        if self.images.max_cache_size == 0 {
            return Err(ConfigError::Validation(
                "images.max_cache_size must be at least 1".to_string(),
            ));
        }
        if self.probe.miss_streak == 0 || self.probe.search_rounds == 0 {
            return Err(ConfigError::Validation(
                "probe.miss_streak and probe.search_rounds must be at least 1".to_string(),
            ));
        }
        if self.probe.search_ceiling == 0 {
            return Err(ConfigError::Validation(
                "probe.search_ceiling must be at least 1".to_string(),
            ));
        }
        if self.probe.timeout_secs == 0 || self.probe.timeout_secs > 60 {
            return Err(ConfigError::Validation(format!(
                "probe.timeout_secs must be within 1..=60, got {}",
                self.probe.timeout_secs
            )));
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }

    pub fn probe_tuning(&self) -> ProbeTuning {
        ProbeTuning {
            scan_window: self.probe.scan_window,
            miss_streak: self.probe.miss_streak,
            search_ceiling: self.probe.search_ceiling,
            search_rounds: self.probe.search_rounds,
            default_estimate: self.probe.default_estimate,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_secs)
    }

    pub fn prefetch_debounce(&self) -> Duration {
        Duration::from_millis(self.prefetch.debounce_ms)
    }

    pub fn prefetch_stagger(&self) -> Duration {
        Duration::from_millis(self.prefetch.stagger_ms)
    }
}

/// A documented stock `viewer.toml` with every option at its default.
pub fn stock_config_toml() -> String {
    let defaults = ViewerConfig::default();
    format!(
        r#"# tipitaka-viewer configuration. All options are optional;
# defaults are shown. Unknown keys are rejected.

# Archive origin for remote mode, e.g. "https://tipitaka.example.org".
# Leave empty when viewing a local archive directory (--local-root).
base_url = "{base_url}"

# First path segment of every image location:
# /{archive_root}/<edition>/<volume>/<page>.png
archive_root = "{archive_root}"

# Site-absolute path of the metadata catalog document.
metadata_path = "{metadata_path}"

# Directory for the catalog cache and the session record.
cache_dir = "{cache_dir}"

[images]
# Resident page images; the oldest-inserted is evicted beyond this.
max_cache_size = {max_cache_size}

[probe]
# Per existence check. A timed-out probe counts as a missing page.
timeout_secs = {timeout_secs}
# ± pages scanned around the per-volume estimate.
scan_window = {scan_window}
# Consecutive misses that end the scan early.
miss_streak = {miss_streak}
# Binary-search upper bound and probe budget.
search_ceiling = {search_ceiling}
search_rounds = {search_rounds}
# Seed estimate for volumes outside the lookup table.
default_estimate = {default_estimate}

[prefetch]
# Idle delay before background prefetch starts.
debounce_ms = {debounce_ms}
# Gap between successive background loads.
stagger_ms = {stagger_ms}
"#,
        base_url = defaults.base_url,
        archive_root = defaults.archive_root,
        metadata_path = defaults.metadata_path,
        cache_dir = defaults.cache_dir,
        max_cache_size = defaults.images.max_cache_size,
        timeout_secs = defaults.probe.timeout_secs,
        scan_window = defaults.probe.scan_window,
        miss_streak = defaults.probe.miss_streak,
        search_ceiling = defaults.probe.search_ceiling,
        search_rounds = defaults.probe.search_rounds,
        default_estimate = defaults.probe.default_estimate,
        debounce_ms = defaults.prefetch.debounce_ms,
        stagger_ms = defaults.prefetch.stagger_ms,
    )
}
