//! Tunables for the context compactor (§4.E). Mirrors [`compactor::CompactionOptions`]'s
//! defaults; `enabled` gates whether the pipeline invokes the compactor at all.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompactionConfig {
    /// Auto-compact toggle (`start --auto-compact` / config equivalent, §6).
    pub enabled: bool,
    /// Percentage shaved off the effective limits before they're used as a budget.
    pub safety_margin_percent: f64,
    /// Whether to compress oversized tool bodies before falling back to truncation.
    pub selective_compression_enabled: bool,
    /// The most-recent percentage of the token budget exempt from selective compression.
    pub preserve_recent_percent: f64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        let defaults = compactor::CompactionOptions::default();
        Self {
            enabled: true,
            safety_margin_percent: defaults.safety_margin_percent,
            selective_compression_enabled: defaults.selective_compression_enabled,
            preserve_recent_percent: defaults.preserve_recent_percent,
        }
    }
}

impl From<&CompactionConfig> for compactor::CompactionOptions {
    fn from(config: &CompactionConfig) -> Self {
        Self {
            safety_margin_percent: config.safety_margin_percent,
            selective_compression_enabled: config.selective_compression_enabled,
            preserve_recent_percent: config.preserve_recent_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_compactor_crate_default() {
        let config = CompactionConfig::default();
        let converted: compactor::CompactionOptions = (&config).into();
        let native = compactor::CompactionOptions::default();
        assert_eq!(converted.safety_margin_percent, native.safety_margin_percent);
        assert_eq!(converted.preserve_recent_percent, native.preserve_recent_percent);
    }
}
