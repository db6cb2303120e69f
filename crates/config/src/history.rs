//! Tunables for the in-memory request/response history ring (§3).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// `start --history` toggle (§6).
    pub enabled: bool,
    /// Maximum number of retained records; `0` means unlimited.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { enabled: false, capacity: 100 }
    }
}
