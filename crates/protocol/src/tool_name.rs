//! Tool-name truncation for the 64-character limit OpenAI enforces on tool names.
//!
//! Anthropic tool names may exceed OpenAI's limit. Names that do are replaced by a
//! deterministic truncated form with a hash suffix, and the mapping is kept for the
//! lifetime of a single request so responses can restore the original name.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Maximum tool name length OpenAI's API accepts.
pub const MAX_TOOL_NAME_LEN: usize = 64;

const HASH_SUFFIX_LEN: usize = 8;

/// Bidirectional mapping between original and truncated tool names, scoped to one request.
#[derive(Debug, Default, Clone)]
pub struct ToolNameMap {
    truncated_to_original: HashMap<String, String>,
}

impl ToolNameMap {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the name to send upstream, truncating and recording the mapping if needed.
    pub fn to_upstream(&mut self, original: &str) -> String {
        if original.len() <= MAX_TOOL_NAME_LEN {
            return original.to_string();
        }

        let truncated = truncate_with_hash(original);
        self.truncated_to_original.insert(truncated.clone(), original.to_string());
        truncated
    }

    /// Restores the original name for a possibly-truncated name seen in a response.
    ///
    /// Falls back to the input unchanged if it isn't a name this map truncated.
    pub fn from_upstream(&self, maybe_truncated: &str) -> String {
        self.truncated_to_original
            .get(maybe_truncated)
            .cloned()
            .unwrap_or_else(|| maybe_truncated.to_string())
    }
}

fn truncate_with_hash(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    let hash_suffix: String = digest.iter().take(HASH_SUFFIX_LEN / 2).map(|b| format!("{b:02x}")).collect();

    // Reserve room for an underscore and the hash suffix.
    let keep = MAX_TOOL_NAME_LEN - HASH_SUFFIX_LEN - 1;
    let prefix: String = name.chars().take(keep).collect();
    format!("{prefix}_{hash_suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_pass_through_unchanged() {
        let mut map = ToolNameMap::new();
        assert_eq!(map.to_upstream("get_weather"), "get_weather");
        assert!(map.truncated_to_original.is_empty());
    }

    #[test]
    fn long_names_are_truncated_and_restorable() {
        let mut map = ToolNameMap::new();
        let long_name = "a".repeat(100);

        let truncated = map.to_upstream(&long_name);
        assert!(truncated.len() <= MAX_TOOL_NAME_LEN);
        assert_eq!(map.from_upstream(&truncated), long_name);
    }

    #[test]
    fn truncation_is_deterministic() {
        let long_name = "b".repeat(90);
        let mut a = ToolNameMap::new();
        let mut b = ToolNameMap::new();
        assert_eq!(a.to_upstream(&long_name), b.to_upstream(&long_name));
    }

    #[test]
    fn unknown_names_pass_through_from_upstream() {
        let map = ToolNameMap::new();
        assert_eq!(map.from_upstream("get_weather"), "get_weather");
    }
}
