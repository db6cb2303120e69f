//! Model-alias normalization for Anthropic model identifiers.
//!
//! Accepts short family aliases (`opus`, `sonnet`, `haiku`) and dated model ids
//! (`claude-sonnet-4-5-20250929`) and maps them onto whatever concrete model id
//! the caller's configured alias table names as current for that family.

use std::collections::HashMap;

/// Maps a short alias or a dated model id to its normalized form.
///
/// `aliases` maps a short name (e.g. `"sonnet"`) to the model id currently
/// considered latest for that family. Unknown names pass through unchanged.
pub fn normalize(name: &str, aliases: &HashMap<String, String>) -> String {
    if let Some(resolved) = aliases.get(name) {
        return resolved.clone();
    }

    strip_dated_suffix(name).unwrap_or_else(|| name.to_string())
}

/// Strips a trailing `-YYYYMMDD` date from `claude-<family>-<major>[-<minor>]-YYYYMMDD`,
/// joining `major`/`minor` with a dot (e.g. `claude-sonnet-4-5-20250929` → `claude-sonnet-4.5`).
fn strip_dated_suffix(name: &str) -> Option<String> {
    let parts: Vec<&str> = name.split('-').collect();
    let last = *parts.last()?;
    if last.len() != 8 || !last.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let without_date = &parts[..parts.len() - 1];
    if without_date.len() < 3 {
        return None;
    }

    let is_numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let last_idx = without_date.len() - 1;
    if !is_numeric(without_date[last_idx]) {
        return None;
    }

    if without_date.len() >= 4 && is_numeric(without_date[last_idx - 1]) {
        let major = without_date[last_idx - 1];
        let minor = without_date[last_idx];
        let prefix = without_date[..last_idx - 1].join("-");
        return Some(format!("{prefix}-{major}.{minor}"));
    }

    let major = without_date[last_idx];
    let prefix = without_date[..last_idx].join("-");
    Some(format!("{prefix}-{major}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> HashMap<String, String> {
        HashMap::from([
            ("opus".to_string(), "claude-opus-4-1-20250805".to_string()),
            ("sonnet".to_string(), "claude-sonnet-4-5-20250929".to_string()),
            ("haiku".to_string(), "claude-haiku-4-5-20251001".to_string()),
        ])
    }

    #[test]
    fn resolves_known_alias() {
        assert_eq!(normalize("sonnet", &aliases()), "claude-sonnet-4-5-20250929");
    }

    #[test]
    fn unknown_name_passes_through() {
        assert_eq!(normalize("gpt-4o", &aliases()), "gpt-4o");
    }

    #[test]
    fn strips_dated_suffix_with_minor_version() {
        assert_eq!(normalize("claude-sonnet-4-5-20250929", &HashMap::new()), "claude-sonnet-4.5");
    }

    #[test]
    fn strips_dated_suffix_without_minor_version() {
        assert_eq!(normalize("claude-haiku-3-20240307", &HashMap::new()), "claude-haiku-3");
    }
}
