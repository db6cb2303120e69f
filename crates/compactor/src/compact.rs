//! Binary-search context truncation, keeping the most recent conversation tail under a
//! model's effective token and byte budgets.

use std::collections::HashSet;

use protocol::unified::{UnifiedContent, UnifiedContentContainer, UnifiedMessage, UnifiedRequest, UnifiedRole};

use crate::limits::DynamicLimitRegistry;
use crate::tokenizer::Tokenizer;

const MARKER_TOKEN_OVERHEAD: u32 = 50;
const MARKER_BYTE_OVERHEAD: u64 = 200;
const LARGE_TOOL_BODY_THRESHOLD_BYTES: usize = 10 * 1024;
const COMPRESS_HEAD_TAIL_CHARS: usize = 250;
const MAX_INTEGRITY_PASSES: usize = 2;
const MAX_MARKER_TOOL_NAMES: usize = 5;

/// Tunables for a single compaction call.
pub struct CompactionOptions {
    /// Percentage shaved off the effective limits before they're used as a budget. Default 2%.
    pub safety_margin_percent: f64,
    /// Whether to compress oversized tool bodies before falling back to truncation.
    pub selective_compression_enabled: bool,
    /// The most-recent percentage of the token budget exempt from selective compression.
    pub preserve_recent_percent: f64,
}

impl Default for CompactionOptions {
    fn default() -> Self {
        Self {
            safety_margin_percent: 2.0,
            selective_compression_enabled: true,
            preserve_recent_percent: 30.0,
        }
    }
}

pub struct CompactionOutcome {
    pub request: UnifiedRequest,
    pub was_compacted: bool,
    pub original_tokens: u32,
    pub compacted_tokens: u32,
    pub removed_count: usize,
}

/// Compacts `request` so its token and byte cost fit the model's effective limits.
///
/// Non-fatal by construction: any condition that would make compaction unsafe (system prompt
/// alone exceeds budget, truncation would remove every message, or the integrity pass empties
/// the preserved tail) returns the request unmodified with `was_compacted = false`.
pub fn compact(
    mut request: UnifiedRequest,
    tokenizer: &Tokenizer,
    limits: &DynamicLimitRegistry,
    model_id: &str,
    max_context_window_tokens: u32,
    options: &CompactionOptions,
) -> CompactionOutcome {
    let system_text = request.system.clone().unwrap_or_default();
    let original_tokens = tokenizer.count_messages(&request.messages) + tokenizer.count_text(&system_text);

    let margin = 1.0 - (options.safety_margin_percent / 100.0);
    let token_budget = (limits.effective_token_limit(model_id, max_context_window_tokens) as f64 * margin) as u32;
    let byte_budget = limits.effective_byte_limit().map(|b| (b as f64 * margin) as u64);

    let system_tokens = tokenizer.count_text(&system_text);
    let system_bytes = system_text.len() as u64;

    if system_tokens >= token_budget || byte_budget.is_some_and(|b| system_bytes >= b) {
        log::warn!("system prompt alone exceeds the compaction budget for model {model_id}, skipping compaction");
        return unmodified(request, original_tokens);
    }

    let available_tokens = token_budget.saturating_sub(system_tokens).saturating_sub(MARKER_TOKEN_OVERHEAD);
    let available_bytes = byte_budget.map(|b| b.saturating_sub(system_bytes).saturating_sub(MARKER_BYTE_OVERHEAD));

    if fits_budget(&request.messages, tokenizer, available_tokens, available_bytes) {
        return unmodified(request, original_tokens);
    }

    let mut messages = request.messages.clone();
    let mut compression_applied = false;

    if options.selective_compression_enabled {
        compression_applied = apply_selective_compression(&mut messages, tokenizer, options.preserve_recent_percent, available_tokens);
    }

    let preserve_index = if compression_applied && fits_budget(&messages, tokenizer, available_tokens, available_bytes) {
        0
    } else {
        binary_search_preserve_index(&messages, tokenizer, available_tokens, available_bytes)
    };

    if preserve_index >= messages.len() {
        log::warn!("compaction for model {model_id} would remove the entire conversation, skipping");
        return unmodified(request, original_tokens);
    }

    let removed = messages[..preserve_index].to_vec();
    let mut preserved = messages[preserve_index..].to_vec();

    run_integrity_post_pass(&mut preserved);

    if preserved.is_empty() {
        log::warn!("integrity post-pass emptied the preserved tail for model {model_id}, skipping compaction");
        return unmodified(request, original_tokens);
    }

    let marker_text = build_marker_text(&removed);
    let mut system_out = request.system.clone();

    if compression_applied {
        let notice = "\n\n[Some earlier tool results were compressed to save context.]";
        system_out = Some(system_out.unwrap_or_default() + notice);
    }

    match &mut system_out {
        Some(system) => {
            system.push_str("\n\n");
            system.push_str(&marker_text);
        }
        None => preserved.insert(0, marker_message(marker_text)),
    }

    let compacted_tokens = tokenizer.count_messages(&preserved) + tokenizer.count_text(system_out.as_deref().unwrap_or(""));

    request.messages = preserved;
    request.system = system_out;

    CompactionOutcome {
        request,
        was_compacted: true,
        original_tokens,
        compacted_tokens,
        removed_count: removed.len(),
    }
}

fn unmodified(request: UnifiedRequest, original_tokens: u32) -> CompactionOutcome {
    CompactionOutcome {
        request,
        was_compacted: false,
        original_tokens,
        compacted_tokens: original_tokens,
        removed_count: 0,
    }
}

fn fits_budget(messages: &[UnifiedMessage], tokenizer: &Tokenizer, available_tokens: u32, available_bytes: Option<u64>) -> bool {
    tokenizer.count_messages(messages) <= available_tokens
        && available_bytes.is_none_or(|limit| message_bytes(messages) <= limit)
}

fn message_bytes(messages: &[UnifiedMessage]) -> u64 {
    messages.iter().map(single_message_bytes).sum()
}

fn single_message_bytes(message: &UnifiedMessage) -> u64 {
    serde_json::to_vec(message).map(|bytes| bytes.len() as u64).unwrap_or(0)
}

/// Binary search for the smallest index `i` such that `messages[i..]` fits both budgets.
/// Cost is monotonically non-increasing as `i` grows, so "fits" is monotonic too.
fn binary_search_preserve_index(messages: &[UnifiedMessage], tokenizer: &Tokenizer, available_tokens: u32, available_bytes: Option<u64>) -> usize {
    let n = messages.len();
    let mut lo = 0;
    let mut hi = n;

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if fits_budget(&messages[mid..], tokenizer, available_tokens, available_bytes) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    lo
}

fn tool_use_ids(messages: &[UnifiedMessage]) -> HashSet<String> {
    let mut ids = HashSet::new();
    for message in messages {
        if let UnifiedContentContainer::Blocks(blocks) = &message.content {
            for block in blocks {
                if let UnifiedContent::ToolUse { id, .. } = block {
                    ids.insert(id.clone());
                }
            }
        }
        if let Some(tool_calls) = &message.tool_calls {
            ids.extend(tool_calls.iter().map(|call| call.id.clone()));
        }
    }
    ids
}

fn tool_result_ids(messages: &[UnifiedMessage]) -> HashSet<String> {
    let mut ids = HashSet::new();
    for message in messages {
        if let UnifiedContentContainer::Blocks(blocks) = &message.content {
            for block in blocks {
                if let UnifiedContent::ToolResult { tool_use_id, .. } = block {
                    ids.insert(tool_use_id.clone());
                }
            }
        }
        if message.role == UnifiedRole::Tool {
            if let Some(id) = &message.tool_call_id {
                ids.insert(id.clone());
            }
        }
    }
    ids
}

/// Drops orphaned tool_use/tool_result pairs and any leading non-user message, repeating
/// until a fixed point (bounded by `MAX_INTEGRITY_PASSES`).
fn run_integrity_post_pass(messages: &mut Vec<UnifiedMessage>) {
    for _ in 0..MAX_INTEGRITY_PASSES {
        let use_ids = tool_use_ids(messages);
        let result_ids = tool_result_ids(messages);
        let mut changed = false;

        messages.retain_mut(|message| {
            if let UnifiedContentContainer::Blocks(blocks) = &mut message.content {
                let before = blocks.len();
                blocks.retain(|block| match block {
                    UnifiedContent::ToolResult { tool_use_id, .. } => use_ids.contains(tool_use_id),
                    UnifiedContent::ToolUse { id, .. } => result_ids.contains(id),
                    _ => true,
                });
                changed |= blocks.len() != before;
            }
            if let Some(tool_calls) = &mut message.tool_calls {
                let before = tool_calls.len();
                tool_calls.retain(|call| result_ids.contains(&call.id));
                changed |= tool_calls.len() != before;
            }
            if message.role == UnifiedRole::Tool
                && let Some(id) = &message.tool_call_id
                && !use_ids.contains(id)
            {
                changed = true;
                return false;
            }
            !is_empty_message(message)
        });

        while messages.first().is_some_and(|m| m.role != UnifiedRole::User) {
            messages.remove(0);
            changed = true;
        }

        if !changed {
            break;
        }
    }
}

fn is_empty_message(message: &UnifiedMessage) -> bool {
    let content_empty = match &message.content {
        UnifiedContentContainer::Text(text) => text.is_empty(),
        UnifiedContentContainer::Blocks(blocks) => blocks.is_empty(),
    };
    content_empty && message.tool_calls.as_ref().is_none_or(Vec::is_empty)
}

fn build_marker_text(removed: &[UnifiedMessage]) -> String {
    let mut role_counts: std::collections::BTreeMap<&'static str, usize> = std::collections::BTreeMap::new();
    let mut tool_names = Vec::new();

    for message in removed {
        let role = match message.role {
            UnifiedRole::System => "system",
            UnifiedRole::User => "user",
            UnifiedRole::Assistant => "assistant",
            UnifiedRole::Tool => "tool",
        };
        *role_counts.entry(role).or_insert(0) += 1;

        if let UnifiedContentContainer::Blocks(blocks) = &message.content {
            for block in blocks {
                if let UnifiedContent::ToolUse { name, .. } = block
                    && tool_names.len() < MAX_MARKER_TOOL_NAMES
                    && !tool_names.contains(name)
                {
                    tool_names.push(name.clone());
                }
            }
        }
    }

    let role_summary = role_counts.iter().map(|(role, count)| format!("{count} {role}")).collect::<Vec<_>>().join(", ");
    let mut text = format!("[CONTEXT TRUNCATED: {} earlier messages removed ({role_summary})]", removed.len());
    if !tool_names.is_empty() {
        text.push_str(&format!(" Tools involved: {}.", tool_names.join(", ")));
    }
    text
}

fn marker_message(text: String) -> UnifiedMessage {
    UnifiedMessage {
        role: UnifiedRole::User,
        content: UnifiedContentContainer::Text(text),
        tool_calls: None,
        tool_call_id: None,
    }
}

/// Replaces oversized tool-result bodies older than the most-recent `preserve_recent_percent`
/// of the token budget with a head/tail excerpt. Returns whether anything was compressed.
fn apply_selective_compression(messages: &mut [UnifiedMessage], tokenizer: &Tokenizer, preserve_recent_percent: f64, available_tokens: u32) -> bool {
    let recent_budget = (available_tokens as f64 * (preserve_recent_percent / 100.0)) as u32;

    let n = messages.len();
    let mut suffix_tokens = vec![0u32; n + 1];
    for i in (0..n).rev() {
        suffix_tokens[i] = suffix_tokens[i + 1] + tokenizer.count_messages(&messages[i..i + 1]);
    }
    let threshold_index = (0..=n).find(|&i| suffix_tokens[i] <= recent_budget).unwrap_or(n);

    let mut compressed_any = false;
    for message in messages[..threshold_index].iter_mut() {
        if let UnifiedContentContainer::Blocks(blocks) = &mut message.content {
            for block in blocks.iter_mut() {
                if let UnifiedContent::ToolResult { content, .. } = block {
                    compressed_any |= compress_tool_result_content(content);
                }
            }
        }
    }
    compressed_any
}

fn compress_tool_result_content(content: &mut protocol::unified::UnifiedToolResultContent) -> bool {
    use protocol::unified::UnifiedToolResultContent;

    match content {
        UnifiedToolResultContent::Text(text) => compress_large_body(text),
        UnifiedToolResultContent::Multiple(items) => items.iter_mut().fold(false, |acc, item| compress_large_body(item) || acc),
    }
}

fn compress_large_body(body: &mut String) -> bool {
    if body.len() <= LARGE_TOOL_BODY_THRESHOLD_BYTES {
        return false;
    }

    let omitted = body.len() - 2 * COMPRESS_HEAD_TAIL_CHARS;
    let head: String = body.chars().take(COMPRESS_HEAD_TAIL_CHARS).collect();
    let tail: String = body.chars().rev().take(COMPRESS_HEAD_TAIL_CHARS).collect::<Vec<_>>().into_iter().rev().collect();
    *body = format!("{head}[… {omitted} characters omitted …]{tail}");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::DynamicLimitRegistry;
    use crate::tokenizer::{Tokenizer, TokenizerName};

    fn user_message(text: &str) -> UnifiedMessage {
        UnifiedMessage {
            role: UnifiedRole::User,
            content: UnifiedContentContainer::Text(text.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn request_with(messages: Vec<UnifiedMessage>) -> UnifiedRequest {
        UnifiedRequest {
            model: "gpt-4o".to_string(),
            messages,
            system: Some("You are a helpful assistant.".to_string()),
            system_is_array: false,
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop_sequences: None,
            stream: None,
            tools: None,
            tool_choice: None,
            parallel_tool_calls: None,
            metadata: None,
            thinking: None,
        }
    }

    #[test]
    fn small_conversation_is_not_compacted() {
        let tokenizer = Tokenizer::new(TokenizerName::Cl100kBase, false, 5.0, 3.0);
        let limits = DynamicLimitRegistry::new();
        let request = request_with(vec![user_message("hi"), user_message("how are you?")]);

        let outcome = compact(request, &tokenizer, &limits, "gpt-4o", 128_000, &CompactionOptions::default());
        assert!(!outcome.was_compacted);
        assert_eq!(outcome.removed_count, 0);
    }

    #[test]
    fn oversized_conversation_is_truncated_to_a_recent_tail() {
        let tokenizer = Tokenizer::new(TokenizerName::Cl100kBase, false, 5.0, 3.0);
        let limits = DynamicLimitRegistry::new();
        limits.record_token_limit_exceeded("gpt-4o", 1_000);

        let mut messages = Vec::new();
        for i in 0..200 {
            messages.push(user_message(&format!("message number {i} with some filler text to use up tokens")));
        }
        let request = request_with(messages);

        let outcome = compact(request, &tokenizer, &limits, "gpt-4o", 128_000, &CompactionOptions::default());
        assert!(outcome.was_compacted);
        assert!(outcome.removed_count > 0);
        assert!(outcome.request.messages.first().unwrap().content_text_contains("CONTEXT TRUNCATED"));
    }

    #[test]
    fn integrity_pass_removes_leading_non_user_message() {
        let mut messages = vec![
            UnifiedMessage {
                role: UnifiedRole::Assistant,
                content: UnifiedContentContainer::Text("orphaned reply".to_string()),
                tool_calls: None,
                tool_call_id: None,
            },
            user_message("hello"),
        ];
        run_integrity_post_pass(&mut messages);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, UnifiedRole::User);
    }

    #[test]
    fn compress_large_body_leaves_small_bodies_untouched() {
        let mut body = "short".to_string();
        assert!(!compress_large_body(&mut body));
        assert_eq!(body, "short");
    }

    #[test]
    fn compress_large_body_keeps_head_and_tail() {
        let mut body = "x".repeat(20_000);
        assert!(compress_large_body(&mut body));
        assert!(body.starts_with("xxx"));
        assert!(body.contains("omitted"));
    }

    trait ContentTextContains {
        fn content_text_contains(&self, needle: &str) -> bool;
    }

    impl ContentTextContains for UnifiedMessage {
        fn content_text_contains(&self, needle: &str) -> bool {
            match &self.content {
                UnifiedContentContainer::Text(text) => text.contains(needle),
                UnifiedContentContainer::Blocks(_) => false,
            }
        }
    }
}
