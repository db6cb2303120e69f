//! Token counting for compaction and limit enforcement.
//!
//! Counts are produced by one of the two BPE encodings `tiktoken-rs` ships as lazily-built
//! singletons, so the underlying vocabulary is loaded once per process and reused for every call.

use protocol::unified::{UnifiedContent, UnifiedContentContainer, UnifiedMessage};
use tiktoken_rs::CoreBPE;

/// Per-tool-call overhead added on top of raw text tokens for Anthropic-vendor models, to
/// compensate for tool-use framing the BPE count alone doesn't capture.
const ANTHROPIC_TOOL_USE_OVERHEAD_TOKENS: u32 = 8;

/// Which BPE vocabulary to count with, named after the model family that uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerName {
    O200kBase,
    Cl100kBase,
}

impl TokenizerName {
    pub fn from_model_tokenizer_name(name: &str) -> Self {
        match name {
            "o200k_base" => Self::O200kBase,
            _ => Self::Cl100kBase,
        }
    }

    fn bpe(self) -> &'static CoreBPE {
        match self {
            Self::O200kBase => tiktoken_rs::o200k_base_singleton(),
            Self::Cl100kBase => tiktoken_rs::cl100k_base_singleton(),
        }
    }
}

/// Counts tokens for a message array under a named tokenizer, applying the Anthropic-family
/// safety buffer and tool-use overhead described for the vendor given.
pub struct Tokenizer {
    name: TokenizerName,
    is_anthropic_vendor: bool,
    anthropic_safety_buffer_percent: f64,
    default_safety_buffer_percent: f64,
}

impl Tokenizer {
    /// `anthropic_safety_buffer_percent`/`default_safety_buffer_percent` are the multiplicative
    /// corrections applied on top of the raw BPE count (e.g. `5.0` for 1.05x), configurable per
    /// §9's open question rather than hardcoded.
    pub fn new(
        name: TokenizerName,
        is_anthropic_vendor: bool,
        anthropic_safety_buffer_percent: f64,
        default_safety_buffer_percent: f64,
    ) -> Self {
        Self { name, is_anthropic_vendor, anthropic_safety_buffer_percent, default_safety_buffer_percent }
    }

    pub fn count_text(&self, text: &str) -> u32 {
        self.name.bpe().encode_with_special_tokens(text).len() as u32
    }

    pub fn count_messages(&self, messages: &[UnifiedMessage]) -> u32 {
        let raw: u32 = messages.iter().map(|m| self.count_message(m)).sum();
        self.apply_safety_buffer(raw)
    }

    fn count_message(&self, message: &UnifiedMessage) -> u32 {
        match &message.content {
            UnifiedContentContainer::Text(text) => self.count_text(text),
            UnifiedContentContainer::Blocks(blocks) => blocks.iter().map(|block| self.count_block(block)).sum(),
        }
    }

    fn count_block(&self, block: &UnifiedContent) -> u32 {
        match block {
            UnifiedContent::Text { text } => self.count_text(text),
            UnifiedContent::Thinking { thinking, .. } => self.count_text(thinking),
            UnifiedContent::Image { .. } => 0,
            UnifiedContent::ToolUse { name, input, .. } => {
                let overhead = if self.is_anthropic_vendor { ANTHROPIC_TOOL_USE_OVERHEAD_TOKENS } else { 0 };
                self.count_text(name) + self.count_text(&input.to_string()) + overhead
            }
            UnifiedContent::ToolResult { content, .. } => match content {
                protocol::unified::UnifiedToolResultContent::Text(text) => self.count_text(text),
                protocol::unified::UnifiedToolResultContent::Multiple(items) => {
                    items.iter().map(|item| self.count_text(item)).sum()
                }
            },
        }
    }

    /// 1.05x for Anthropic-vendor models, 1.03x for everything else, to cover cross-tokenizer drift.
    fn apply_safety_buffer(&self, raw_tokens: u32) -> u32 {
        let percent = if self.is_anthropic_vendor {
            self.anthropic_safety_buffer_percent
        } else {
            self.default_safety_buffer_percent
        };
        (raw_tokens as f64 * (1.0 + percent / 100.0)).ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::unified::UnifiedRole;

    fn text_message(text: &str) -> UnifiedMessage {
        UnifiedMessage {
            role: UnifiedRole::User,
            content: UnifiedContentContainer::Text(text.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tokenizer(name: TokenizerName, is_anthropic_vendor: bool) -> Tokenizer {
        Tokenizer::new(name, is_anthropic_vendor, 5.0, 3.0)
    }

    #[test]
    fn empty_text_counts_zero_tokens() {
        let tokenizer = tokenizer(TokenizerName::Cl100kBase, false);
        assert_eq!(tokenizer.count_text(""), 0);
    }

    #[test]
    fn counting_is_deterministic() {
        let tokenizer = tokenizer(TokenizerName::Cl100kBase, false);
        let messages = vec![text_message("The quick brown fox jumps over the lazy dog.")];
        assert_eq!(tokenizer.count_messages(&messages), tokenizer.count_messages(&messages));
    }

    #[test]
    fn anthropic_vendor_applies_larger_safety_buffer() {
        let messages = vec![text_message("hello world, this is a test message")];
        let openai_tokenizer = tokenizer(TokenizerName::O200kBase, false);
        let anthropic_tokenizer = tokenizer(TokenizerName::O200kBase, true);
        assert!(anthropic_tokenizer.count_messages(&messages) >= openai_tokenizer.count_messages(&messages));
    }

    #[test]
    fn resolves_tokenizer_name_from_model_descriptor() {
        assert_eq!(TokenizerName::from_model_tokenizer_name("o200k_base"), TokenizerName::O200kBase);
        assert_eq!(TokenizerName::from_model_tokenizer_name("cl100k_base"), TokenizerName::Cl100kBase);
    }
}
