//! Model descriptor: identity, vendor, and capability metadata for a single upstream model.

use serde::{Deserialize, Serialize};

/// Which wire protocol a model's native completions endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    OpenAi,
    Anthropic,
}

/// Capability and limit metadata for a model, loaded once per run and cached process-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub tokenizer_name: String,
    pub max_prompt_tokens: u32,
    pub max_output_tokens: u32,
    pub max_context_window_tokens: u32,
    pub supports_tool_calls: bool,
    pub supports_parallel_tool_calls: bool,
    pub supports_vision: bool,
    pub is_preview: bool,
}

/// A single model offered by the upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub vendor: Vendor,
    pub display_name: String,
    pub capabilities: ModelCapabilities,
}

impl Default for ModelCapabilities {
    /// Conservative defaults for a model the catalog didn't describe further.
    fn default() -> Self {
        Self {
            tokenizer_name: "o200k_base".to_string(),
            max_prompt_tokens: 8_192,
            max_output_tokens: 4_096,
            max_context_window_tokens: 8_192,
            supports_tool_calls: true,
            supports_parallel_tool_calls: false,
            supports_vision: false,
            is_preview: false,
        }
    }
}
