//! Tunables for token counting (§4.D): which BPE vocabulary to fall back to when a model
//! descriptor doesn't announce one, and the cross-tokenizer safety buffers (§9 open question).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenizerConfig {
    /// Used when a model's capability descriptor doesn't name a tokenizer.
    pub default_tokenizer_name: String,
    /// Percentage safety buffer applied to Anthropic-vendor token counts. Default 5%.
    pub anthropic_safety_buffer_percent: f64,
    /// Percentage safety buffer applied to every other vendor's token counts. Default 3%.
    pub default_safety_buffer_percent: f64,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            default_tokenizer_name: "o200k_base".to_string(),
            anthropic_safety_buffer_percent: 5.0,
            default_safety_buffer_percent: 3.0,
        }
    }
}

impl TokenizerConfig {
    /// Builds a [`compactor::Tokenizer`] for a model, falling back to `default_tokenizer_name`
    /// when the model descriptor doesn't announce one.
    pub fn build(&self, model_tokenizer_name: Option<&str>, is_anthropic_vendor: bool) -> compactor::Tokenizer {
        let name = compactor::TokenizerName::from_model_tokenizer_name(
            model_tokenizer_name.unwrap_or(&self.default_tokenizer_name),
        );
        compactor::Tokenizer::new(
            name,
            is_anthropic_vendor,
            self.anthropic_safety_buffer_percent,
            self.default_safety_buffer_percent,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_falls_back_to_o200k_base() {
        let config = TokenizerConfig::default();
        let tokenizer = config.build(None, false);
        assert_eq!(tokenizer.count_text(""), 0);
    }
}
