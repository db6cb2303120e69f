//! Keeps conversation payloads under a model's effective token and byte budgets.
//!
//! Three collaborating pieces: [`tokenizer`] counts tokens with the right BPE vocabulary for a
//! model family, [`limits`] tracks budgets refined by upstream error feedback, and [`compact`]
//! runs the binary-search truncation, integrity pass, and optional selective compression.

pub mod compact;
pub mod limits;
pub mod tokenizer;

pub use compact::{CompactionOptions, CompactionOutcome, compact as compact_request};
pub use limits::DynamicLimitRegistry;
pub use tokenizer::{Tokenizer, TokenizerName};
