//! Wire and canonical message types shared by the proxy's protocol translation layer.
//!
//! `anthropic` and `openai` model each protocol's wire shapes; `unified` is the
//! canonical, protocol-agnostic representation that requests and responses are
//! translated through.

pub mod anthropic;
pub mod model_name;
pub mod openai;
pub mod streaming;
pub mod tool_name;
pub mod unified;
