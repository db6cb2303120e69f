//! Wire types for OpenAI's Chat Completions API.
//!
//! Mirrors the subset of the API this proxy accepts and emits: chat
//! completions (streaming and non-streaming), tool calling, and model
//! listing. Unknown fields are dropped on deserialize; forward-compatible
//! string variants are captured via `Other(String)`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON Schema payload for a tool's parameters.
///
/// Kept as a raw JSON value rather than a typed schema: this proxy never
/// validates arguments against the schema, only forwards it between
/// protocols.
pub type JsonSchema = Value;

/// Chat completion request body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    /// The model to use for the completion.
    pub model: String,

    /// The conversation so far, including an optional leading system message.
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum number of tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Penalizes tokens based on their frequency in the text so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Penalizes tokens that have appeared at all in the text so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Sequences that halt generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Whether to stream the response as Server-Sent Events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Tools the model may call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    /// Controls how the model uses tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Whether to allow the model to call multiple tools at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// A single message in a chat completion request or response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    /// Who sent the message.
    pub role: ChatRole,

    /// Text content. `None` for assistant messages that only carry tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// For role `tool`, the id of the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Role of a chat message's sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ChatRole {
    /// Sets context or constraints for the conversation.
    #[serde(rename = "system")]
    System,
    /// A message from the end user.
    #[serde(rename = "user")]
    User,
    /// A message generated by the model.
    #[serde(rename = "assistant")]
    Assistant,
    /// The result of a tool call.
    #[serde(rename = "tool")]
    Tool,
    /// Any other role not yet known, for forward compatibility.
    #[serde(untagged)]
    Other(String),
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    /// Always `function` today; kept for forward compatibility with other tool types.
    #[serde(rename = "type")]
    pub tool_type: ToolCallType,

    /// The function specification.
    pub function: FunctionDefinition,
}

/// Discriminator for tool/tool-call kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ToolCallType {
    /// A callable function. The only kind OpenAI currently supports.
    #[serde(rename = "function")]
    Function,
}

/// A callable function's name, description, and parameter schema.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionDefinition {
    /// Function name, passed back verbatim in tool calls.
    pub name: String,

    /// Description shown to the model to help it decide when to call this.
    pub description: String,

    /// JSON Schema for the function's arguments.
    pub parameters: Box<JsonSchema>,
}

/// How the model should choose between available tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// A named mode (`none`, `auto`, `required`).
    Mode(ToolChoiceMode),
    /// Force the model to call a specific function.
    Specific {
        /// Always `function`.
        #[serde(rename = "type")]
        tool_type: ToolCallType,
        /// The function to call.
        function: ToolChoiceFunction,
    },
}

/// Named tool-choice modes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolChoiceMode {
    /// Disable tool calling entirely.
    #[serde(rename = "none")]
    None,
    /// Let the model decide whether to call a tool.
    #[serde(rename = "auto")]
    Auto,
    /// Require the model to call at least one tool.
    #[serde(rename = "required")]
    Required,
    /// Anthropic's equivalent of `required`, accepted as an alias.
    #[serde(rename = "any")]
    Any,
    /// Any other mode not yet known, for forward compatibility.
    #[serde(untagged)]
    Other(String),
}

/// Names the function a `ToolChoice::Specific` forces the model to call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolChoiceFunction {
    /// The function name.
    pub name: String,
}

/// A tool call made by the assistant.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCall {
    /// Unique identifier for this call, echoed back in the matching tool result message.
    pub id: String,

    /// Always `function`.
    #[serde(rename = "type")]
    pub tool_type: ToolCallType,

    /// The function invoked and its arguments.
    pub function: FunctionCall,
}

/// The function and arguments for a tool call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionCall {
    /// Name of the function invoked.
    pub name: String,

    /// Arguments as a JSON-encoded string.
    pub arguments: String,
}

/// Non-streaming chat completion response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    /// Unique identifier for this completion.
    pub id: String,

    /// Always `chat.completion`.
    pub object: ObjectType,

    /// Unix timestamp the completion was created.
    pub created: u64,

    /// Model that generated the completion.
    pub model: String,

    /// Generated choices. Usually a single entry.
    pub choices: Vec<ChatChoice>,

    /// Token usage for the request.
    pub usage: Usage,
}

/// A single completion choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatChoice {
    /// Index of this choice among the response's choices.
    pub index: u32,

    /// The generated message.
    pub message: ChatMessage,

    /// Why generation stopped.
    pub finish_reason: FinishReason,
}

/// Reason generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum FinishReason {
    /// The model reached a natural stopping point.
    #[serde(rename = "stop")]
    Stop,
    /// Generation stopped because it hit `max_tokens`.
    #[serde(rename = "length")]
    Length,
    /// The response was filtered for policy reasons.
    #[serde(rename = "content_filter")]
    ContentFilter,
    /// The model decided to call one or more tools.
    #[serde(rename = "tool_calls")]
    ToolCalls,
    /// Any other finish reason not yet known, for forward compatibility.
    #[serde(untagged)]
    Other(String),
}

/// Token usage for a request/response pair.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
    /// Sum of prompt and completion tokens.
    pub total_tokens: u32,
}

/// A single streaming chunk (one SSE `data:` event in a `chat.completion.chunk` stream).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionChunk {
    /// Identifier shared by every chunk in this completion.
    pub id: String,

    /// Always `chat.completion.chunk`.
    pub object: ObjectType,

    /// Unix timestamp the chunk was created.
    pub created: u64,

    /// Model generating the completion.
    pub model: String,

    /// Backend configuration fingerprint; not tracked by this proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,

    /// Incremental choice updates.
    pub choices: Vec<ChatChoiceDelta>,

    /// Present only on the final usage-reporting chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Incremental update to a single choice in a streaming response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatChoiceDelta {
    /// Index of the choice being updated.
    pub index: u32,

    /// Token log-probabilities; never populated by this proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Value>,

    /// The incremental content.
    pub delta: ChatMessageDelta,

    /// Present only in the final chunk for this choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Incremental message content in a streaming response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessageDelta {
    /// Present only in the first chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,

    /// Text fragment to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Legacy function-call delta, superseded by `tool_calls`. Never populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,

    /// Incremental tool call updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<StreamingToolCall>>,
}

/// Tool call updates in streaming responses, built incrementally across chunks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StreamingToolCall {
    /// Establishes a new tool call at `index`.
    Start {
        /// Position of this tool call in the response's `tool_calls` array.
        index: usize,
        /// Unique identifier for this call.
        id: String,
        /// Always `function`.
        #[serde(rename = "type")]
        r#type: ToolCallType,
        /// Function name and initial (usually empty) arguments.
        function: FunctionStart,
    },
    /// Appends to the arguments of a previously started tool call.
    Delta {
        /// Index matching a prior `Start`.
        index: usize,
        /// Argument fragment to append.
        function: FunctionDelta,
    },
}

/// Function name and initial arguments for a streaming tool call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionStart {
    /// Name of the function being called.
    pub name: String,
    /// Initial arguments fragment, usually empty.
    pub arguments: String,
}

/// Incremental arguments fragment for a streaming tool call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionDelta {
    /// Argument fragment to append to the accumulated arguments string.
    pub arguments: String,
}

/// `object` field discriminator used throughout the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ObjectType {
    /// A single model description.
    #[serde(rename = "model")]
    Model,
    /// A list container, e.g. for `/v1/models`.
    #[serde(rename = "list")]
    List,
    /// A complete chat completion.
    #[serde(rename = "chat.completion")]
    ChatCompletion,
    /// A single chunk of a streaming chat completion.
    #[serde(rename = "chat.completion.chunk")]
    ChatCompletionChunk,
}

/// A model available for use.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Model {
    /// Model identifier, used as the `model` field in requests.
    pub id: String,
    /// Always `model`.
    pub object: ObjectType,
    /// Unix timestamp the model was created or became available.
    pub created: u64,
    /// Organization that owns the model.
    pub owned_by: String,
}

/// Response body for `/v1/models`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsResponse {
    /// Always `list`.
    pub object: ObjectType,
    /// Available models.
    pub data: Vec<Model>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_request_with_tool_choice_mode() {
        let json = json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "tool_choice": "auto",
        });

        let req: ChatCompletionRequest = serde_json::from_value(json).unwrap();
        assert!(matches!(req.tool_choice, Some(ToolChoice::Mode(ToolChoiceMode::Auto))));
    }

    #[test]
    fn tool_choice_mode_accepts_anthropic_any_alias() {
        let mode: ToolChoiceMode = serde_json::from_value(json!("any")).unwrap();
        assert_eq!(mode, ToolChoiceMode::Any);
    }

    #[test]
    fn finish_reason_round_trips() {
        let value = serde_json::to_value(FinishReason::ToolCalls).unwrap();
        assert_eq!(value, json!("tool_calls"));
    }

    #[test]
    fn unknown_finish_reason_is_captured_as_other() {
        let reason: FinishReason = serde_json::from_value(json!("some_future_reason")).unwrap();
        assert!(matches!(reason, FinishReason::Other(s) if s == "some_future_reason"));
    }
}
