//! Conversions from unified types to OpenAI protocol types.

use crate::{openai, unified};

/// Content the upstream rejects if a `tool_calls` entry isn't followed by a matching `tool`
/// message — emitted in place of a result the client never supplied.
const INTERRUPTED_TOOL_CALL_MESSAGE: &str = "Tool execution was interrupted or failed.";

impl From<unified::UnifiedRequest> for openai::ChatCompletionRequest {
    fn from(req: unified::UnifiedRequest) -> Self {
        // Convert messages and extract system messages
        let mut messages = Vec::with_capacity(req.messages.len() + if req.system.is_some() { 1 } else { 0 });

        // Add system message if present
        if let Some(system) = req.system {
            messages.push(openai::ChatMessage {
                role: openai::ChatRole::System,
                content: Some(system),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        // Convert all messages, splitting tool_result blocks into their own `tool` messages
        // and repairing any tool_calls left without a matching result.
        let mut converted = Vec::with_capacity(req.messages.len());
        for msg in req.messages {
            converted.extend(flatten_message(msg));
        }
        messages.extend(repair_tool_call_sequence(converted));

        Self {
            model: req.model,
            messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            top_p: req.top_p,
            frequency_penalty: req.frequency_penalty,
            presence_penalty: req.presence_penalty,
            stop: req.stop_sequences,
            stream: req.stream,
            tools: req.tools.map(|t| t.into_iter().map(openai::Tool::from).collect()),
            tool_choice: req.tool_choice.map(openai::ToolChoice::from),
            parallel_tool_calls: req.parallel_tool_calls,
        }
    }
}

impl From<unified::UnifiedRole> for openai::ChatRole {
    fn from(role: unified::UnifiedRole) -> Self {
        match role {
            unified::UnifiedRole::System => openai::ChatRole::System,
            unified::UnifiedRole::User => openai::ChatRole::User,
            unified::UnifiedRole::Assistant => openai::ChatRole::Assistant,
            unified::UnifiedRole::Tool => openai::ChatRole::Tool,
        }
    }
}

impl From<unified::UnifiedMessage> for openai::ChatMessage {
    fn from(msg: unified::UnifiedMessage) -> Self {
        let role = openai::ChatRole::from(msg.role);

        let content = match msg.content {
            unified::UnifiedContentContainer::Text(text) => Some(text),
            unified::UnifiedContentContainer::Blocks(blocks) => {
                // Convert blocks to text - OpenAI doesn't support structured content in the same way
                // Extract text from blocks
                let text_parts: Vec<String> = blocks
                    .into_iter()
                    .filter_map(|block| match block {
                        unified::UnifiedContent::Text { text } => Some(text),
                        unified::UnifiedContent::ToolResult { content, .. } => match content {
                            unified::UnifiedToolResultContent::Text(text) => Some(text),
                            unified::UnifiedToolResultContent::Multiple(texts) => Some(texts.join("\n")),
                        },
                        _ => None,
                    })
                    .collect();

                if text_parts.is_empty() {
                    None
                } else {
                    Some(text_parts.join("\n"))
                }
            }
        };

        Self {
            role,
            content,
            tool_calls: msg.tool_calls.map(|calls| {
                calls
                    .into_iter()
                    .map(|call| openai::ToolCall {
                        id: call.id,
                        tool_type: openai::ToolCallType::Function,
                        function: openai::FunctionCall {
                            name: call.function.name,
                            arguments: match call.function.arguments {
                                unified::UnifiedArguments::String(s) => s,
                                unified::UnifiedArguments::Value(v) => {
                                    serde_json::to_string(&v).unwrap_or_else(|_| "{}".to_string())
                                }
                            },
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id,
        }
    }
}

/// Converts a single unified request message into one or more OpenAI messages.
///
/// Anthropic lets a `tool_result` block live inside a `user` message's content array;
/// OpenAI requires each tool result as its own `tool`-role message, keyed by
/// `tool_call_id`, ordered before any remaining text from the same turn.
fn flatten_message(msg: unified::UnifiedMessage) -> Vec<openai::ChatMessage> {
    let unified::UnifiedMessage { role, content, tool_calls, tool_call_id } = msg;
    let role = openai::ChatRole::from(role);

    let blocks = match content {
        unified::UnifiedContentContainer::Text(text) => {
            return vec![build_chat_message(role, Some(text), tool_calls, tool_call_id)];
        }
        unified::UnifiedContentContainer::Blocks(blocks) => blocks,
    };

    let mut out = Vec::new();
    let mut text_parts = Vec::new();

    for block in blocks {
        match block {
            unified::UnifiedContent::Text { text } => text_parts.push(text),
            unified::UnifiedContent::ToolResult { tool_use_id, content, .. } => {
                let text = match content {
                    unified::UnifiedToolResultContent::Text(text) => text,
                    unified::UnifiedToolResultContent::Multiple(texts) => texts.join("\n"),
                };
                out.push(openai::ChatMessage {
                    role: openai::ChatRole::Tool,
                    content: Some(text),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id),
                });
            }
            _ => {}
        }
    }

    let has_remaining_content = !text_parts.is_empty() || tool_calls.is_some();
    if has_remaining_content || out.is_empty() {
        let text = if text_parts.is_empty() { None } else { Some(text_parts.join("\n")) };
        out.push(build_chat_message(role, text, tool_calls, tool_call_id));
    }

    out
}

fn build_chat_message(
    role: openai::ChatRole,
    content: Option<String>,
    tool_calls: Option<Vec<unified::UnifiedToolCall>>,
    tool_call_id: Option<String>,
) -> openai::ChatMessage {
    openai::ChatMessage {
        role,
        content,
        tool_calls: tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|call| openai::ToolCall {
                    id: call.id,
                    tool_type: openai::ToolCallType::Function,
                    function: openai::FunctionCall {
                        name: call.function.name,
                        arguments: match call.function.arguments {
                            unified::UnifiedArguments::String(s) => s,
                            unified::UnifiedArguments::Value(v) => {
                                serde_json::to_string(&v).unwrap_or_else(|_| "{}".to_string())
                            }
                        },
                    },
                })
                .collect()
        }),
        tool_call_id,
    }
}

/// Injects a synthetic `tool` message after any `tool_calls` entry that isn't followed by a
/// matching `tool`-role message, so the upstream never sees a dangling tool call (§4.F).
fn repair_tool_call_sequence(messages: Vec<openai::ChatMessage>) -> Vec<openai::ChatMessage> {
    let mut repaired = Vec::with_capacity(messages.len());
    let mut pending_ids: Vec<String> = Vec::new();

    for message in messages {
        if message.role == openai::ChatRole::Tool {
            if let Some(id) = &message.tool_call_id {
                pending_ids.retain(|pending| pending != id);
            }
            repaired.push(message);
            continue;
        }

        if !pending_ids.is_empty() {
            inject_interrupted_tool_messages(&mut repaired, &mut pending_ids);
        }

        if let Some(calls) = &message.tool_calls {
            pending_ids = calls.iter().map(|call| call.id.clone()).collect();
        }

        repaired.push(message);
    }

    if !pending_ids.is_empty() {
        inject_interrupted_tool_messages(&mut repaired, &mut pending_ids);
    }

    repaired
}

fn inject_interrupted_tool_messages(repaired: &mut Vec<openai::ChatMessage>, pending_ids: &mut Vec<String>) {
    for id in pending_ids.drain(..) {
        repaired.push(openai::ChatMessage {
            role: openai::ChatRole::Tool,
            content: Some(INTERRUPTED_TOOL_CALL_MESSAGE.to_string()),
            tool_calls: None,
            tool_call_id: Some(id),
        });
    }
}

impl From<unified::UnifiedTool> for openai::Tool {
    fn from(tool: unified::UnifiedTool) -> Self {
        Self {
            tool_type: openai::ToolCallType::Function,
            function: openai::FunctionDefinition {
                name: tool.function.name,
                description: tool.function.description,
                parameters: tool.function.parameters,
            },
        }
    }
}

impl From<unified::UnifiedToolChoiceMode> for openai::ToolChoiceMode {
    fn from(mode: unified::UnifiedToolChoiceMode) -> Self {
        match mode {
            unified::UnifiedToolChoiceMode::None => openai::ToolChoiceMode::None,
            unified::UnifiedToolChoiceMode::Auto => openai::ToolChoiceMode::Auto,
            unified::UnifiedToolChoiceMode::Required => openai::ToolChoiceMode::Required,
        }
    }
}

impl From<unified::UnifiedToolChoice> for openai::ToolChoice {
    fn from(choice: unified::UnifiedToolChoice) -> Self {
        match choice {
            unified::UnifiedToolChoice::Mode(mode) => openai::ToolChoice::Mode(openai::ToolChoiceMode::from(mode)),
            unified::UnifiedToolChoice::Specific { function } => openai::ToolChoice::Specific {
                tool_type: openai::ToolCallType::Function,
                function: openai::ToolChoiceFunction { name: function.name },
            },
        }
    }
}

impl From<unified::UnifiedResponse> for openai::ChatCompletionResponse {
    fn from(resp: unified::UnifiedResponse) -> Self {
        Self {
            id: resp.id,
            object: openai::ObjectType::ChatCompletion,
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|choice| openai::ChatChoice {
                    index: choice.index,
                    message: openai::ChatMessage::from(choice.message),
                    finish_reason: choice
                        .finish_reason
                        .map(openai::FinishReason::from)
                        .unwrap_or(openai::FinishReason::Stop),
                })
                .collect(),
            usage: openai::Usage {
                prompt_tokens: resp.usage.prompt_tokens,
                completion_tokens: resp.usage.completion_tokens,
                total_tokens: resp.usage.total_tokens,
            },
        }
    }
}

impl From<unified::UnifiedFinishReason> for openai::FinishReason {
    fn from(reason: unified::UnifiedFinishReason) -> Self {
        match reason {
            unified::UnifiedFinishReason::Stop => openai::FinishReason::Stop,
            unified::UnifiedFinishReason::Length => openai::FinishReason::Length,
            unified::UnifiedFinishReason::ContentFilter => openai::FinishReason::ContentFilter,
            unified::UnifiedFinishReason::ToolCalls => openai::FinishReason::ToolCalls,
        }
    }
}

impl From<unified::UnifiedStreamingToolCall> for openai::StreamingToolCall {
    fn from(call: unified::UnifiedStreamingToolCall) -> Self {
        match call {
            unified::UnifiedStreamingToolCall::Start { index, id, function } => openai::StreamingToolCall::Start {
                index,
                id,
                r#type: openai::ToolCallType::Function,
                function: openai::FunctionStart {
                    name: function.name,
                    arguments: function.arguments,
                },
            },
            unified::UnifiedStreamingToolCall::Delta { index, function } => openai::StreamingToolCall::Delta {
                index,
                function: openai::FunctionDelta {
                    arguments: function.arguments,
                },
            },
        }
    }
}

impl From<unified::UnifiedChunk> for openai::ChatCompletionChunk {
    fn from(chunk: unified::UnifiedChunk) -> Self {
        Self {
            id: chunk.id.into_owned(),
            object: openai::ObjectType::ChatCompletionChunk,
            created: chunk.created,
            model: chunk.model.into_owned(),
            system_fingerprint: None,
            choices: chunk
                .choices
                .into_iter()
                .map(|choice| openai::ChatChoiceDelta {
                    index: choice.index,
                    logprobs: None,
                    delta: openai::ChatMessageDelta {
                        role: choice.delta.role.map(openai::ChatRole::from),
                        content: choice.delta.content,
                        function_call: None,
                        tool_calls: choice
                            .delta
                            .tool_calls
                            .map(|calls| calls.into_iter().map(openai::StreamingToolCall::from).collect()),
                    },
                    finish_reason: choice.finish_reason.map(openai::FinishReason::from),
                })
                .collect(),
            usage: chunk.usage.map(|u| openai::Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        }
    }
}

impl From<unified::UnifiedModel> for openai::Model {
    fn from(model: unified::UnifiedModel) -> Self {
        Self {
            id: model.id,
            object: openai::ObjectType::Model,
            created: model.created,
            owned_by: model.owned_by,
        }
    }
}

impl From<unified::UnifiedModelsResponse> for openai::ModelsResponse {
    fn from(response: unified::UnifiedModelsResponse) -> Self {
        Self {
            object: openai::ObjectType::List,
            data: response.models.into_iter().map(openai::Model::from).collect(),
        }
    }
}
