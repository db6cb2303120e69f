//! Streaming state machine translating OpenAI-shaped chunks into an Anthropic SSE event sequence.
//!
//! An upstream OpenAI-style stream delivers one chunk per delta, each containing at most one
//! choice. Anthropic's wire format instead wants a fully bracketed sequence of block-scoped
//! events (`content_block_start` … `content_block_delta`* … `content_block_stop`). This module
//! holds the bookkeeping needed to produce that sequence incrementally, one chunk at a time.

use std::collections::HashMap;

use crate::anthropic::{
    AnthropicContent, AnthropicContentDelta, AnthropicErrorDetails, AnthropicMessageDelta, AnthropicRole,
    AnthropicStopReason, AnthropicStreamEvent, AnthropicStreamMessageStart, AnthropicUsage,
};
use crate::tool_name::ToolNameMap;
use crate::unified::{UnifiedChunk, UnifiedFinishReason, UnifiedStreamingToolCall, UnifiedUsage};

#[derive(Debug, Clone, Copy, PartialEq)]
enum OpenBlock {
    Text,
    Tool { openai_index: usize },
}

/// Per-request streaming translation state.
///
/// Must be driven with chunks in arrival order; reused across the lifetime of a single
/// streamed response and discarded afterward.
#[derive(Debug)]
pub struct StreamTranslator {
    message_id: String,
    message_start_emitted: bool,
    current_block_index: u32,
    open_block: Option<OpenBlock>,
    tool_block_index_by_openai_index: HashMap<usize, u32>,
    pending_model_name: Option<String>,
    last_usage: UnifiedUsage,
    stream_closed: bool,
}

impl StreamTranslator {
    /// Creates a new translator. `message_id` becomes the Anthropic message's `id`.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            message_start_emitted: false,
            current_block_index: 0,
            open_block: None,
            tool_block_index_by_openai_index: HashMap::new(),
            pending_model_name: None,
            last_usage: UnifiedUsage {
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
            },
            stream_closed: false,
        }
    }

    /// Processes one upstream chunk, returning the Anthropic events it produces.
    ///
    /// `tool_names` restores original (pre-truncation) tool names on the way out.
    pub fn process_chunk(&mut self, chunk: UnifiedChunk, tool_names: &ToolNameMap) -> Vec<AnthropicStreamEvent> {
        if !chunk.model.is_empty() && self.pending_model_name.is_none() {
            self.pending_model_name = Some(chunk.model.clone().into_owned());
        }
        if let Some(usage) = &chunk.usage {
            self.last_usage = usage.clone();
        }

        let mut events = Vec::new();

        let Some(choice) = chunk.choices.into_iter().next() else {
            return events;
        };

        if !self.message_start_emitted {
            events.push(self.message_start_event());
            self.message_start_emitted = true;
        }

        if let Some(text) = choice.delta.content {
            self.close_tool_block_if_open(&mut events);
            self.open_text_block_if_needed(&mut events);
            events.push(AnthropicStreamEvent::ContentBlockDelta {
                index: self.current_block_index,
                delta: AnthropicContentDelta::TextDelta { text },
            });
        }

        if let Some(tool_calls) = choice.delta.tool_calls {
            for call in tool_calls {
                self.apply_tool_call_delta(call, tool_names, &mut events);
            }
        }

        if let Some(finish_reason) = choice.finish_reason {
            self.close_open_block(&mut events);
            events.push(AnthropicStreamEvent::MessageDelta {
                delta: AnthropicMessageDelta {
                    stop_reason: Some(map_stop_reason(finish_reason)),
                    stop_sequence: None,
                },
                usage: to_anthropic_usage(&self.last_usage),
            });
            events.push(AnthropicStreamEvent::MessageStop);
            self.stream_closed = true;
        }

        events
    }

    /// Closes out the stream when the upstream ended without ever sending a `finish_reason`.
    ///
    /// Idempotent: a no-op if `process_chunk` already closed the stream normally.
    pub fn finish(&mut self) -> Vec<AnthropicStreamEvent> {
        if self.stream_closed {
            return Vec::new();
        }
        self.stream_closed = true;

        let mut events = Vec::new();
        if !self.message_start_emitted {
            events.push(self.message_start_event());
            self.message_start_emitted = true;
        }
        self.close_open_block(&mut events);
        events.push(AnthropicStreamEvent::MessageDelta {
            delta: AnthropicMessageDelta {
                stop_reason: Some(AnthropicStopReason::EndTurn),
                stop_sequence: None,
            },
            usage: to_anthropic_usage(&self.last_usage),
        });
        events.push(AnthropicStreamEvent::MessageStop);
        events
    }

    /// Produces a single `error` event, terminating the stream without a `message_stop`.
    pub fn error_event(message: impl Into<String>) -> AnthropicStreamEvent {
        AnthropicStreamEvent::Error {
            error: AnthropicErrorDetails {
                error_type: "api_error".to_string(),
                message: message.into(),
            },
        }
    }

    fn message_start_event(&self) -> AnthropicStreamEvent {
        AnthropicStreamEvent::MessageStart {
            message: AnthropicStreamMessageStart {
                id: self.message_id.clone(),
                message_type: "message".to_string(),
                role: AnthropicRole::Assistant,
                content: vec![],
                model: self.pending_model_name.clone().unwrap_or_default(),
                usage: to_anthropic_usage(&self.last_usage),
            },
        }
    }

    fn open_text_block_if_needed(&mut self, events: &mut Vec<AnthropicStreamEvent>) {
        if self.open_block == Some(OpenBlock::Text) {
            return;
        }
        events.push(AnthropicStreamEvent::ContentBlockStart {
            index: self.current_block_index,
            content_block: AnthropicContent::Text { text: String::new() },
        });
        self.open_block = Some(OpenBlock::Text);
    }

    fn close_tool_block_if_open(&mut self, events: &mut Vec<AnthropicStreamEvent>) {
        if matches!(self.open_block, Some(OpenBlock::Tool { .. })) {
            self.close_open_block(events);
        }
    }

    fn close_open_block(&mut self, events: &mut Vec<AnthropicStreamEvent>) {
        if self.open_block.is_some() {
            events.push(AnthropicStreamEvent::ContentBlockStop {
                index: self.current_block_index,
            });
            self.current_block_index += 1;
            self.open_block = None;
        }
    }

    fn apply_tool_call_delta(
        &mut self,
        call: UnifiedStreamingToolCall,
        tool_names: &ToolNameMap,
        events: &mut Vec<AnthropicStreamEvent>,
    ) {
        match call {
            UnifiedStreamingToolCall::Start { index, id, function } => {
                if self.open_block.is_some() && self.open_block != Some(OpenBlock::Tool { openai_index: index }) {
                    self.close_open_block(events);
                }

                let block_index = self.current_block_index;
                self.tool_block_index_by_openai_index.insert(index, block_index);
                self.open_block = Some(OpenBlock::Tool { openai_index: index });

                events.push(AnthropicStreamEvent::ContentBlockStart {
                    index: block_index,
                    content_block: AnthropicContent::ToolUse {
                        id,
                        name: tool_names.from_upstream(&function.name),
                        input: serde_json::Value::Object(serde_json::Map::new()),
                    },
                });
            }
            UnifiedStreamingToolCall::Delta { index, function } => {
                if let Some(&block_index) = self.tool_block_index_by_openai_index.get(&index) {
                    events.push(AnthropicStreamEvent::ContentBlockDelta {
                        index: block_index,
                        delta: AnthropicContentDelta::InputJsonDelta {
                            partial_json: function.arguments,
                        },
                    });
                }
            }
        }
    }
}

fn map_stop_reason(reason: UnifiedFinishReason) -> AnthropicStopReason {
    match reason {
        UnifiedFinishReason::Stop => AnthropicStopReason::EndTurn,
        UnifiedFinishReason::Length => AnthropicStopReason::MaxTokens,
        UnifiedFinishReason::ToolCalls => AnthropicStopReason::ToolUse,
        UnifiedFinishReason::ContentFilter => AnthropicStopReason::EndTurn,
    }
}

fn to_anthropic_usage(usage: &UnifiedUsage) -> AnthropicUsage {
    AnthropicUsage {
        input_tokens: usage.prompt_tokens as i32,
        output_tokens: usage.completion_tokens as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unified::{UnifiedChoiceDelta, UnifiedFunctionDelta, UnifiedFunctionStart, UnifiedMessageDelta};
    use std::borrow::Cow;

    fn chunk(choices: Vec<UnifiedChoiceDelta>) -> UnifiedChunk {
        UnifiedChunk {
            id: Cow::Borrowed("chunk"),
            model: Cow::Borrowed("gpt-4o"),
            choices,
            usage: None,
            created: 0,
        }
    }

    #[test]
    fn text_only_stream_brackets_a_single_block() {
        let mut translator = StreamTranslator::new("msg_1");
        let tool_names = ToolNameMap::new();

        let first = translator.process_chunk(
            chunk(vec![UnifiedChoiceDelta {
                index: 0,
                delta: UnifiedMessageDelta {
                    role: None,
                    content: Some("Hello".to_string()),
                    tool_calls: None,
                },
                finish_reason: None,
            }]),
            &tool_names,
        );
        assert!(matches!(first[0], AnthropicStreamEvent::MessageStart { .. }));
        assert!(matches!(first[1], AnthropicStreamEvent::ContentBlockStart { index: 0, .. }));
        assert!(matches!(first[2], AnthropicStreamEvent::ContentBlockDelta { index: 0, .. }));

        let last = translator.process_chunk(
            chunk(vec![UnifiedChoiceDelta {
                index: 0,
                delta: UnifiedMessageDelta {
                    role: None,
                    content: None,
                    tool_calls: None,
                },
                finish_reason: Some(UnifiedFinishReason::Stop),
            }]),
            &tool_names,
        );
        assert!(matches!(last[0], AnthropicStreamEvent::ContentBlockStop { index: 0 }));
        assert!(matches!(last[1], AnthropicStreamEvent::MessageDelta { .. }));
        assert!(matches!(last[2], AnthropicStreamEvent::MessageStop));
    }

    #[test]
    fn tool_call_opens_new_block_after_closing_text() {
        let mut translator = StreamTranslator::new("msg_2");
        let tool_names = ToolNameMap::new();

        translator.process_chunk(
            chunk(vec![UnifiedChoiceDelta {
                index: 0,
                delta: UnifiedMessageDelta {
                    role: None,
                    content: Some("thinking...".to_string()),
                    tool_calls: None,
                },
                finish_reason: None,
            }]),
            &tool_names,
        );

        let events = translator.process_chunk(
            chunk(vec![UnifiedChoiceDelta {
                index: 0,
                delta: UnifiedMessageDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![UnifiedStreamingToolCall::Start {
                        index: 0,
                        id: "call_1".to_string(),
                        function: UnifiedFunctionStart {
                            name: "get_weather".to_string(),
                            arguments: String::new(),
                        },
                    }]),
                },
                finish_reason: None,
            }]),
            &tool_names,
        );

        assert!(matches!(events[0], AnthropicStreamEvent::ContentBlockStop { index: 0 }));
        assert!(matches!(events[1], AnthropicStreamEvent::ContentBlockStart { index: 1, .. }));

        let delta_events = translator.process_chunk(
            chunk(vec![UnifiedChoiceDelta {
                index: 0,
                delta: UnifiedMessageDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![UnifiedStreamingToolCall::Delta {
                        index: 0,
                        function: UnifiedFunctionDelta {
                            arguments: "{\"location\":".to_string(),
                        },
                    }]),
                },
                finish_reason: None,
            }]),
            &tool_names,
        );
        assert!(matches!(
            delta_events[0],
            AnthropicStreamEvent::ContentBlockDelta { index: 1, .. }
        ));
    }
}
