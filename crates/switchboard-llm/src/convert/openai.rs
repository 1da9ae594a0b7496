//! Domain messages to `OpenAI` wire format, and stream chunks back to updates

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::parse_arguments;
use crate::error::LlmError;
use crate::protocol::openai::{
    OpenAiContent, OpenAiContentPart, OpenAiFunction, OpenAiFunctionCall, OpenAiImageUrl, OpenAiMessage, OpenAiRequest,
    OpenAiStreamChunk, OpenAiStreamError, OpenAiStreamToolCall, OpenAiTool, OpenAiToolCall,
};
use crate::types::{
    ChatRequest, DomainMessage, FinishReason, PartKind, Role, StreamUpdate, ToolCallContent, Usage,
};

// -- Outbound --

impl From<&ChatRequest> for OpenAiRequest {
    fn from(request: &ChatRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: to_wire_messages(&request.messages),
            temperature: request.options.temperature,
            top_p: request.options.top_p,
            max_tokens: request.options.max_output_tokens,
            stream: true,
            stream_options: None,
            tools: request
                .functions
                .iter()
                .map(|f| OpenAiTool {
                    tool_type: "function".to_owned(),
                    function: OpenAiFunction {
                        name: f.name.clone(),
                        description: f.description.clone(),
                        parameters: f.parameters.clone(),
                    },
                })
                .collect(),
        }
    }
}

const fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::Developer => "developer",
        Role::Assistant => "assistant",
        Role::User | Role::Unknown => "user",
    }
}

/// Convert conversation history, skipping host annotations
///
/// Tool results become one `tool` message each. Assistant tool calls are
/// carried in `tool_calls`. Image parts become data-URI image parts.
pub fn to_wire_messages(messages: &[DomainMessage]) -> Vec<OpenAiMessage> {
    let mut wire = Vec::with_capacity(messages.len());

    for message in messages.iter().filter(|m| m.is_conversational()) {
        for result in message.tool_results() {
            wire.push(OpenAiMessage {
                role: "tool".to_owned(),
                content: Some(OpenAiContent::Text(result.result)),
                tool_calls: Vec::new(),
                tool_call_id: Some(result.call_id),
            });
        }

        let tool_calls: Vec<_> = message
            .tool_calls()
            .map(|call| OpenAiToolCall {
                function: OpenAiFunctionCall {
                    name: call.function_name.clone(),
                    arguments: call.arguments_json(),
                },
                id: call.call_id,
                tool_type: "function".to_owned(),
            })
            .collect();

        let content = message_content(message);

        if content.is_none() && tool_calls.is_empty() {
            continue;
        }

        wire.push(OpenAiMessage {
            role: wire_role(message.role).to_owned(),
            content,
            tool_calls,
            tool_call_id: None,
        });
    }

    wire
}

fn message_content(message: &DomainMessage) -> Option<OpenAiContent> {
    let text = message.full_text();
    let images: Vec<_> = message
        .parts
        .iter()
        .filter(|p| p.kind == PartKind::Image)
        .map(|p| OpenAiContentPart::ImageUrl {
            image_url: OpenAiImageUrl {
                url: format!("data:{};base64,{}", p.name, STANDARD.encode(&p.data)),
            },
        })
        .collect();

    if images.is_empty() {
        return (!text.is_empty()).then_some(OpenAiContent::Text(text));
    }

    let mut parts = Vec::with_capacity(images.len() + 1);
    if !text.is_empty() {
        parts.push(OpenAiContentPart::Text { text });
    }
    parts.extend(images);

    Some(OpenAiContent::Parts(parts))
}

// -- Inbound --

/// Collects tool call fragments until the response says they are complete
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: BTreeMap<u32, PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAssembler {
    /// Merge one fragment into the call at its index
    pub fn push(&mut self, fragment: &OpenAiStreamToolCall) {
        let call = self.calls.entry(fragment.index).or_default();

        if let Some(id) = fragment.id.as_deref().filter(|id| !id.is_empty()) {
            id.clone_into(&mut call.id);
        }

        if let Some(function) = &fragment.function {
            if let Some(name) = function.name.as_deref().filter(|n| !n.is_empty()) {
                name.clone_into(&mut call.name);
            }
            if let Some(arguments) = &function.arguments {
                call.arguments.push_str(arguments);
            }
        }
    }

    /// Take every assembled call, in index order
    pub fn drain(&mut self) -> Vec<ToolCallContent> {
        std::mem::take(&mut self.calls)
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| ToolCallContent {
                arguments: parse_arguments(&call.arguments),
                call_id: call.id,
                function_name: call.name,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Map a wire finish reason
pub fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

/// Convert one chunk into canonical updates
///
/// Tool calls are only emitted once a finish reason arrives (or via
/// [`ToolCallAssembler::drain`] at end of stream).
pub fn chunk_to_updates(chunk: &OpenAiStreamChunk, assembler: &mut ToolCallAssembler) -> Vec<StreamUpdate> {
    let mut updates = Vec::new();

    for choice in &chunk.choices {
        let delta = &choice.delta;

        if let Some(reasoning) = delta.reasoning_content.as_ref().filter(|r| !r.is_empty()) {
            updates.push(StreamUpdate::Reasoning(reasoning.clone()));
        }

        if let Some(text) = delta.content.as_ref().filter(|t| !t.is_empty()) {
            updates.push(StreamUpdate::Text(text.clone()));
        }

        for fragment in delta.tool_calls.iter().flatten() {
            assembler.push(fragment);
        }

        if let Some(reason) = &choice.finish_reason {
            updates.extend(assembler.drain().into_iter().map(StreamUpdate::ToolCall));
            updates.push(StreamUpdate::Finish(finish_reason(reason)));
        }
    }

    if let Some(usage) = chunk.usage {
        updates.push(StreamUpdate::Usage(Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }));
    }

    updates
}

/// Message for an in-band stream error
fn stream_error_message(error: &OpenAiStreamError) -> String {
    match &error.error_type {
        Some(kind) => format!("{kind}: {}", error.message),
        None => error.message.clone(),
    }
}

/// Decodes the SSE event payloads of one chat completion stream
///
/// Owns the tool call assembler for the response. A stream is complete once
/// `[DONE]` or a finish reason has been seen; [`finish`](Self::finish) reports
/// a transport failure for streams that end before that.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    assembler: ToolCallAssembler,
    completed: bool,
}

impl StreamDecoder {
    /// Decode one event payload
    pub fn decode(&mut self, data: &str) -> Vec<Result<StreamUpdate, LlmError>> {
        let data = data.trim();
        if data.is_empty() {
            return Vec::new();
        }

        if data == "[DONE]" {
            self.completed = true;
            return self.drain_calls();
        }

        let chunk = match serde_json::from_str::<OpenAiStreamChunk>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, data = %data, "malformed SSE chunk");
                return vec![Err(LlmError::Streaming(format!("malformed stream chunk: {e}")))];
            }
        };

        if let Some(error) = &chunk.error {
            let message = stream_error_message(error);
            tracing::warn!(error = %message, "provider reported an error mid-stream");
            return vec![Err(LlmError::Streaming(message))];
        }

        let updates = chunk_to_updates(&chunk, &mut self.assembler);
        if updates.iter().any(|u| matches!(u, StreamUpdate::Finish(_))) {
            self.completed = true;
        }

        updates.into_iter().map(Ok).collect()
    }

    /// Flush at end of stream
    ///
    /// Calls still being assembled are emitted before the truncation error.
    pub fn finish(&mut self) -> Vec<Result<StreamUpdate, LlmError>> {
        let mut updates = self.drain_calls();

        if !self.completed {
            tracing::warn!(pending_calls = updates.len(), "stream ended before [DONE]");
            updates.push(Err(LlmError::Streaming("stream ended before [DONE]".to_owned())));
        }

        updates
    }

    fn drain_calls(&mut self) -> Vec<Result<StreamUpdate, LlmError>> {
        self.assembler.drain().into_iter().map(|call| Ok(StreamUpdate::ToolCall(call))).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{BinaryPart, FunctionDefinition, RequestOptions, ToolResultContent};

    fn chunk(raw: serde_json::Value) -> OpenAiStreamChunk {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn request_carries_sampling_and_tools() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_owned(),
            messages: vec![DomainMessage::system("Be brief."), DomainMessage::user("Weather?")],
            functions: vec![FunctionDefinition {
                name: "get_weather".to_owned(),
                description: "Current weather".to_owned(),
                parameters: json!({"type": "object"}),
            }],
            options: RequestOptions {
                temperature: None,
                top_p: None,
                top_k: Some(5),
                max_output_tokens: Some(256),
            },
        };

        let wire = OpenAiRequest::from(&request);

        insta::assert_json_snapshot!(wire, @r#"
        {
          "model": "gpt-4o-mini",
          "messages": [
            {
              "role": "system",
              "content": "Be brief."
            },
            {
              "role": "user",
              "content": "Weather?"
            }
          ],
          "max_tokens": 256,
          "stream": true,
          "tools": [
            {
              "type": "function",
              "function": {
                "name": "get_weather",
                "description": "Current weather",
                "parameters": {
                  "type": "object"
                }
              }
            }
          ]
        }
        "#);
    }

    #[test]
    fn tool_history_maps_to_tool_calls_and_tool_messages() {
        let call = ToolCallContent {
            call_id: "call_1".to_owned(),
            function_name: "add".to_owned(),
            arguments: json!({"a": 1, "b": 2}),
        };
        let history = vec![
            DomainMessage::user("1+2?"),
            DomainMessage::with_parts(Role::Assistant, vec![BinaryPart::tool_call(&call)]),
            DomainMessage::with_parts(
                Role::User,
                vec![BinaryPart::tool_result(&ToolResultContent {
                    call_id: "call_1".to_owned(),
                    result: "3".to_owned(),
                })],
            ),
            DomainMessage::information("not for the model"),
        ];

        let wire = to_wire_messages(&history);

        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1].role, "assistant");
        assert!(wire[1].content.is_none());
        assert_eq!(wire[1].tool_calls[0].id, "call_1");
        assert_eq!(wire[1].tool_calls[0].function.arguments, r#"{"a":1,"b":2}"#);
        assert_eq!(wire[2].role, "tool");
        assert_eq!(wire[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn images_become_data_uris() {
        let message = DomainMessage::user("What is this?").with_part(BinaryPart::new("image/png", PartKind::Image, vec![1, 2, 3]));

        let wire = to_wire_messages(&[message]);
        let Some(OpenAiContent::Parts(parts)) = &wire[0].content else {
            panic!("expected content parts");
        };

        assert!(matches!(&parts[0], OpenAiContentPart::Text { text } if text == "What is this?"));
        assert!(matches!(&parts[1], OpenAiContentPart::ImageUrl { image_url } if image_url.url == "data:image/png;base64,AQID"));
    }

    #[test]
    fn developer_role_is_preserved() {
        let wire = to_wire_messages(&[DomainMessage::text(Role::Developer, "Use tools.")]);
        assert_eq!(wire[0].role, "developer");
    }

    #[test]
    fn fragmented_tool_call_is_assembled_on_finish() {
        let mut assembler = ToolCallAssembler::default();

        let first = chunk_to_updates(
            &chunk(json!({
                "choices": [{"index": 0, "delta": {"tool_calls": [
                    {"index": 0, "id": "call_9", "type": "function", "function": {"name": "get_weather", "arguments": "{\"loc"}}
                ]}}]
            })),
            &mut assembler,
        );
        assert!(first.is_empty());

        let second = chunk_to_updates(
            &chunk(json!({
                "choices": [{"index": 0, "delta": {"tool_calls": [
                    {"index": 0, "function": {"arguments": "ation\": \"Paris\"}"}}
                ]}, "finish_reason": "tool_calls"}]
            })),
            &mut assembler,
        );

        assert_eq!(
            second,
            [
                StreamUpdate::ToolCall(ToolCallContent {
                    call_id: "call_9".to_owned(),
                    function_name: "get_weather".to_owned(),
                    arguments: json!({"location": "Paris"}),
                }),
                StreamUpdate::Finish(FinishReason::ToolCalls),
            ]
        );
        assert!(assembler.is_empty());
    }

    #[test]
    fn text_reasoning_and_usage_chunks() {
        let mut assembler = ToolCallAssembler::default();

        let updates = chunk_to_updates(
            &chunk(json!({
                "choices": [{"index": 0, "delta": {"reasoning_content": "think", "content": "Hi"}}]
            })),
            &mut assembler,
        );
        assert_eq!(
            updates,
            [StreamUpdate::Reasoning("think".to_owned()), StreamUpdate::Text("Hi".to_owned())]
        );

        let usage = chunk_to_updates(
            &chunk(json!({
                "choices": [],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            })),
            &mut assembler,
        );
        assert_eq!(
            usage,
            [StreamUpdate::Usage(Usage {
                input_tokens: 12,
                output_tokens: 3,
                total_tokens: 15
            })]
        );
    }

    #[test]
    fn unknown_finish_reason_maps_to_other() {
        assert_eq!(finish_reason("stop"), FinishReason::Stop);
        assert_eq!(finish_reason("eos"), FinishReason::Other);
    }

    #[test]
    fn error_chunk_fails_the_stream() {
        let mut decoder = StreamDecoder::default();

        let text = decoder.decode(r#"{"choices": [{"index": 0, "delta": {"content": "partial"}}]}"#);
        assert!(matches!(&text[..], [Ok(StreamUpdate::Text(t))] if t == "partial"));

        let failed = decoder.decode(r#"{"error": {"message": "The server had an error", "type": "server_error"}}"#);
        assert!(matches!(
            &failed[..],
            [Err(LlmError::Streaming(message))] if message == "server_error: The server had an error"
        ));
    }

    #[test]
    fn malformed_chunk_fails_the_stream() {
        let mut decoder = StreamDecoder::default();

        let failed = decoder.decode("{\"choices\": [");

        assert!(matches!(&failed[..], [Err(LlmError::Streaming(message))] if message.starts_with("malformed stream chunk")));
    }

    #[test]
    fn unterminated_stream_flushes_pending_calls() {
        let mut decoder = StreamDecoder::default();

        let updates = decoder.decode(
            r#"{"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "id": "call_1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}}
            ]}}]}"#,
        );
        assert!(updates.is_empty());

        let flushed = decoder.finish();
        assert_eq!(flushed.len(), 2);
        assert!(matches!(
            &flushed[0],
            Ok(StreamUpdate::ToolCall(call)) if call.call_id == "call_1" && call.arguments == json!({"city": "Oslo"})
        ));
        assert!(matches!(&flushed[1], Err(e) if e.is_transport()));
    }

    #[test]
    fn done_marker_completes_the_stream() {
        let mut decoder = StreamDecoder::default();

        decoder.decode(r#"{"choices": [{"index": 0, "delta": {"content": "Hi"}}]}"#);
        assert!(decoder.decode("[DONE]").is_empty());
        assert!(decoder.finish().is_empty());

        let mut finished = StreamDecoder::default();
        finished.decode(r#"{"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}"#);
        assert!(finished.finish().is_empty());
    }
}
