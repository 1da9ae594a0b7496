//! Domain messages to Google wire format, and stream chunks back to updates

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::LlmError;
use crate::protocol::google::{
    GoogleContent, GoogleFunctionCall, GoogleFunctionDeclaration, GoogleFunctionResponse, GoogleGenerationConfig,
    GoogleInlineData, GooglePart, GoogleRequest, GoogleStreamChunk, GoogleStreamError, GoogleTool,
};
use crate::types::{ChatRequest, DomainMessage, FinishReason, PartKind, Role, StreamUpdate, ToolCallContent, Usage};

// -- Outbound --

impl From<&ChatRequest> for GoogleRequest {
    fn from(request: &ChatRequest) -> Self {
        let options = &request.options;
        let generation_config = (options.temperature.is_some()
            || options.top_p.is_some()
            || options.top_k.is_some()
            || options.max_output_tokens.is_some())
        .then_some(GoogleGenerationConfig {
            temperature: options.temperature,
            top_p: options.top_p,
            top_k: options.top_k,
            max_output_tokens: options.max_output_tokens,
        });

        let tools = if request.functions.is_empty() {
            Vec::new()
        } else {
            vec![GoogleTool {
                function_declarations: request
                    .functions
                    .iter()
                    .map(|f| GoogleFunctionDeclaration {
                        name: f.name.clone(),
                        description: f.description.clone(),
                        parameters: f.parameters.clone(),
                    })
                    .collect(),
            }]
        };

        let (system_instruction, contents) = to_wire_contents(&request.messages);

        Self {
            contents,
            system_instruction,
            generation_config,
            tools,
        }
    }
}

/// Split history into a system instruction and alternating contents
///
/// System and developer messages are folded into the instruction. Function
/// responses are named after the call they answer, found by id in the
/// earlier assistant tool calls.
pub fn to_wire_contents(messages: &[DomainMessage]) -> (Option<GoogleContent>, Vec<GoogleContent>) {
    let mut instruction = Vec::new();
    let mut contents = Vec::new();
    let mut call_names: HashMap<String, String> = HashMap::new();

    for message in messages.iter().filter(|m| m.is_conversational()) {
        if matches!(message.role, Role::System | Role::Developer) {
            let text = message.full_text();
            if !text.is_empty() {
                instruction.push(GooglePart::text(text));
            }
            continue;
        }

        let mut parts = Vec::new();

        let text = message.full_text();
        if !text.is_empty() {
            parts.push(GooglePart::text(text));
        }

        for part in message.parts.iter().filter(|p| p.kind == PartKind::Image) {
            parts.push(GooglePart {
                inline_data: Some(GoogleInlineData {
                    mime_type: part.name.clone(),
                    data: STANDARD.encode(&part.data),
                }),
                ..GooglePart::default()
            });
        }

        for call in message.tool_calls() {
            call_names.insert(call.call_id.clone(), call.function_name.clone());
            parts.push(GooglePart {
                function_call: Some(GoogleFunctionCall {
                    id: Some(call.call_id),
                    name: call.function_name,
                    args: object_args(call.arguments),
                }),
                ..GooglePart::default()
            });
        }

        for result in message.tool_results() {
            let name = call_names
                .get(&result.call_id)
                .cloned()
                .unwrap_or_else(|| result.call_id.clone());

            parts.push(GooglePart {
                function_response: Some(GoogleFunctionResponse {
                    id: Some(result.call_id),
                    name,
                    response: json!({ "result": result_value(&result.result) }),
                }),
                ..GooglePart::default()
            });
        }

        if parts.is_empty() {
            continue;
        }

        let role = if message.role == Role::Assistant { "model" } else { "user" };
        contents.push(GoogleContent {
            role: Some(role.to_owned()),
            parts,
        });
    }

    let instruction = (!instruction.is_empty()).then_some(GoogleContent {
        role: None,
        parts: instruction,
    });

    (instruction, contents)
}

fn object_args(arguments: Value) -> Value {
    match arguments {
        Value::Object(_) => arguments,
        Value::Null => json!({}),
        other => json!({ "raw": other }),
    }
}

fn result_value(result: &str) -> Value {
    serde_json::from_str(result).unwrap_or_else(|_| Value::String(result.to_owned()))
}

// -- Inbound --

/// Map a wire finish reason
pub fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

/// Convert one chunk into canonical updates
///
/// Only the first candidate is read. Usage is reported once, on the chunk
/// that carries the finish reason.
pub fn chunk_to_updates(chunk: &GoogleStreamChunk) -> Vec<StreamUpdate> {
    let mut updates = Vec::new();

    let Some(candidate) = chunk.candidates.first() else {
        return updates;
    };

    for part in &candidate.content.parts {
        if let Some(text) = part.text.as_ref().filter(|t| !t.is_empty()) {
            if part.thought == Some(true) {
                updates.push(StreamUpdate::Reasoning(text.clone()));
            } else {
                updates.push(StreamUpdate::Text(text.clone()));
            }
        }

        if let Some(call) = &part.function_call {
            updates.push(StreamUpdate::ToolCall(ToolCallContent {
                call_id: call
                    .id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple())),
                function_name: call.name.clone(),
                arguments: if call.args.is_null() { json!({}) } else { call.args.clone() },
            }));
        }
    }

    if let Some(reason) = &candidate.finish_reason {
        if let Some(usage) = chunk.usage_metadata {
            updates.push(StreamUpdate::Usage(Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            }));
        }
        updates.push(StreamUpdate::Finish(finish_reason(reason)));
    }

    updates
}

/// Message for an in-band `google.rpc.Status`
fn stream_error_message(error: &GoogleStreamError) -> String {
    match (&error.status, error.code) {
        (Some(status), Some(code)) => format!("{status} ({code}): {}", error.message),
        (Some(status), None) => format!("{status}: {}", error.message),
        (None, _) => error.message.clone(),
    }
}

/// Decode one SSE event payload of a `streamGenerateContent` response
pub fn decode_event(data: &str) -> Vec<Result<StreamUpdate, LlmError>> {
    let data = data.trim();
    if data.is_empty() {
        return Vec::new();
    }

    let chunk = match serde_json::from_str::<GoogleStreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, data = %data, "malformed Google SSE chunk");
            return vec![Err(LlmError::Streaming(format!("malformed stream chunk: {e}")))];
        }
    };

    if let Some(error) = &chunk.error {
        let message = stream_error_message(error);
        tracing::warn!(error = %message, "provider reported an error mid-stream");
        return vec![Err(LlmError::Streaming(message))];
    }

    chunk_to_updates(&chunk).into_iter().map(Ok).collect()
}
