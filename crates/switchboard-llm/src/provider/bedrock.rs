//! AWS Bedrock backend using the `ConverseStream` API

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ContentBlockDelta, ContentBlockStart, ConversationRole, ConverseStreamOutput, ImageBlock,
    ImageFormat, ImageSource, InferenceConfiguration, Message as BedrockMessage, StopReason, SystemContentBlock, Tool,
    ToolConfiguration, ToolInputSchema, ToolResultBlock, ToolResultContentBlock, ToolSpecification, ToolUseBlock,
};
use aws_smithy_types::{Blob, Document, Number};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use switchboard_config::BedrockConfig;
use tokio::sync::OnceCell;

use super::{BackendCapabilities, ChatBackend};
use crate::convert::parse_arguments;
use crate::error::LlmError;
use crate::types::{
    ChatRequest, DomainMessage, FinishReason, FunctionDefinition, PartKind, RequestOptions, Role, StreamUpdate,
    ToolCallContent, UpdateStream, Usage,
};

/// AWS Bedrock backend
///
/// The SDK client is built on first use and then reused by this backend only.
pub struct BedrockBackend {
    name: String,
    config: BedrockConfig,
    client: OnceCell<BedrockClient>,
}

impl BedrockBackend {
    pub fn new(name: &str, config: BedrockConfig) -> Self {
        Self {
            name: name.to_owned(),
            config,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &BedrockClient {
        self.client.get_or_init(|| build_client(&self.config)).await
    }
}

/// Build a Bedrock runtime client, preferring explicit keys over the default chain
async fn build_client(config: &BedrockConfig) -> BedrockClient {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.region.clone()));

    if let (Some(access_key), Some(secret_key)) = (&config.access_key_id, &config.secret_access_key) {
        let credentials = aws_credential_types::Credentials::new(
            access_key.expose_secret(),
            secret_key.expose_secret(),
            None,
            None,
            "switchboard-config",
        );
        loader = loader.credentials_provider(credentials);
    }

    BedrockClient::new(&loader.load().await)
}

#[async_trait]
impl ChatBackend for BedrockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            top_k: false,
            tool_calling: true,
        }
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<UpdateStream, LlmError> {
        let (system, messages) = build_converse_input(&request.messages)?;

        let mut converse = self
            .client()
            .await
            .converse_stream()
            .model_id(&request.model)
            .set_system((!system.is_empty()).then_some(system))
            .set_messages(Some(messages))
            .inference_config(build_inference_config(&request.options));

        if let Some(tool_config) = build_tool_config(&request.functions)? {
            converse = converse.tool_config(tool_config);
        }

        let output = converse.send().await.map_err(|e| {
            tracing::error!(provider = %self.name, error = %e, "bedrock converse_stream failed");
            LlmError::Upstream(e.to_string())
        })?;

        let state = Some((output.stream, HashMap::<i32, PendingToolUse>::new()));

        let updates = futures_util::stream::unfold(state, |state| async move {
            let (mut receiver, mut pending) = state?;

            loop {
                let event = match receiver.recv().await {
                    Ok(Some(event)) => event,
                    Ok(None) => return None,
                    Err(e) => return Some((Err(LlmError::Streaming(e.to_string())), None)),
                };

                let update = match event {
                    ConverseStreamOutput::ContentBlockStart(start) => {
                        if let Some(ContentBlockStart::ToolUse(tool)) = start.start() {
                            pending.insert(
                                start.content_block_index(),
                                PendingToolUse {
                                    id: tool.tool_use_id().to_owned(),
                                    name: tool.name().to_owned(),
                                    input: String::new(),
                                },
                            );
                        }
                        None
                    }
                    ConverseStreamOutput::ContentBlockDelta(delta) => match delta.delta() {
                        Some(ContentBlockDelta::Text(text)) => Some(StreamUpdate::Text(text.clone())),
                        Some(ContentBlockDelta::ToolUse(tool)) => {
                            if let Some(call) = pending.get_mut(&delta.content_block_index()) {
                                call.input.push_str(tool.input());
                            }
                            None
                        }
                        _ => None,
                    },
                    ConverseStreamOutput::ContentBlockStop(stop) => pending
                        .remove(&stop.content_block_index())
                        .map(|call| StreamUpdate::ToolCall(call.into_content())),
                    ConverseStreamOutput::MessageStop(stop) => {
                        Some(StreamUpdate::Finish(finish_reason(stop.stop_reason())))
                    }
                    ConverseStreamOutput::Metadata(meta) => meta.usage().map(|u| {
                        StreamUpdate::Usage(Usage {
                            input_tokens: u32::try_from(u.input_tokens()).unwrap_or_default(),
                            output_tokens: u32::try_from(u.output_tokens()).unwrap_or_default(),
                            total_tokens: u32::try_from(u.total_tokens()).unwrap_or_default(),
                        })
                    }),
                    _ => None,
                };

                if let Some(update) = update {
                    return Some((Ok(update), Some((receiver, pending))));
                }
            }
        });

        Ok(Box::pin(updates))
    }
}

/// Tool use block still receiving input fragments
struct PendingToolUse {
    id: String,
    name: String,
    input: String,
}

impl PendingToolUse {
    fn into_content(self) -> ToolCallContent {
        ToolCallContent {
            call_id: self.id,
            function_name: self.name,
            arguments: parse_arguments(&self.input),
        }
    }
}

fn finish_reason(reason: &StopReason) -> FinishReason {
    match reason {
        StopReason::EndTurn | StopReason::StopSequence => FinishReason::Stop,
        StopReason::MaxTokens => FinishReason::Length,
        StopReason::ToolUse => FinishReason::ToolCalls,
        StopReason::ContentFiltered | StopReason::GuardrailIntervened => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn build_inference_config(options: &RequestOptions) -> InferenceConfiguration {
    InferenceConfiguration::builder()
        .set_temperature(options.temperature.map(|t| t as f32))
        .set_top_p(options.top_p.map(|p| p as f32))
        .set_max_tokens(options.max_output_tokens.and_then(|m| i32::try_from(m).ok()))
        .build()
}

fn build_tool_config(functions: &[FunctionDefinition]) -> Result<Option<ToolConfiguration>, LlmError> {
    if functions.is_empty() {
        return Ok(None);
    }

    let mut config = ToolConfiguration::builder();

    for function in functions {
        let mut spec = ToolSpecification::builder()
            .name(&function.name)
            .input_schema(ToolInputSchema::Json(value_to_document(&function.parameters)));

        if !function.description.is_empty() {
            spec = spec.description(&function.description);
        }

        let spec = spec
            .build()
            .map_err(|e| LlmError::InvalidArgument(format!("invalid tool specification: {e}")))?;
        config = config.tools(Tool::ToolSpec(spec));
    }

    config
        .build()
        .map(Some)
        .map_err(|e| LlmError::InvalidArgument(format!("invalid tool configuration: {e}")))
}

/// Split history into system blocks and Converse messages
///
/// Converse requires alternating roles, so consecutive messages with the
/// same role are merged. Tool results travel as user content.
fn build_converse_input(messages: &[DomainMessage]) -> Result<(Vec<SystemContentBlock>, Vec<BedrockMessage>), LlmError> {
    let mut system = Vec::new();
    let mut turns: Vec<(ConversationRole, Vec<ContentBlock>)> = Vec::new();

    for message in messages.iter().filter(|m| m.is_conversational()) {
        let role = match message.role {
            Role::System | Role::Developer => {
                let text = message.full_text();
                if !text.is_empty() {
                    system.push(SystemContentBlock::Text(text));
                }
                continue;
            }
            Role::Assistant => ConversationRole::Assistant,
            Role::User | Role::Unknown => ConversationRole::User,
        };

        let blocks = content_blocks(message)?;
        if blocks.is_empty() {
            continue;
        }

        match turns.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => turns.push((role, blocks)),
        }
    }

    let messages = turns
        .into_iter()
        .map(|(role, blocks)| {
            BedrockMessage::builder()
                .role(role)
                .set_content(Some(blocks))
                .build()
                .map_err(|e| LlmError::InvalidArgument(format!("invalid bedrock message: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((system, messages))
}

fn content_blocks(message: &DomainMessage) -> Result<Vec<ContentBlock>, LlmError> {
    let mut blocks = Vec::new();

    let text = message.full_text();
    if !text.is_empty() {
        blocks.push(ContentBlock::Text(text));
    }

    for part in message.parts.iter().filter(|p| p.kind == PartKind::Image) {
        let image = ImageBlock::builder()
            .format(image_format(&part.name))
            .source(ImageSource::Bytes(Blob::new(part.data.clone())))
            .build()
            .map_err(|e| LlmError::InvalidArgument(format!("invalid image part: {e}")))?;
        blocks.push(ContentBlock::Image(image));
    }

    for call in message.tool_calls() {
        let input = match call.arguments {
            Value::String(raw) => parse_arguments(&raw),
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let tool_use = ToolUseBlock::builder()
            .tool_use_id(call.call_id)
            .name(call.function_name)
            .input(value_to_document(&input))
            .build()
            .map_err(|e| LlmError::InvalidArgument(format!("invalid tool call: {e}")))?;
        blocks.push(ContentBlock::ToolUse(tool_use));
    }

    for result in message.tool_results() {
        let tool_result = ToolResultBlock::builder()
            .tool_use_id(result.call_id)
            .content(ToolResultContentBlock::Text(result.result))
            .build()
            .map_err(|e| LlmError::InvalidArgument(format!("invalid tool result: {e}")))?;
        blocks.push(ContentBlock::ToolResult(tool_result));
    }

    Ok(blocks)
}

fn image_format(mime: &str) -> ImageFormat {
    match mime {
        "image/png" => ImageFormat::Png,
        "image/gif" => ImageFormat::Gif,
        "image/webp" => ImageFormat::Webp,
        _ => ImageFormat::Jpeg,
    }
}

/// Convert JSON to an AWS `Document`, keeping integers exact
fn value_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => n
            .as_u64()
            .map(Number::PosInt)
            .or_else(|| n.as_i64().map(Number::NegInt))
            .or_else(|| n.as_f64().map(Number::Float))
            .map_or(Document::Null, Document::Number),
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(value_to_document).collect()),
        Value::Object(map) => Document::Object(map.iter().map(|(k, v)| (k.clone(), value_to_document(v))).collect()),
    }
}
