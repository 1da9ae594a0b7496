use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};

use super::message::{DomainMessage, ToolCallContent, ToolResultContent};
use crate::error::LlmError;

/// Token accounting for one streamed response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub input_tokens: u32,
    /// Tokens generated
    pub output_tokens: u32,
    /// Sum as reported by the provider
    pub total_tokens: u32,
}

impl Usage {
    /// Build from input and output counts, deriving the total
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }
}

/// Why the provider stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of turn
    Stop,
    /// Output token limit reached
    Length,
    /// Model requested tool calls
    ToolCalls,
    /// Provider filtered the content
    ContentFilter,
    /// Anything else the provider reported
    Other,
}

/// Provider-agnostic increment produced by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// Text fragment
    Text(String),
    /// Reasoning fragment from models that expose it
    Reasoning(String),
    /// Fully assembled tool call request
    ToolCall(ToolCallContent),
    /// Result of an executed tool call
    ToolResult(ToolResultContent),
    /// Token accounting
    Usage(Usage),
    /// End of the response
    Finish(FinishReason),
}

/// Stream of canonical updates from one provider response
pub type UpdateStream = Pin<Box<dyn Stream<Item = Result<StreamUpdate, LlmError>> + Send>>;

/// Stream of domain messages returned to callers
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<DomainMessage, LlmError>> + Send>>;
