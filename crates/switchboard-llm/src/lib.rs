//! Provider-agnostic LLM engine for Switchboard
//!
//! Resolves tool names across modules, talks to `OpenAI`-compatible, Google,
//! and AWS Bedrock backends, and turns their streaming output into domain
//! messages. Tool calls can be executed automatically in a bounded loop or
//! surfaced to the caller.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod convert;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod protocol;
pub mod provider;
pub mod resolver;
pub mod types;
pub mod usage;

pub use engine::{Engine, EngineFactory, EngineSettings};
pub use error::LlmError;
pub use normalizer::normalize;
pub use provider::{BackendCapabilities, ChatBackend, ProviderLookup, ProviderRecord, create_backend};
pub use resolver::{ResolvedFunction, resolve};
pub use types::{
    BinaryPart, DomainMessage, MessageStream, MessageType, Participant, PartKind, Role, SessionHandle, StreamUpdate,
    ToolCallContent, ToolCatalog, ToolDescriptor, ToolError, ToolExecutionMode, ToolHandler, ToolParameter,
    ToolResultContent, Usage,
};
pub use usage::UsageChannel;
