//! Provider-agnostic types shared by the resolver, normalizer, and backends

pub mod message;
pub mod request;
pub mod session;
pub mod stream;
pub mod tool;

pub use message::{BinaryPart, DomainMessage, MessageType, PartKind, Role, ToolCallContent, ToolResultContent};
pub use request::{ChatRequest, LIMIT_MAX_CONTEXT_LENGTH, Participant, RequestOptions, SamplingParams};
pub use session::{SessionHandle, ToolExecutionMode};
pub use stream::{FinishReason, MessageStream, StreamUpdate, UpdateStream, Usage};
pub use tool::{FnHandler, FunctionDefinition, ToolCatalog, ToolDescriptor, ToolError, ToolHandler, ToolParameter};
