//! Per-session engine: resolves tools, calls the provider, streams domain messages

mod factory;
mod turn;

use std::sync::Arc;

use switchboard_config::ToolsConfig;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub use self::factory::EngineFactory;
use self::turn::Turn;
use crate::error::LlmError;
use crate::provider::ChatBackend;
use crate::resolver;
use crate::types::{
    ChatRequest, DomainMessage, MessageStream, Participant, RequestOptions, SessionHandle, ToolCatalog, Usage,
};
use crate::usage::UsageChannel;

/// Host-level behavior shared by every engine a factory creates
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Rename colliding function names instead of failing
    pub auto_resolve_conflicts: bool,
    /// Model/tool round trips allowed per turn in automatic mode
    pub max_tool_rounds: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&ToolsConfig::default())
    }
}

impl From<&ToolsConfig> for EngineSettings {
    fn from(config: &ToolsConfig) -> Self {
        Self {
            auto_resolve_conflicts: config.auto_resolve_conflicts,
            max_tool_rounds: config.max_tool_rounds,
        }
    }
}

/// Talks to one provider on behalf of one participant
///
/// Owns its client and usage channel; nothing is shared between engines.
pub struct Engine {
    participant: Participant,
    backend: Arc<dyn ChatBackend>,
    settings: EngineSettings,
    usage: UsageChannel,
}

impl Engine {
    pub fn new(participant: Participant, backend: Arc<dyn ChatBackend>, settings: EngineSettings) -> Self {
        Self {
            participant,
            backend,
            settings,
            usage: UsageChannel::new(),
        }
    }

    /// The participant this engine answers for
    pub const fn participant(&self) -> &Participant {
        &self.participant
    }

    /// Name of the provider record backing this engine
    pub fn provider_name(&self) -> &str {
        self.backend.name()
    }

    /// Receive usage reports from responses produced by this engine
    pub fn subscribe_usage(&self) -> broadcast::Receiver<Usage> {
        self.usage.subscribe()
    }

    /// Usage of the most recent response, if one reported it
    pub fn last_usage(&self) -> Option<Usage> {
        self.usage.last()
    }

    /// Start one conversation turn
    ///
    /// Validation and tool resolution happen here; the provider is only
    /// contacted once the returned stream is polled.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty conversation, `ToolNameConflict` when
    /// tools collide and auto-resolution is off
    pub fn get_message(
        &self,
        messages: &[DomainMessage],
        tools: Option<&ToolCatalog>,
        session: &SessionHandle,
        cancel: CancellationToken,
    ) -> Result<MessageStream, LlmError> {
        if messages.is_empty() {
            return Err(LlmError::InvalidArgument("conversation must contain at least one message".to_owned()));
        }

        let functions = resolver::resolve(tools, self.settings.auto_resolve_conflicts)?.unwrap_or_default();

        let capabilities = self.backend.capabilities();
        if !functions.is_empty() && !capabilities.tool_calling {
            tracing::warn!(provider = %self.backend.name(), "backend does not support tool calling; tools ignored");
        }
        let functions = if capabilities.tool_calling { functions } else { Vec::new() };

        let mut history = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = &self.participant.system_prompt {
            history.push(DomainMessage::system(prompt.clone()));
        }
        history.extend(messages.iter().filter(|m| m.is_conversational()).cloned());

        tracing::debug!(
            session = %session.id,
            participant = %self.participant.name,
            provider = %self.backend.name(),
            messages = history.len(),
            functions = functions.len(),
            "starting turn"
        );

        let request = ChatRequest {
            model: self.participant.model.clone(),
            messages: history,
            functions: functions.iter().map(resolver::ResolvedFunction::definition).collect(),
            options: RequestOptions::from_sampling(&self.participant.sampling, capabilities.top_k),
        };

        let turn = Turn {
            backend: Arc::clone(&self.backend),
            request,
            functions,
            mode: session.tool_execution_mode,
            max_rounds: self.settings.max_tool_rounds,
            cancel,
            usage: self.usage.clone(),
        };

        Ok(turn.into_stream())
    }
}
