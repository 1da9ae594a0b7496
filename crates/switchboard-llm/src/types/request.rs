use indexmap::IndexMap;
use switchboard_config::ParticipantConfig;

use super::message::DomainMessage;
use super::tool::FunctionDefinition;

/// Participant parameter that caps generated tokens
pub const LIMIT_MAX_CONTEXT_LENGTH: &str = "LimitMaxContextLength";

/// Sampling settings attached to a participant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingParams {
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    pub top_p: Option<f64>,
    /// Top-k sampling
    pub top_k: Option<u32>,
    /// Maximum tokens to generate
    pub max_output_tokens: Option<u32>,
    /// Free-form provider parameters
    pub overrides: IndexMap<String, String>,
}

impl SamplingParams {
    /// Output cap from the `LimitMaxContextLength` override, if it parses
    pub fn limit_max_context_length(&self) -> Option<u32> {
        let raw = self.overrides.get(LIMIT_MAX_CONTEXT_LENGTH)?;

        match raw.trim().parse() {
            Ok(limit) => Some(limit),
            Err(e) => {
                tracing::warn!(value = %raw, error = %e, "ignoring unparseable {LIMIT_MAX_CONTEXT_LENGTH}");
                None
            }
        }
    }
}

/// The conversation participant an engine speaks for
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    /// Participant name
    pub name: String,
    /// Provider record name
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Prepended to every conversation
    pub system_prompt: Option<String>,
    /// Sampling settings
    pub sampling: SamplingParams,
}

impl Participant {
    /// Build from a named configuration entry
    pub fn from_config(name: impl Into<String>, config: &ParticipantConfig) -> Self {
        Self {
            name: name.into(),
            provider: config.provider.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone().filter(|prompt| !prompt.trim().is_empty()),
            sampling: SamplingParams {
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                max_output_tokens: config.max_output_tokens,
                overrides: config.parameters.clone(),
            },
        }
    }
}

/// Sampling settings translated for one backend
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestOptions {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub max_output_tokens: Option<u32>,
}

impl RequestOptions {
    /// Translate participant sampling into request options
    ///
    /// `top_k` is dropped for backends that cannot honor it. A
    /// `LimitMaxContextLength` override takes precedence over
    /// `max_output_tokens`.
    pub fn from_sampling(sampling: &SamplingParams, supports_top_k: bool) -> Self {
        Self {
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            top_k: sampling.top_k.filter(|_| supports_top_k),
            max_output_tokens: sampling.limit_max_context_length().or(sampling.max_output_tokens),
        }
    }
}

/// Everything a backend needs to open one streamed response
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation history, system prompt first when present
    pub messages: Vec<DomainMessage>,
    /// Functions the model may call
    pub functions: Vec<FunctionDefinition>,
    /// Sampling options
    pub options: RequestOptions,
}
