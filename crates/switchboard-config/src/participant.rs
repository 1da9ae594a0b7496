use indexmap::IndexMap;
use serde::Deserialize;

/// A conversation participant: which provider and model answer, and how
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticipantConfig {
    /// Name of the provider record backing this participant
    pub provider: String,
    /// Model identifier passed to the provider
    pub model: String,
    /// System prompt prepended to every conversation
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Top-k sampling (ignored by providers that do not support it)
    #[serde(default)]
    pub top_k: Option<u32>,
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Free-form provider parameters (e.g. `LimitMaxContextLength`)
    #[serde(default)]
    pub parameters: IndexMap<String, String>,
}
