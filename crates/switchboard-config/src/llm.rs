use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Top-level LLM configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Provider records keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, LlmProviderConfig>,
}

/// A single provider record
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmProviderConfig {
    /// Provider protocol type
    #[serde(rename = "type")]
    pub provider_type: LlmProviderType,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Disabled providers are kept in the file but cannot back an engine
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

/// Supported provider protocols
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderType {
    /// OpenAI-compatible chat completions API
    Openai,
    /// Google Generative Language API
    Google,
    /// AWS Bedrock Converse API
    Bedrock(BedrockConfig),
}

impl LlmProviderType {
    /// Short protocol name used in logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Google => "google",
            Self::Bedrock(_) => "bedrock",
        }
    }
}

/// AWS Bedrock-specific configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedrockConfig {
    /// AWS region
    pub region: String,
    /// Access key ID (optional, uses default credential chain if absent)
    #[serde(default)]
    pub access_key_id: Option<SecretString>,
    /// Secret access key
    #[serde(default)]
    pub secret_access_key: Option<SecretString>,
}
