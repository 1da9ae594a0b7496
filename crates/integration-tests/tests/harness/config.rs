//! Programmatic configuration builder for integration tests

use indexmap::IndexMap;
use secrecy::SecretString;
use switchboard_config::{Config, LlmProviderConfig, LlmProviderType, ParticipantConfig};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder with no providers or participants
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Add an `OpenAI`-compatible provider pointed at a mock backend
    pub fn with_openai_provider(self, name: &str, base_url: &str, api_key: Option<&str>) -> Self {
        self.with_provider(name, LlmProviderType::Openai, base_url, api_key)
    }

    /// Add a Google provider pointed at a mock backend
    pub fn with_google_provider(self, name: &str, base_url: &str, api_key: Option<&str>) -> Self {
        self.with_provider(name, LlmProviderType::Google, base_url, api_key)
    }

    fn with_provider(mut self, name: &str, provider_type: LlmProviderType, base_url: &str, api_key: Option<&str>) -> Self {
        self.config.llm.providers.insert(
            name.to_owned(),
            LlmProviderConfig {
                provider_type,
                api_key: api_key.map(|k| SecretString::from(k.to_owned())),
                base_url: Some(base_url.parse().expect("valid URL")),
                enabled: true,
            },
        );
        self
    }

    /// Mark a provider as disabled
    pub fn disable_provider(mut self, name: &str) -> Self {
        if let Some(provider) = self.config.llm.providers.get_mut(name) {
            provider.enabled = false;
        }
        self
    }

    /// Add a participant answering through a provider
    pub fn with_participant(mut self, name: &str, provider: &str, model: &str) -> Self {
        self.config.participants.insert(
            name.to_owned(),
            ParticipantConfig {
                provider: provider.to_owned(),
                model: model.to_owned(),
                system_prompt: None,
                temperature: None,
                top_p: None,
                top_k: None,
                max_output_tokens: None,
                parameters: IndexMap::new(),
            },
        );
        self
    }

    /// Edit the most recently added participant
    pub fn tune_participant(mut self, edit: impl FnOnce(&mut ParticipantConfig)) -> Self {
        if let Some((_, participant)) = self.config.participants.last_mut() {
            edit(participant);
        }
        self
    }

    /// Set host-level tool behavior
    pub fn with_tools(mut self, auto_resolve_conflicts: bool, max_tool_rounds: u32) -> Self {
        self.config.tools.auto_resolve_conflicts = auto_resolve_conflicts;
        self.config.tools.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config.validate().expect("valid test config");
        self.config
    }
}
