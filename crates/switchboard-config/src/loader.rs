use std::path::Path;

use crate::{Config, LlmProviderType};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured, a participant points
    /// at a missing provider, or sampling values are out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_has_providers()?;
        self.validate_providers()?;
        self.validate_participants()?;
        self.validate_tools()?;
        Ok(())
    }

    fn validate_has_providers(&self) -> anyhow::Result<()> {
        if self.llm.providers.is_empty() {
            anyhow::bail!("at least one LLM provider must be configured");
        }
        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        for (name, provider) in &self.llm.providers {
            if let LlmProviderType::Bedrock(bedrock) = &provider.provider_type {
                if bedrock.region.trim().is_empty() {
                    anyhow::bail!("bedrock provider '{name}' requires a region");
                }
                if bedrock.access_key_id.is_some() != bedrock.secret_access_key.is_some() {
                    anyhow::bail!(
                        "bedrock provider '{name}' must set both access_key_id and secret_access_key, or neither"
                    );
                }
            }
        }
        Ok(())
    }

    fn validate_participants(&self) -> anyhow::Result<()> {
        for (name, participant) in &self.participants {
            if !self.llm.providers.contains_key(&participant.provider) {
                anyhow::bail!(
                    "participant '{name}' references unknown provider '{}'",
                    participant.provider
                );
            }

            if participant.model.trim().is_empty() {
                anyhow::bail!("participant '{name}' must name a model");
            }

            if let Some(temperature) = participant.temperature
                && !(0.0..=2.0).contains(&temperature)
            {
                anyhow::bail!("participant '{name}' temperature must be between 0.0 and 2.0");
            }

            if let Some(top_p) = participant.top_p
                && !(0.0..=1.0).contains(&top_p)
            {
                anyhow::bail!("participant '{name}' top_p must be between 0.0 and 1.0");
            }
        }
        Ok(())
    }

    fn validate_tools(&self) -> anyhow::Result<()> {
        if self.tools.max_tool_rounds == 0 {
            anyhow::bail!("tools.max_tool_rounds must be greater than 0");
        }
        Ok(())
    }
}
