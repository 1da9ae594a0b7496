use std::sync::Arc;

use switchboard_config::Config;

use super::{Engine, EngineSettings};
use crate::error::LlmError;
use crate::provider::{ProviderLookup, create_backend};
use crate::types::Participant;

/// Builds one engine per participant from the provider records
#[derive(Clone)]
pub struct EngineFactory {
    lookup: Arc<dyn ProviderLookup>,
    settings: EngineSettings,
}

impl EngineFactory {
    pub fn new(lookup: Arc<dyn ProviderLookup>, settings: EngineSettings) -> Self {
        Self { lookup, settings }
    }

    /// Factory over the providers and tool settings of a loaded config
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(config.llm.clone()), EngineSettings::from(&config.tools))
    }

    pub const fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Create an engine for a participant
    ///
    /// Every call gets its own backend client and usage channel.
    ///
    /// # Errors
    ///
    /// `ProviderNotFound` when the participant names an unknown record,
    /// `ProviderDisabled` when the record is switched off
    pub fn create(&self, participant: &Participant) -> Result<Engine, LlmError> {
        let record = self
            .lookup
            .provider_by_name(&participant.provider)
            .ok_or_else(|| LlmError::ProviderNotFound {
                provider: participant.provider.clone(),
            })?;

        if !record.enabled {
            tracing::warn!(provider = %record.name, participant = %participant.name, "provider is disabled");
            return Err(LlmError::ProviderDisabled { provider: record.name });
        }

        let backend = create_backend(&record)?;

        tracing::info!(
            participant = %participant.name,
            provider = %record.name,
            model = %participant.model,
            "engine created"
        );

        Ok(Engine::new(participant.clone(), backend, self.settings))
    }
}
