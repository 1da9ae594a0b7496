//! Backend trait and provider-specific implementations

pub mod bedrock;
pub mod google;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use switchboard_config::{LlmConfig, LlmProviderType};
use url::Url;

use crate::error::LlmError;
use crate::types::{ChatRequest, UpdateStream};

/// Capabilities advertised by a backend
#[derive(Debug, Clone, Copy)]
pub struct BackendCapabilities {
    /// Whether the backend honors top-k sampling
    pub top_k: bool,
    /// Whether the backend supports function calling
    pub tool_calling: bool,
}

/// A provider client able to stream one chat response
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Provider record name
    fn name(&self) -> &str;

    /// Advertised capabilities
    fn capabilities(&self) -> BackendCapabilities;

    /// Send the request and return its incremental updates
    async fn open_stream(&self, request: &ChatRequest) -> Result<UpdateStream, LlmError>;
}

/// Connection details for one configured provider
#[derive(Debug, Clone)]
pub struct ProviderRecord {
    /// Record name
    pub name: String,
    /// Protocol and protocol-specific settings
    pub provider_type: LlmProviderType,
    /// Base URL override
    pub endpoint: Option<Url>,
    /// API key; empty when none is configured
    pub credential: SecretString,
    /// Disabled records cannot back an engine
    pub enabled: bool,
}

/// Source of provider records
pub trait ProviderLookup: Send + Sync {
    /// Find a provider by record name
    fn provider_by_name(&self, name: &str) -> Option<ProviderRecord>;
}

impl ProviderLookup for LlmConfig {
    fn provider_by_name(&self, name: &str) -> Option<ProviderRecord> {
        let config = self.providers.get(name)?;

        Some(ProviderRecord {
            name: name.to_owned(),
            provider_type: config.provider_type.clone(),
            endpoint: config.base_url.clone(),
            credential: config
                .api_key
                .clone()
                .unwrap_or_else(|| SecretString::from(String::new())),
            enabled: config.enabled,
        })
    }
}

/// Build a fresh backend client for a provider record
pub fn create_backend(record: &ProviderRecord) -> Result<Arc<dyn ChatBackend>, LlmError> {
    let backend: Arc<dyn ChatBackend> = match &record.provider_type {
        LlmProviderType::Openai => Arc::new(openai::OpenAiBackend::new(record)?),
        LlmProviderType::Google => Arc::new(google::GoogleBackend::new(record)?),
        LlmProviderType::Bedrock(bedrock) => Arc::new(bedrock::BedrockBackend::new(&record.name, bedrock.clone())),
    };

    tracing::debug!(provider = %record.name, kind = record.provider_type.as_str(), "created backend");

    Ok(backend)
}

/// Join a path onto a base URL without dropping the base path
pub(crate) fn endpoint_url(base: &Url, path: &str) -> String {
    let base = base.as_str().trim_end_matches('/');
    format!("{base}/{}", path.trim_start_matches('/'))
}

/// Read an error response body and turn it into an upstream error
pub(crate) async fn upstream_status_error(provider: &str, response: reqwest::Response) -> LlmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    tracing::warn!(provider = %provider, status = %status, "upstream returned error");

    LlmError::Upstream(format!("provider returned {status}: {body}"))
}
