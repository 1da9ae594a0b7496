//! Google Generative Language API backend

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{StreamExt, stream};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{BackendCapabilities, ChatBackend, ProviderRecord, endpoint_url, upstream_status_error};
use crate::convert::google::decode_event;
use crate::error::LlmError;
use crate::protocol::google::GoogleRequest;
use crate::types::{ChatRequest, UpdateStream};

/// Default Google Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header carrying the API key
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Generative Language API backend
pub struct GoogleBackend {
    name: String,
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl GoogleBackend {
    /// Create a backend with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Internal` if the default base URL fails to parse
    pub fn new(record: &ProviderRecord) -> Result<Self, LlmError> {
        let base_url = match &record.endpoint {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_BASE_URL).map_err(|e| LlmError::Internal(e.into()))?,
        };

        Ok(Self {
            name: record.name.clone(),
            client: Client::new(),
            base_url,
            api_key: record.credential.clone(),
        })
    }

    /// `streamGenerateContent` URL for a model
    fn stream_url(&self, model: &str) -> String {
        let model = model.trim_start_matches("models/");
        endpoint_url(&self.base_url, &format!("models/{model}:streamGenerateContent?alt=sse"))
    }
}

#[async_trait]
impl ChatBackend for GoogleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            top_k: true,
            tool_calling: true,
        }
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<UpdateStream, LlmError> {
        let wire_request = GoogleRequest::from(request);

        let response = self
            .client
            .post(self.stream_url(&request.model))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.name, error = %e, "upstream stream request failed");
                LlmError::Upstream(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(upstream_status_error(&self.name, response).await);
        }

        let updates = response
            .bytes_stream()
            .eventsource()
            .map(|result| match result {
                Ok(event) => decode_event(&event.data),
                Err(e) => vec![Err(LlmError::Streaming(e.to_string()))],
            })
            .flat_map(stream::iter);

        Ok(Box::pin(updates))
    }
}
