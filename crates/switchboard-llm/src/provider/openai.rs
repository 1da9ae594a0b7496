//! OpenAI-compatible chat completions backend

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{StreamExt, future, stream};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{BackendCapabilities, ChatBackend, ProviderRecord, endpoint_url, upstream_status_error};
use crate::convert::openai::StreamDecoder;
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiRequest, OpenAiStreamOptions};
use crate::types::{ChatRequest, UpdateStream};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Whether the endpoint is api.openai.com rather than a compatible server
fn is_canonical_openai(base_url: &Url) -> bool {
    base_url.host_str().is_some_and(|h| h == "api.openai.com")
}

/// OpenAI-compatible backend
pub struct OpenAiBackend {
    name: String,
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl OpenAiBackend {
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

    fn completions_url(&self) -> String {
        endpoint_url(&self.base_url, "chat/completions")
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            top_k: false,
            tool_calling: true,
        }
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<UpdateStream, LlmError> {
        let mut wire_request = OpenAiRequest::from(request);

        // Compatible servers (Ollama, vLLM, NIM) reject stream_options
        wire_request.stream_options =
            is_canonical_openai(&self.base_url).then_some(OpenAiStreamOptions { include_usage: true });

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
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
            .map(Some)
            .chain(stream::once(future::ready(None)))
            .scan(StreamDecoder::default(), |decoder, event| {
                let batch = match event {
                    Some(Ok(event)) => decoder.decode(&event.data),
                    Some(Err(e)) => vec![Err(LlmError::Streaming(e.to_string()))],
                    None => decoder.finish(),
                };

                future::ready(Some(batch))
            })
            .flat_map(stream::iter);

        Ok(Box::pin(updates))
    }
}
