use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::types::{AssistantStatus, Message, QueryExecution};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[cfg(test)]
pub trait MockBackend: Send + Sync {
    fn status(&self) -> Result<AssistantStatus>;
    fn create_mock_stream(&self, messages: &[Message]) -> Result<ByteStream>;
    fn execute_mock_query(&self, query: &str) -> Result<QueryExecution>;
}

/// HTTP client for the AI-assistant backend: status probe, streaming chat,
/// and the synchronous execute-query call used by the approval gate.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    #[cfg(test)]
    mock_backend: Option<Arc<dyn MockBackend>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            #[cfg(test)]
            mock_backend: None,
        })
    }

    #[cfg(test)]
    pub fn new_mock(mock_backend: Arc<dyn MockBackend>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "http://localhost:5000".to_string(),
            api_key: None,
            mock_backend: Some(mock_backend),
        }
    }

    /// `GET status` — whether the assistant is enabled and has a key configured.
    pub async fn status(&self) -> Result<AssistantStatus> {
        #[cfg(test)]
        {
            if let Some(backend) = &self.mock_backend {
                return backend.status();
            }
        }

        let request_url = format!("{}/api/ai_assistant/status", self.base_url);
        let response = self
            .apply_credentials(self.http.get(&request_url))
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        response
            .json::<AssistantStatus>()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))
    }

    /// `POST chat` — opens the event stream for one turn. A non-2xx response
    /// before any frame is a hard failure for the turn.
    pub async fn create_chat_stream(
        &self,
        data_source_id: u64,
        messages: &[Message],
    ) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(backend) = &self.mock_backend {
                return backend.create_mock_stream(messages);
            }
        }

        let request_url = format!("{}/api/ai_assistant/chat", self.base_url);
        let payload = json!({
            "data_source_id": data_source_id,
            "messages": messages,
        });

        if debug_payload_enabled() {
            emit_debug_payload(&request_url, self.api_key.as_deref(), &payload);
        }

        let response = self
            .apply_credentials(self.http.post(&request_url))
            .header("accept", "text/event-stream")
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }

    /// `POST execute-query` — synchronous, used only by the approval gate.
    /// The query is passed through verbatim; validation is the backend's job.
    pub async fn execute_query(&self, data_source_id: u64, query: &str) -> Result<QueryExecution> {
        #[cfg(test)]
        {
            if let Some(backend) = &self.mock_backend {
                return backend.execute_mock_query(query);
            }
        }

        let request_url = format!("{}/api/ai_assistant/execute_query", self.base_url);
        let payload = json!({
            "data_source_id": data_source_id,
            "query": query,
        });

        if debug_payload_enabled() {
            emit_debug_payload(&request_url, self.api_key.as_deref(), &payload);
        }

        let response = self
            .apply_credentials(self.http.post(&request_url))
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        response
            .json::<QueryExecution>()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))
    }

    fn apply_credentials(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.header("authorization", format!("Key {api_key}")),
            None => request,
        }
    }
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() {
        return anyhow!("cannot reach backend endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "backend endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("request to '{}' failed: {}", request_url, error)
}
