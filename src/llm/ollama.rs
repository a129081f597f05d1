//! Ollama-compatible HTTP client.
//!
//! Talks to `GET /api/tags` for the model listing and `POST /api/chat`
//! (non-streaming) for replies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::{ChatClient, ChatResponse, ClientFactory, Message};
use super::models::ModelListing;
use crate::error::LlmError;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Client for an Ollama-compatible server.
pub struct OllamaClient {
    /// HTTP client for making API requests.
    http_client: Client,
    /// Base URL of the server, without a trailing slash.
    host: String,
    /// Optional bearer token.
    api_key: Option<String>,
}

impl OllamaClient {
    /// Create a client for `host` with the default request timeout.
    pub fn new(host: impl Into<String>, api_key: Option<String>) -> Result<Self, LlmError> {
        Self::with_timeout(host, api_key, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Create a client for `host` with an explicit request timeout.
    pub fn with_timeout(
        host: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let host = host.into().trim().trim_end_matches('/').to_string();
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(LlmError::InvalidHost(host));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            host,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Get the host URL.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, LlmError> {
        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            // Ollama reports errors as {"error": "..."}
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);

            return Err(LlmError::ApiError { code, message });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))
    }
}

/// Internal request structure for `/api/chat`.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: String,
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelListing>, LlmError> {
        let url = format!("{}/api/tags", self.host);
        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let body = Self::read_json(response).await?;
        let listings = match body {
            Value::Object(mut map) => match map.remove("models") {
                Some(Value::Array(items)) => items,
                Some(other) => vec![other],
                None => Vec::new(),
            },
            Value::Array(items) => items,
            other => vec![other],
        };

        tracing::debug!(host = %self.host, count = listings.len(), "Listed models");
        Ok(listings.into_iter().map(ModelListing::from_value).collect())
    }

    async fn chat(&self, model: &str, messages: &[Message]) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/api/chat", self.host);
        let request = ChatRequest {
            model,
            messages,
            stream: false,
        };

        let response = self
            .authorize(self.http_client.post(&url))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(LlmError::ModelNotFound(model.to_string()));
        }

        Ok(ChatResponse::from(Self::read_json(response).await?))
    }
}

/// Factory producing [`OllamaClient`]s with a shared request timeout.
#[derive(Debug, Clone)]
pub struct OllamaClientFactory {
    timeout: Duration,
}

impl OllamaClientFactory {
    /// Create a factory whose clients use `timeout` per request.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for OllamaClientFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }
}

impl ClientFactory for OllamaClientFactory {
    fn connect(&self, host: &str, api_key: Option<&str>) -> Result<Arc<dyn ChatClient>, LlmError> {
        let client =
            OllamaClient::with_timeout(host, api_key.map(str::to_string), self.timeout)?;
        Ok(Arc::new(client))
    }
}
