//! Chat client abstraction used by the test batteries.
//!
//! Endpoints answer in more than one shape, so responses are kept as a small
//! closed set of variants and normalized later by the extraction module.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::models::ModelListing;
use crate::error::LlmError;

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat reply as returned by an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatResponse {
    /// The endpoint returned bare text.
    Text(String),
    /// A keyed object such as `{"message": {"content": ...}}`.
    Object(Map<String, Value>),
    /// Anything else; only its string rendering is usable.
    Other(Value),
}

impl From<Value> for ChatResponse {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ChatResponse::Text(text),
            Value::Object(map) => ChatResponse::Object(map),
            other => ChatResponse::Other(other),
        }
    }
}

impl From<String> for ChatResponse {
    fn from(text: String) -> Self {
        ChatResponse::Text(text)
    }
}

impl From<&str> for ChatResponse {
    fn from(text: &str) -> Self {
        ChatResponse::Text(text.to_string())
    }
}

/// An LLM endpoint that can list its models and answer chat requests.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// List the models served by the endpoint, in whatever shape it reports them.
    async fn list_models(&self) -> Result<Vec<ModelListing>, LlmError>;

    /// Send a conversation to `model` and return its reply.
    async fn chat(&self, model: &str, messages: &[Message]) -> Result<ChatResponse, LlmError>;
}

/// Builds chat clients for a host, so runs can target any endpoint.
pub trait ClientFactory: Send + Sync {
    /// Create a client for `host`, authenticating with `api_key` when given.
    fn connect(&self, host: &str, api_key: Option<&str>) -> Result<Arc<dyn ChatClient>, LlmError>;
}
