//! LLM endpoint integration for etch-bench.
//!
//! The batteries only depend on the [`ChatClient`] trait. [`OllamaClient`] is
//! the HTTP implementation used by the CLI; tests plug in scripted clients.
//!
//! ```ignore
//! use etch_bench::llm::{ChatClient, Message, OllamaClient};
//!
//! let client = OllamaClient::new("http://localhost:11434", None)?;
//! let names = etch_bench::llm::normalize_models(&client.list_models().await?);
//! let reply = client.chat(&names[0], &[Message::user("What is 17 + 28?")]).await?;
//! ```

pub mod client;
pub mod models;
pub mod ollama;

pub use client::{ChatClient, ChatResponse, ClientFactory, Message};
pub use models::{normalize_models, ModelListing};
pub use ollama::{OllamaClient, OllamaClientFactory};
