//! # Hindsight Providers
//!
//! Remote gateway implementations: an OpenAI-compatible chat-completion
//! gateway (non-streaming and streaming SSE, with tool calling) and an
//! OpenAI-compatible embedding gateway pinned to one model and dimension.
//! [`retry`] wraps either gateway with bounded exponential backoff for
//! transient failures.

pub mod openai;
pub mod retry;

pub use openai::{OpenAiChatGateway, OpenAiEmbeddingGateway};
pub use retry::{RetryingChatGateway, RetryingEmbeddingGateway};
