//! Gateway traits — the abstractions over remote LLM capabilities.
//!
//! [`ChatGateway`] sends a conversation plus a tool palette to a
//! chat-completion backend and returns either a complete message or a
//! stream of chunks. [`EmbeddingGateway`] turns text into a fixed-length
//! vector using one process-wide configured model; callers never select
//! the model.

use crate::error::GatewayError;
use crate::message::{Message, MessageToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "gpt-4o").
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.2
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a chat gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Complete tool calls, present only on the final chunk
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The chat-completion gateway trait.
///
/// The orchestrator calls `stream()` each round without knowing which
/// backend is in use. The default `stream()` wraps `complete()` as a single
/// chunk, which keeps mock gateways in tests trivial.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// A human-readable name for this gateway (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ChatRequest)
        -> std::result::Result<ChatResponse, GatewayError>;

    /// Send a request and get a stream of response chunks.
    async fn stream(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, GatewayError>>,
        GatewayError,
    > {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(StreamChunk {
                content: Some(response.message.content),
                tool_calls: response.message.tool_calls,
                done: true,
                usage: response.usage,
            }))
            .await;
        Ok(rx)
    }
}

/// The embedding gateway trait.
///
/// The provider and model are fixed process-wide at construction time and
/// are part of the stored-vector uniqueness contract; there is deliberately
/// no way to pass a model per call.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Provider tag recorded alongside stored vectors.
    fn provider(&self) -> &str;

    /// The fixed embedding model name.
    fn model(&self) -> &str;

    /// The fixed output dimension every vector must have.
    fn dimension(&self) -> usize;

    /// Embed one text into a vector of exactly `dimension()` components.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoGateway;

    #[async_trait]
    impl ChatGateway for EchoGateway {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: ChatRequest,
        ) -> std::result::Result<ChatResponse, GatewayError> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ChatResponse {
                message: Message::assistant(last),
                usage: None,
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        let gw = EchoGateway;
        let mut rx = gw
            .stream(ChatRequest {
                model: "test".into(),
                messages: vec![Message::user("hello")],
                temperature: 0.2,
                max_tokens: None,
                tools: vec![],
            })
            .await
            .unwrap();

        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("hello"));
        assert!(chunk.done);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "peek".into(),
            description: "Probe the archive".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" }
                },
                "required": ["query"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("peek"));
        assert!(json.contains("required"));
    }
}
