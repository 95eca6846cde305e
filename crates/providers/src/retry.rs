//! Retry wrappers — bounded exponential backoff around a gateway.
//!
//! Transient upstream failures (network, timeout, rate limit, 5xx) are
//! retried up to the configured attempt count; permanent failures (auth,
//! configuration) surface immediately. Streaming only retries stream
//! *establishment* — once chunks are flowing, an interruption is the
//! orchestrator's problem.

use async_trait::async_trait;
use hindsight_config::RetryConfig;
use hindsight_core::error::GatewayError;
use hindsight_core::gateway::{
    ChatGateway, ChatRequest, ChatResponse, EmbeddingGateway, StreamChunk,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

fn backoff_delay(config: &RetryConfig, attempt: u32, error: &GatewayError) -> Duration {
    if let GatewayError::RateLimited { retry_after_secs } = error {
        return Duration::from_secs(*retry_after_secs);
    }
    Duration::from_millis(config.base_delay_ms.saturating_mul(1 << attempt.min(10)))
}

/// A chat gateway that retries transient failures of its inner gateway.
pub struct RetryingChatGateway {
    inner: Arc<dyn ChatGateway>,
    config: RetryConfig,
}

impl RetryingChatGateway {
    pub fn new(inner: Arc<dyn ChatGateway>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ChatGateway for RetryingChatGateway {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<ChatResponse, GatewayError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt + 1 < self.config.max_attempts => {
                    let delay = backoff_delay(&self.config, attempt, &e);
                    warn!(
                        gateway = %self.inner.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient completion failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn stream(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, GatewayError>>,
        GatewayError,
    > {
        let mut attempt = 0;
        loop {
            match self.inner.stream(request.clone()).await {
                Ok(rx) => return Ok(rx),
                Err(e) if e.is_retryable() && attempt + 1 < self.config.max_attempts => {
                    let delay = backoff_delay(&self.config, attempt, &e);
                    warn!(
                        gateway = %self.inner.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient stream-establishment failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// An embedding gateway that retries transient failures of its inner gateway.
pub struct RetryingEmbeddingGateway {
    inner: Arc<dyn EmbeddingGateway>,
    config: RetryConfig,
}

impl RetryingEmbeddingGateway {
    pub fn new(inner: Arc<dyn EmbeddingGateway>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl EmbeddingGateway for RetryingEmbeddingGateway {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, GatewayError> {
        let mut attempt = 0;
        loop {
            match self.inner.embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_retryable() && attempt + 1 < self.config.max_attempts => {
                    let delay = backoff_delay(&self.config, attempt, &e);
                    warn!(
                        provider = %self.inner.provider(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient embedding failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hindsight_core::message::Message;
    use std::sync::Mutex;

    struct FlakyEmbedder {
        failures_before_success: Mutex<usize>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl EmbeddingGateway for FlakyEmbedder {
        fn provider(&self) -> &str {
            "flaky"
        }
        fn model(&self) -> &str {
            "test-embed"
        }
        fn dimension(&self) -> usize {
            3
        }
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, GatewayError> {
            *self.calls.lock().unwrap() += 1;
            let mut remaining = self.failures_before_success.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                Err(GatewayError::Network("connection reset".into()))
            } else {
                Ok(vec![0.1, 0.2, 0.3])
            }
        }
    }

    struct AuthFailChat {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ChatGateway for AuthFailChat {
        fn name(&self) -> &str {
            "auth-fail"
        }
        async fn complete(
            &self,
            _request: ChatRequest,
        ) -> std::result::Result<ChatResponse, GatewayError> {
            *self.calls.lock().unwrap() += 1;
            Err(GatewayError::AuthenticationFailed("bad key".into()))
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let inner = Arc::new(FlakyEmbedder {
            failures_before_success: Mutex::new(2),
            calls: Mutex::new(0),
        });
        let gw = RetryingEmbeddingGateway::new(inner.clone(), fast_config(3));
        let vector = gw.embed("hello").await.unwrap();
        assert_eq!(vector.len(), 3);
        assert_eq!(*inner.calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let inner = Arc::new(FlakyEmbedder {
            failures_before_success: Mutex::new(10),
            calls: Mutex::new(0),
        });
        let gw = RetryingEmbeddingGateway::new(inner.clone(), fast_config(3));
        let err = gw.embed("hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)));
        assert_eq!(*inner.calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn permanent_failures_not_retried() {
        let inner = Arc::new(AuthFailChat {
            calls: Mutex::new(0),
        });
        let gw = RetryingChatGateway::new(inner.clone(), fast_config(5));
        let err = gw
            .complete(ChatRequest {
                model: "gpt-4o".into(),
                messages: vec![Message::user("hi")],
                temperature: 0.2,
                max_tokens: None,
                tools: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthenticationFailed(_)));
        assert_eq!(*inner.calls.lock().unwrap(), 1);
    }

    #[test]
    fn rate_limit_delay_honors_retry_after() {
        let config = fast_config(3);
        let delay = backoff_delay(
            &config,
            0,
            &GatewayError::RateLimited {
                retry_after_secs: 7,
            },
        );
        assert_eq!(delay, Duration::from_secs(7));
    }

    #[test]
    fn backoff_grows_exponentially() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 250,
        };
        let e = GatewayError::Network("x".into());
        assert_eq!(backoff_delay(&config, 0, &e), Duration::from_millis(250));
        assert_eq!(backoff_delay(&config, 1, &e), Duration::from_millis(500));
        assert_eq!(backoff_delay(&config, 2, &e), Duration::from_millis(1000));
    }
}
