//! Bounded access to the language model

use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::providers::LlmProvider;

/// Wraps an `LlmProvider` with a deadline and error normalisation
#[derive(Clone)]
pub struct GenerationGateway {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl GenerationGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &GenerationConfig) -> Self {
        Self {
            provider,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Complete `prompt` within the configured timeout
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let started = std::time::Instant::now();

        let result = tokio::time::timeout(self.timeout, self.provider.generate(prompt))
            .await
            .map_err(|_| Error::GenerationTimeout {
                secs: self.timeout.as_secs(),
            })?;

        match result {
            Ok(text) => {
                tracing::debug!(
                    "{} ({}) answered in {}ms",
                    self.provider.name(),
                    self.provider.model(),
                    started.elapsed().as_millis()
                );
                Ok(text)
            }
            Err(err @ (Error::Generation(_) | Error::GenerationTimeout { .. })) => Err(err),
            Err(other) => Err(Error::generation(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct SlowLlm;

    #[async_trait]
    impl LlmProvider for SlowLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("late".to_string())
        }

        fn name(&self) -> &str {
            "slow"
        }

        fn model(&self) -> &str {
            "slow-1"
        }
    }

    struct BrokenLlm;

    #[async_trait]
    impl LlmProvider for BrokenLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(Error::internal("connection reset"))
        }

        fn name(&self) -> &str {
            "broken"
        }

        fn model(&self) -> &str {
            "broken-1"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let gateway = GenerationGateway::new(Arc::new(SlowLlm), &GenerationConfig::default());
        let err = gateway.generate("prompt").await.unwrap_err();
        assert!(matches!(err, Error::GenerationTimeout { secs: 60 }));
    }

    #[tokio::test]
    async fn test_provider_failure_is_generation_error() {
        let gateway = GenerationGateway::new(Arc::new(BrokenLlm), &GenerationConfig::default());
        let err = gateway.generate("prompt").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
