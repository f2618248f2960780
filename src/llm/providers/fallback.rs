
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

use super::base::{LlmMetadata, LlmProvider, LlmProviderError};

/// Tries `primary`, then `secondary` once. The metadata of a rescued call
/// has `fallback_used` set so results can be traced back.
pub struct LlmProviderWithFallback {
    primary: Arc<dyn LlmProvider>,
    secondary: Arc<dyn LlmProvider>,
    fallback_count: AtomicUsize,
}

impl LlmProviderWithFallback {

    pub fn new(primary: Arc<dyn LlmProvider>, secondary: Arc<dyn LlmProvider>) -> Self {
        info!(
            "LlmProviderWithFallback initialized: primary={}/{}, fallback={}/{}",
            primary.provider_name(),
            primary.model_name(),
            secondary.provider_name(),
            secondary.model_name()
        );
        Self {
            primary,
            secondary,
            fallback_count: AtomicUsize::new(0),
        }
    }


    pub fn fallback_count(&self) -> usize {
        self.fallback_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for LlmProviderWithFallback {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_format: Option<&str>,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        let original_error = match self
            .primary
            .generate(system_prompt, user_prompt, response_format)
            .await
        {
            Ok(ok) => return Ok(ok),
            Err(e) => e,
        };

        warn!(
            "Primary LLM provider {} failed, falling back to {}: {}",
            self.primary.provider_name(),
            self.secondary.provider_name(),
            original_error
        );

        let (content, mut metadata) = self
            .secondary
            .generate(system_prompt, user_prompt, response_format)
            .await?;

        metadata.fallback_used = true;
        metadata.original_error = Some(original_error.to_string());
        self.fallback_count.fetch_add(1, Ordering::SeqCst);

        Ok((content, metadata))
    }

    fn provider_name(&self) -> &str {
        self.primary.provider_name()
    }

    fn model_name(&self) -> &str {
        self.primary.model_name()
    }
}
