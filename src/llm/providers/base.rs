
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum LlmProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Unsupported provider: {0}")]
    Unsupported(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}


#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmMetadata {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_prompt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_completion: Option<u32>,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_error: Option<String>,
}

/// Structured-text completion. Decomposition and relevance judging both
/// go through this; neither cares which model sits behind it.
#[async_trait]
pub trait LlmProvider: Send + Sync {

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_format: Option<&str>,
    ) -> Result<(String, LlmMetadata), LlmProviderError>;


    fn provider_name(&self) -> &str;


    fn model_name(&self) -> &str;
}


#[async_trait]
impl LlmProvider for Arc<dyn LlmProvider> {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_format: Option<&str>,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        (**self).generate(system_prompt, user_prompt, response_format).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}


/// Runs `generate` under a deadline, mapping expiry to [`LlmProviderError::Timeout`].
pub async fn generate_with_timeout(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    user_prompt: &str,
    response_format: Option<&str>,
    timeout_secs: u64,
) -> Result<(String, LlmMetadata), LlmProviderError> {
    let call = provider.generate(system_prompt, user_prompt, response_format);
    match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), call).await {
        Ok(result) => result,
        Err(_) => Err(LlmProviderError::Timeout(timeout_secs)),
    }
}
