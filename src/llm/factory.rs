
use std::sync::Arc;

use super::embeddings::{EmbeddingGateway, HttpEmbeddingGateway};
use super::providers::base::{LlmProvider, LlmProviderError};
use super::providers::fallback::LlmProviderWithFallback;
use super::providers::ollama::OllamaProvider;
use super::providers::openai::OpenAiCompatProvider;
use crate::DEFAULT_OLLAMA_URL;
use crate::core::config::GeoarkConfig;


pub struct LlmProviderFactory;

impl LlmProviderFactory {

    pub fn create(
        provider: &str,
        model: &str,
        api_key: Option<&str>,
        base_url: Option<&str>,
        temperature: f64,
    ) -> Result<Arc<dyn LlmProvider>, LlmProviderError> {
        match provider {
            "ollama" => Ok(Arc::new(OllamaProvider::new(
                base_url.unwrap_or(DEFAULT_OLLAMA_URL),
                model,
                temperature,
            ))),
            "openai" | "cerebras" | "gemini" => Ok(Arc::new(OpenAiCompatProvider::new(
                base_url.map(String::from),
                api_key.map(String::from),
                model,
                temperature,
            ))),
            other => Err(LlmProviderError::Unsupported(format!(
                "{other}. Supported: ollama, openai"
            ))),
        }
    }

    /// `None` when the config disables the model-assisted paths.
    pub fn from_config(config: &GeoarkConfig) -> Result<Option<Arc<dyn LlmProvider>>, LlmProviderError> {
        if !config.llm_enabled() {
            return Ok(None);
        }

        let primary = Self::create(
            &config.llm_provider,
            &config.llm_model,
            config.llm_api_key.as_deref(),
            config.llm_base_url.as_deref(),
            config.llm_temperature,
        )?;

        if !config.llm_fallback_enabled {
            return Ok(Some(primary));
        }

        let secondary: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::new(
            config.llm_fallback_url.clone(),
            config.llm_fallback_model.clone(),
            config.llm_temperature,
        ));
        Ok(Some(Arc::new(LlmProviderWithFallback::new(primary, secondary))))
    }
}


pub struct EmbeddingGatewayFactory;

impl EmbeddingGatewayFactory {

    #[must_use]
    pub fn from_config(config: &GeoarkConfig) -> Arc<dyn EmbeddingGateway> {
        Arc::new(HttpEmbeddingGateway::new(
            config.embedding_provider.clone(),
            config.embedding_url.clone(),
            config.embedding_model.clone(),
            config.embedding_api_key.clone(),
            config.embedding_query_instruction.clone(),
            config.embedding_timeout_secs,
        ))
    }
}
