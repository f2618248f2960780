
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::llm::embeddings::EmbeddingError;
use crate::llm::providers::LlmProviderError;
use crate::search::SearchError;


#[derive(Error, Debug)]
pub enum GeoarkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(#[from] LlmProviderError),

    #[error("Embedding generation error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for GeoarkError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}


pub type Result<T> = std::result::Result<T, GeoarkError>;
