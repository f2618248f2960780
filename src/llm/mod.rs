pub mod embeddings;
pub mod factory;
pub mod json;
pub mod providers;

pub use embeddings::{EmbedKind, EmbeddingBatch, EmbeddingError, EmbeddingGateway, HttpEmbeddingGateway};
pub use factory::{EmbeddingGatewayFactory, LlmProviderFactory};
pub use json::{extract_json, extract_json_object};
pub use providers::{LlmMetadata, LlmProvider, LlmProviderError};
