use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::text::normalize;

/// Instruction BGE-family models expect in front of retrieval queries.
pub const BGE_QUERY_INSTRUCTION: &str = "Represent this sentence for searching relevant passages: ";


#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Batch size mismatch: sent {sent} texts, received {received} vectors")]
    BatchMismatch { sent: usize, received: usize },

    #[error("Provider not implemented: {0}")]
    NotImplemented(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Query,
    Document,
}


#[derive(Debug, Clone, Default)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    /// Normalized/lemmatized form of each input, parallel to `vectors`.
    pub normalized: Vec<String>,
}

impl EmbeddingBatch {

    pub fn len(&self) -> usize {
        self.vectors.len()
    }


    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}


#[async_trait]
pub trait EmbeddingGateway: Send + Sync {

    async fn embed(&self, texts: &[String], kind: EmbedKind) -> Result<EmbeddingBatch, EmbeddingError>;


    fn model_name(&self) -> &str;
}


#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}


pub struct HttpEmbeddingGateway {
    provider: String,
    url: String,
    model: String,
    api_key: Option<String>,
    query_instruction: Option<String>,
    timeout_secs: u64,
    client: Client,
}

impl HttpEmbeddingGateway {

    pub fn new(
        provider: impl Into<String>,
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        query_instruction: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        let provider = provider.into().to_lowercase();
        let model = model.into();
        let url = url.into().trim_end_matches('/').to_string();
        let query_instruction = query_instruction.or_else(|| {
            model
                .to_lowercase()
                .contains("bge")
                .then(|| BGE_QUERY_INSTRUCTION.to_string())
        });

        info!(
            "HttpEmbeddingGateway initialized: provider={}, model={}, query_instruction={}",
            provider,
            model,
            query_instruction.is_some()
        );

        Self {
            provider,
            url,
            model,
            api_key,
            query_instruction,
            timeout_secs,
            client: Client::new(),
        }
    }


    fn prepare_inputs(&self, normalized: &[String], kind: EmbedKind) -> Vec<String> {
        match (kind, &self.query_instruction) {
            (EmbedKind::Query, Some(instruction)) => normalized
                .iter()
                .map(|t| format!("{instruction}{t}"))
                .collect(),
            _ => normalized.to_vec(),
        }
    }

    async fn embed_ollama(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&OllamaEmbedRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaEmbedResponse>()
            .await?;

        Ok(response.embeddings)
    }

    async fn embed_openai(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| EmbeddingError::InvalidResponse("API key required".to_string()))?;

        let mut response = self
            .client
            .post(format!("{}/embeddings", self.url))
            .bearer_auth(api_key)
            .json(&OpenAIEmbeddingRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<OpenAIEmbeddingResponse>()
            .await?;

        response.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingGateway for HttpEmbeddingGateway {
    async fn embed(&self, texts: &[String], kind: EmbedKind) -> Result<EmbeddingBatch, EmbeddingError> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch::default());
        }

        let normalized: Vec<String> = texts.iter().map(|t| normalize(t)).collect();
        let inputs = self.prepare_inputs(&normalized, kind);

        let call = async {
            match self.provider.as_str() {
                "ollama" => self.embed_ollama(&inputs).await,
                "openai" => self.embed_openai(&inputs).await,
                other => Err(EmbeddingError::NotImplemented(other.to_string())),
            }
        };

        let vectors = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| EmbeddingError::Timeout(self.timeout_secs))??;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::BatchMismatch {
                sent: texts.len(),
                received: vectors.len(),
            });
        }

        debug!(
            "Embedded {} texts ({:?}), dims={}",
            texts.len(),
            kind,
            vectors.first().map_or(0, Vec::len)
        );

        Ok(EmbeddingBatch { vectors, normalized })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(model: &str, instruction: Option<String>) -> HttpEmbeddingGateway {
        HttpEmbeddingGateway::new("ollama", "http://localhost:11434/", model, None, instruction, 5)
    }

    #[test]
    fn test_bge_models_get_query_instruction() {
        let gw = gateway("bge-base-en-v1.5", None);
        let inputs = gw.prepare_inputs(&["poverty rate".to_string()], EmbedKind::Query);
        assert_eq!(inputs[0], format!("{BGE_QUERY_INSTRUCTION}poverty rate"));
    }

    #[test]
    fn test_documents_never_get_instruction() {
        let gw = gateway("bge-base-en-v1.5", None);
        let inputs = gw.prepare_inputs(&["poverty rate".to_string()], EmbedKind::Document);
        assert_eq!(inputs[0], "poverty rate");
    }

    #[test]
    fn test_non_bge_models_have_no_instruction() {
        let gw = gateway("nomic-embed-text", None);
        let inputs = gw.prepare_inputs(&["income".to_string()], EmbedKind::Query);
        assert_eq!(inputs[0], "income");
    }

    #[test]
    fn test_explicit_instruction_wins() {
        let gw = gateway("nomic-embed-text", Some("search_query: ".to_string()));
        let inputs = gw.prepare_inputs(&["income".to_string()], EmbedKind::Query);
        assert_eq!(inputs[0], "search_query: income");
    }

    #[tokio::test]
    async fn test_unknown_provider_is_rejected() {
        let gw = HttpEmbeddingGateway::new("nope", "http://localhost", "m", None, None, 5);
        let result = gw.embed(&["text".to_string()], EmbedKind::Document).await;
        assert!(matches!(result, Err(EmbeddingError::NotImplemented(_))));
    }
}
