
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::SearchError;
use super::models::{Purpose, ScoredMatch, VariableRef, VerificationStatus};
use crate::catalog::{Catalog, CatalogVariable};
use crate::llm::embeddings::{EmbedKind, EmbeddingGateway};
use crate::text;

/// Tokens this short never count toward lexical overlap.
const MIN_TOKEN_CHARS: usize = 3;


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub semantic: f64,
    pub keyword: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            keyword: 0.3,
        }
    }
}

impl HybridWeights {

    pub fn combine(&self, semantic: f64, lexical: f64) -> f64 {
        self.semantic * semantic + self.keyword * lexical
    }
}

/// Raw cosine similarity in [-1, 1]; 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Share of the query's long-enough tokens present as whole tokens in `document`.
pub fn lexical_overlap(query_normalized: &str, document_normalized: &str) -> f64 {
    let document_tokens: HashSet<&str> = text::tokens(document_normalized).collect();
    let query_tokens: Vec<&str> = text::tokens(query_normalized)
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .collect();

    let matches = query_tokens
        .iter()
        .filter(|t| document_tokens.contains(*t))
        .count();
    matches as f64 / query_tokens.len().max(1) as f64
}


pub struct HybridScorer {
    gateway: Arc<dyn EmbeddingGateway>,
    weights: HybridWeights,
}

impl HybridScorer {

    pub fn new(gateway: Arc<dyn EmbeddingGateway>, weights: HybridWeights) -> Self {
        Self { gateway, weights }
    }


    pub fn weights(&self) -> HybridWeights {
        self.weights
    }

    /// Scores every variable against `concept` and keeps the best `top_k`.
    ///
    /// Gateway failures and dimension mismatches are returned as errors;
    /// an empty result here must mean "nothing matched", never "could not score".
    pub async fn score(
        &self,
        concept: &str,
        purpose: Purpose,
        catalog: &Catalog,
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>, SearchError> {
        let batch = self
            .gateway
            .embed(&[concept.to_string()], EmbedKind::Query)
            .await?;

        if batch.vectors.len() != 1 || batch.normalized.len() != 1 {
            return Err(SearchError::Embedding(
                crate::llm::embeddings::EmbeddingError::BatchMismatch {
                    sent: 1,
                    received: if batch.vectors.len() != 1 {
                        batch.vectors.len()
                    } else {
                        batch.normalized.len()
                    },
                },
            ));
        }
        let (query_vector, query_normalized) = (&batch.vectors[0], &batch.normalized[0]);

        if !catalog.is_empty() && query_vector.len() != catalog.dimension() {
            return Err(SearchError::DimensionMismatch {
                query: query_vector.len(),
                catalog: catalog.dimension(),
            });
        }

        let mut scored: Vec<ScoredMatch> = catalog
            .variables()
            .iter()
            .map(|var| self.score_variable(concept, purpose, query_vector, query_normalized, var))
            .collect();

        // Stable sort keeps catalog order among equal scores.
        scored.sort_by(|a, b| b.hybrid_score.total_cmp(&a.hybrid_score));
        scored.truncate(top_k);

        debug!(
            "Scored '{}' against {} variables, kept {} (best={:.3})",
            text::safe_truncate(concept, 40),
            catalog.len(),
            scored.len(),
            scored.first().map_or(0.0, |m| m.hybrid_score)
        );

        Ok(scored)
    }

    fn score_variable(
        &self,
        concept: &str,
        purpose: Purpose,
        query_vector: &[f32],
        query_normalized: &str,
        var: &CatalogVariable,
    ) -> ScoredMatch {
        let semantic = cosine_similarity(query_vector, &var.embedding);
        let lexical = lexical_overlap(query_normalized, &var.normalized_text);
        ScoredMatch {
            variable: VariableRef::from(var),
            semantic_score: semantic,
            lexical_score: lexical,
            hybrid_score: self.weights.combine(semantic, lexical),
            concept: concept.to_string(),
            purpose,
            verification: VerificationStatus::Unverified,
            relevance_reason: None,
        }
    }
}
