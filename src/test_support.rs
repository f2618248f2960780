//! Deterministic stand-ins for the external model calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::catalog::{Catalog, CatalogRow, CatalogVariable};
use crate::llm::embeddings::{EmbedKind, EmbeddingBatch, EmbeddingError, EmbeddingGateway};
use crate::llm::providers::{LlmMetadata, LlmProvider, LlmProviderError};
use crate::text::normalize;

enum StubBehavior {
    Replies(Mutex<VecDeque<String>>),
    Fail,
    Hang,
}

pub struct StubLlm {
    behavior: StubBehavior,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubLlm {
    /// Returns `reply` for every call.
    pub fn replying(reply: &str) -> Self {
        Self::scripted(&[reply])
    }

    /// Pops replies in order; the last one repeats.
    pub fn scripted(replies: &[&str]) -> Self {
        Self::with(StubBehavior::Replies(Mutex::new(
            replies.iter().map(|r| (*r).to_string()).collect(),
        )))
    }

    pub fn failing() -> Self {
        Self::with(StubBehavior::Fail)
    }

    pub fn hanging() -> Self {
        Self::with(StubBehavior::Hang)
    }

    fn with(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn generate(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _response_format: Option<&str>,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(user_prompt.to_string());

        match &self.behavior {
            StubBehavior::Replies(queue) => {
                let mut queue = queue.lock();
                let reply = if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                };
                Ok((reply, LlmMetadata::default()))
            }
            StubBehavior::Fail => Err(LlmProviderError::Provider("stub failure".to_string())),
            StubBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LlmProviderError::Provider("unreachable".to_string()))
            }
        }
    }

    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

/// Bag-of-words embedder over a fixed vocabulary: one dimension per word,
/// so cosine similarity tracks shared vocabulary exactly.
pub struct StubEmbedder {
    vocabulary: Vec<String>,
    calls: AtomicUsize,
    kinds: Mutex<Vec<EmbedKind>>,
    fail: bool,
    short_batches: bool,
    padded_batches: bool,
}

impl StubEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| normalize(w)).collect(),
            calls: AtomicUsize::new(0),
            kinds: Mutex::new(Vec::new()),
            fail: false,
            short_batches: false,
            padded_batches: false,
        }
    }

    pub fn failing(vocabulary: &[&str]) -> Self {
        Self {
            fail: true,
            ..Self::new(vocabulary)
        }
    }

    pub fn short_batches(vocabulary: &[&str]) -> Self {
        Self {
            short_batches: true,
            ..Self::new(vocabulary)
        }
    }

    /// Answers every call with one extra vector and normalized form.
    pub fn padded_batches(vocabulary: &[&str]) -> Self {
        Self {
            padded_batches: true,
            ..Self::new(vocabulary)
        }
    }

    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn kinds(&self) -> Vec<EmbedKind> {
        self.kinds.lock().clone()
    }

    pub fn vector(&self, normalized: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for token in normalized.split_whitespace() {
            if let Some(idx) = self.vocabulary.iter().position(|w| w == token) {
                vector[idx] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingGateway for StubEmbedder {
    async fn embed(&self, texts: &[String], kind: EmbedKind) -> Result<EmbeddingBatch, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.kinds.lock().push(kind);

        if self.fail {
            return Err(EmbeddingError::InvalidResponse("stub gateway down".to_string()));
        }

        let mut normalized: Vec<String> = texts.iter().map(|t| normalize(t)).collect();
        let mut vectors: Vec<Vec<f32>> = normalized.iter().map(|n| self.vector(n)).collect();
        if self.short_batches {
            vectors.pop();
        }
        if self.padded_batches {
            vectors.push(vec![0.0; self.vocabulary.len()]);
            normalized.push(String::new());
        }
        Ok(EmbeddingBatch { vectors, normalized })
    }

    fn model_name(&self) -> &str {
        "stub-embedder"
    }
}

pub fn row(field_name: &str, description: &str, entity_type: Option<&str>) -> CatalogRow {
    CatalogRow {
        id: None,
        dataset_id: "acs".to_string(),
        table_id: "acs_table".to_string(),
        description: description.to_string(),
        field_name: field_name.to_string(),
        tags: Vec::new(),
        entity_type: entity_type.map(String::from),
        geometry_type: None,
    }
}

/// Builds a catalog synchronously with the stub's vectors.
pub fn catalog(embedder: &StubEmbedder, rows: &[CatalogRow]) -> Catalog {
    let variables = rows
        .iter()
        .map(|r| {
            let normalized_text = normalize(&r.document_text());
            CatalogVariable {
                id: r.field_name.clone(),
                dataset_id: r.dataset_id.clone(),
                table_id: r.table_id.clone(),
                description: r.description.clone(),
                field_name: r.field_name.clone(),
                tags: r.tags.clone(),
                entity_type: r.entity_type.clone(),
                geometry_type: r.geometry_type.clone(),
                embedding: embedder.vector(&normalized_text),
                normalized_text,
            }
        })
        .collect();
    Catalog::new(variables).expect("stub catalog is valid")
}

/// Vocabulary and rows for the poverty / population scenario.
pub const SCENARIO_VOCABULARY: &[&str] = &[
    "poverty", "rate", "total", "population", "child", "count", "median", "household",
    "income", "density", "unemployment", "estimate", "margin", "error", "rural", "urban",
];

pub fn scenario_rows() -> Vec<CatalogRow> {
    vec![
        row("Poverty_Rate_Est", "Poverty rate estimate", Some("COUNTY")),
        row("Child_Poverty_Rate", "Child poverty rate", Some("COUNTY")),
        row("Poverty_Rate_MOE", "Poverty rate margin of error", Some("COUNTY")),
        row("Total_Population", "Total population count", Some("COUNTY")),
        row("Population_Density", "Population density", Some("TRACT")),
        row("Median_Household_Income", "Median household income", Some("COUNTY")),
        row("Unemployment_Rate", "Unemployment rate", Some("COUNTY")),
        row("Rural_Urban_Code", "Rural urban continuum code", None),
    ]
}
