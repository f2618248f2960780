pub mod aggregator;
pub mod decomposer;
pub mod judge;
pub mod models;
pub mod pipeline;
pub mod scorer;

use thiserror::Error;

use crate::llm::embeddings::EmbeddingError;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Query embedding has {query} dimensions but the catalog uses {catalog}")]
    DimensionMismatch { query: usize, catalog: usize },
}

pub use aggregator::{Aggregation, Aggregator, per_concept_limit};
pub use decomposer::{DecomposerConfig, QueryDecomposer};
pub use judge::{JudgeConfig, RelevanceJudge, Verification};
pub use models::{
    AggregatedResultSet, Concept, ConceptResults, Decomposition, GeographicLevel, Purpose, PurposeCounts,
    ResultsByPurpose, ScoredMatch, SearchStats, TemporalFilter, VariableRef, VerificationOutcome,
    VerificationStatus,
};
pub use pipeline::{RunOptions, SearchPipeline};
pub use scorer::{HybridScorer, HybridWeights};
