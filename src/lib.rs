//! GeoARK variable search.
//!
//! Maps a natural-language data request onto catalog variables: the query is
//! decomposed into purpose-tagged concepts, each concept is scored against the
//! catalog with a hybrid semantic/lexical score, results are merged and
//! geographically filtered, and an optional LLM judge confirms relevance.

pub mod catalog;
pub mod core;
pub mod llm;
pub mod mcp;
pub mod search;
pub mod text;

#[cfg(test)]
mod test_support;

pub use catalog::{Catalog, CatalogBuilder, CatalogRow, CatalogStore, CatalogVariable};
pub use crate::core::config::GeoarkConfig;
pub use crate::core::error::{GeoarkError, Result};
pub use search::{AggregatedResultSet, Decomposition, RunOptions, ScoredMatch, SearchError, SearchPipeline};
pub use text::safe_truncate;


pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";


pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";


pub const DEFAULT_LLM_MODEL: &str = "llama3.1:8b";
