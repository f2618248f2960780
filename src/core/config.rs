
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{GeoarkError, Result};
use crate::{DEFAULT_EMBEDDING_MODEL, DEFAULT_LLM_MODEL, DEFAULT_OLLAMA_URL};


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoarkConfig {

    pub catalog_path: Option<PathBuf>,

    /// Empty string disables the model-assisted decomposer and the judge.
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_temperature: f64,
    pub llm_timeout_secs: u64,


    pub llm_fallback_enabled: bool,
    pub llm_fallback_url: String,
    pub llm_fallback_model: String,


    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_query_instruction: Option<String>,
    pub embedding_batch_size: usize,
    pub embedding_timeout_secs: u64,


    pub semantic_weight: f64,
    pub keyword_weight: f64,
    pub total_budget: usize,
    pub max_results: usize,
    pub max_concepts: usize,
    pub use_verification: bool,
    pub verification_min_candidates: usize,
    pub verification_max_candidates: usize,
    pub verification_fallback_top_n: usize,
}

impl Default for GeoarkConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,

            llm_provider: "ollama".to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: None,
            llm_base_url: None,
            llm_temperature: 0.2,
            llm_timeout_secs: 60,

            llm_fallback_enabled: false,
            llm_fallback_url: DEFAULT_OLLAMA_URL.to_string(),
            llm_fallback_model: "llama3.2".to_string(),

            embedding_provider: "ollama".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_api_key: None,
            embedding_query_instruction: None,
            embedding_batch_size: 500,
            embedding_timeout_secs: 30,

            semantic_weight: 0.7,
            keyword_weight: 0.3,
            total_budget: 15,
            max_results: 20,
            max_concepts: 8,
            use_verification: true,
            verification_min_candidates: 5,
            verification_max_candidates: 20,
            verification_fallback_top_n: 5,
        }
    }
}

impl GeoarkConfig {
    /// Layers an optional config file under `GEOARK_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(config::Environment::with_prefix("GEOARK").try_parsing(true));

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }


    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }


    pub fn validate(&self) -> Result<()> {
        if self.semantic_weight < 0.0 || self.keyword_weight < 0.0 {
            return Err(GeoarkError::Config(
                "semantic_weight and keyword_weight must be non-negative".to_string(),
            ));
        }
        let sum = self.semantic_weight + self.keyword_weight;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(GeoarkError::Config(format!(
                "semantic_weight + keyword_weight must equal 1.0 (got {sum})"
            )));
        }
        for (name, value) in [
            ("total_budget", self.total_budget),
            ("max_results", self.max_results),
            ("max_concepts", self.max_concepts),
            ("embedding_batch_size", self.embedding_batch_size),
            ("verification_max_candidates", self.verification_max_candidates),
            ("verification_fallback_top_n", self.verification_fallback_top_n),
        ] {
            if value == 0 {
                return Err(GeoarkError::Config(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }


    pub fn llm_enabled(&self) -> bool {
        !self.llm_provider.trim().is_empty() && self.llm_provider != "none"
    }
}
