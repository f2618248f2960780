//! Query decomposition: natural-language query to purpose-tagged concepts.
//!
//! A configured LLM is tried first; any failure falls back to keyword rules,
//! so `decompose` always yields at least one concept.

pub mod patterns;
pub mod prompt;

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::models::{Concept, Decomposition, GeographicLevel, Purpose, TemporalFilter};
use crate::llm::json::extract_json_object;
use crate::llm::providers::{LlmProvider, generate_with_timeout};
use crate::text::safe_truncate;
use prompt::{SYSTEM_PROMPT, build_decomposition_prompt};

/// Responses shorter than this (trimmed) are treated as empty.
const MIN_RESPONSE_CHARS: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct DecomposerConfig {
    pub max_concepts: usize,
    pub llm_timeout_secs: u64,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            max_concepts: 8,
            llm_timeout_secs: 60,
        }
    }
}

pub struct QueryDecomposer {
    llm: Option<Arc<dyn LlmProvider>>,
    config: DecomposerConfig,
}

impl QueryDecomposer {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, config: DecomposerConfig) -> Self {
        match &llm {
            Some(provider) => info!(
                "QueryDecomposer initialized: provider={}, model={}",
                provider.provider_name(),
                provider.model_name()
            ),
            None => info!("QueryDecomposer initialized: rule-based only"),
        }
        Self { llm, config }
    }

    pub fn rule_based(max_concepts: usize) -> Self {
        Self::new(
            None,
            DecomposerConfig {
                max_concepts,
                ..DecomposerConfig::default()
            },
        )
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn decompose(&self, query: &str) -> Decomposition {
        if let Some(llm) = &self.llm {
            if let Some(decomposition) = self.decompose_with_llm(llm.as_ref(), query).await {
                info!(
                    "Decomposed query into {} concepts via {}",
                    decomposition.concepts.len(),
                    llm.provider_name()
                );
                return decomposition;
            }
        }

        let decomposition = self.decompose_rule_based(query);
        info!(
            "Decomposed query into {} concepts via keyword rules",
            decomposition.concepts.len()
        );
        decomposition
    }

    async fn decompose_with_llm(&self, llm: &dyn LlmProvider, query: &str) -> Option<Decomposition> {
        let prompt = build_decomposition_prompt(query);
        debug!("Calling LLM for decomposition: '{}'", safe_truncate(query, 80));

        let response = match generate_with_timeout(
            llm,
            SYSTEM_PROMPT,
            &prompt,
            Some("json_object"),
            self.config.llm_timeout_secs,
        )
        .await
        {
            Ok((response, _metadata)) => response,
            Err(e) => {
                warn!("Decomposition LLM call failed, using keyword rules: {}", e);
                return None;
            }
        };

        if response.trim().chars().count() < MIN_RESPONSE_CHARS {
            warn!("Decomposition response too short, using keyword rules");
            return None;
        }

        let Some(payload) = extract_json_object(&response) else {
            warn!(
                "No JSON object in decomposition response, using keyword rules: {}",
                safe_truncate(&response, 200)
            );
            return None;
        };

        let concepts = parse_search_queries(&payload);
        if concepts.is_empty() {
            warn!("Decomposition response had no usable search_queries, using keyword rules");
            return None;
        }

        let geographic_level = payload
            .get("geographic_level")
            .and_then(Value::as_str)
            .and_then(GeographicLevel::parse_lenient)
            .or_else(|| patterns::detect_geographic_level(&query.to_lowercase()));

        Some(Decomposition::from_concepts(
            query,
            concepts,
            self.config.max_concepts,
            geographic_level,
            parse_temporal_filter(&payload),
            false,
        ))
    }

    /// Keyword-rule decomposition. Never fails and never calls out.
    pub fn decompose_rule_based(&self, query: &str) -> Decomposition {
        let lower = query.to_lowercase();
        let mut concepts: Vec<Concept> = Vec::new();

        let stripped = patterns::strip_non_concept_terms(&lower);
        for phrase in patterns::split_phrases(&stripped) {
            concepts.push(Concept::new(phrase, Purpose::Primary));
        }

        if patterns::has_normalization_intent(&lower) {
            concepts.push(Concept::new(patterns::NORMALIZATION_CONCEPT, Purpose::Normalization));
        }

        for keyword in patterns::detect_filters(&lower) {
            concepts.push(Concept::new(keyword, Purpose::Filter));
        }

        let geographic_level = patterns::detect_geographic_level(&lower);
        debug!(
            "Keyword rules: {} concepts, geographic_level={:?}",
            concepts.len(),
            geographic_level
        );

        Decomposition::from_concepts(
            query,
            concepts,
            self.config.max_concepts,
            geographic_level,
            None,
            true,
        )
    }
}

/// Accepts `{"query", "purpose"}` objects or bare strings; blank entries are dropped.
fn parse_search_queries(payload: &Value) -> Vec<Concept> {
    let Some(entries) = payload.get("search_queries").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(text) => Some(Concept::new(text.trim(), Purpose::Primary)),
            Value::Object(fields) => {
                let text = fields.get("query").and_then(Value::as_str)?;
                let purpose = Purpose::coerce(fields.get("purpose").and_then(Value::as_str));
                Some(Concept::new(text.trim(), purpose))
            }
            _ => None,
        })
        .filter(|c| !c.query.is_empty())
        .collect()
}

fn parse_temporal_filter(payload: &Value) -> Option<TemporalFilter> {
    let fields = payload.get("temporal_filter")?.as_object()?;
    let bound = |key: &str| match fields.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let filter = TemporalFilter {
        start: bound("start"),
        end: bound("end"),
    };
    (filter.start.is_some() || filter.end.is_some()).then_some(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubLlm;

    fn with_llm(llm: Arc<StubLlm>, timeout_secs: u64) -> QueryDecomposer {
        QueryDecomposer::new(
            Some(llm),
            DecomposerConfig {
                max_concepts: 8,
                llm_timeout_secs: timeout_secs,
            },
        )
    }

    #[test]
    fn test_rule_based_poverty_per_capita_by_county() {
        let decomposer = QueryDecomposer::rule_based(8);
        let d = decomposer.decompose_rule_based("poverty rate per capita by county");

        assert_eq!(d.primary_concepts, vec!["poverty rate"]);
        assert_eq!(d.normalization_concepts, vec!["total population"]);
        assert!(d.filter_concepts.is_empty());
        assert_eq!(d.geographic_level, Some(GeographicLevel::County));
        assert!(d.fallback_used);
    }

    #[test]
    fn test_rule_based_single_short_token() {
        let d = QueryDecomposer::rule_based(8).decompose_rule_based("x");
        assert_eq!(d.concepts, vec![Concept::new("x", Purpose::Primary)]);
        assert_eq!(d.geographic_level, None);
    }

    #[test]
    fn test_rule_based_filters_and_normalization() {
        let d = QueryDecomposer::rule_based(8)
            .decompose_rule_based("Show me poverty rates normalized by population for rural counties");

        assert_eq!(d.primary_concepts, vec!["poverty rates"]);
        assert_eq!(d.normalization_concepts, vec!["total population"]);
        assert_eq!(d.filter_concepts, vec!["rural"]);
        assert_eq!(d.geographic_level, Some(GeographicLevel::County));
    }

    #[test]
    fn test_rule_based_caps_concepts() {
        let d = QueryDecomposer::rule_based(2)
            .decompose_rule_based("income, education, housing, health insurance");
        assert_eq!(d.concepts.len(), 2);
        assert_eq!(d.primary_concepts, vec!["income", "education"]);
    }

    #[tokio::test]
    async fn test_llm_decomposition_tolerates_fences_and_prose() {
        let llm = Arc::new(StubLlm::replying(
            "Sure, here it is:\n```json\n{\"search_queries\": [\
             {\"query\": \"poverty rate\", \"purpose\": \"primary\"},\
             {\"query\": \"total population\", \"purpose\": \"Normalization\"},\
             {\"query\": \"  \", \"purpose\": \"related\"},\
             {\"query\": \"rural\", \"purpose\": \"geography\"}],\
             \"geographic_level\": \"county\",\
             \"temporal_filter\": {\"start\": 2015, \"end\": \"2020\"}}\n```",
        ));
        let d = with_llm(llm.clone(), 5).decompose("poverty rate per capita by county").await;

        assert!(!d.fallback_used);
        assert_eq!(d.primary_concepts, vec!["poverty rate", "rural"]);
        assert_eq!(d.normalization_concepts, vec!["total population"]);
        assert_eq!(d.geographic_level, Some(GeographicLevel::County));
        assert_eq!(
            d.temporal_filter,
            Some(TemporalFilter {
                start: Some("2015".to_string()),
                end: Some("2020".to_string()),
            })
        );
        assert_eq!(llm.calls(), 1);
        assert!(llm.last_prompt().unwrap().contains("poverty rate per capita by county"));
    }

    #[tokio::test]
    async fn test_llm_missing_geography_uses_keywords() {
        let llm = Arc::new(StubLlm::replying(
            r#"{"search_queries": [{"query": "median income"}], "geographic_level": null}"#,
        ));
        let d = with_llm(llm, 5).decompose("median income by census tract").await;

        assert!(!d.fallback_used);
        assert_eq!(d.primary_concepts, vec!["median income"]);
        assert_eq!(d.geographic_level, Some(GeographicLevel::Tract));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let llm = Arc::new(StubLlm::failing());
        let d = with_llm(llm.clone(), 5).decompose("poverty rate per capita by county").await;

        assert!(d.fallback_used);
        assert_eq!(d.primary_concepts, vec!["poverty rate"]);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_unusable_llm_responses_fall_back() {
        for reply in ["ok", "I cannot help with that request.", r#"{"search_queries": []}"#, r#"{"primary_concepts": ["a"]}"#] {
            let d = with_llm(Arc::new(StubLlm::replying(reply)), 5).decompose("median income").await;
            assert!(d.fallback_used, "reply {reply:?} should fall back");
            assert_eq!(d.primary_concepts, vec!["median income"]);
        }
    }

    #[tokio::test]
    async fn test_llm_timeout_falls_back() {
        let llm = Arc::new(StubLlm::hanging());
        let d = with_llm(llm, 1).decompose("x").await;

        assert!(d.fallback_used);
        assert_eq!(d.concepts, vec![Concept::new("x", Purpose::Primary)]);
    }
}
