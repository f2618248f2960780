//! End-to-end variable search: decompose, aggregate, verify, rank.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::SearchError;
use super::aggregator::Aggregator;
use super::decomposer::{DecomposerConfig, QueryDecomposer};
use super::judge::{JudgeConfig, RelevanceJudge, Verification};
use super::models::{
    AggregatedResultSet, Decomposition, PurposeCounts, ResultsByPurpose, ScoredMatch, SearchStats, VerificationOutcome,
    VerificationStatus,
};
use super::scorer::{HybridScorer, HybridWeights};
use crate::catalog::{Catalog, CatalogBuilder, CatalogStore, load_rows};
use crate::core::config::GeoarkConfig;
use crate::core::error::Result;
use crate::llm::factory::{EmbeddingGatewayFactory, LlmProviderFactory};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub use_verification: bool,
    pub total_budget: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_verification: true,
            total_budget: 15,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &GeoarkConfig) -> Self {
        Self {
            use_verification: config.use_verification,
            total_budget: config.total_budget,
        }
    }
}

pub struct SearchPipeline {
    catalog: Arc<CatalogStore>,
    decomposer: QueryDecomposer,
    aggregator: Aggregator,
    judge: Option<RelevanceJudge>,
    max_results: usize,
    defaults: RunOptions,
}

impl SearchPipeline {
    pub fn new(
        catalog: Arc<CatalogStore>,
        decomposer: QueryDecomposer,
        aggregator: Aggregator,
        judge: Option<RelevanceJudge>,
        max_results: usize,
    ) -> Self {
        Self {
            catalog,
            decomposer,
            aggregator,
            judge,
            max_results,
            defaults: RunOptions::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: RunOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Wires providers from config and builds the catalog from `catalog_path`, if set.
    pub async fn from_config(config: &GeoarkConfig) -> Result<Self> {
        config.validate()?;

        let gateway = EmbeddingGatewayFactory::from_config(config);
        let llm = LlmProviderFactory::from_config(config)?;

        let catalog = match &config.catalog_path {
            Some(path) => {
                let rows = load_rows(path)?;
                CatalogBuilder::new(gateway.clone(), config.embedding_batch_size)
                    .build(rows)
                    .await?
            }
            None => {
                warn!("No catalog_path configured, starting with an empty catalog");
                Catalog::empty()
            }
        };

        let decomposer = QueryDecomposer::new(
            llm.clone(),
            DecomposerConfig {
                max_concepts: config.max_concepts,
                llm_timeout_secs: config.llm_timeout_secs,
            },
        );
        let weights = HybridWeights {
            semantic: config.semantic_weight,
            keyword: config.keyword_weight,
        };
        let aggregator = Aggregator::new(HybridScorer::new(gateway, weights));
        let judge = llm.map(|llm| {
            RelevanceJudge::new(
                llm,
                JudgeConfig {
                    min_candidates: config.verification_min_candidates,
                    max_candidates: config.verification_max_candidates,
                    fallback_top_n: config.verification_fallback_top_n,
                    timeout_secs: config.llm_timeout_secs,
                },
            )
        });

        info!(
            "SearchPipeline ready: {} variables, llm={}",
            catalog.len(),
            config.llm_enabled()
        );

        Ok(Self::new(
            Arc::new(CatalogStore::new(catalog)),
            decomposer,
            aggregator,
            judge,
            config.max_results,
        )
        .with_defaults(RunOptions::from_config(config)))
    }

    pub fn default_options(&self) -> RunOptions {
        self.defaults
    }

    pub fn catalog_store(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn weights(&self) -> HybridWeights {
        self.aggregator.scorer().weights()
    }

    /// Decomposition only, no scoring. Blank queries are rejected like in `run`.
    pub async fn decompose(&self, query: &str) -> std::result::Result<Decomposition, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        Ok(self.decomposer.decompose(query).await)
    }

    pub async fn run(&self, query: &str, options: RunOptions) -> std::result::Result<AggregatedResultSet, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        self.run_traced(Uuid::new_v4(), query, options).await
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    async fn run_traced(
        &self,
        run_id: Uuid,
        query: &str,
        options: RunOptions,
    ) -> std::result::Result<AggregatedResultSet, SearchError> {
        let started = Instant::now();
        let catalog = self.catalog.snapshot();
        info!(
            "Search started: '{}' over {} variables",
            crate::text::safe_truncate(query, 80),
            catalog.len()
        );

        let decomposition = self.decomposer.decompose(query).await;
        let aggregation = self
            .aggregator
            .aggregate(&decomposition, &catalog, options.total_budget)
            .await?;
        let total_candidates = aggregation.matches.len();

        let verification = match (&self.judge, options.use_verification) {
            (Some(judge), true) => judge.verify(query, &decomposition, aggregation.matches).await,
            (None, true) => {
                debug!("Verification requested but no LLM is configured");
                Verification {
                    matches: aggregation.matches,
                    outcome: VerificationOutcome::Disabled,
                }
            }
            (_, false) => Verification {
                matches: aggregation.matches,
                outcome: VerificationOutcome::Disabled,
            },
        };

        let all_results = rank_final(verification.matches, self.max_results);
        let results_by_purpose = ResultsByPurpose::group(&all_results);

        let stats = SearchStats {
            run_id,
            purpose_counts: PurposeCounts::from_grouped(&results_by_purpose),
            total_candidates,
            total_results: all_results.len(),
            geographic_filtered: aggregation.geographic_filtered,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            fallback_decomposition: decomposition.fallback_used,
            verification_ran: !matches!(
                verification.outcome,
                VerificationOutcome::Disabled | VerificationOutcome::Skipped
            ),
            verification_outcome: verification.outcome,
        };

        info!(
            "Search finished: {} results from {} candidates in {}ms (verification={:?})",
            stats.total_results, stats.total_candidates, stats.elapsed_ms, stats.verification_outcome
        );

        Ok(AggregatedResultSet {
            query: query.to_string(),
            decomposition,
            results_by_query: aggregation.results_by_query,
            results_by_purpose,
            all_results,
            stats,
        })
    }
}

/// Verified first, then hybrid score descending; stable, then truncated.
pub fn rank_final(mut matches: Vec<ScoredMatch>, max_results: usize) -> Vec<ScoredMatch> {
    matches.sort_by(|a, b| {
        let a_verified = a.verification == VerificationStatus::Verified;
        let b_verified = b.verification == VerificationStatus::Verified;
        b_verified
            .cmp(&a_verified)
            .then_with(|| b.hybrid_score.total_cmp(&a.hybrid_score))
    });
    matches.truncate(max_results);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::models::{GeographicLevel, Purpose};
    use crate::test_support::{SCENARIO_VOCABULARY, StubEmbedder, StubLlm, catalog, scenario_rows};
    use std::collections::HashSet;

    fn pipeline(embedder: Arc<StubEmbedder>, judge: Option<Arc<StubLlm>>) -> SearchPipeline {
        let catalog = catalog(&embedder, &scenario_rows());
        SearchPipeline::new(
            Arc::new(CatalogStore::new(catalog)),
            QueryDecomposer::rule_based(8),
            Aggregator::new(HybridScorer::new(embedder, HybridWeights::default())),
            judge.map(|llm| {
                RelevanceJudge::new(
                    llm,
                    JudgeConfig {
                        timeout_secs: 5,
                        ..JudgeConfig::default()
                    },
                )
            }),
            20,
        )
    }

    fn unverified(budget: usize) -> RunOptions {
        RunOptions {
            use_verification: false,
            total_budget: budget,
        }
    }

    fn ids(matches: &[ScoredMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.id()).collect()
    }

    #[tokio::test]
    async fn test_poverty_rate_per_capita_by_county() {
        let embedder = Arc::new(StubEmbedder::new(SCENARIO_VOCABULARY));
        let result = pipeline(embedder, None)
            .run("poverty rate per capita by county", unverified(6))
            .await
            .unwrap();

        let d = &result.decomposition;
        assert_eq!(d.primary_concepts, vec!["poverty rate"]);
        assert_eq!(d.normalization_concepts, vec!["total population"]);
        assert_eq!(d.geographic_level, Some(GeographicLevel::County));

        assert_eq!(result.results_by_query.len(), 2);
        assert!(result.results_by_query.iter().all(|c| c.results.len() == 3));

        let by_purpose = &result.results_by_purpose;
        assert_eq!(by_purpose.primary[0].id(), "Poverty_Rate_Est");
        assert!(!ids(&by_purpose.primary).contains(&"Total_Population"));
        assert_eq!(ids(&by_purpose.normalization), vec!["Total_Population"]);
        assert!(!ids(&result.all_results).contains(&"Population_Density"));

        let stats = &result.stats;
        assert_eq!(stats.geographic_filtered, 1);
        assert_eq!(stats.total_candidates, 4);
        assert_eq!(stats.total_results, 4);
        assert_eq!(stats.purpose_counts.primary, 3);
        assert_eq!(stats.purpose_counts.normalization, 1);
        assert!(stats.fallback_decomposition);
        assert!(!stats.verification_ran);
        assert_eq!(stats.verification_outcome, VerificationOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_single_token_query() {
        let embedder = Arc::new(StubEmbedder::new(SCENARIO_VOCABULARY));
        let result = pipeline(embedder, None).run("x", unverified(15)).await.unwrap();

        assert_eq!(result.decomposition.concepts.len(), 1);
        assert_eq!(result.decomposition.primary_concepts, vec!["x"]);
        assert_eq!(result.results_by_query[0].purpose, Purpose::Primary);
    }

    #[tokio::test]
    async fn test_results_are_unique_and_grouped() {
        let embedder = Arc::new(StubEmbedder::new(SCENARIO_VOCABULARY));
        let result = pipeline(embedder, None)
            .run("poverty rate, unemployment and median household income", unverified(30))
            .await
            .unwrap();

        let unique: HashSet<&str> = ids(&result.all_results).into_iter().collect();
        assert_eq!(unique.len(), result.all_results.len());

        for purpose in Purpose::priority_order() {
            for m in result.results_by_purpose.bucket(purpose) {
                assert!(unique.contains(m.id()));
            }
        }
        assert!(result.all_results.windows(2).all(|w| w[0].hybrid_score >= w[1].hybrid_score));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let embedder = Arc::new(StubEmbedder::new(SCENARIO_VOCABULARY));
        let result = pipeline(embedder, None).run("   ", unverified(15)).await;
        assert!(matches!(result, Err(SearchError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_decompose_rejects_blank_query() {
        let embedder = Arc::new(StubEmbedder::new(SCENARIO_VOCABULARY));
        let pipeline = pipeline(embedder.clone(), None);

        tokio_test::assert_err!(pipeline.decompose("").await);
        assert!(matches!(pipeline.decompose(" \t ").await, Err(SearchError::EmptyQuery)));

        let decomposition = pipeline.decompose("  poverty rate by county ").await.unwrap();
        assert!(!decomposition.concepts.is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_short_embedding_batch_is_fatal() {
        let embedder = Arc::new(StubEmbedder::short_batches(SCENARIO_VOCABULARY));
        let result = pipeline(embedder, None).run("poverty rate", unverified(15)).await;
        assert!(matches!(
            result,
            Err(SearchError::Embedding(crate::llm::embeddings::EmbeddingError::BatchMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_fatal() {
        let embedder = Arc::new(StubEmbedder::failing(SCENARIO_VOCABULARY));
        let result = pipeline(embedder, None).run("poverty rate", unverified(15)).await;
        assert!(matches!(result, Err(SearchError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_verification_keeps_judged_subset() {
        let embedder = Arc::new(StubEmbedder::new(SCENARIO_VOCABULARY));
        let llm = Arc::new(StubLlm::replying(
            r#"{"relevant": [{"index": 2, "reason": "margin"}, {"index": 1, "reason": "estimate"}]}"#,
        ));
        let options = RunOptions {
            use_verification: true,
            total_budget: 16,
        };
        let result = pipeline(embedder, Some(llm.clone()))
            .run("poverty rate by county", options)
            .await
            .unwrap();

        assert_eq!(ids(&result.all_results), vec!["Poverty_Rate_Est", "Poverty_Rate_MOE"]);
        assert!(result.all_results.iter().all(|m| m.verification == VerificationStatus::Verified));
        assert_eq!(result.stats.verification_outcome, VerificationOutcome::Verified);
        assert!(result.stats.verification_ran);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_verification_fails_open() {
        let embedder = Arc::new(StubEmbedder::new(SCENARIO_VOCABULARY));
        let options = RunOptions {
            use_verification: true,
            total_budget: 16,
        };
        let result = pipeline(embedder, Some(Arc::new(StubLlm::failing())))
            .run("poverty rate by county", options)
            .await
            .unwrap();

        assert_eq!(result.stats.verification_outcome, VerificationOutcome::ErrorFallback);
        assert_eq!(result.all_results.len(), result.stats.total_candidates);
        assert!(!result.all_results.is_empty());
        assert!(
            result
                .all_results
                .iter()
                .all(|m| m.verification == VerificationStatus::ErrorFallback)
        );
    }

    #[test]
    fn test_rank_final_puts_verified_first() {
        let embedder = StubEmbedder::new(SCENARIO_VOCABULARY);
        let catalog = catalog(&embedder, &scenario_rows());
        let matches: Vec<ScoredMatch> = catalog
            .variables()
            .iter()
            .take(4)
            .enumerate()
            .map(|(i, v)| ScoredMatch {
                variable: v.into(),
                semantic_score: 0.0,
                lexical_score: 0.0,
                hybrid_score: i as f64,
                concept: "c".to_string(),
                purpose: Purpose::Primary,
                verification: if i % 2 == 0 {
                    VerificationStatus::Verified
                } else {
                    VerificationStatus::Unjudged
                },
                relevance_reason: None,
            })
            .collect();

        let ranked = rank_final(matches, 3);
        let scores: Vec<f64> = ranked.iter().map(|m| m.hybrid_score).collect();
        assert_eq!(scores, vec![2.0, 0.0, 3.0]);
    }
}
