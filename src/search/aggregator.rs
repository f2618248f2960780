
use futures::future::try_join_all;
use std::collections::HashSet;
use tracing::{debug, info};

use super::SearchError;
use super::models::{ConceptResults, Decomposition, GeographicLevel, Purpose, ScoredMatch};
use super::scorer::HybridScorer;
use crate::catalog::Catalog;

/// Even split of the total budget across concepts, at least one each.
pub fn per_concept_limit(total_budget: usize, concept_count: usize) -> usize {
    (total_budget / concept_count.max(1)).max(1)
}


#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Raw per-concept lists in decomposition order.
    pub results_by_query: Vec<ConceptResults>,
    /// Deduplicated and geographically filtered, in purpose-priority order.
    pub matches: Vec<ScoredMatch>,
    pub geographic_filtered: usize,
}

pub struct Aggregator {
    scorer: HybridScorer,
}

impl Aggregator {
    pub fn new(scorer: HybridScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &HybridScorer {
        &self.scorer
    }

    pub async fn aggregate(
        &self,
        decomposition: &Decomposition,
        catalog: &Catalog,
        total_budget: usize,
    ) -> Result<Aggregation, SearchError> {
        let limit = per_concept_limit(total_budget, decomposition.concepts.len());
        debug!(
            "Aggregating {} concepts, per_concept_limit={}",
            decomposition.concepts.len(),
            limit
        );

        let per_concept = try_join_all(
            decomposition
                .concepts
                .iter()
                .map(|c| self.scorer.score(&c.query, c.purpose, catalog, limit)),
        )
        .await?;

        let results_by_query: Vec<ConceptResults> = decomposition
            .concepts
            .iter()
            .zip(per_concept)
            .map(|(concept, results)| ConceptResults {
                query: concept.query.clone(),
                purpose: concept.purpose,
                results,
            })
            .collect();

        let deduped = dedup_by_priority(&results_by_query);
        let before_filter = deduped.len();
        let matches = match decomposition.geographic_level {
            Some(level) => filter_geography(deduped, level),
            None => deduped,
        };
        let geographic_filtered = before_filter - matches.len();

        info!(
            "Aggregated {} unique candidates ({} dropped by geographic filter)",
            matches.len(),
            geographic_filtered
        );

        Ok(Aggregation {
            results_by_query,
            matches,
            geographic_filtered,
        })
    }
}

/// First occurrence wins, walking purposes in priority order and concepts in
/// decomposition order within each purpose.
pub fn dedup_by_priority(results_by_query: &[ConceptResults]) -> Vec<ScoredMatch> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut unique = Vec::new();

    for purpose in Purpose::priority_order() {
        for concept in results_by_query.iter().filter(|c| c.purpose == purpose) {
            for m in &concept.results {
                if seen.insert(m.id()) {
                    unique.push(m.clone());
                }
            }
        }
    }
    unique
}

/// Drops matches labelled with a different entity type. Unlabelled matches stay.
pub fn filter_geography(matches: Vec<ScoredMatch>, level: GeographicLevel) -> Vec<ScoredMatch> {
    matches
        .into_iter()
        .filter(|m| match m.variable.entity_type.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(label) => level.matches_label(label),
        })
        .collect()
}
