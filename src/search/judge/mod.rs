//! LLM relevance verification over aggregated candidates.
//!
//! Verification fails open: when the judge cannot be reached or understood,
//! candidates are kept and annotated rather than dropped.

pub mod prompt;

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::models::{Decomposition, ScoredMatch, VerificationOutcome, VerificationStatus};
use crate::llm::json::extract_json;
use crate::llm::providers::{LlmProvider, generate_with_timeout};
use prompt::{SYSTEM_PROMPT, build_judge_prompt};

#[derive(Debug, Clone, Copy)]
pub struct JudgeConfig {
    /// At or below this many candidates the judge is not called.
    pub min_candidates: usize,
    /// Candidates shown to the judge; the rest are kept as unjudged.
    pub max_candidates: usize,
    /// Kept when the judge answers with an empty selection.
    pub fallback_top_n: usize,
    pub timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            min_candidates: 5,
            max_candidates: 20,
            fallback_top_n: 5,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Verification {
    pub matches: Vec<ScoredMatch>,
    pub outcome: VerificationOutcome,
}

pub struct RelevanceJudge {
    llm: Arc<dyn LlmProvider>,
    config: JudgeConfig,
}

impl RelevanceJudge {
    pub fn new(llm: Arc<dyn LlmProvider>, config: JudgeConfig) -> Self {
        info!(
            "RelevanceJudge initialized: provider={}, max_candidates={}",
            llm.provider_name(),
            config.max_candidates
        );
        Self { llm, config }
    }

    pub async fn verify(
        &self,
        query: &str,
        decomposition: &Decomposition,
        candidates: Vec<ScoredMatch>,
    ) -> Verification {
        if candidates.len() <= self.config.min_candidates {
            debug!("{} candidates, skipping relevance judge", candidates.len());
            return Verification {
                matches: mark(candidates, VerificationStatus::AutoIncluded),
                outcome: VerificationOutcome::Skipped,
            };
        }

        // Positions into `candidates`, best hybrid score first; `candidates` keeps the caller's order.
        let mut ranked: Vec<usize> = (0..candidates.len()).collect();
        ranked.sort_by(|&a, &b| candidates[b].hybrid_score.total_cmp(&candidates[a].hybrid_score));

        let shown_count = candidates.len().min(self.config.max_candidates);
        let shown: Vec<ScoredMatch> = ranked[..shown_count]
            .iter()
            .map(|&i| candidates[i].clone())
            .collect();
        let prompt = build_judge_prompt(query, decomposition, &shown);

        debug!("Calling LLM judge with {} of {} candidates", shown_count, candidates.len());

        let response = match generate_with_timeout(
            self.llm.as_ref(),
            SYSTEM_PROMPT,
            &prompt,
            Some("json_object"),
            self.config.timeout_secs,
        )
        .await
        {
            Ok((response, _metadata)) => response,
            Err(e) => {
                warn!("Relevance judge call failed, keeping all candidates: {}", e);
                return Verification {
                    matches: mark(candidates, VerificationStatus::ErrorFallback),
                    outcome: VerificationOutcome::ErrorFallback,
                };
            }
        };

        let Some(selection) = parse_selection(&response, shown_count) else {
            warn!(
                "Could not parse relevance judge response, keeping all candidates: {}",
                crate::text::safe_truncate(&response, 200)
            );
            return Verification {
                matches: mark(candidates, VerificationStatus::ParseFailed),
                outcome: VerificationOutcome::ParseFailed,
            };
        };

        if selection.is_empty() {
            warn!(
                "Relevance judge kept nothing, falling back to top {}",
                self.config.fallback_top_n
            );
            let top: Vec<ScoredMatch> = shown
                .into_iter()
                .chain(ranked[shown_count..].iter().map(|&i| candidates[i].clone()))
                .take(self.config.fallback_top_n)
                .collect();
            return Verification {
                matches: mark(top, VerificationStatus::EmptyFallback),
                outcome: VerificationOutcome::EmptyFallback,
            };
        }

        let mut reasons: HashMap<usize, Option<String>> = selection
            .into_iter()
            .map(|(pos, reason)| (ranked[pos], reason))
            .collect();
        let shown_positions: HashSet<usize> = ranked[..shown_count].iter().copied().collect();
        let matches: Vec<ScoredMatch> = candidates
            .into_iter()
            .enumerate()
            .filter_map(|(i, mut m)| {
                if !shown_positions.contains(&i) {
                    m.verification = VerificationStatus::Unjudged;
                    return Some(m);
                }
                let reason = reasons.remove(&i)?;
                m.verification = VerificationStatus::Verified;
                m.relevance_reason = reason;
                Some(m)
            })
            .collect();

        info!(
            "Relevance judge kept {} of {} shown candidates",
            matches
                .iter()
                .filter(|m| m.verification == VerificationStatus::Verified)
                .count(),
            shown_count
        );

        Verification {
            matches,
            outcome: VerificationOutcome::Verified,
        }
    }
}

fn mark(mut matches: Vec<ScoredMatch>, status: VerificationStatus) -> Vec<ScoredMatch> {
    for m in &mut matches {
        m.verification = status;
    }
    matches
}

/// Zero-based kept indices with optional reasons, in first-seen order.
///
/// Accepts `{"relevant": [{"index", "reason"} | n]}`, `{"relevant_indices": [n]}`
/// or a bare array. Out-of-range and repeated indices are skipped.
/// `None` means the response could not be understood at all.
pub fn parse_selection(response: &str, shown_count: usize) -> Option<Vec<(usize, Option<String>)>> {
    let payload = extract_json(response)?;
    let entries = match &payload {
        Value::Array(items) => items,
        Value::Object(fields) => fields
            .get("relevant")
            .or_else(|| fields.get("relevant_indices"))
            .and_then(Value::as_array)?,
        _ => return None,
    };

    let mut selection: Vec<(usize, Option<String>)> = Vec::new();
    for entry in entries {
        let (index, reason) = match entry {
            Value::Object(fields) => (
                fields.get("index").and_then(as_index),
                fields
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty()),
            ),
            other => (as_index(other), None),
        };

        let Some(index) = index.filter(|i| (1..=shown_count).contains(i)) else {
            continue;
        };
        if selection.iter().any(|(seen, _)| *seen == index - 1) {
            continue;
        }
        selection.push((index - 1, reason));
    }
    Some(selection)
}

fn as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
