
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::catalog::CatalogVariable;


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Purpose {
    #[default]
    Primary,
    Normalization,
    Filter,
    Related,
}

impl Purpose {
    /// Unknown or missing labels fall back to `Primary`.
    pub fn coerce(label: Option<&str>) -> Self {
        label
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or_default()
    }

    /// Dedup priority order.
    pub fn priority_order() -> impl Iterator<Item = Purpose> {
        Purpose::iter()
    }


    pub fn as_str(self) -> &'static str {
        self.into()
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, IntoStaticStr, EnumIter)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum GeographicLevel {
    County,
    State,
    Tract,
    BlockGroup,
    Zip,
}

impl GeographicLevel {
    /// Lenient parse for model output ("county", "Block Group", "blockgroup", "null").
    pub fn parse_lenient(label: &str) -> Option<Self> {
        let squashed: String = label
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match squashed.as_str() {
            "county" | "counties" => Some(Self::County),
            "state" | "states" => Some(Self::State),
            "tract" | "tracts" | "censustract" => Some(Self::Tract),
            "blockgroup" | "blockgroups" | "bg" => Some(Self::BlockGroup),
            "zip" | "zips" | "zipcode" | "zipcodes" | "zcta" => Some(Self::Zip),
            _ => None,
        }
    }


    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Case-insensitive comparison against a variable's entity-type label.
    pub fn matches_label(self, label: &str) -> bool {
        Self::parse_lenient(label) == Some(self) || label.trim().eq_ignore_ascii_case(self.as_str())
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub query: String,
    pub purpose: Purpose,
}

impl Concept {

    pub fn new(query: impl Into<String>, purpose: Purpose) -> Self {
        Self {
            query: query.into(),
            purpose,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFilter {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    pub concepts: Vec<Concept>,
    pub primary_concepts: Vec<String>,
    pub normalization_concepts: Vec<String>,
    pub filter_concepts: Vec<String>,
    pub related_concepts: Vec<String>,
    pub geographic_level: Option<GeographicLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_filter: Option<TemporalFilter>,
    pub fallback_used: bool,
}

impl Decomposition {
    /// Dedupes case-insensitively, caps at `max_concepts`, and derives the
    /// purpose lists. An empty list becomes a single primary concept wrapping `query`.
    pub fn from_concepts(
        query: &str,
        concepts: Vec<Concept>,
        max_concepts: usize,
        geographic_level: Option<GeographicLevel>,
        temporal_filter: Option<TemporalFilter>,
        fallback_used: bool,
    ) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut concepts: Vec<Concept> = concepts
            .into_iter()
            .map(|c| Concept::new(c.query.trim(), c.purpose))
            .filter(|c| !c.query.is_empty())
            .filter(|c| seen.insert(c.query.to_lowercase()))
            .collect();
        concepts.truncate(max_concepts.max(1));

        if concepts.is_empty() {
            concepts.push(Concept::new(query.trim(), Purpose::Primary));
        }

        let texts_for = |purpose: Purpose| -> Vec<String> {
            concepts
                .iter()
                .filter(|c| c.purpose == purpose)
                .map(|c| c.query.clone())
                .collect()
        };

        Self {
            primary_concepts: texts_for(Purpose::Primary),
            normalization_concepts: texts_for(Purpose::Normalization),
            filter_concepts: texts_for(Purpose::Filter),
            related_concepts: texts_for(Purpose::Related),
            concepts,
            geographic_level,
            temporal_filter,
            fallback_used,
        }
    }
}

/// Identifying fields of a catalog variable; enough to fetch the data downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRef {
    pub id: String,
    pub dataset_id: String,
    pub table_id: String,
    pub field_name: String,
    pub description: String,
    pub entity_type: Option<String>,
    /// Spatial representation of the source layer (point, polygon, ...), when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<String>,
}

impl From<&CatalogVariable> for VariableRef {
    fn from(var: &CatalogVariable) -> Self {
        Self {
            id: var.id.clone(),
            dataset_id: var.dataset_id.clone(),
            table_id: var.table_id.clone(),
            field_name: var.field_name.clone(),
            description: var.description.clone(),
            entity_type: var.entity_type.clone(),
            geometry_type: var.geometry_type.clone(),
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    AutoIncluded,
    Verified,
    Unjudged,
    ParseFailed,
    ErrorFallback,
    EmptyFallback,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub variable: VariableRef,
    pub semantic_score: f64,
    pub lexical_score: f64,
    pub hybrid_score: f64,
    pub concept: String,
    pub purpose: Purpose,
    pub verification: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_reason: Option<String>,
}

impl ScoredMatch {

    pub fn id(&self) -> &str {
        &self.variable.id
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptResults {
    pub query: String,
    pub purpose: Purpose,
    pub results: Vec<ScoredMatch>,
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsByPurpose {
    pub primary: Vec<ScoredMatch>,
    pub normalization: Vec<ScoredMatch>,
    pub filter: Vec<ScoredMatch>,
    pub related: Vec<ScoredMatch>,
}

impl ResultsByPurpose {
    /// Groups `matches` by purpose; each group is sorted by hybrid score, stable.
    pub fn group(matches: &[ScoredMatch]) -> Self {
        let mut grouped = Self::default();
        for m in matches {
            grouped.bucket_mut(m.purpose).push(m.clone());
        }
        for purpose in Purpose::iter() {
            grouped
                .bucket_mut(purpose)
                .sort_by(|a, b| b.hybrid_score.total_cmp(&a.hybrid_score));
        }
        grouped
    }


    pub fn bucket(&self, purpose: Purpose) -> &[ScoredMatch] {
        match purpose {
            Purpose::Primary => &self.primary,
            Purpose::Normalization => &self.normalization,
            Purpose::Filter => &self.filter,
            Purpose::Related => &self.related,
        }
    }

    fn bucket_mut(&mut self, purpose: Purpose) -> &mut Vec<ScoredMatch> {
        match purpose {
            Purpose::Primary => &mut self.primary,
            Purpose::Normalization => &mut self.normalization,
            Purpose::Filter => &mut self.filter,
            Purpose::Related => &mut self.related,
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Disabled,
    Skipped,
    Verified,
    ParseFailed,
    ErrorFallback,
    EmptyFallback,
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurposeCounts {
    pub primary: usize,
    pub normalization: usize,
    pub filter: usize,
    pub related: usize,
}

impl PurposeCounts {

    pub fn from_grouped(grouped: &ResultsByPurpose) -> Self {
        Self {
            primary: grouped.primary.len(),
            normalization: grouped.normalization.len(),
            filter: grouped.filter.len(),
            related: grouped.related.len(),
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    pub run_id: uuid::Uuid,
    pub purpose_counts: PurposeCounts,
    pub total_candidates: usize,
    pub total_results: usize,
    pub geographic_filtered: usize,
    pub elapsed_ms: u64,
    pub fallback_decomposition: bool,
    pub verification_ran: bool,
    pub verification_outcome: VerificationOutcome,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResultSet {
    pub query: String,
    pub decomposition: Decomposition,
    pub results_by_query: Vec<ConceptResults>,
    pub results_by_purpose: ResultsByPurpose,
    pub all_results: Vec<ScoredMatch>,
    pub stats: SearchStats,
}
