use crate::search::models::{Decomposition, ScoredMatch};


pub const SYSTEM_PROMPT: &str = r#"You are a census and geospatial data expert. You decide which candidate data variables actually answer a user's question.

Be strict: keep a variable only if an analyst would use it to answer the question.

Always respond with valid JSON."#;


pub fn build_judge_prompt(query: &str, decomposition: &Decomposition, shown: &[ScoredMatch]) -> String {
    let concepts = if decomposition.primary_concepts.is_empty() {
        "(none)".to_string()
    } else {
        decomposition.primary_concepts.join(", ")
    };
    let level = decomposition
        .geographic_level
        .map_or("any", |l| l.as_str());

    let candidates = shown
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {} ({})", i + 1, m.variable.description, m.variable.field_name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Select the variables relevant to this query.

**User Query:**
"{query}"

**Primary Concepts:** {concepts}
**Geographic Level:** {level}

**Candidates:**
{candidates}

**Response Format (JSON):**
{{
  "relevant": [
    {{"index": 1, "reason": "why this variable answers the query"}}
  ]
}}

Use the candidate numbers above. Return an empty list if nothing is relevant."#
    )
}
