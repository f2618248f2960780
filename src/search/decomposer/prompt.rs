

pub const SYSTEM_PROMPT: &str = r#"You are a geospatial data analyst. You break natural-language questions about demographic and geospatial data into short, searchable variable concepts.

Always respond with valid JSON."#;


pub fn build_decomposition_prompt(query: &str) -> String {
    format!(
        r#"Decompose this query into searchable data-variable concepts.

**User Query:**
"{query}"

**Identify:**
1. **primary** - the measures the user actually wants (e.g. poverty rate, median income)
2. **normalization** - denominators needed to compute ratios (e.g. total population, land area)
3. **filter** - criteria used to restrict results (e.g. rural, above a threshold)
4. **related** - semantically close variables worth searching as well
5. The geographic level, if stated
6. The time period, if stated

**Response Format (JSON):**
{{
  "primary_concepts": ["..."],
  "normalization_concepts": ["..."],
  "filter_concepts": ["..."],
  "related_concepts": ["..."],
  "geographic_level": "COUNTY|STATE|TRACT|BLOCK_GROUP|ZIP" or null,
  "temporal_filter": {{"start": "year", "end": "year"}} or null,
  "search_queries": [
    {{"query": "short search phrase", "purpose": "primary|normalization|filter|related"}}
  ]
}}

Keep each search phrase to a few words. Do not include the geographic level in search phrases."#
    )
}
