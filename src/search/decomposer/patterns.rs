use lazy_static::lazy_static;
use regex::Regex;

use crate::search::models::GeographicLevel;

/// Phrases that signal the user wants a ratio against some denominator.
pub const NORMALIZATION_KEYWORDS: &[&str] = &[
    "per capita",
    "per 1000",
    "per 1,000",
    "per 100",
    "per 100,000",
    "per person",
    "per household",
    "rate",
    "rates",
    "percentage",
    "percent",
    "ratio",
    "proportion",
    "normalized",
    "normalised",
    "density",
];

/// Attributive and comparison filters; each match becomes a `filter` concept.
pub const FILTER_KEYWORDS: &[&str] = &[
    "rural",
    "urban",
    "suburban",
    "metropolitan",
    "high",
    "highest",
    "low",
    "lowest",
    "above",
    "below",
    "greater than",
    "less than",
    "more than",
    "fewer than",
    "over",
    "under",
];

pub const NORMALIZATION_CONCEPT: &str = "total population";

fn word_alternation(words: &[&str]) -> String {
    let mut sorted: Vec<&str> = words.to_vec();
    // Longest first so "greater than" wins over a shorter prefix.
    sorted.sort_by_key(|w| std::cmp::Reverse(w.len()));
    sorted
        .iter()
        .map(|w| regex::escape(w).replace(r"\ ", r"\s+").replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

lazy_static! {
    static ref NORMALIZATION_PATTERN: Regex =
        Regex::new(&format!(r"\b(?:{})\b", word_alternation(NORMALIZATION_KEYWORDS)))
            .expect("normalization pattern is valid");

    static ref NORMALIZATION_MARKER: Regex = Regex::new(
        r"\b(?:per\s+(?:capita|person|persons|household|households|resident|residents|thousand|hundred|\d[\d,]*)|normali[sz]ed\s+(?:by|to|against)\s+[a-z]+|normali[sz]ed)\b"
    )
    .expect("normalization marker pattern is valid");

    static ref FILTER_PATTERN: Regex =
        Regex::new(&format!(r"\b(?:{})\b", word_alternation(FILTER_KEYWORDS)))
            .expect("filter pattern is valid");

    static ref GEOGRAPHIC_PATTERN: Regex = Regex::new(
        r"\b(?:(?:at\s+the\s+)?(?P<level>counties|county|states|state|census\s+tracts?|tracts?|block\s*groups?|zip\s*codes?|zips?|zcta)(?:\s+level)?)\b"
    )
    .expect("geographic pattern is valid");

    static ref SPLIT_PATTERN: Regex =
        Regex::new(r"\s*(?:,|;|\band\b|\bor\b|\bwith\b|\bfor\b|\bby\b|\bin\b)\s*")
            .expect("split pattern is valid");

    static ref LEADING_FILLER: Regex = Regex::new(
        r"^(?:show\s+me|give\s+me|tell\s+me\s+about|find|get|list|search\s+for|look\s+for|what\s+(?:is|are)|where\s+(?:is|are)|which|i\s+want|i\s+need|data\s+(?:on|about)|information\s+(?:on|about)|the|all|some|of)\s+"
    )
    .expect("filler pattern is valid");

    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace pattern is valid");
}


pub fn has_normalization_intent(lower: &str) -> bool {
    NORMALIZATION_PATTERN.is_match(lower)
}

/// Filter keywords in order of appearance, deduplicated.
pub fn detect_filters(lower: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in FILTER_PATTERN.find_iter(lower) {
        let keyword = WHITESPACE.replace_all(m.as_str(), " ").into_owned();
        if !found.contains(&keyword) {
            found.push(keyword);
        }
    }
    found
}

/// First geographic-level keyword in the text wins.
pub fn detect_geographic_level(lower: &str) -> Option<GeographicLevel> {
    GEOGRAPHIC_PATTERN
        .captures(lower)
        .and_then(|caps| caps.name("level"))
        .and_then(|m| GeographicLevel::parse_lenient(m.as_str()))
}

/// Removes everything that is not itself a searchable measure: denominator
/// markers, geographic levels and filter words.
pub fn strip_non_concept_terms(lower: &str) -> String {
    let text = NORMALIZATION_MARKER.replace_all(lower, " ");
    let text = GEOGRAPHIC_PATTERN.replace_all(&text, " ");
    FILTER_PATTERN.replace_all(&text, " ").into_owned()
}

/// Splits on conjunctions/punctuation and cleans each phrase.
pub fn split_phrases(text: &str) -> Vec<String> {
    SPLIT_PATTERN
        .split(text)
        .map(clean_phrase)
        .filter(|p| p.chars().count() > 2)
        .collect()
}

fn clean_phrase(phrase: &str) -> String {
    let mut phrase = WHITESPACE
        .replace_all(phrase.trim_matches(|c: char| !c.is_alphanumeric()), " ")
        .into_owned();
    loop {
        let stripped = LEADING_FILLER.replace(&phrase, "").into_owned();
        if stripped == phrase {
            break;
        }
        phrase = stripped;
    }
    phrase.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_intent() {
        assert!(has_normalization_intent("poverty rate per capita"));
        assert!(has_normalization_intent("percentage of uninsured"));
        assert!(!has_normalization_intent("median income"));
        assert!(!has_normalization_intent("separate"));
    }

    #[test]
    fn test_detect_geographic_level() {
        assert_eq!(detect_geographic_level("income by county"), Some(GeographicLevel::County));
        assert_eq!(detect_geographic_level("at the census tract level"), Some(GeographicLevel::Tract));
        assert_eq!(detect_geographic_level("block groups in ohio"), Some(GeographicLevel::BlockGroup));
        assert_eq!(detect_geographic_level("by zip code"), Some(GeographicLevel::Zip));
        assert_eq!(detect_geographic_level("statewide totals"), None);
    }

    #[test]
    fn test_detect_filters() {
        assert_eq!(detect_filters("rural and urban rural counties"), vec!["rural", "urban"]);
        assert_eq!(detect_filters("income greater  than median"), vec!["greater than"]);
        assert!(detect_filters("highway overpass").is_empty());
    }

    #[test]
    fn test_strip_non_concept_terms() {
        let stripped = strip_non_concept_terms("poverty rate per capita by county");
        assert_eq!(split_phrases(&stripped), vec!["poverty rate"]);

        let stripped = strip_non_concept_terms("high unemployment in rural counties at the state level");
        assert_eq!(split_phrases(&stripped), vec!["unemployment"]);
    }

    #[test]
    fn test_split_phrases_drops_fillers_and_short() {
        let phrases = split_phrases("show me median income, housing costs and education for me");
        assert_eq!(phrases, vec!["median income", "housing costs", "education"]);
    }
}
