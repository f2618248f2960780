
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPECIAL_CHARS: Regex = Regex::new(r#"[|"()\[\]{}/\\,;:!?_]+"#)
        .expect("special character pattern is valid");
}


#[inline]
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Lowercases, strips separator characters, lemmatizes each word.
pub fn normalize(text: &str) -> String {
    let cleaned = SPECIAL_CHARS.replace_all(text, " ");
    cleaned
        .to_lowercase()
        .split_whitespace()
        .map(|word| lemmatize(word.trim_matches(|c: char| c == '.' || c == '\'')))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}


pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split_whitespace()
}

/// Noun-plural folding; enough to line "counties" up with "county".
pub fn lemmatize(word: &str) -> String {
    let len = word.chars().count();
    if len <= 3 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return word.to_string();
    }

    if let Some(stem) = word.strip_suffix("ies") {
        if len > 4 {
            return format!("{stem}y");
        }
    }
    if word.ends_with("sses") {
        return word[..word.len() - 2].to_string();
    }
    for suffix in ["xes", "ches", "shes", "zzes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('s') {
        return stem.to_string();
    }
    word.to_string()
}
