//! Keyword extraction and matching
//!
//! Shared by the learning engine (pattern keys) and the scoring cues.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

/// Tokens shorter than this are never keywords
const MIN_KEYWORD_LEN: usize = 4;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "about", "above", "after", "again", "also", "because", "been", "before", "being", "below",
        "between", "both", "could", "does", "doing", "down", "during", "each", "even", "every",
        "from", "further", "going", "have", "having", "here", "hers", "into", "just", "know",
        "like", "make", "more", "most", "much", "must", "only", "other", "ours", "over", "really",
        "said", "same", "should", "some", "such", "than", "that", "their", "theirs", "them",
        "then", "there", "these", "they", "thing", "things", "this", "those", "through", "under",
        "until", "very", "want", "well", "were", "what", "when", "where", "which", "while", "will",
        "with", "would", "yeah", "your", "yours", "okay",
    ]
    .into_iter()
    .collect()
});

/// Suffixes accepted after a cue term ("price" matches "prices", "pricing" does not)
const INFLECTIONS: &[&str] = &["", "s", "es", "d", "ed", "ing", "ly"];

/// Extract up to `max` keywords from `text`
///
/// Lowercased, punctuation stripped, stopwords and tokens of three
/// characters or fewer dropped. Ranked by frequency, ties by first
/// occurrence.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, token) in normalized.split_whitespace().enumerate() {
        if token.chars().count() < MIN_KEYWORD_LEN || STOPWORDS.contains(token) {
            continue;
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(max)
        .map(|(token, _, _)| token.to_string())
        .collect()
}

/// Whether `term` occurs in `haystack_lower` as a whole word (or phrase),
/// allowing simple inflections. `haystack_lower` must already be lowercase.
pub fn contains_term(haystack_lower: &str, term: &str) -> bool {
    let term = term.to_lowercase();
    if term.is_empty() {
        return false;
    }

    let mut start = 0;
    while let Some(found) = haystack_lower[start..].find(&term) {
        let begin = start + found;
        let end = begin + term.len();

        let boundary_before = haystack_lower[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());

        if boundary_before {
            let rest: String = haystack_lower[end..]
                .chars()
                .take_while(|c| c.is_alphanumeric())
                .collect();
            if INFLECTIONS.contains(&rest.as_str()) {
                return true;
            }
        }

        start = begin
            + haystack_lower[begin..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
    }
    false
}

/// Count how many of `terms` occur in `haystack_lower`
pub fn count_terms(haystack_lower: &str, terms: &[&str]) -> usize {
    terms
        .iter()
        .filter(|term| contains_term(haystack_lower, term))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_filters_short_and_stopwords() {
        let keywords = extract_keywords("The price is way too high, and that is what we said!", 10);
        assert_eq!(keywords, vec!["price", "high"]);
    }

    #[test]
    fn test_extract_ranks_by_frequency_then_position() {
        let keywords = extract_keywords(
            "Budget talk: competitor pricing, competitor contract, budget, competitor",
            3,
        );
        assert_eq!(keywords, vec!["competitor", "budget", "talk"]);
    }

    #[test]
    fn test_extract_caps_and_skips_numbers() {
        let text = "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima 2024";
        let keywords = extract_keywords(text, 10);
        assert_eq!(keywords.len(), 10);
        assert!(!keywords.contains(&"2024".to_string()));
        assert_eq!(keywords[0], "alpha");
    }

    #[test]
    fn test_contains_term_word_boundaries() {
        assert!(contains_term("your prices are high", "price"));
        assert!(contains_term("we want to sign today", "sign"));
        assert!(!contains_term("let me design it", "sign"));
        assert!(!contains_term("the signal is weak", "sign"));
        assert!(contains_term("can you show me the dashboard", "show me"));
        assert!(!contains_term("anything", ""));
    }

    #[test]
    fn test_count_terms() {
        let text = "we need a discount and better terms";
        assert_eq!(count_terms(text, &["discount", "terms", "negotiate"]), 2);
    }
}
