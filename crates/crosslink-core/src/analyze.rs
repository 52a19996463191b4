//! Text analysis: tokenization, case folding, stop words, and stemming.
//!
//! The same pipeline is applied to indexed documents and to search
//! queries so both sides agree on term identity. Stemming uses the
//! Snowball English (Porter2) algorithm from `rust-stemmers`.

use std::collections::HashMap;

use rust_stemmers::{Algorithm, Stemmer};

/// English function words that carry no topical signal.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

/// Split text into stemmed, case-folded index terms in document order.
///
/// Tokens are maximal runs of alphanumeric characters. Stop words and
/// single-character tokens are dropped before stemming.
pub fn analyze(text: &str) -> Vec<String> {
    let stemmer = Stemmer::create(Algorithm::English);
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|raw| !raw.is_empty())
        .map(|raw| raw.to_lowercase())
        .filter(|word| word.chars().count() > 1 && !STOP_WORDS.contains(&word.as_str()))
        .map(|word| stemmer.stem(&word).into_owned())
        .collect()
}

/// Analyze a query and deduplicate its terms, keeping first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for term in analyze(query) {
        if !seen.contains(&term) {
            seen.push(term);
        }
    }
    seen
}

/// Count occurrences of each term.
pub fn term_frequencies(tokens: &[String]) -> HashMap<&str, u32> {
    let mut freqs: HashMap<&str, u32> = HashMap::new();
    for token in tokens {
        *freqs.entry(token.as_str()).or_insert(0) += 1;
    }
    freqs
}
