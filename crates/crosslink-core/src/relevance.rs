//! Lexical relevance scoring.
//!
//! Both storage backends rank search hits with the same Okapi BM25
//! function so relevance thresholds mean the same thing everywhere.
//!
//! ```text
//! idf(t)      = ln(1 + (N - df + 0.5) / (df + 0.5))
//! score(d, q) = Σ_t idf(t) · tf·(k1 + 1) / (tf + k1·(1 - b + b·|d|/avgdl))
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::analyze::term_frequencies;
use crate::models::SearchHit;

/// Corpus statistics for a set of query terms, restricted to publishable
/// documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermStatistics {
    /// Number of publishable documents.
    pub documents: u64,
    /// Mean token count of publishable documents.
    pub average_length: f64,
    /// Number of publishable documents containing each term.
    pub document_frequency: HashMap<String, u64>,
}

impl TermStatistics {
    /// Inverse document frequency of a term (never negative).
    pub fn idf(&self, term: &str) -> f64 {
        let n = self.documents as f64;
        let df = self.document_frequency.get(term).copied().unwrap_or(0) as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

/// Okapi BM25 parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25 {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25 {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25 {
    /// Score one document's tokens against deduplicated query terms.
    ///
    /// Returns 0.0 when no query term occurs in the document.
    pub fn score(&self, tokens: &[String], terms: &[String], stats: &TermStatistics) -> f64 {
        if tokens.is_empty() || terms.is_empty() {
            return 0.0;
        }
        let tf = term_frequencies(tokens);
        let len = tokens.len() as f64;
        let avgdl = if stats.average_length > 0.0 {
            stats.average_length
        } else {
            len
        };
        terms
            .iter()
            .filter_map(|t| tf.get(t.as_str()).map(|f| (t, *f as f64)))
            .map(|(t, f)| {
                let norm = self.k1 * (1.0 - self.b + self.b * len / avgdl);
                stats.idf(t) * f * (self.k1 + 1.0) / (f + norm)
            })
            .sum()
    }
}

/// Sort hits by relevance descending, then document id ascending, and
/// truncate to `limit`.
pub fn rank_hits(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    hits.truncate(limit);
    hits
}

/// Pick the `n` most characteristic terms of a token sequence by
/// `tf × idf`, ties broken by term ascending.
pub fn salient_terms(tokens: &[String], stats: &TermStatistics, n: usize) -> Vec<String> {
    let mut weighted: Vec<(&str, f64)> = term_frequencies(tokens)
        .into_iter()
        .map(|(term, f)| (term, f as f64 * stats.idf(term)))
        .collect();
    weighted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    weighted
        .into_iter()
        .take(n)
        .map(|(term, _)| term.to_string())
        .collect()
}
