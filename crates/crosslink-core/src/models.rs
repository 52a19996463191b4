//! Core data models used throughout Crosslink.
//!
//! These types represent the index records, link edges, and authority
//! records that flow between the normalizer, index, link graph, and
//! authority scorer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A document as delivered by the content source.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: String,
    /// Markup bytes as stored; decoded lossily if not valid UTF-8.
    pub raw_markup: Vec<u8>,
    /// Title supplied by the content source, if it has one.
    pub title: Option<String>,
    pub publishable: bool,
}

/// Input to [`Indexer::index`](crate::index::Indexer::index): a document
/// whose markup has already been normalized.
#[derive(Debug, Clone)]
pub struct IndexInput {
    pub document_id: String,
    pub normalized_text: String,
    pub title: Option<String>,
    pub publishable: bool,
}

/// Stored index entry for one document.
///
/// `tokens` is stale iff `fingerprint` differs from the fingerprint of the
/// document's current normalized text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRecord {
    pub document_id: String,
    /// Stemmed tokens in document order.
    pub tokens: Vec<String>,
    pub fingerprint: String,
    pub title: Option<String>,
    pub publishable: bool,
    pub indexed_at: DateTime<Utc>,
}

/// Enumerated category of a link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Discovered by lexical relatedness.
    #[default]
    Semantic,
    /// Discovered by an explicit keyword rule.
    Keyword,
    /// Curated by hand; never removed by re-evaluation.
    Manual,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Semantic => "semantic",
            LinkType::Keyword => "keyword",
            LinkType::Manual => "manual",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(LinkType::Semantic),
            "keyword" => Ok(LinkType::Keyword),
            "manual" => Ok(LinkType::Manual),
            other => Err(Error::InvalidConfig(format!(
                "unknown link type '{}'. Use semantic, keyword, or manual.",
                other
            ))),
        }
    }
}

/// A directed link between two documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub anchor_text: String,
    pub link_type: LinkType,
    pub created_at: DateTime<Utc>,
}

/// A proposed outbound link, pending acceptance by the link graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateLink {
    pub target_id: String,
    pub anchor_text: String,
    pub link_type: LinkType,
    /// BM25 relevance of the target to the source's salient terms.
    pub relevance: f64,
}

/// Why a candidate was not committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    Duplicate,
    SelfLink,
    BudgetExceeded,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Duplicate => "duplicate",
            RejectReason::SelfLink => "self-link",
            RejectReason::BudgetExceeded => "budget-exceeded",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-document authority and degree counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorityRecord {
    pub document_id: String,
    pub score: f64,
    pub inbound_count: u64,
    pub outbound_count: u64,
    pub last_updated: DateTime<Utc>,
}

/// A ranked full-text search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document_id: String,
    pub relevance: f64,
}
