//! Storage abstraction for Crosslink.
//!
//! The [`Store`] trait is the persistence port of the core: three logical
//! tables (index, links, authority) plus the full-text relevance query.
//! The core holds no global state; every component receives a store
//! handle.
//!
//! Implementations must be `Send + Sync` and must make each method atomic:
//! a reader never observes half of an index write, half of an edge
//! insert, or half of an authority batch.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AuthorityRecord, Edge, IndexRecord, SearchHit};
use crate::relevance::TermStatistics;

/// Outcome of a budgeted edge insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Inserted,
    /// The `(source, target)` pair already exists.
    Duplicate,
    /// The source already holds `budget` outbound edges.
    BudgetExceeded,
}

/// A consistent view of the link graph at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    /// Indexed documents, sorted and unique.
    pub nodes: Vec<String>,
    /// `(source_id, target_id)` pairs whose endpoints are both indexed.
    pub edges: Vec<(String, String)>,
}

impl GraphSnapshot {
    /// Build a snapshot over the indexed documents. Edges with an
    /// endpoint outside `nodes` carry no authority and are dropped.
    pub fn new(mut nodes: Vec<String>, edges: Vec<(String, String)>) -> Self {
        nodes.sort();
        nodes.dedup();
        let edges = edges
            .into_iter()
            .filter(|(s, t)| {
                nodes.binary_search(s).is_ok() && nodes.binary_search(t).is_ok()
            })
            .collect();
        Self { nodes, edges }
    }
}

/// Row counts for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub indexed: u64,
    pub publishable: u64,
    pub edges: u64,
    pub authority_records: u64,
}

/// Abstract storage backend for Crosslink.
///
/// # Operations
///
/// | Method | Table | Purpose |
/// |--------|-------|---------|
/// | [`get_index_record`](Store::get_index_record) | index | Exact lookup by document id |
/// | [`write_index_record`](Store::write_index_record) | index | Compare-and-swap on fingerprint |
/// | [`update_index_metadata`](Store::update_index_metadata) | index | Title/publishable only |
/// | [`search`](Store::search) | index | BM25 over publishable documents |
/// | [`insert_edge`](Store::insert_edge) | links | Atomic duplicate + budget check |
/// | [`delete_edges_touching`](Store::delete_edges_touching) | links | Remove a document's edges |
/// | [`graph_snapshot`](Store::graph_snapshot) | index + links | Consistent read |
/// | [`write_authority`](Store::write_authority) | authority | Atomic batch upsert/delete |
#[async_trait]
pub trait Store: Send + Sync {
    /// Retrieve the index record of a document.
    async fn get_index_record(&self, document_id: &str) -> Result<Option<IndexRecord>>;

    /// Write an index record if the stored fingerprint still equals
    /// `expected_fingerprint` (`None`: no record may exist yet).
    ///
    /// Fails with [`Error::IndexWriteConflict`](crate::Error::IndexWriteConflict)
    /// and writes nothing when the expectation does not hold.
    async fn write_index_record(
        &self,
        record: &IndexRecord,
        expected_fingerprint: Option<&str>,
    ) -> Result<()>;

    /// Update title and publishable flag without touching tokens,
    /// fingerprint, or `indexed_at`. Returns false if no record exists.
    async fn update_index_metadata(
        &self,
        document_id: &str,
        title: Option<&str>,
        publishable: bool,
    ) -> Result<bool>;

    /// Delete an index record. Returns whether one existed.
    async fn delete_index_record(&self, document_id: &str) -> Result<bool>;

    /// Ids of all indexed documents, ascending.
    async fn list_indexed_ids(&self) -> Result<Vec<String>>;

    /// Corpus statistics over publishable documents for the given terms.
    async fn term_statistics(&self, terms: &[String]) -> Result<TermStatistics>;

    /// Rank publishable documents against stemmed, deduplicated terms.
    ///
    /// Results are ordered by relevance descending, then document id
    /// ascending, and contain only documents matching at least one term.
    async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<SearchHit>>;

    /// Insert an edge unless the pair exists or the source is at `budget`.
    async fn insert_edge(&self, edge: &Edge, budget: usize) -> Result<EdgeInsert>;

    /// Delete one edge. Returns whether it existed.
    async fn delete_edge(&self, source_id: &str, target_id: &str) -> Result<bool>;

    /// Delete every edge where the document is source or target.
    async fn delete_edges_touching(&self, document_id: &str) -> Result<Vec<Edge>>;

    /// Edges leaving a document, ordered by target id.
    async fn outbound_edges(&self, source_id: &str) -> Result<Vec<Edge>>;

    /// Edges entering a document, ordered by source id.
    async fn inbound_edges(&self, target_id: &str) -> Result<Vec<Edge>>;

    /// Nodes and edges read in one consistent view.
    async fn graph_snapshot(&self) -> Result<GraphSnapshot>;

    /// Retrieve the authority record of a document.
    async fn get_authority(&self, document_id: &str) -> Result<Option<AuthorityRecord>>;

    /// All authority records, ordered by document id.
    async fn authority_records(&self) -> Result<Vec<AuthorityRecord>>;

    /// Insert a record only if the document has none. Returns whether it
    /// was inserted.
    async fn seed_authority(&self, record: &AuthorityRecord) -> Result<bool>;

    /// Upsert `records` and delete `removals` as one atomic batch.
    async fn write_authority(&self, records: &[AuthorityRecord], removals: &[String])
        -> Result<()>;

    /// Row counts for status reporting.
    async fn counts(&self) -> Result<StoreCounts>;
}
