//! Read-only status snapshots for the presentation layer.

use serde::Serialize;

use crate::authority::RecomputeReport;

/// Point-in-time view of the corpus, link graph, and scores.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Documents the content source currently lists.
    pub documents_known: u64,
    pub documents_indexed: u64,
    pub documents_publishable: u64,
    pub edges: u64,
    pub authority_records: u64,
    /// Documents awaiting an authority recomputation.
    pub pending_dirty: usize,
    pub last_recompute: Option<RecomputeReport>,
}

impl StatusSnapshot {
    /// Share of known documents that are indexed, `100.0` for an empty
    /// corpus.
    pub fn percent_indexed(&self) -> f64 {
        if self.documents_known == 0 {
            return 100.0;
        }
        let indexed = self.documents_indexed.min(self.documents_known);
        indexed as f64 * 100.0 / self.documents_known as f64
    }
}
