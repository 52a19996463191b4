//! Candidate link discovery.
//!
//! A document's own most characteristic terms (by `tf × idf`) become the
//! query for a BM25 search over the index. Hits are filtered, ranked by
//! relevance descending then document id ascending, and turned into
//! [`CandidateLink`]s carrying anchor text from the target's title.
//!
//! Discovery only reads the store; committing is the link graph's job.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::LinkingParams;
use crate::error::{Error, Result};
use crate::models::CandidateLink;
use crate::relevance::{rank_hits, salient_terms};
use crate::store::Store;

/// Finds related documents for a source document.
pub struct CandidateFinder<S: Store> {
    store: Arc<S>,
    params: LinkingParams,
}

impl<S: Store> CandidateFinder<S> {
    pub fn new(store: Arc<S>, params: LinkingParams) -> Self {
        Self { store, params }
    }

    /// New link candidates for `document_id`: excludes the document
    /// itself, targets it already links to, and hits below the relevance
    /// threshold.
    pub async fn find_candidates(
        &self,
        document_id: &str,
        max_candidates: usize,
    ) -> Result<Vec<CandidateLink>> {
        self.rank(document_id, max_candidates, true).await
    }

    /// Ranked proposals for re-evaluation: like
    /// [`find_candidates`](Self::find_candidates) but keeps targets that
    /// are already linked.
    pub async fn proposals(
        &self,
        document_id: &str,
        max_candidates: usize,
    ) -> Result<Vec<CandidateLink>> {
        self.rank(document_id, max_candidates, false).await
    }

    async fn rank(
        &self,
        document_id: &str,
        max_candidates: usize,
        exclude_linked: bool,
    ) -> Result<Vec<CandidateLink>> {
        if max_candidates == 0 {
            return Ok(Vec::new());
        }
        let source = self
            .store
            .get_index_record(document_id)
            .await?
            .ok_or_else(|| Error::DocumentNotIndexed(document_id.to_string()))?;

        let mut distinct: Vec<String> = source.tokens.clone();
        distinct.sort();
        distinct.dedup();
        let stats = self.store.term_statistics(&distinct).await?;
        let query = salient_terms(&source.tokens, &stats, self.params.salient_terms);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let linked: HashSet<String> = if exclude_linked {
            self.store
                .outbound_edges(document_id)
                .await?
                .into_iter()
                .map(|e| e.target_id)
                .collect()
        } else {
            HashSet::new()
        };

        // The source and linked targets may occupy slots; over-fetch so
        // truncation happens after filtering.
        let fetch = max_candidates + linked.len() + 1;
        let hits = self.store.search(&query, fetch).await?;
        let hits: Vec<_> = hits
            .into_iter()
            .filter(|h| h.document_id != document_id)
            .filter(|h| !linked.contains(&h.document_id))
            .filter(|h| h.relevance >= self.params.min_relevance)
            .collect();
        let hits = rank_hits(hits, max_candidates);

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            let title = self
                .store
                .get_index_record(&hit.document_id)
                .await?
                .and_then(|r| r.title);
            candidates.push(CandidateLink {
                anchor_text: title.unwrap_or_else(|| hit.document_id.clone()),
                target_id: hit.document_id,
                link_type: self.params.default_link_type,
                relevance: hit.relevance,
            });
        }

        debug!(
            document_id,
            query_terms = query.len(),
            candidates = candidates.len(),
            "ranked candidates"
        );
        Ok(candidates)
    }
}
