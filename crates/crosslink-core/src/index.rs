//! Fingerprinted full-text index.
//!
//! A document is re-indexed only when the SHA-256 fingerprint of its
//! normalized text differs from the stored one; this exact comparison is
//! the sole dedup mechanism. Tokens, fingerprint, and timestamp are
//! written together through the store's compare-and-swap so a reader
//! never sees a partial update.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::analyze::{analyze, query_terms};
use crate::error::{Error, Result};
use crate::models::{IndexInput, IndexRecord, SearchHit};
use crate::store::Store;

/// Lowercase hex SHA-256 of normalized text.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// What [`Indexer::index`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOutcome {
    /// First index record for the document.
    Created,
    /// Text changed; tokens and fingerprint rewritten.
    Updated,
    /// Text unchanged; nothing written.
    Unchanged,
    /// Text unchanged; only title or publishable flag rewritten.
    MetadataUpdated,
}

impl IndexOutcome {
    /// Whether tokens were (re)written.
    pub fn reindexed(&self) -> bool {
        matches!(self, IndexOutcome::Created | IndexOutcome::Updated)
    }
}

/// Index operations over a [`Store`].
pub struct Indexer<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Indexer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// True unless the stored fingerprint equals the document's current one.
    pub async fn should_reindex(&self, doc: &IndexInput) -> Result<bool> {
        let stored = self.store.get_index_record(&doc.document_id).await?;
        Ok(stored.map(|r| r.fingerprint) != Some(fingerprint(&doc.normalized_text)))
    }

    /// Tokenize and store a document if its text changed.
    ///
    /// A fingerprint conflict with a concurrent writer is retried once
    /// against a fresh read, then surfaced.
    pub async fn index(&self, doc: &IndexInput) -> Result<IndexOutcome> {
        let fp = fingerprint(&doc.normalized_text);
        let mut retried = false;

        loop {
            let current = self.store.get_index_record(&doc.document_id).await?;

            if let Some(existing) = &current {
                if existing.fingerprint == fp {
                    if existing.title == doc.title && existing.publishable == doc.publishable {
                        debug!(document_id = %doc.document_id, "fingerprint unchanged, skipping");
                        return Ok(IndexOutcome::Unchanged);
                    }
                    self.store
                        .update_index_metadata(
                            &doc.document_id,
                            doc.title.as_deref(),
                            doc.publishable,
                        )
                        .await?;
                    return Ok(IndexOutcome::MetadataUpdated);
                }
            }

            let record = IndexRecord {
                document_id: doc.document_id.clone(),
                tokens: analyze(&doc.normalized_text),
                fingerprint: fp.clone(),
                title: doc.title.clone(),
                publishable: doc.publishable,
                indexed_at: Utc::now(),
            };
            let expected = current.as_ref().map(|r| r.fingerprint.as_str());

            match self.store.write_index_record(&record, expected).await {
                Ok(()) => {
                    debug!(
                        document_id = %doc.document_id,
                        tokens = record.tokens.len(),
                        "indexed"
                    );
                    return Ok(if current.is_some() {
                        IndexOutcome::Updated
                    } else {
                        IndexOutcome::Created
                    });
                }
                Err(Error::IndexWriteConflict { document_id }) if !retried => {
                    warn!(%document_id, "index write conflict, retrying with fresh read");
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Rank publishable documents against a free-text query.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        self.store.search(&terms, limit).await
    }

    /// Drop a document from the index. Returns whether it was indexed.
    pub async fn remove(&self, document_id: &str) -> Result<bool> {
        self.store.delete_index_record(document_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorityRecord, Edge};
    use crate::relevance::TermStatistics;
    use crate::store::memory::InMemoryStore;
    use crate::store::{EdgeInsert, GraphSnapshot, StoreCounts};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the next `conflicts` index writes as if another writer had
    /// raced ahead. When `rival` is set, that text is stored first.
    struct RacingStore {
        inner: InMemoryStore,
        conflicts: AtomicUsize,
        attempts: AtomicUsize,
        rival: Option<String>,
    }

    impl RacingStore {
        fn new(conflicts: usize, rival: Option<&str>) -> Self {
            Self {
                inner: InMemoryStore::new(),
                conflicts: AtomicUsize::new(conflicts),
                attempts: AtomicUsize::new(0),
                rival: rival.map(str::to_string),
            }
        }
    }

    #[async_trait]
    impl Store for RacingStore {
        async fn get_index_record(&self, document_id: &str) -> Result<Option<IndexRecord>> {
            self.inner.get_index_record(document_id).await
        }

        async fn write_index_record(
            &self,
            record: &IndexRecord,
            expected_fingerprint: Option<&str>,
        ) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let inject = self
                .conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !inject {
                return self.inner.write_index_record(record, expected_fingerprint).await;
            }
            if let Some(text) = &self.rival {
                let rival = IndexRecord {
                    tokens: analyze(text),
                    fingerprint: fingerprint(text),
                    ..record.clone()
                };
                self.inner
                    .write_index_record(&rival, expected_fingerprint)
                    .await?;
            }
            Err(Error::IndexWriteConflict {
                document_id: record.document_id.clone(),
            })
        }

        async fn update_index_metadata(
            &self,
            document_id: &str,
            title: Option<&str>,
            publishable: bool,
        ) -> Result<bool> {
            self.inner
                .update_index_metadata(document_id, title, publishable)
                .await
        }

        async fn delete_index_record(&self, document_id: &str) -> Result<bool> {
            self.inner.delete_index_record(document_id).await
        }

        async fn list_indexed_ids(&self) -> Result<Vec<String>> {
            self.inner.list_indexed_ids().await
        }

        async fn term_statistics(&self, terms: &[String]) -> Result<TermStatistics> {
            self.inner.term_statistics(terms).await
        }

        async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<SearchHit>> {
            self.inner.search(terms, limit).await
        }

        async fn insert_edge(&self, edge: &Edge, budget: usize) -> Result<EdgeInsert> {
            self.inner.insert_edge(edge, budget).await
        }

        async fn delete_edge(&self, source_id: &str, target_id: &str) -> Result<bool> {
            self.inner.delete_edge(source_id, target_id).await
        }

        async fn delete_edges_touching(&self, document_id: &str) -> Result<Vec<Edge>> {
            self.inner.delete_edges_touching(document_id).await
        }

        async fn outbound_edges(&self, source_id: &str) -> Result<Vec<Edge>> {
            self.inner.outbound_edges(source_id).await
        }

        async fn inbound_edges(&self, target_id: &str) -> Result<Vec<Edge>> {
            self.inner.inbound_edges(target_id).await
        }

        async fn graph_snapshot(&self) -> Result<GraphSnapshot> {
            self.inner.graph_snapshot().await
        }

        async fn get_authority(&self, document_id: &str) -> Result<Option<AuthorityRecord>> {
            self.inner.get_authority(document_id).await
        }

        async fn authority_records(&self) -> Result<Vec<AuthorityRecord>> {
            self.inner.authority_records().await
        }

        async fn seed_authority(&self, record: &AuthorityRecord) -> Result<bool> {
            self.inner.seed_authority(record).await
        }

        async fn write_authority(
            &self,
            records: &[AuthorityRecord],
            removals: &[String],
        ) -> Result<()> {
            self.inner.write_authority(records, removals).await
        }

        async fn counts(&self) -> Result<StoreCounts> {
            self.inner.counts().await
        }
    }

    fn input(id: &str, text: &str) -> IndexInput {
        IndexInput {
            document_id: id.to_string(),
            normalized_text: text.to_string(),
            title: None,
            publishable: true,
        }
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(fingerprint("Hello World."), fingerprint("Hello World!"));
    }

    #[tokio::test]
    async fn test_index_twice_is_unchanged() {
        let store = Arc::new(InMemoryStore::new());
        let indexer = Indexer::new(store.clone());
        let doc = input("a", "Graphs connect nodes with edges.");

        assert!(indexer.should_reindex(&doc).await.unwrap());
        assert_eq!(indexer.index(&doc).await.unwrap(), IndexOutcome::Created);
        let first = store.get_index_record("a").await.unwrap().unwrap();

        assert!(!indexer.should_reindex(&doc).await.unwrap());
        assert_eq!(indexer.index(&doc).await.unwrap(), IndexOutcome::Unchanged);
        let second = store.get_index_record("a").await.unwrap().unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.indexed_at, second.indexed_at);
    }

    #[tokio::test]
    async fn test_text_change_triggers_reindex() {
        let store = Arc::new(InMemoryStore::new());
        let indexer = Indexer::new(store.clone());
        indexer.index(&input("a", "first version")).await.unwrap();

        let changed = input("a", "first version.");
        assert!(indexer.should_reindex(&changed).await.unwrap());
        assert_eq!(indexer.index(&changed).await.unwrap(), IndexOutcome::Updated);
        assert!(!indexer.should_reindex(&changed).await.unwrap());
    }

    #[tokio::test]
    async fn test_metadata_only_change_keeps_fingerprint_and_timestamp() {
        let store = Arc::new(InMemoryStore::new());
        let indexer = Indexer::new(store.clone());
        let mut doc = input("a", "stable text");
        indexer.index(&doc).await.unwrap();
        let before = store.get_index_record("a").await.unwrap().unwrap();

        doc.publishable = false;
        assert_eq!(
            indexer.index(&doc).await.unwrap(),
            IndexOutcome::MetadataUpdated
        );
        let after = store.get_index_record("a").await.unwrap().unwrap();
        assert!(!after.publishable);
        assert_eq!(before.indexed_at, after.indexed_at);
        assert_eq!(before.fingerprint, after.fingerprint);
    }

    #[tokio::test]
    async fn test_search_ranks_and_breaks_ties_by_id() {
        let store = Arc::new(InMemoryStore::new());
        let indexer = Indexer::new(store);
        indexer.index(&input("b", "rust ownership borrowing")).await.unwrap();
        indexer.index(&input("a", "rust ownership borrowing")).await.unwrap();
        indexer.index(&input("c", "python garbage collection")).await.unwrap();

        let hits = indexer.search("Ownership", 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(indexer.search("the of", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_conflict_retries_against_fresh_read() {
        let store = Arc::new(RacingStore::new(1, Some("rival text")));
        let indexer = Indexer::new(store.clone());

        let outcome = indexer.index(&input("a", "our text")).await.unwrap();
        assert_eq!(outcome, IndexOutcome::Updated);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
        let stored = store.get_index_record("a").await.unwrap().unwrap();
        assert_eq!(stored.fingerprint, fingerprint("our text"));
    }

    #[tokio::test]
    async fn test_repeated_conflict_is_surfaced_after_one_retry() {
        let store = Arc::new(RacingStore::new(usize::MAX, None));
        let indexer = Indexer::new(store.clone());

        let err = indexer.index(&input("a", "never lands")).await.unwrap_err();
        assert!(matches!(err, Error::IndexWriteConflict { ref document_id } if document_id == "a"));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
        assert!(store.get_index_record("a").await.unwrap().is_none());
    }
}
