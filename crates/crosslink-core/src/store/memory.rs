//! In-memory [`Store`] implementation for testing and embedding.
//!
//! All three tables live behind one `parking_lot::RwLock`, so every method
//! is atomic and [`graph_snapshot`](Store::graph_snapshot) is trivially
//! consistent. Search scores every publishable document with BM25.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::models::{AuthorityRecord, Edge, IndexRecord, SearchHit};
use crate::relevance::{rank_hits, Bm25, TermStatistics};

use super::{EdgeInsert, GraphSnapshot, Store, StoreCounts};

#[derive(Default)]
struct Tables {
    index: BTreeMap<String, IndexRecord>,
    links: BTreeMap<(String, String), Edge>,
    authority: BTreeMap<String, AuthorityRecord>,
}

impl Tables {
    fn term_statistics(&self, terms: &[String]) -> TermStatistics {
        let mut stats = TermStatistics::default();
        let mut total_len = 0usize;
        for record in self.index.values().filter(|r| r.publishable) {
            stats.documents += 1;
            total_len += record.tokens.len();
            for term in terms {
                if record.tokens.iter().any(|t| t == term) {
                    *stats.document_frequency.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }
        if stats.documents > 0 {
            stats.average_length = total_len as f64 / stats.documents as f64;
        }
        stats
    }
}

/// In-memory store for tests and single-process use.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_index_record(&self, document_id: &str) -> Result<Option<IndexRecord>> {
        Ok(self.tables.read().index.get(document_id).cloned())
    }

    async fn write_index_record(
        &self,
        record: &IndexRecord,
        expected_fingerprint: Option<&str>,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let current = tables
            .index
            .get(&record.document_id)
            .map(|r| r.fingerprint.as_str());
        if current != expected_fingerprint {
            return Err(Error::IndexWriteConflict {
                document_id: record.document_id.clone(),
            });
        }
        tables
            .index
            .insert(record.document_id.clone(), record.clone());
        Ok(())
    }

    async fn update_index_metadata(
        &self,
        document_id: &str,
        title: Option<&str>,
        publishable: bool,
    ) -> Result<bool> {
        let mut tables = self.tables.write();
        match tables.index.get_mut(document_id) {
            Some(record) => {
                record.title = title.map(str::to_string);
                record.publishable = publishable;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_index_record(&self, document_id: &str) -> Result<bool> {
        Ok(self.tables.write().index.remove(document_id).is_some())
    }

    async fn list_indexed_ids(&self) -> Result<Vec<String>> {
        Ok(self.tables.read().index.keys().cloned().collect())
    }

    async fn term_statistics(&self, terms: &[String]) -> Result<TermStatistics> {
        Ok(self.tables.read().term_statistics(terms))
    }

    async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<SearchHit>> {
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let tables = self.tables.read();
        let stats = tables.term_statistics(terms);
        let bm25 = Bm25::default();
        let hits: Vec<SearchHit> = tables
            .index
            .values()
            .filter(|r| r.publishable)
            .filter_map(|r| {
                let relevance = bm25.score(&r.tokens, terms, &stats);
                (relevance > 0.0).then(|| SearchHit {
                    document_id: r.document_id.clone(),
                    relevance,
                })
            })
            .collect();
        Ok(rank_hits(hits, limit))
    }

    async fn insert_edge(&self, edge: &Edge, budget: usize) -> Result<EdgeInsert> {
        let mut tables = self.tables.write();
        let key = (edge.source_id.clone(), edge.target_id.clone());
        if tables.links.contains_key(&key) {
            return Ok(EdgeInsert::Duplicate);
        }
        let outbound = tables
            .links
            .keys()
            .filter(|(s, _)| *s == edge.source_id)
            .count();
        if outbound >= budget {
            return Ok(EdgeInsert::BudgetExceeded);
        }
        tables.links.insert(key, edge.clone());
        Ok(EdgeInsert::Inserted)
    }

    async fn delete_edge(&self, source_id: &str, target_id: &str) -> Result<bool> {
        let key = (source_id.to_string(), target_id.to_string());
        Ok(self.tables.write().links.remove(&key).is_some())
    }

    async fn delete_edges_touching(&self, document_id: &str) -> Result<Vec<Edge>> {
        let mut tables = self.tables.write();
        let keys: Vec<(String, String)> = tables
            .links
            .keys()
            .filter(|(s, t)| s == document_id || t == document_id)
            .cloned()
            .collect();
        Ok(keys
            .iter()
            .filter_map(|k| tables.links.remove(k))
            .collect())
    }

    async fn outbound_edges(&self, source_id: &str) -> Result<Vec<Edge>> {
        Ok(self
            .tables
            .read()
            .links
            .values()
            .filter(|e| e.source_id == source_id)
            .cloned()
            .collect())
    }

    async fn inbound_edges(&self, target_id: &str) -> Result<Vec<Edge>> {
        Ok(self
            .tables
            .read()
            .links
            .values()
            .filter(|e| e.target_id == target_id)
            .cloned()
            .collect())
    }

    async fn graph_snapshot(&self) -> Result<GraphSnapshot> {
        let tables = self.tables.read();
        Ok(GraphSnapshot::new(
            tables.index.keys().cloned().collect(),
            tables.links.keys().cloned().collect(),
        ))
    }

    async fn get_authority(&self, document_id: &str) -> Result<Option<AuthorityRecord>> {
        Ok(self.tables.read().authority.get(document_id).cloned())
    }

    async fn authority_records(&self) -> Result<Vec<AuthorityRecord>> {
        Ok(self.tables.read().authority.values().cloned().collect())
    }

    async fn seed_authority(&self, record: &AuthorityRecord) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.authority.contains_key(&record.document_id) {
            return Ok(false);
        }
        tables
            .authority
            .insert(record.document_id.clone(), record.clone());
        Ok(true)
    }

    async fn write_authority(
        &self,
        records: &[AuthorityRecord],
        removals: &[String],
    ) -> Result<()> {
        let mut tables = self.tables.write();
        for id in removals {
            tables.authority.remove(id);
        }
        for record in records {
            tables
                .authority
                .insert(record.document_id.clone(), record.clone());
        }
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let tables = self.tables.read();
        Ok(StoreCounts {
            indexed: tables.index.len() as u64,
            publishable: tables.index.values().filter(|r| r.publishable).count() as u64,
            edges: tables.links.len() as u64,
            authority_records: tables.authority.len() as u64,
        })
    }
}
