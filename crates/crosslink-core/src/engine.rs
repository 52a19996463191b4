//! Orchestration of the full pipeline.
//!
//! ```text
//! ContentSource ──▶ normalize ──▶ Indexer ──▶ CandidateFinder ──▶ LinkGraph
//!                                                                    │ dirty ids
//!                                                   AuthorityScorer ◀┘
//! ```
//!
//! The engine owns no global state: it holds the injected store and
//! content source plus per-key locks. Change events for one document are
//! serialized on the index locks; edge commits for one source are
//! serialized on the commit locks. Locks are always taken index before
//! commit. Dirty ids accumulate until [`Engine::recompute`] drains them,
//! and recomputations run one at a time.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::authority::{AuthorityScorer, RecomputeReport};
use crate::candidates::CandidateFinder;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graph::{CommitReport, LinkGraph, ReconcileReport};
use crate::index::{IndexOutcome, Indexer};
use crate::locks::KeyedLocks;
use crate::models::{AuthorityRecord, CandidateLink, IndexInput, LinkType};
use crate::normalize::{extract_title, normalize_bytes};
use crate::source::{ChangeEvent, ContentSource};
use crate::status::StatusSnapshot;
use crate::store::Store;

/// What handling one change event did.
#[derive(Debug, Default)]
pub struct ChangeReport {
    pub document_id: String,
    /// Index outcome, `None` when the document was removed.
    pub outcome: Option<IndexOutcome>,
    pub removed: bool,
    pub reconcile: Option<ReconcileReport>,
    /// Documents whose authority inputs changed.
    pub dirty: BTreeSet<String>,
    /// Non-fatal problems: lossy decodes and rejected candidates.
    pub warnings: Vec<Error>,
}

impl ChangeReport {
    fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            ..Self::default()
        }
    }
}

/// The Crosslink pipeline over a store and a content source.
pub struct Engine<S: Store, C: ContentSource> {
    store: Arc<S>,
    source: Arc<C>,
    config: EngineConfig,
    indexer: Indexer<S>,
    finder: CandidateFinder<S>,
    graph: LinkGraph<S>,
    scorer: AuthorityScorer<S>,
    index_locks: KeyedLocks,
    commit_locks: KeyedLocks,
    dirty: parking_lot::Mutex<BTreeSet<String>>,
    recompute_lock: tokio::sync::Mutex<()>,
    last_recompute: parking_lot::Mutex<Option<RecomputeReport>>,
}

impl<S: Store, C: ContentSource> Engine<S, C> {
    /// Build an engine after validating `config`.
    pub fn new(store: Arc<S>, source: Arc<C>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            indexer: Indexer::new(store.clone()),
            finder: CandidateFinder::new(store.clone(), config.linking.clone()),
            graph: LinkGraph::new(store.clone(), config.linking.outbound_budget),
            scorer: AuthorityScorer::new(store.clone(), config.authority.clone()),
            store,
            source,
            config,
            index_locks: KeyedLocks::new(),
            commit_locks: KeyedLocks::new(),
            dirty: parking_lot::Mutex::new(BTreeSet::new()),
            recompute_lock: tokio::sync::Mutex::new(()),
            last_recompute: parking_lot::Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn source(&self) -> &Arc<C> {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn indexer(&self) -> &Indexer<S> {
        &self.indexer
    }

    pub fn finder(&self) -> &CandidateFinder<S> {
        &self.finder
    }

    pub fn graph(&self) -> &LinkGraph<S> {
        &self.graph
    }

    pub fn scorer(&self) -> &AuthorityScorer<S> {
        &self.scorer
    }

    /// Dispatch a change notification.
    pub async fn handle(&self, event: ChangeEvent) -> Result<ChangeReport> {
        match event {
            ChangeEvent::Changed(id) => self.document_changed(&id).await,
            ChangeEvent::Deleted(id) => self.document_deleted(&id).await,
        }
    }

    /// Re-index a document and, if its text or metadata changed,
    /// re-evaluate its outbound links.
    pub async fn document_changed(&self, document_id: &str) -> Result<ChangeReport> {
        let _index = self.index_locks.lock(document_id).await;
        let mut report = self.ingest_locked(document_id).await?;
        if matches!(report.outcome, Some(outcome) if outcome != IndexOutcome::Unchanged) {
            let reconcile = self.relink_locked(document_id).await?;
            self.absorb(&mut report, reconcile);
        }
        Ok(report)
    }

    /// Index a document without touching its links.
    ///
    /// Bulk loads index every document first and relink afterwards, so
    /// that early documents can see later ones as candidates.
    pub async fn ingest(&self, document_id: &str) -> Result<ChangeReport> {
        let _index = self.index_locks.lock(document_id).await;
        self.ingest_locked(document_id).await
    }

    /// Drop a document from the index and the link graph.
    pub async fn document_deleted(&self, document_id: &str) -> Result<ChangeReport> {
        let _index = self.index_locks.lock(document_id).await;
        self.delete_locked(document_id).await
    }

    /// Re-evaluate a document's outbound links against fresh proposals.
    pub async fn relink(&self, document_id: &str) -> Result<ReconcileReport> {
        self.relink_locked(document_id).await
    }

    /// New candidates for a document, at most `linking.max_candidates`.
    pub async fn candidates(&self, document_id: &str) -> Result<Vec<CandidateLink>> {
        self.finder
            .find_candidates(document_id, self.config.linking.max_candidates)
            .await
    }

    /// Commit a hand-curated link. The anchor defaults to the target's
    /// title, then its id.
    ///
    /// Both ends must be indexed; otherwise the link is refused with
    /// [`Error::DocumentNotIndexed`].
    pub async fn add_link(
        &self,
        source_id: &str,
        target_id: &str,
        anchor_text: Option<&str>,
        link_type: LinkType,
    ) -> Result<CommitReport> {
        if self.store.get_index_record(source_id).await?.is_none() {
            return Err(Error::DocumentNotIndexed(source_id.to_string()));
        }
        let target = self
            .store
            .get_index_record(target_id)
            .await?
            .ok_or_else(|| Error::DocumentNotIndexed(target_id.to_string()))?;
        let anchor = match anchor_text {
            Some(anchor) => anchor.to_string(),
            None => target.title.unwrap_or_else(|| target_id.to_string()),
        };
        let _commit = self.commit_locks.lock(source_id).await;
        let report = self
            .graph
            .add_link(source_id, target_id, &anchor, link_type)
            .await?;
        self.mark_dirty(&report.dirty);
        Ok(report)
    }

    /// Drain the dirty set and recompute authority.
    ///
    /// `full` forces a recomputation from the uniform distribution. On
    /// failure the drained ids are put back.
    pub async fn recompute(&self, full: bool) -> Result<RecomputeReport> {
        let _running = self.recompute_lock.lock().await;
        let dirty = std::mem::take(&mut *self.dirty.lock());

        let result = if full {
            self.scorer.recompute_full().await
        } else {
            self.scorer.recompute(&dirty).await
        };
        match result {
            Ok(report) => {
                *self.last_recompute.lock() = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                self.dirty.lock().extend(dirty);
                Err(e)
            }
        }
    }

    /// Number of documents awaiting recomputation.
    pub fn pending_dirty(&self) -> usize {
        self.dirty.lock().len()
    }

    pub fn last_recompute(&self) -> Option<RecomputeReport> {
        self.last_recompute.lock().clone()
    }

    /// Point-in-time status for presentation.
    pub async fn status(&self) -> Result<StatusSnapshot> {
        let known = self.source.list_ids().await?.len() as u64;
        let counts = self.store.counts().await?;
        Ok(StatusSnapshot {
            documents_known: known,
            documents_indexed: counts.indexed,
            documents_publishable: counts.publishable,
            edges: counts.edges,
            authority_records: counts.authority_records,
            pending_dirty: self.pending_dirty(),
            last_recompute: self.last_recompute(),
        })
    }

    async fn ingest_locked(&self, document_id: &str) -> Result<ChangeReport> {
        let Some(doc) = self.source.get_document(document_id).await? else {
            debug!(document_id, "document vanished from source, deleting");
            return self.delete_locked(document_id).await;
        };

        let mut report = ChangeReport::new(document_id);
        let normalized = normalize_bytes(&doc.raw_markup);
        if normalized.lossy {
            warn!(document_id, "markup is not valid UTF-8, decoded lossily");
            report.warnings.push(Error::MalformedContent {
                document_id: document_id.to_string(),
                detail: "invalid UTF-8 replaced".to_string(),
            });
        }
        let title = doc
            .title
            .clone()
            .or_else(|| extract_title(&String::from_utf8_lossy(&doc.raw_markup)));

        let outcome = self
            .indexer
            .index(&IndexInput {
                document_id: document_id.to_string(),
                normalized_text: normalized.text,
                title,
                publishable: doc.publishable,
            })
            .await?;
        report.outcome = Some(outcome);

        if outcome == IndexOutcome::Created {
            self.seed_authority(document_id).await?;
            report.dirty.insert(document_id.to_string());
        }
        self.mark_dirty(&report.dirty);
        debug!(document_id, ?outcome, "document ingested");
        Ok(report)
    }

    async fn delete_locked(&self, document_id: &str) -> Result<ChangeReport> {
        let _commit = self.commit_locks.lock(document_id).await;
        let mut report = ChangeReport::new(document_id);
        report.dirty = self.graph.delete_document(document_id).await?;
        report.removed = self.indexer.remove(document_id).await?;
        self.mark_dirty(&report.dirty);
        info!(
            document_id,
            removed = report.removed,
            edges_touched = report.dirty.len(),
            "document deleted"
        );
        Ok(report)
    }

    async fn relink_locked(&self, document_id: &str) -> Result<ReconcileReport> {
        let _commit = self.commit_locks.lock(document_id).await;
        let proposals = self
            .finder
            .proposals(document_id, self.config.linking.max_candidates)
            .await?;
        let report = self.graph.reconcile(document_id, &proposals).await?;
        self.mark_dirty(&report.dirty);
        Ok(report)
    }

    /// First appearance: uniform default until the next recomputation.
    async fn seed_authority(&self, document_id: &str) -> Result<()> {
        let n = self.store.counts().await?.indexed.max(1);
        let seeded = self
            .store
            .seed_authority(&AuthorityRecord {
                document_id: document_id.to_string(),
                score: self.config.authority.total_mass / n as f64,
                inbound_count: 0,
                outbound_count: 0,
                last_updated: chrono::Utc::now(),
            })
            .await?;
        if seeded {
            debug!(document_id, "authority seeded");
        }
        Ok(())
    }

    fn absorb(&self, report: &mut ChangeReport, reconcile: ReconcileReport) {
        let source_id = report.document_id.clone();
        report.dirty.extend(reconcile.dirty.iter().cloned());
        report.warnings.extend(
            reconcile
                .commit
                .rejected
                .iter()
                .cloned()
                .map(|r| r.into_error(&source_id)),
        );
        report.reconcile = Some(reconcile);
    }

    fn mark_dirty(&self, ids: &BTreeSet<String>) {
        if !ids.is_empty() {
            self.dirty.lock().extend(ids.iter().cloned());
        }
    }
}
