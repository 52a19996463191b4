//! Link graph manager.
//!
//! Commits candidate links as edges under three rules: no self-links, at
//! most one edge per ordered pair, and at most `outbound_budget` edges per
//! source. The duplicate and budget checks run inside the store's atomic
//! insert, so concurrent commits for the same source can never overshoot
//! the budget. A batch is not transactional: each candidate is accepted or
//! rejected on its own.
//!
//! Every mutating operation reports the documents whose authority inputs
//! changed (its dirty set).

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{CandidateLink, Edge, LinkType, RejectReason};
use crate::store::{EdgeInsert, Store};

/// A candidate that was not committed, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedCandidate {
    pub candidate: CandidateLink,
    pub reason: RejectReason,
}

impl RejectedCandidate {
    /// The rejection as a reportable [`Error::CandidateRejected`].
    pub fn into_error(self, source_id: &str) -> Error {
        Error::CandidateRejected {
            source_id: source_id.to_string(),
            target_id: self.candidate.target_id,
            reason: self.reason,
        }
    }
}

/// Result of [`LinkGraph::commit_edges`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitReport {
    pub accepted: Vec<Edge>,
    pub rejected: Vec<RejectedCandidate>,
    pub dirty: BTreeSet<String>,
}

/// Result of [`LinkGraph::reconcile`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Semantic edges no longer proposed.
    pub removed: Vec<Edge>,
    pub commit: CommitReport,
    pub dirty: BTreeSet<String>,
}

/// Edge bookkeeping over a [`Store`].
pub struct LinkGraph<S: Store> {
    store: Arc<S>,
    outbound_budget: usize,
}

impl<S: Store> LinkGraph<S> {
    pub fn new(store: Arc<S>, outbound_budget: usize) -> Self {
        Self {
            store,
            outbound_budget,
        }
    }

    pub fn outbound_budget(&self) -> usize {
        self.outbound_budget
    }

    /// Commit candidates in the given order.
    ///
    /// Once the source holds `outbound_budget` edges, every remaining
    /// candidate is rejected with [`RejectReason::BudgetExceeded`].
    pub async fn commit_edges(
        &self,
        source_id: &str,
        candidates: &[CandidateLink],
    ) -> Result<CommitReport> {
        let mut report = CommitReport::default();

        for candidate in candidates {
            if candidate.target_id == source_id {
                report.rejected.push(RejectedCandidate {
                    candidate: candidate.clone(),
                    reason: RejectReason::SelfLink,
                });
                continue;
            }

            let edge = Edge {
                source_id: source_id.to_string(),
                target_id: candidate.target_id.clone(),
                anchor_text: candidate.anchor_text.clone(),
                link_type: candidate.link_type,
                created_at: Utc::now(),
            };
            let reason = match self.store.insert_edge(&edge, self.outbound_budget).await? {
                EdgeInsert::Inserted => {
                    report.dirty.insert(edge.source_id.clone());
                    report.dirty.insert(edge.target_id.clone());
                    report.accepted.push(edge);
                    continue;
                }
                EdgeInsert::Duplicate => RejectReason::Duplicate,
                EdgeInsert::BudgetExceeded => RejectReason::BudgetExceeded,
            };
            debug!(source_id, target_id = %candidate.target_id, %reason, "candidate rejected");
            report.rejected.push(RejectedCandidate {
                candidate: candidate.clone(),
                reason,
            });
        }

        Ok(report)
    }

    /// Re-evaluate a source's outbound edges against fresh proposals.
    ///
    /// The desired set is the first `outbound_budget` proposals. Semantic
    /// edges outside it are removed; manual and keyword edges are never
    /// touched. Desired targets not yet linked are then committed.
    pub async fn reconcile(
        &self,
        source_id: &str,
        proposals: &[CandidateLink],
    ) -> Result<ReconcileReport> {
        let desired: Vec<&CandidateLink> = proposals.iter().take(self.outbound_budget).collect();
        let desired_ids: HashSet<&str> = desired.iter().map(|c| c.target_id.as_str()).collect();

        let mut report = ReconcileReport::default();
        let existing = self.store.outbound_edges(source_id).await?;
        let mut linked: HashSet<String> = HashSet::new();

        for edge in existing {
            if edge.link_type == LinkType::Semantic && !desired_ids.contains(edge.target_id.as_str()) {
                if self.store.delete_edge(&edge.source_id, &edge.target_id).await? {
                    report.dirty.insert(edge.source_id.clone());
                    report.dirty.insert(edge.target_id.clone());
                    report.removed.push(edge);
                }
            } else {
                linked.insert(edge.target_id);
            }
        }

        let fresh: Vec<CandidateLink> = desired
            .into_iter()
            .filter(|c| !linked.contains(&c.target_id))
            .cloned()
            .collect();
        report.commit = self.commit_edges(source_id, &fresh).await?;
        report.dirty.extend(report.commit.dirty.iter().cloned());

        debug!(
            source_id,
            removed = report.removed.len(),
            accepted = report.commit.accepted.len(),
            "reconciled outbound links"
        );
        Ok(report)
    }

    /// Remove every edge touching `document_id`. Both endpoints of each
    /// removed edge are dirty.
    pub async fn delete_document(&self, document_id: &str) -> Result<BTreeSet<String>> {
        let removed = self.store.delete_edges_touching(document_id).await?;
        let mut dirty = BTreeSet::new();
        for edge in removed {
            dirty.insert(edge.source_id);
            dirty.insert(edge.target_id);
        }
        Ok(dirty)
    }

    /// Commit one hand-curated edge through the same checks as discovered
    /// candidates.
    pub async fn add_link(
        &self,
        source_id: &str,
        target_id: &str,
        anchor_text: &str,
        link_type: LinkType,
    ) -> Result<CommitReport> {
        let candidate = CandidateLink {
            target_id: target_id.to_string(),
            anchor_text: anchor_text.to_string(),
            link_type,
            relevance: 0.0,
        };
        self.commit_edges(source_id, std::slice::from_ref(&candidate))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn candidate(target: &str, relevance: f64) -> CandidateLink {
        CandidateLink {
            target_id: target.to_string(),
            anchor_text: target.to_uppercase(),
            link_type: LinkType::Semantic,
            relevance,
        }
    }

    #[tokio::test]
    async fn test_budget_accepts_top_ranked() {
        let graph = LinkGraph::new(Arc::new(InMemoryStore::new()), 3);
        let ranked: Vec<_> = ["b", "c", "d", "e", "f"]
            .iter()
            .enumerate()
            .map(|(i, t)| candidate(t, 10.0 - i as f64))
            .collect();

        let report = graph.commit_edges("a", &ranked).await.unwrap();
        let accepted: Vec<&str> = report.accepted.iter().map(|e| e.target_id.as_str()).collect();
        assert_eq!(accepted, vec!["b", "c", "d"]);
        assert_eq!(report.rejected.len(), 2);
        assert!(report
            .rejected
            .iter()
            .all(|r| r.reason == RejectReason::BudgetExceeded));
        assert_eq!(report.accepted[0].anchor_text, "B");
    }

    #[tokio::test]
    async fn test_self_link_and_duplicate_rejected() {
        let graph = LinkGraph::new(Arc::new(InMemoryStore::new()), 5);
        let report = graph
            .commit_edges("a", &[candidate("a", 3.0), candidate("b", 2.0), candidate("b", 1.0)])
            .await
            .unwrap();
        assert_eq!(report.accepted.len(), 1);
        let reasons: Vec<RejectReason> = report.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(reasons, vec![RejectReason::SelfLink, RejectReason::Duplicate]);

        let err = report.rejected[0].clone().into_error("a");
        assert_eq!(err.to_string(), "candidate a -> a rejected: self-link");
        assert_eq!(
            report.dirty.into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_reconcile_replaces_stale_semantic_edges_only() {
        let store = Arc::new(InMemoryStore::new());
        let graph = LinkGraph::new(store.clone(), 2);
        graph
            .commit_edges("a", &[candidate("old", 1.0)])
            .await
            .unwrap();
        graph
            .add_link("a", "pinned", "Pinned", LinkType::Manual)
            .await
            .unwrap();

        let report = graph
            .reconcile("a", &[candidate("new", 5.0), candidate("other", 4.0)])
            .await
            .unwrap();
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.removed[0].target_id, "old");
        assert_eq!(report.commit.accepted.len(), 1);
        assert_eq!(report.commit.accepted[0].target_id, "new");
        assert_eq!(
            report.commit.rejected[0].reason,
            RejectReason::BudgetExceeded
        );
        assert!(report.dirty.contains("old"));

        let targets: Vec<String> = store
            .outbound_edges("a")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.target_id)
            .collect();
        assert_eq!(targets, vec!["new", "pinned"]);
    }

    #[tokio::test]
    async fn test_delete_document_reports_endpoints() {
        let store = Arc::new(InMemoryStore::new());
        let graph = LinkGraph::new(store.clone(), 5);
        graph.commit_edges("a", &[candidate("b", 1.0)]).await.unwrap();
        graph.commit_edges("c", &[candidate("a", 1.0)]).await.unwrap();
        graph.commit_edges("c", &[candidate("b", 1.0)]).await.unwrap();

        let dirty = graph.delete_document("a").await.unwrap();
        assert_eq!(
            dirty.into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert_eq!(store.counts().await.unwrap().edges, 1);
    }
}
