//! Authority scoring over the link graph.
//!
//! Scores are the fixed point of a damped propagation in which every
//! document keeps a teleport share `(1 - d) · M / N`, passes `d` of its
//! score evenly along its outbound edges, and, when it has no outbound
//! edges, spreads that `d` share evenly over every *other* document:
//!
//! ```text
//! s'(v) = (1-d)·M/N + d·Σ_{u→v} s(u)/out(u) + d·(Σ_{u dangling, u≠v} s(u))/(N-1)
//! ```
//!
//! Total mass is conserved by every pass. Iteration is Jacobi-style and
//! bounded by `max_iterations`; a run that hits the cap keeps its best
//! iterate and reports [`Error::ConvergenceNotReached`] as a warning.
//!
//! A pass contracts the error by at least `d`, so a run stops once the
//! largest change drops below `tolerance · (1 - d) / (2d)`. Every
//! converged result then lies within `tolerance / 2` of the fixed point,
//! and any two converged runs agree within `tolerance`.
//!
//! # Modes
//!
//! - **Full**: start from the uniform distribution and sweep every node.
//! - **Incremental**: start from the stored scores and sweep only an
//!   active frontier, seeded with the dirty documents and their
//!   out-neighbours. A node that moves by more than the tolerance
//!   activates its out-neighbours for the next pass. When the global
//!   dangling mass drifts, every node depends on the change and the
//!   frontier widens to the whole graph. Once the frontier settles, one
//!   sweep over every node confirms convergence.
//!
//! Incremental mode is only used when the stored records cover exactly the
//! current node set and sum to the configured mass; otherwise the scorer
//! falls back to a full run.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AuthorityParams;
use crate::error::{Error, Result};
use crate::models::AuthorityRecord;
use crate::store::{GraphSnapshot, Store};

/// Index-based view of a [`GraphSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
    outbound: Vec<Vec<usize>>,
    inbound: Vec<Vec<usize>>,
}

impl Adjacency {
    /// Build from a snapshot. Self-loops and repeated pairs are ignored.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let ids = snapshot.nodes.clone();
        let positions: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let mut outbound = vec![Vec::new(); ids.len()];
        let mut inbound = vec![Vec::new(); ids.len()];

        for (source, target) in &snapshot.edges {
            let (Some(&u), Some(&v)) = (positions.get(source), positions.get(target)) else {
                continue;
            };
            if u == v {
                continue;
            }
            outbound[u].push(v);
            inbound[v].push(u);
        }
        for list in outbound.iter_mut().chain(inbound.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        Self {
            ids,
            positions,
            outbound,
            inbound,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn outbound(&self, node: usize) -> &[usize] {
        &self.outbound[node]
    }

    pub fn inbound(&self, node: usize) -> &[usize] {
        &self.inbound[node]
    }

    fn is_dangling(&self, node: usize) -> bool {
        self.outbound[node].is_empty()
    }
}

/// Scores produced by [`rank_full`] or [`rank_incremental`], indexed like
/// [`Adjacency::ids`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Largest single-node change in the final pass.
    pub max_delta: f64,
}

/// Full recomputation from the uniform distribution.
pub fn rank_full(graph: &Adjacency, params: &AuthorityParams) -> Ranking {
    let n = graph.len();
    if n == 0 {
        return Ranking {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
            max_delta: 0.0,
        };
    }
    let start = vec![params.total_mass / n as f64; n];
    iterate(graph, params, start, None)
}

/// Frontier-restricted recomputation warm-started from `prior`.
///
/// `seeds` are the positions of the dirty documents. Pass `widen = true`
/// when a dirty document gained or lost all of its outbound edges, which
/// moves the dangling mass every node depends on.
pub fn rank_incremental(
    graph: &Adjacency,
    params: &AuthorityParams,
    prior: &[f64],
    seeds: &[usize],
    widen: bool,
) -> Ranking {
    if widen {
        return iterate(graph, params, prior.to_vec(), None);
    }
    let mut active = vec![false; graph.len()];
    for &node in seeds {
        active[node] = true;
        for &next in graph.outbound(node) {
            active[next] = true;
        }
    }
    iterate(graph, params, prior.to_vec(), Some(active))
}

fn dangling_mass(graph: &Adjacency, scores: &[f64]) -> f64 {
    (0..graph.len())
        .filter(|&u| graph.is_dangling(u))
        .map(|u| scores[u])
        .sum()
}

fn iterate(
    graph: &Adjacency,
    params: &AuthorityParams,
    mut scores: Vec<f64>,
    mut active: Option<Vec<bool>>,
) -> Ranking {
    let n = graph.len();
    if n == 1 {
        return Ranking {
            scores: vec![params.total_mass],
            iterations: 0,
            converged: true,
            max_delta: 0.0,
        };
    }

    let d = params.damping;
    let teleport = (1.0 - d) * params.total_mass / n as f64;
    let others = (n - 1) as f64;
    let threshold = params.tolerance * (1.0 - d) / (2.0 * d);
    let baseline_dangling = dangling_mass(graph, &scores);

    let mut iterations = 0;
    let mut max_delta = 0.0;
    let mut converged = false;

    while iterations < params.max_iterations {
        let dangling = dangling_mass(graph, &scores);
        if active.is_some() && (dangling - baseline_dangling).abs() > threshold {
            debug!(dangling, "dangling mass moved, widening frontier");
            active = None;
        }
        let settled = active
            .as_ref()
            .map_or(false, |flags| !flags.iter().any(|&a| a));
        if settled {
            if iterations == 0 {
                max_delta = 0.0;
                converged = true;
                break;
            }
            active = None;
        }

        iterations += 1;
        max_delta = 0.0;
        let mut next = scores.clone();
        let mut moved = Vec::new();

        for v in 0..n {
            if let Some(flags) = &active {
                if !flags[v] {
                    continue;
                }
            }
            let linked: f64 = graph
                .inbound(v)
                .iter()
                .map(|&u| scores[u] / graph.outbound(u).len() as f64)
                .sum();
            let own = if graph.is_dangling(v) { scores[v] } else { 0.0 };
            let value = teleport + d * linked + d * (dangling - own) / others;

            let delta = (value - scores[v]).abs();
            if delta > max_delta {
                max_delta = delta;
            }
            if delta > threshold {
                moved.push(v);
            }
            next[v] = value;
        }
        scores = next;

        if max_delta < threshold {
            if active.take().is_none() {
                converged = true;
                break;
            }
            continue;
        }
        if let Some(flags) = &mut active {
            flags.iter_mut().for_each(|f| *f = false);
            for v in moved {
                flags[v] = true;
                for &w in graph.outbound(v) {
                    flags[w] = true;
                }
            }
        }
    }

    normalize(&mut scores, params.total_mass);
    Ranking {
        scores,
        iterations,
        converged,
        max_delta,
    }
}

fn normalize(scores: &mut [f64], total_mass: f64) {
    let sum: f64 = scores.iter().sum();
    if sum > 0.0 {
        let factor = total_mass / sum;
        scores.iter_mut().for_each(|s| *s *= factor);
    }
}

/// Which algorithm a recomputation used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputeMode {
    Full,
    Incremental,
}

impl RecomputeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecomputeMode::Full => "full",
            RecomputeMode::Incremental => "incremental",
        }
    }
}

/// Summary of one recomputation.
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeReport {
    pub mode: RecomputeMode,
    pub nodes: usize,
    pub iterations: usize,
    pub converged: bool,
    pub max_delta: f64,
    /// Records written.
    pub updated: usize,
    /// Records deleted because their document left the graph.
    pub removed: usize,
    pub finished_at: DateTime<Utc>,
}

impl RecomputeReport {
    /// [`Error::ConvergenceNotReached`] if the run hit the iteration cap.
    pub fn warning(&self) -> Option<Error> {
        (!self.converged).then(|| Error::ConvergenceNotReached {
            iterations: self.iterations,
            max_delta: self.max_delta,
        })
    }
}

/// Maintains stored authority records.
pub struct AuthorityScorer<S: Store> {
    store: Arc<S>,
    params: AuthorityParams,
}

impl<S: Store> AuthorityScorer<S> {
    pub fn new(store: Arc<S>, params: AuthorityParams) -> Self {
        Self { store, params }
    }

    pub fn params(&self) -> &AuthorityParams {
        &self.params
    }

    /// Recompute after the edges touching `dirty` changed, incrementally
    /// when enabled and possible.
    pub async fn recompute(&self, dirty: &BTreeSet<String>) -> Result<RecomputeReport> {
        self.run(dirty, self.params.incremental).await
    }

    /// Recompute every score from the uniform distribution.
    pub async fn recompute_full(&self) -> Result<RecomputeReport> {
        self.run(&BTreeSet::new(), false).await
    }

    /// Stored score, `0.0` for unknown documents.
    pub async fn score(&self, document_id: &str) -> Result<f64> {
        Ok(self
            .store
            .get_authority(document_id)
            .await?
            .map(|r| r.score)
            .unwrap_or(0.0))
    }

    async fn run(
        &self,
        dirty: &BTreeSet<String>,
        allow_incremental: bool,
    ) -> Result<RecomputeReport> {
        let snapshot = self.store.graph_snapshot().await?;
        let graph = Adjacency::from_snapshot(&snapshot);
        let prior: HashMap<String, AuthorityRecord> = self
            .store
            .authority_records()
            .await?
            .into_iter()
            .map(|r| (r.document_id.clone(), r))
            .collect();

        let (mode, ranking) = if allow_incremental && self.prior_covers(&graph, &prior) {
            let start: Vec<f64> = graph.ids().iter().map(|id| prior[id].score).collect();
            let seeds: Vec<usize> = dirty.iter().filter_map(|id| graph.position(id)).collect();
            let widen = seeds.iter().any(|&node| {
                let was_dangling = prior[&graph.ids()[node]].outbound_count == 0;
                was_dangling != graph.is_dangling(node)
            });
            debug!(seeds = seeds.len(), widen, "incremental authority pass");
            (
                RecomputeMode::Incremental,
                rank_incremental(&graph, &self.params, &start, &seeds, widen),
            )
        } else {
            debug!(nodes = graph.len(), "full authority pass");
            (RecomputeMode::Full, rank_full(&graph, &self.params))
        };

        let now = Utc::now();
        let mut records = Vec::new();
        for (node, id) in graph.ids().iter().enumerate() {
            let record = AuthorityRecord {
                document_id: id.clone(),
                score: ranking.scores[node],
                inbound_count: graph.inbound(node).len() as u64,
                outbound_count: graph.outbound(node).len() as u64,
                last_updated: now,
            };
            let unchanged = prior.get(id).map_or(false, |p| {
                p.score == record.score
                    && p.inbound_count == record.inbound_count
                    && p.outbound_count == record.outbound_count
            });
            if !unchanged {
                records.push(record);
            }
        }
        let removals: Vec<String> = prior
            .keys()
            .filter(|id| graph.position(id).is_none())
            .cloned()
            .collect();

        self.store.write_authority(&records, &removals).await?;

        let report = RecomputeReport {
            mode,
            nodes: graph.len(),
            iterations: ranking.iterations,
            converged: ranking.converged,
            max_delta: ranking.max_delta,
            updated: records.len(),
            removed: removals.len(),
            finished_at: now,
        };
        if let Some(warning) = report.warning() {
            warn!(%warning, "keeping best authority iterate");
        }
        info!(
            mode = mode.as_str(),
            nodes = report.nodes,
            iterations = report.iterations,
            updated = report.updated,
            "authority recomputed"
        );
        Ok(report)
    }

    fn prior_covers(&self, graph: &Adjacency, prior: &HashMap<String, AuthorityRecord>) -> bool {
        if graph.is_empty() || prior.len() != graph.len() {
            return false;
        }
        if !graph.ids().iter().all(|id| prior.contains_key(id)) {
            return false;
        }
        let mass: f64 = prior.values().map(|r| r.score).sum();
        (mass - self.params.total_mass).abs() <= 1e-6 * self.params.total_mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> Adjacency {
        Adjacency::from_snapshot(&GraphSnapshot::new(
            nodes.iter().map(|s| s.to_string()).collect(),
            edges
                .iter()
                .map(|(s, t)| (s.to_string(), t.to_string()))
                .collect(),
        ))
    }

    fn mass(r: &Ranking) -> f64 {
        r.scores.iter().sum()
    }

    #[test]
    fn test_zero_edges_is_uniform() {
        let g = graph(&["a", "b", "c", "d"], &[]);
        let r = rank_full(&g, &AuthorityParams::default());
        assert!(r.converged);
        for s in &r.scores {
            assert!((s - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cycle_is_symmetric() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let r = rank_full(&g, &AuthorityParams::default());
        assert!((mass(&r) - 1.0).abs() < 1e-12);
        for s in &r.scores {
            assert!((s - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_dangling_sink_scores_below_its_sources() {
        let g = graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "a"), ("a", "d")],
        );
        let r = rank_full(&g, &AuthorityParams::default());
        assert!((mass(&r) - 1.0).abs() < 1e-12);
        let d = r.scores[3];
        assert!(r.scores[..3].iter().all(|&s| d < s));
    }

    #[test]
    fn test_iteration_cap_keeps_mass() {
        let params = AuthorityParams {
            max_iterations: 1,
            ..AuthorityParams::default()
        };
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("a", "c")]);
        let r = rank_full(&g, &params);
        assert!(!r.converged);
        assert_eq!(r.iterations, 1);
        assert!((mass(&r) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_node_holds_all_mass() {
        let params = AuthorityParams {
            total_mass: 3.0,
            ..AuthorityParams::default()
        };
        let r = rank_full(&graph(&["only"], &[]), &params);
        assert_eq!(r.scores, vec![3.0]);
    }

    #[test]
    fn test_incremental_matches_full_after_edge_change() {
        let params = AuthorityParams::default();
        let before = graph(
            &["a", "b", "c", "d", "e"],
            &[("a", "b"), ("b", "c"), ("c", "a"), ("d", "a"), ("e", "d"), ("a", "e")],
        );
        let prior = rank_full(&before, &params).scores;

        let after = graph(
            &["a", "b", "c", "d", "e"],
            &[
                ("a", "b"),
                ("b", "c"),
                ("c", "a"),
                ("d", "a"),
                ("e", "d"),
                ("a", "e"),
                ("b", "e"),
            ],
        );
        let seeds = [after.position("b").unwrap(), after.position("e").unwrap()];
        let inc = rank_incremental(&after, &params, &prior, &seeds, false);
        let full = rank_full(&after, &params);
        assert!(inc.converged);
        for (x, y) in inc.scores.iter().zip(&full.scores) {
            assert!((x - y).abs() < params.tolerance, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_incremental_without_seeds_is_noop() {
        let params = AuthorityParams::default();
        let g = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let prior = rank_full(&g, &params).scores;
        let r = rank_incremental(&g, &params, &prior, &[], false);
        assert_eq!(r.iterations, 0);
        assert!(r.converged);
    }

    #[tokio::test]
    async fn test_scorer_falls_back_to_full_and_removes_stale() {
        let store = Arc::new(InMemoryStore::new());
        store
            .seed_authority(&AuthorityRecord {
                document_id: "ghost".into(),
                score: 1.0,
                inbound_count: 0,
                outbound_count: 0,
                last_updated: Utc::now(),
            })
            .await
            .unwrap();
        let scorer = AuthorityScorer::new(store.clone(), AuthorityParams::default());
        let report = scorer.recompute(&BTreeSet::new()).await.unwrap();
        assert_eq!(report.mode, RecomputeMode::Full);
        assert_eq!(report.removed, 1);
        assert!(report.warning().is_none());
        assert_eq!(scorer.score("ghost").await.unwrap(), 0.0);
    }
}
