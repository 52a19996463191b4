//! Sync pipeline orchestration.
//!
//! Brings the store in line with the content source in four passes:
//! index every listed document, delete indexed documents the source no
//! longer lists, re-evaluate links for documents whose content changed,
//! then recompute authority. Indexing finishes before linking starts so
//! that early documents can link to later ones.

use anyhow::Result;
use std::collections::HashSet;
use tracing::warn;

use crosslink_core::authority::RecomputeReport;
use crosslink_core::index::IndexOutcome;
use crosslink_core::source::ContentSource;
use crosslink_core::store::Store;
use crosslink_core::Engine;

use crate::config::Config;
use crate::db;
use crate::progress::{ProgressMode, SyncPhase, SyncProgressEvent, SyncProgressReporter};

/// Counters from one sync.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub scanned: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub metadata_updated: u64,
    pub removed: u64,
    pub relinked: u64,
    pub edges_added: u64,
    pub edges_removed: u64,
    pub rejected: u64,
    pub warnings: u64,
    pub recompute: Option<RecomputeReport>,
}

/// Run a sync against any engine.
///
/// With `full`, every document is relinked and authority is recomputed
/// from scratch; otherwise only changed documents are relinked and the
/// recomputation is incremental where possible.
pub async fn sync<S: Store, C: ContentSource>(
    engine: &Engine<S, C>,
    full: bool,
    progress: &dyn SyncProgressReporter,
) -> Result<SyncSummary> {
    let mut summary = SyncSummary::default();

    let ids = engine.source().list_ids().await?;
    let total = ids.len() as u64;
    summary.scanned = total;

    let mut changed = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let report = engine.ingest(id).await?;
        for warning in &report.warnings {
            warn!(document_id = %id, %warning, "ingest warning");
        }
        summary.warnings += report.warnings.len() as u64;
        match report.outcome {
            Some(IndexOutcome::Created) => summary.created += 1,
            Some(IndexOutcome::Updated) => summary.updated += 1,
            Some(IndexOutcome::MetadataUpdated) => summary.metadata_updated += 1,
            Some(IndexOutcome::Unchanged) => summary.unchanged += 1,
            None => {}
        }
        if report.outcome.is_some_and(|o| o != IndexOutcome::Unchanged) {
            changed.push(id.clone());
        }
        progress.report(SyncProgressEvent::Progress {
            phase: SyncPhase::Indexing,
            n: i as u64 + 1,
            total,
        });
    }

    let listed: HashSet<&String> = ids.iter().collect();
    for id in engine.store().list_indexed_ids().await? {
        if !listed.contains(&id) {
            let report = engine.document_deleted(&id).await?;
            if report.removed {
                summary.removed += 1;
            }
        }
    }

    let relink = if full { ids.clone() } else { changed };
    let relink_total = relink.len() as u64;
    for (i, id) in relink.iter().enumerate() {
        let report = engine.relink(id).await?;
        summary.relinked += 1;
        summary.edges_added += report.commit.accepted.len() as u64;
        summary.edges_removed += report.removed.len() as u64;
        summary.rejected += report.commit.rejected.len() as u64;
        progress.report(SyncProgressEvent::Progress {
            phase: SyncPhase::Linking,
            n: i as u64 + 1,
            total: relink_total,
        });
    }

    progress.report(SyncProgressEvent::Scoring { documents: total });
    summary.recompute = Some(engine.recompute(full).await?);

    Ok(summary)
}

/// `xl sync`: sync the configured content root into the database.
pub async fn run_sync(config: &Config, full: bool, mode: ProgressMode) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let reporter = mode.reporter();
    reporter.report(SyncProgressEvent::Discovering {
        root: config.content.root.display().to_string(),
    });

    let summary = sync(&engine, full, reporter.as_ref()).await?;

    println!("sync {}", config.content.root.display());
    println!("  scanned: {} documents", summary.scanned);
    println!(
        "  indexed: {} created, {} updated, {} metadata, {} unchanged",
        summary.created, summary.updated, summary.metadata_updated, summary.unchanged
    );
    println!("  removed: {}", summary.removed);
    println!(
        "  relinked: {} (edges added {}, removed {}, rejected {})",
        summary.relinked, summary.edges_added, summary.edges_removed, summary.rejected
    );
    if summary.warnings > 0 {
        println!("  warnings: {}", summary.warnings);
    }
    if let Some(report) = &summary.recompute {
        println!(
            "  authority: {} over {} documents, {} iterations{}",
            report.mode.as_str(),
            report.nodes,
            report.iterations,
            if report.converged { "" } else { " (not converged)" }
        );
    }
    println!("ok");

    pool.close().await;
    Ok(())
}
