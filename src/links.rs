//! Link graph and score commands.
//!
//! Read-only views (`xl links`, `xl scores`) and the mutating commands
//! that act on a single document (`xl link`, `xl changed`, `xl deleted`).
//! Mutations recompute authority before returning, so the stored scores
//! are always current when the process exits.

use anyhow::{bail, Result};
use tracing::warn;

use crosslink_core::models::LinkType;
use crosslink_core::store::Store;
use crosslink_core::ChangeReport;

use crate::config::Config;
use crate::db::{self, AppEngine};

pub async fn run_links(config: &Config, id: &str) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let store = engine.store();
    if store.get_index_record(id).await?.is_none() {
        pool.close().await;
        bail!("document not indexed: {}", id);
    }
    let outbound = store.outbound_edges(id).await?;
    let inbound = store.inbound_edges(id).await?;

    println!("--- Outbound ({}/{}) ---", outbound.len(), config.linking.outbound_budget);
    for e in &outbound {
        println!("  -> {}  \"{}\"  [{}]", e.target_id, e.anchor_text, e.link_type);
    }
    println!();
    println!("--- Inbound ({}) ---", inbound.len());
    for e in &inbound {
        println!("  <- {}  \"{}\"  [{}]", e.source_id, e.anchor_text, e.link_type);
    }

    pool.close().await;
    Ok(())
}

pub async fn run_link(
    config: &Config,
    source: &str,
    target: &str,
    anchor: Option<&str>,
    link_type: LinkType,
) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let report = engine.add_link(source, target, anchor, link_type).await?;

    if let Some(rejected) = report.rejected.into_iter().next() {
        pool.close().await;
        bail!("{}", rejected.into_error(source));
    }
    engine.recompute(false).await?;

    for e in &report.accepted {
        println!("linked {} -> {} \"{}\" [{}]", e.source_id, e.target_id, e.anchor_text, e.link_type);
    }
    pool.close().await;
    Ok(())
}

pub async fn run_changed(config: &Config, id: &str) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let report = engine.document_changed(id).await?;
    print_change(&engine, &report).await?;
    pool.close().await;
    Ok(())
}

pub async fn run_deleted(config: &Config, id: &str) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let report = engine.document_deleted(id).await?;
    print_change(&engine, &report).await?;
    pool.close().await;
    Ok(())
}

async fn print_change(engine: &AppEngine, report: &ChangeReport) -> Result<()> {
    for warning in &report.warnings {
        warn!(document_id = %report.document_id, %warning, "change warning");
    }
    let recompute = engine.recompute(false).await?;

    match report.outcome {
        Some(outcome) => println!("{}: {:?}", report.document_id, outcome),
        None if report.removed => println!("{}: removed", report.document_id),
        None => println!("{}: not indexed", report.document_id),
    }
    if let Some(reconcile) = &report.reconcile {
        println!(
            "  links: +{} -{} ({} rejected)",
            reconcile.commit.accepted.len(),
            reconcile.removed.len(),
            reconcile.commit.rejected.len()
        );
    }
    println!(
        "  authority: {} ({} updated)",
        recompute.mode.as_str(),
        recompute.updated
    );
    Ok(())
}

pub async fn run_scores(config: &Config, limit: usize) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let mut records = engine.store().authority_records().await?;
    records.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.document_id.cmp(&b.document_id))
    });
    records.truncate(limit);

    if records.is_empty() {
        println!("No scores.");
    }
    println!("  {:<40} {:>10} {:>4} {:>4}", "DOCUMENT", "SCORE", "IN", "OUT");
    for r in &records {
        println!(
            "  {:<40} {:>10.6} {:>4} {:>4}",
            r.document_id, r.score, r.inbound_count, r.outbound_count
        );
    }

    pool.close().await;
    Ok(())
}

pub async fn run_recompute(config: &Config, full: bool) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let report = engine.recompute(full).await?;
    println!("recompute {}", report.mode.as_str());
    println!("  documents: {}", report.nodes);
    println!("  iterations: {}", report.iterations);
    println!("  converged: {}", report.converged);
    println!("  updated: {}", report.updated);
    println!("  removed: {}", report.removed);
    if let Some(warning) = report.warning() {
        eprintln!("warning: {}", warning);
    }
    pool.close().await;
    Ok(())
}
