//! Corpus, link graph, and authority overview.
//!
//! Used by `xl status` to confirm that syncs are keeping the index and
//! the link graph in step with the content root.

use anyhow::Result;

use crosslink_core::store::Store;

use crate::config::Config;
use crate::db;

/// Run the status command: gather a snapshot and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let snapshot = engine.status().await?;
    let records = engine.store().authority_records().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Crosslink Status");
    println!("================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Content:     {}", config.content.root.display());
    println!();
    println!("  Documents:   {}", snapshot.documents_known);
    println!(
        "  Indexed:     {} / {} ({:.0}%)",
        snapshot.documents_indexed,
        snapshot.documents_known,
        snapshot.percent_indexed()
    );
    println!("  Publishable: {}", snapshot.documents_publishable);
    println!(
        "  Links:       {} (budget {} per document)",
        snapshot.edges, config.linking.outbound_budget
    );
    println!("  Scored:      {}", snapshot.authority_records);

    let total: f64 = records.iter().map(|r| r.score).sum();
    if let Some(updated) = records.iter().map(|r| r.last_updated).max() {
        println!(
            "  Mass:        {:.6} (target {})",
            total, config.authority.total_mass
        );
        println!("  Last scored: {}", format_ts_relative(updated.timestamp()));
    }
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
