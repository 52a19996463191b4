//! Search and candidate queries.
//!
//! `xl search` ranks publishable documents against a free-text query;
//! `xl candidates` shows what a document would link to next. Both print
//! the same BM25 relevance the link selection uses.

use anyhow::Result;

use crosslink_core::store::Store;

use crate::config::Config;
use crate::db;

pub async fn run_search(config: &Config, query: &str, limit: usize) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let hits = engine.indexer().search(query, limit).await?;

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let record = engine.store().get_index_record(&hit.document_id).await?;
        let title = record
            .as_ref()
            .and_then(|r| r.title.as_deref())
            .unwrap_or("(untitled)");
        let score = engine.scorer().score(&hit.document_id).await?;
        println!("{}. [{:.2}] {}", i + 1, hit.relevance, title);
        println!("    id: {}", hit.document_id);
        println!("    authority: {:.6}", score);
        println!();
    }

    pool.close().await;
    Ok(())
}

pub async fn run_candidates(config: &Config, id: &str, limit: Option<usize>) -> Result<()> {
    let (pool, engine) = db::open_engine(config).await?;
    let max = limit.unwrap_or(config.linking.max_candidates);
    let candidates = engine.finder().find_candidates(id, max).await?;

    if candidates.is_empty() {
        println!("No candidates.");
        pool.close().await;
        return Ok(());
    }

    for (i, c) in candidates.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} -> {} ({})",
            i + 1,
            c.relevance,
            c.anchor_text,
            c.target_id,
            c.link_type
        );
    }

    pool.close().await;
    Ok(())
}
