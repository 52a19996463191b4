//! Export the link graph as JSON.
//!
//! Produces a single document holding index metadata, every link, and
//! every authority score, for site generators that render related-page
//! sections from it.

use anyhow::Result;
use serde::Serialize;
use sqlx::Row;
use std::path::Path;

use crate::config::Config;
use crate::db;

#[derive(Serialize)]
struct ExportData {
    documents: Vec<ExportDocument>,
    links: Vec<ExportLink>,
}

#[derive(Serialize)]
struct ExportDocument {
    id: String,
    title: Option<String>,
    publishable: bool,
    fingerprint: String,
    token_count: i64,
    indexed_at: i64,
    score: Option<f64>,
    inbound: i64,
    outbound: i64,
}

#[derive(Serialize)]
struct ExportLink {
    source: String,
    target: String,
    anchor: String,
    link_type: String,
    created_at: i64,
}

/// Export documents and links as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;

    let doc_rows = sqlx::query(
        "SELECT d.document_id, d.title, d.publishable, d.fingerprint, d.token_count, \
                d.indexed_at, a.score, \
                COALESCE(a.inbound_count, 0) AS inbound, \
                COALESCE(a.outbound_count, 0) AS outbound \
         FROM doc_index d LEFT JOIN authority a ON a.document_id = d.document_id \
         ORDER BY d.document_id",
    )
    .fetch_all(&pool)
    .await?;

    let link_rows = sqlx::query(
        "SELECT source_id, target_id, anchor_text, link_type, created_at \
         FROM links ORDER BY source_id, target_id",
    )
    .fetch_all(&pool)
    .await?;

    let documents: Vec<ExportDocument> = doc_rows
        .iter()
        .map(|row| ExportDocument {
            id: row.get("document_id"),
            title: row.get("title"),
            publishable: row.get::<i64, _>("publishable") != 0,
            fingerprint: row.get("fingerprint"),
            token_count: row.get("token_count"),
            indexed_at: row.get("indexed_at"),
            score: row.get("score"),
            inbound: row.get("inbound"),
            outbound: row.get("outbound"),
        })
        .collect();

    let links: Vec<ExportLink> = link_rows
        .iter()
        .map(|row| ExportLink {
            source: row.get("source_id"),
            target: row.get("target_id"),
            anchor: row.get("anchor_text"),
            link_type: row.get("link_type"),
            created_at: row.get("created_at"),
        })
        .collect();

    let data = ExportData { documents, links };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} documents, {} links to {}",
                data.documents.len(),
                data.links.len(),
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    pool.close().await;
    Ok(())
}
