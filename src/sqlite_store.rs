//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `doc_index`, `doc_index_fts`,
//! `links`, and `authority` tables. Multi-statement operations run inside
//! a transaction so readers never see them half-applied.
//!
//! Full-text search uses FTS5 only to find documents containing at least
//! one query term; ranking is done with the shared BM25 scorer from
//! `crosslink-core`, so relevance values match the in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crosslink_core::error::{Error, Result};
use crosslink_core::models::{AuthorityRecord, Edge, IndexRecord, LinkType, SearchHit};
use crosslink_core::relevance::{rank_hits, Bm25, TermStatistics};
use crosslink_core::store::{EdgeInsert, GraphSnapshot, Store, StoreCounts};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// FTS5 query matching any of the terms, each quoted as a literal.
fn fts_any(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn index_record(row: &SqliteRow) -> IndexRecord {
    let tokens: String = row.get("tokens");
    IndexRecord {
        document_id: row.get("document_id"),
        tokens: tokens.split_whitespace().map(str::to_string).collect(),
        fingerprint: row.get("fingerprint"),
        title: row.get("title"),
        publishable: row.get("publishable"),
        indexed_at: from_millis(row.get("indexed_at")),
    }
}

fn edge(row: &SqliteRow) -> Edge {
    let link_type: String = row.get("link_type");
    Edge {
        source_id: row.get("source_id"),
        target_id: row.get("target_id"),
        anchor_text: row.get("anchor_text"),
        link_type: link_type.parse().unwrap_or(LinkType::Semantic),
        created_at: from_millis(row.get("created_at")),
    }
}

fn authority(row: &SqliteRow) -> AuthorityRecord {
    AuthorityRecord {
        document_id: row.get("document_id"),
        score: row.get("score"),
        inbound_count: row.get::<i64, _>("inbound_count") as u64,
        outbound_count: row.get::<i64, _>("outbound_count") as u64,
        last_updated: from_millis(row.get("last_updated")),
    }
}

const EDGE_COLUMNS: &str = "source_id, target_id, anchor_text, link_type, created_at";

async fn term_statistics_tx(
    tx: &mut Transaction<'_, Sqlite>,
    terms: &[String],
) -> Result<TermStatistics> {
    let totals = sqlx::query(
        "SELECT COUNT(*) AS n, COALESCE(SUM(token_count), 0) AS total \
         FROM doc_index WHERE publishable = 1",
    )
    .fetch_one(&mut **tx)
    .await
    .map_err(Error::storage)?;

    let documents: i64 = totals.get("n");
    let total: i64 = totals.get("total");
    let mut stats = TermStatistics {
        documents: documents as u64,
        average_length: if documents > 0 {
            total as f64 / documents as f64
        } else {
            0.0
        },
        ..TermStatistics::default()
    };

    for term in terms {
        let df: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM doc_index_fts
            JOIN doc_index d ON d.document_id = doc_index_fts.document_id
            WHERE d.publishable = 1 AND doc_index_fts MATCH ?
            "#,
        )
        .bind(fts_any(std::slice::from_ref(term)))
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::storage)?;
        if df > 0 {
            stats.document_frequency.insert(term.clone(), df as u64);
        }
    }
    Ok(stats)
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_index_record(&self, document_id: &str) -> Result<Option<IndexRecord>> {
        let row = sqlx::query("SELECT * FROM doc_index WHERE document_id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::storage)?;
        Ok(row.as_ref().map(index_record))
    }

    async fn write_index_record(
        &self,
        record: &IndexRecord,
        expected_fingerprint: Option<&str>,
    ) -> Result<()> {
        let tokens = record.tokens.join(" ");
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;

        let written = match expected_fingerprint {
            None => sqlx::query(
                r#"
                INSERT INTO doc_index (document_id, tokens, token_count, fingerprint,
                                       title, publishable, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(document_id) DO NOTHING
                "#,
            )
            .bind(&record.document_id)
            .bind(&tokens)
            .bind(record.tokens.len() as i64)
            .bind(&record.fingerprint)
            .bind(&record.title)
            .bind(record.publishable)
            .bind(to_millis(&record.indexed_at))
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?,
            Some(expected) => sqlx::query(
                r#"
                UPDATE doc_index
                SET tokens = ?, token_count = ?, fingerprint = ?, title = ?,
                    publishable = ?, indexed_at = ?
                WHERE document_id = ? AND fingerprint = ?
                "#,
            )
            .bind(&tokens)
            .bind(record.tokens.len() as i64)
            .bind(&record.fingerprint)
            .bind(&record.title)
            .bind(record.publishable)
            .bind(to_millis(&record.indexed_at))
            .bind(&record.document_id)
            .bind(expected)
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?,
        };

        if written.rows_affected() == 0 {
            tx.rollback().await.map_err(Error::storage)?;
            return Err(Error::IndexWriteConflict {
                document_id: record.document_id.clone(),
            });
        }

        sqlx::query("DELETE FROM doc_index_fts WHERE document_id = ?")
            .bind(&record.document_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?;
        sqlx::query("INSERT INTO doc_index_fts (document_id, tokens) VALUES (?, ?)")
            .bind(&record.document_id)
            .bind(&tokens)
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?;

        tx.commit().await.map_err(Error::storage)?;
        Ok(())
    }

    async fn update_index_metadata(
        &self,
        document_id: &str,
        title: Option<&str>,
        publishable: bool,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE doc_index SET title = ?, publishable = ? WHERE document_id = ?")
                .bind(title)
                .bind(publishable)
                .bind(document_id)
                .execute(&self.pool)
                .await
                .map_err(Error::storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_index_record(&self, document_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        sqlx::query("DELETE FROM doc_index_fts WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?;
        let result = sqlx::query("DELETE FROM doc_index WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?;
        tx.commit().await.map_err(Error::storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_indexed_ids(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT document_id FROM doc_index ORDER BY document_id")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::storage)
    }

    async fn term_statistics(&self, terms: &[String]) -> Result<TermStatistics> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        let stats = term_statistics_tx(&mut tx, terms).await?;
        tx.commit().await.map_err(Error::storage)?;
        Ok(stats)
    }

    async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<SearchHit>> {
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        let stats = term_statistics_tx(&mut tx, terms).await?;
        let rows = sqlx::query(
            r#"
            SELECT d.document_id, d.tokens FROM doc_index d
            WHERE d.publishable = 1 AND d.document_id IN (
                SELECT document_id FROM doc_index_fts WHERE doc_index_fts MATCH ?
            )
            "#,
        )
        .bind(fts_any(terms))
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::storage)?;
        tx.commit().await.map_err(Error::storage)?;

        let bm25 = Bm25::default();
        let hits: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| {
                let tokens: String = row.get("tokens");
                let tokens: Vec<String> = tokens.split_whitespace().map(str::to_string).collect();
                let relevance = bm25.score(&tokens, terms, &stats);
                (relevance > 0.0).then(|| SearchHit {
                    document_id: row.get("document_id"),
                    relevance,
                })
            })
            .collect();
        Ok(rank_hits(hits, limit))
    }

    async fn insert_edge(&self, edge: &Edge, budget: usize) -> Result<EdgeInsert> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;

        // Duplicate and budget checks live in the same statement as the insert.
        let inserted = sqlx::query(
            r#"
            INSERT INTO links (source_id, target_id, anchor_text, link_type, created_at)
            SELECT ?, ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM links WHERE source_id = ? AND target_id = ?)
              AND (SELECT COUNT(*) FROM links WHERE source_id = ?) < ?
            "#,
        )
        .bind(&edge.source_id)
        .bind(&edge.target_id)
        .bind(&edge.anchor_text)
        .bind(edge.link_type.as_str())
        .bind(to_millis(&edge.created_at))
        .bind(&edge.source_id)
        .bind(&edge.target_id)
        .bind(&edge.source_id)
        .bind(budget as i64)
        .execute(&mut *tx)
        .await
        .map_err(Error::storage)?;

        let outcome = if inserted.rows_affected() > 0 {
            EdgeInsert::Inserted
        } else {
            let exists: bool = sqlx::query_scalar(
                "SELECT COUNT(*) > 0 FROM links WHERE source_id = ? AND target_id = ?",
            )
            .bind(&edge.source_id)
            .bind(&edge.target_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::storage)?;
            if exists {
                EdgeInsert::Duplicate
            } else {
                EdgeInsert::BudgetExceeded
            }
        };

        tx.commit().await.map_err(Error::storage)?;
        Ok(outcome)
    }

    async fn delete_edge(&self, source_id: &str, target_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM links WHERE source_id = ? AND target_id = ?")
            .bind(source_id)
            .bind(target_id)
            .execute(&self.pool)
            .await
            .map_err(Error::storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_edges_touching(&self, document_id: &str) -> Result<Vec<Edge>> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        let rows = sqlx::query(&format!(
            "SELECT {} FROM links WHERE source_id = ? OR target_id = ? \
             ORDER BY source_id, target_id",
            EDGE_COLUMNS
        ))
        .bind(document_id)
        .bind(document_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::storage)?;
        sqlx::query("DELETE FROM links WHERE source_id = ? OR target_id = ?")
            .bind(document_id)
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?;
        tx.commit().await.map_err(Error::storage)?;
        Ok(rows.iter().map(edge).collect())
    }

    async fn outbound_edges(&self, source_id: &str) -> Result<Vec<Edge>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM links WHERE source_id = ? ORDER BY target_id",
            EDGE_COLUMNS
        ))
        .bind(source_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::storage)?;
        Ok(rows.iter().map(edge).collect())
    }

    async fn inbound_edges(&self, target_id: &str) -> Result<Vec<Edge>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM links WHERE target_id = ? ORDER BY source_id",
            EDGE_COLUMNS
        ))
        .bind(target_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::storage)?;
        Ok(rows.iter().map(edge).collect())
    }

    async fn graph_snapshot(&self) -> Result<GraphSnapshot> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        let nodes: Vec<String> = sqlx::query_scalar("SELECT document_id FROM doc_index")
            .fetch_all(&mut *tx)
            .await
            .map_err(Error::storage)?;
        let edges: Vec<(String, String)> =
            sqlx::query_as("SELECT source_id, target_id FROM links ORDER BY source_id, target_id")
                .fetch_all(&mut *tx)
                .await
                .map_err(Error::storage)?;
        tx.commit().await.map_err(Error::storage)?;
        Ok(GraphSnapshot::new(nodes, edges))
    }

    async fn get_authority(&self, document_id: &str) -> Result<Option<AuthorityRecord>> {
        let row = sqlx::query("SELECT * FROM authority WHERE document_id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::storage)?;
        Ok(row.as_ref().map(authority))
    }

    async fn authority_records(&self) -> Result<Vec<AuthorityRecord>> {
        let rows = sqlx::query("SELECT * FROM authority ORDER BY document_id")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::storage)?;
        Ok(rows.iter().map(authority).collect())
    }

    async fn seed_authority(&self, record: &AuthorityRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO authority (document_id, score, inbound_count, outbound_count, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(document_id) DO NOTHING
            "#,
        )
        .bind(&record.document_id)
        .bind(record.score)
        .bind(record.inbound_count as i64)
        .bind(record.outbound_count as i64)
        .bind(to_millis(&record.last_updated))
        .execute(&self.pool)
        .await
        .map_err(Error::storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn write_authority(
        &self,
        records: &[AuthorityRecord],
        removals: &[String],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        for id in removals {
            sqlx::query("DELETE FROM authority WHERE document_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(Error::storage)?;
        }
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO authority (document_id, score, inbound_count, outbound_count, last_updated)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(document_id) DO UPDATE SET
                    score = excluded.score,
                    inbound_count = excluded.inbound_count,
                    outbound_count = excluded.outbound_count,
                    last_updated = excluded.last_updated
                "#,
            )
            .bind(&record.document_id)
            .bind(record.score)
            .bind(record.inbound_count as i64)
            .bind(record.outbound_count as i64)
            .bind(to_millis(&record.last_updated))
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?;
        }
        tx.commit().await.map_err(Error::storage)?;
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM doc_index) AS indexed,
                (SELECT COUNT(*) FROM doc_index WHERE publishable = 1) AS publishable,
                (SELECT COUNT(*) FROM links) AS edges,
                (SELECT COUNT(*) FROM authority) AS authority_records
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::storage)?;
        Ok(StoreCounts {
            indexed: row.get::<i64, _>("indexed") as u64,
            publishable: row.get::<i64, _>("publishable") as u64,
            edges: row.get::<i64, _>("edges") as u64,
            authority_records: row.get::<i64, _>("authority_records") as u64,
        })
    }
}
