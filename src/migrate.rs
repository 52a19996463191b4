use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // Index table: one row per document, tokens space-joined
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_index (
            document_id TEXT PRIMARY KEY,
            tokens TEXT NOT NULL,
            token_count INTEGER NOT NULL,
            fingerprint TEXT NOT NULL,
            title TEXT,
            publishable INTEGER NOT NULL DEFAULT 1,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Links table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS links (
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            anchor_text TEXT NOT NULL,
            link_type TEXT NOT NULL DEFAULT 'semantic',
            created_at INTEGER NOT NULL,
            PRIMARY KEY (source_id, target_id),
            CHECK (source_id <> target_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Authority table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS authority (
            document_id TEXT PRIMARY KEY,
            score REAL NOT NULL,
            inbound_count INTEGER NOT NULL DEFAULT 0,
            outbound_count INTEGER NOT NULL DEFAULT 0,
            last_updated INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='doc_index_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        // Tokens are already stemmed; keep diacritics so matches stay exact.
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE doc_index_fts USING fts5(
                document_id UNINDEXED,
                tokens,
                tokenize = 'unicode61 remove_diacritics 0'
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_authority_score ON authority(score DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
