//! # Crosslink
//!
//! Incremental cross-linking and authority scoring for document corpora.
//!
//! The pipeline itself lives in `crosslink-core`; this crate wires it to
//! a filesystem content root and a SQLite database and exposes it as the
//! `xl` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────────────────┐   ┌──────────┐
//! │ Content     │──▶│ crosslink-core Engine  │──▶│  SQLite  │
//! │ root (HTML) │   │ index, link, score     │   │  FTS5    │
//! └─────────────┘   └────────────────────────┘   └────┬─────┘
//!                                                     │
//!                                                     ▼
//!                                                ┌──────────┐
//!                                                │   CLI    │
//!                                                │   (xl)   │
//!                                                └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connector_fs`] | Filesystem content source |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` |
//! | [`ingest`] | Sync pipeline |
//! | [`search`] | Search and candidate queries |
//! | [`links`] | Link graph and score commands |
//! | [`stats`] | Status overview |
//! | [`export`] | JSON export |
//! | [`db`] | Database connection and engine wiring |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod connector_fs;
pub mod db;
pub mod export;
pub mod ingest;
pub mod links;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod sqlite_store;
pub mod stats;
