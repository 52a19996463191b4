//! # Crosslink Core
//!
//! Library side of Crosslink: markup normalization, a fingerprinted
//! full-text index, candidate link discovery, a budgeted link graph, and
//! PageRank-style authority scoring kept current as the graph changes.
//!
//! Persistence and content access are ports ([`store::Store`],
//! [`source::ContentSource`]); [`store::memory::InMemoryStore`] ships here
//! for tests and embedding. The `crosslink` application crate provides the
//! SQLite store, the filesystem source, and the `xl` CLI.
//!
//! ```text
//! raw markup ─▶ normalize ─▶ index ─▶ candidates ─▶ graph ─▶ authority
//! ```

pub mod analyze;
pub mod authority;
pub mod candidates;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod index;
pub mod locks;
pub mod models;
pub mod normalize;
pub mod relevance;
pub mod source;
pub mod status;
pub mod store;

pub use config::{AuthorityParams, EngineConfig, LinkingParams};
pub use engine::{ChangeReport, Engine};
pub use error::{Error, Result};
