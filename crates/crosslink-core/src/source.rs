//! Content source port.
//!
//! The core only reads from a content source; it never writes back.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::SourceDocument;

/// Supplies raw documents by id.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch a document, `None` if it no longer exists.
    async fn get_document(&self, id: &str) -> Result<Option<SourceDocument>>;

    /// Ids of every document currently in the corpus.
    async fn list_ids(&self) -> Result<Vec<String>>;
}

/// A change notification from the content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Changed(String),
    Deleted(String),
}

impl ChangeEvent {
    pub fn document_id(&self) -> &str {
        match self {
            ChangeEvent::Changed(id) | ChangeEvent::Deleted(id) => id,
        }
    }
}
