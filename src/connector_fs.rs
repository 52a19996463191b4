//! Filesystem content source.
//!
//! Walks `content.root`, keeping files that match `include_globs` and none
//! of the exclude patterns. A document's id is its path relative to the
//! root with `/` separators. Files matching `draft_globs` are indexed but
//! not publishable. Titles come from the markup itself.

use anyhow::{bail, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crosslink_core::error::Error;
use crosslink_core::models::SourceDocument;
use crosslink_core::source::ContentSource;

use crate::config::ContentConfig;

pub struct FsContentSource {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    drafts: GlobSet,
    follow_symlinks: bool,
}

impl FsContentSource {
    pub fn from_config(config: &ContentConfig) -> Result<Self> {
        let mut default_excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        default_excludes.extend(config.exclude_globs.clone());

        Ok(Self {
            root: config.root.clone(),
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&default_excludes)?,
            drafts: build_globset(&config.draft_globs)?,
            follow_symlinks: config.follow_symlinks,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ids of all matching files, sorted.
    pub fn scan(&self) -> crosslink_core::Result<Vec<String>> {
        if !self.root.exists() {
            return Err(Error::storage(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("content root does not exist: {}", self.root.display()),
            )));
        }

        let mut ids = Vec::new();
        let walker = WalkDir::new(&self.root).follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = entry.map_err(Error::storage)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let id = relative.to_string_lossy().replace('\\', "/");
            if self.accepts(&id) {
                ids.push(id);
            }
        }

        // Sort for deterministic ordering
        ids.sort();
        Ok(ids)
    }

    fn accepts(&self, id: &str) -> bool {
        !self.exclude.is_match(id) && self.include.is_match(id)
    }

    /// Map an id back to a path under the root, refusing anything that
    /// could escape it.
    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        (safe && self.accepts(id)).then(|| self.root.join(relative))
    }
}

#[async_trait]
impl ContentSource for FsContentSource {
    async fn get_document(&self, id: &str) -> crosslink_core::Result<Option<SourceDocument>> {
        let Some(path) = self.resolve(id) else {
            return Ok(None);
        };
        let raw_markup = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage(e)),
        };
        Ok(Some(SourceDocument {
            id: id.to_string(),
            raw_markup,
            title: None,
            publishable: !self.drafts.is_match(id),
        }))
    }

    async fn list_ids(&self) -> crosslink_core::Result<Vec<String>> {
        self.scan()
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => bail!("invalid glob '{}': {}", pattern, e),
        }
    }
    Ok(builder.build()?)
}
