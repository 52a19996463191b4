use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crosslink_core::{AuthorityParams, EngineConfig, LinkingParams};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub linking: LinkingParams,
    #[serde(default)]
    pub authority: AuthorityParams,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Matching documents are indexed but never offered as link targets.
    #[serde(default = "default_draft_globs")]
    pub draft_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.html".to_string(), "**/*.htm".to_string()]
}

fn default_draft_globs() -> Vec<String> {
    vec!["drafts/**".to_string()]
}

impl Config {
    /// Core tuning parameters.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            linking: self.linking.clone(),
            authority: self.authority.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.content.include_globs.is_empty() {
        anyhow::bail!("content.include_globs must not be empty");
    }

    config.engine().validate()?;

    Ok(config)
}
