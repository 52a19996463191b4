//! Tuning parameters for linking and authority scoring.
//!
//! The application maps its TOML configuration onto these types; every
//! value is checked by [`EngineConfig::validate`] before use.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::LinkType;

/// Candidate discovery and link budget parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkingParams {
    /// Maximum candidates returned per document.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Maximum outbound edges per source document.
    #[serde(default = "default_outbound_budget")]
    pub outbound_budget: usize,
    /// Hits scoring below this BM25 relevance are never proposed.
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
    /// Number of a document's own terms used as its query.
    #[serde(default = "default_salient_terms")]
    pub salient_terms: usize,
    /// Link type given to discovered candidates.
    #[serde(default)]
    pub default_link_type: LinkType,
}

fn default_max_candidates() -> usize {
    10
}
fn default_outbound_budget() -> usize {
    5
}
fn default_min_relevance() -> f64 {
    1.0
}
fn default_salient_terms() -> usize {
    12
}

impl Default for LinkingParams {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            outbound_budget: default_outbound_budget(),
            min_relevance: default_min_relevance(),
            salient_terms: default_salient_terms(),
            default_link_type: LinkType::default(),
        }
    }
}

/// Authority propagation parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityParams {
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Iteration stops once no score moves by more than this.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Sum of all scores after every recomputation.
    #[serde(default = "default_total_mass")]
    pub total_mass: f64,
    /// Allow frontier-restricted recomputation from stored scores.
    #[serde(default = "default_incremental")]
    pub incremental: bool,
}

fn default_damping() -> f64 {
    0.85
}
fn default_tolerance() -> f64 {
    1e-10
}
fn default_max_iterations() -> usize {
    200
}
fn default_total_mass() -> f64 {
    1.0
}
fn default_incremental() -> bool {
    true
}

impl Default for AuthorityParams {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            total_mass: default_total_mass(),
            incremental: default_incremental(),
        }
    }
}

/// All core parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub linking: LinkingParams,
    #[serde(default)]
    pub authority: AuthorityParams,
}

impl EngineConfig {
    /// Reject out-of-range parameters.
    pub fn validate(&self) -> Result<()> {
        let l = &self.linking;
        if l.max_candidates == 0 {
            return Err(invalid("linking.max_candidates must be >= 1"));
        }
        if l.outbound_budget == 0 {
            return Err(invalid("linking.outbound_budget must be >= 1"));
        }
        if l.salient_terms == 0 {
            return Err(invalid("linking.salient_terms must be >= 1"));
        }
        if !(l.min_relevance >= 0.0) {
            return Err(invalid("linking.min_relevance must be >= 0"));
        }

        let a = &self.authority;
        if !(a.damping > 0.0 && a.damping < 1.0) {
            return Err(invalid("authority.damping must be in (0, 1)"));
        }
        if !(a.tolerance > 0.0) {
            return Err(invalid("authority.tolerance must be > 0"));
        }
        if a.max_iterations == 0 {
            return Err(invalid("authority.max_iterations must be >= 1"));
        }
        if !(a.total_mass > 0.0 && a.total_mass.is_finite()) {
            return Err(invalid("authority.total_mass must be a positive number"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> Error {
    Error::InvalidConfig(msg.to_string())
}
