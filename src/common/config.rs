//! Configuration for the optimization pipeline.
//!
//! One sub-struct per pass family, each with its own `Default`, loaded from an
//! optional config file and layered over those defaults — the same split a
//! decompiler's `AnalysisConfig`/`OutputConfig` pair makes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// Top-level optimizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OptimizerConfig {
    pub graph: GraphConfig,
    pub ssa: SsaConfig,
    pub passes: PassesConfig,
    pub output: OutputConfig,
}

impl OptimizerConfig {
    /// Load a config file (TOML/JSON/YAML, inferred from extension) layered
    /// over the struct defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| ConfigError::Load {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
        source
            .try_deserialize()
            .map_err(|e| ConfigError::Load {
                path: path.to_string_lossy().to_string(),
                source: e,
            })
    }
}

/// Limits on the graph engine's fixed-point computations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Upper bound on dominator fixed-point iterations before giving up.
    /// The naive algorithm always converges in at most `node_count`
    /// iterations, so this is a generous safety margin, not a tuning knob.
    pub max_dominator_iterations: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_dominator_iterations: 10_000,
        }
    }
}

/// Limits on SSA construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsaConfig {
    /// Upper bound on distinct versions minted for a single variable name,
    /// guarding against runaway renaming on malformed input.
    pub max_versions_per_variable: usize,
}

impl Default for SsaConfig {
    fn default() -> Self {
        Self {
            max_versions_per_variable: 100_000,
        }
    }
}

/// Which stages of the pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassesConfig {
    pub enable_ccp: bool,
    pub enable_constant_propagation: bool,
    pub enable_simple_dce: bool,
    pub enable_aggressive_dce: bool,
    pub enable_destruct: bool,
}

impl Default for PassesConfig {
    fn default() -> Self {
        Self {
            enable_ccp: true,
            enable_constant_propagation: true,
            enable_simple_dce: true,
            enable_aggressive_dce: true,
            enable_destruct: true,
        }
    }
}

/// Output document formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print the emitted JSON document.
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}
