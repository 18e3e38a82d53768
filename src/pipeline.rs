//! The `optimise` facade: §4.9. Runs the seven-stage pipeline from §6 over a
//! [`Code`] document and reports what each stage did.
//!
//! Grounded on a decompiler engine's `analyze()` entry point, which wraps a
//! fixed sequence of analysis phases in spans and returns an
//! `AnalysisStatistics` alongside the transformed artifact; here the phases
//! are the SSA pipeline's stages instead of per-decompiler-phase passes.

use std::time::{Duration, Instant};

use tracing::info_span;

use crate::common::OptimizerConfig;
use crate::error::Result;
use crate::ir::Code;
use crate::passes::{
    aggressive_dead_code_elimination, conditional_constant_propagation, constant_propagation,
    dead_code_elimination, ssa_destruction,
};
use crate::ssa::build_ssa;

/// What one pipeline stage did to the document.
#[derive(Debug, Clone, Default)]
pub struct StageStatistics {
    pub name: String,
    pub elapsed: Duration,
    pub statements_before: usize,
    pub statements_after: usize,
    pub phis_before: usize,
    pub phis_after: usize,
}

impl StageStatistics {
    /// Statements removed by this stage (negative if it grew the document).
    pub fn statements_removed(&self) -> i64 {
        self.statements_before as i64 - self.statements_after as i64
    }

    /// φs coalesced away by this stage (negative if it inserted φs).
    pub fn phis_removed(&self) -> i64 {
        self.phis_before as i64 - self.phis_after as i64
    }
}

/// Per-pass statistics for one `optimise` run, in pipeline order.
#[derive(Debug, Clone, Default)]
pub struct PipelineStatistics {
    pub stages: Vec<StageStatistics>,
}

impl PipelineStatistics {
    pub fn total_elapsed(&self) -> Duration {
        self.stages.iter().map(|s| s.elapsed).sum()
    }

    pub fn total_statements_removed(&self) -> i64 {
        self.stages.iter().map(|s| s.statements_removed()).sum()
    }
}

fn statement_count(code: &Code) -> usize {
    code.blocks.iter().map(|b| b.code.len()).sum()
}

fn phi_count(code: &Code) -> usize {
    code.blocks.iter().flat_map(|b| &b.code).filter(|op| op.is_phi()).count()
}

/// The `OptimizerConfig`-driven facade over the whole pass pipeline. Holds
/// no mutable state between calls, so one instance serves any number of
/// documents concurrently.
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Run SSA construction, CCP, constant propagation, simple DCE,
    /// aggressive DCE, constant propagation again, and SSA destruction, in
    /// that order, skipping any stage disabled in `self.config.passes`.
    pub fn optimise(&self, mut code: Code) -> Result<(Code, PipelineStatistics)> {
        let mut stats = PipelineStatistics::default();

        self.run_stage(&mut code, &mut stats, "ssa_construction", |c| build_ssa(c))?;

        if self.config.passes.enable_ccp {
            self.run_stage(&mut code, &mut stats, "conditional_constant_propagation", |c| {
                conditional_constant_propagation(c)
            })?;
        }
        if self.config.passes.enable_constant_propagation {
            self.run_stage(&mut code, &mut stats, "constant_propagation", |c| {
                constant_propagation(c);
                Ok(())
            })?;
        }
        if self.config.passes.enable_simple_dce {
            self.run_stage(&mut code, &mut stats, "dead_code_elimination", |c| {
                dead_code_elimination(c);
                Ok(())
            })?;
        }
        if self.config.passes.enable_aggressive_dce {
            self.run_stage(&mut code, &mut stats, "aggressive_dead_code_elimination", |c| {
                aggressive_dead_code_elimination(c)
            })?;
        }
        if self.config.passes.enable_constant_propagation {
            self.run_stage(&mut code, &mut stats, "constant_propagation_post_dce", |c| {
                constant_propagation(c);
                Ok(())
            })?;
        }
        if self.config.passes.enable_destruct {
            self.run_stage(&mut code, &mut stats, "ssa_destruction", |c| ssa_destruction(c))?;
        }

        Ok((code, stats))
    }

    fn run_stage(
        &self,
        code: &mut Code,
        stats: &mut PipelineStatistics,
        name: &str,
        stage: impl FnOnce(&mut Code) -> Result<()>,
    ) -> Result<()> {
        let span = info_span!("pass", name, blocks = code.blocks.len());
        let _enter = span.enter();

        let statements_before = statement_count(code);
        let phis_before = phi_count(code);
        tracing::info!(statements = statements_before, phis = phis_before, "stage entry");

        let start = Instant::now();
        stage(code)?;
        let elapsed = start.elapsed();

        let statements_after = statement_count(code);
        let phis_after = phi_count(code);
        tracing::info!(
            statements = statements_after,
            phis = phis_after,
            elapsed_us = elapsed.as_micros() as u64,
            "stage exit"
        );

        stats.stages.push(StageStatistics {
            name: name.to_string(),
            elapsed,
            statements_before,
            statements_after,
            phis_before,
            phis_after,
        });
        Ok(())
    }
}
