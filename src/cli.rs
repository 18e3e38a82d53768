//! Command line interface: §4.9/§6.
//!
//! Grounded on `cli/args.rs` + `cli/runner/mod.rs`'s split (a `Parser`
//! struct plus a `Subcommand` enum, dispatched from one `Cli::run`), pulled
//! into a single module since this crate's command surface is one document
//! transform with a handful of single-pass variants rather than a whole
//! inspection toolkit.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::common::OptimizerConfig;
use crate::error::Result;
use crate::ir::Code;
use crate::passes::{
    aggressive_dead_code_elimination, conditional_constant_propagation, constant_propagation,
    dead_code_elimination, ssa_destruction,
};
use crate::pipeline::Optimizer;
use crate::ssa::build_ssa;

/// Command line interface for the SSA optimizing middle-end.
#[derive(Debug, Parser)]
#[command(author, version, about = "CFG -> SSA -> optimize -> CFG middle-end", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (stackable: -v, -vv, -vvv, ...).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Load an `OptimizerConfig` from this file (TOML/JSON/YAML), layered
    /// over the compiled-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full seven-stage pipeline.
    Optimise {
        /// Input IR document (JSON).
        #[arg(long)]
        input: PathBuf,

        /// Where to write the transformed document.
        #[arg(long)]
        output: PathBuf,

        /// Print per-stage statistics to stderr after running.
        #[arg(long)]
        stats: bool,
    },

    /// Run only SSA construction (phi-insertion + renaming).
    Ssa {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Run only conditional constant propagation.
    Ccp {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Run dead-code elimination.
    Dce {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,

        /// Run the aggressive (CDG-based) variant instead of the simple one.
        #[arg(long)]
        aggressive: bool,
    },

    /// Run only SSA destruction (out-of-SSA copy insertion and coalescing).
    Destruct {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

impl Cli {
    /// Execute the selected subcommand.
    pub fn run(&self) -> Result<()> {
        let config = match &self.config {
            Some(path) => OptimizerConfig::load_from_file(path)?,
            None => OptimizerConfig::default(),
        };

        let pretty = config.output.pretty;
        match &self.command {
            Command::Optimise { input, output, stats } => self.run_optimise(input, output, *stats, config),
            Command::Ssa { input, output } => self.run_single_pass(input, output, pretty, |c| build_ssa(c)),
            Command::Ccp { input, output } => {
                self.run_single_pass(input, output, pretty, |c| conditional_constant_propagation(c))
            }
            Command::Dce { input, output, aggressive } => {
                if *aggressive {
                    self.run_single_pass(input, output, pretty, |c| aggressive_dead_code_elimination(c))
                } else {
                    self.run_single_pass(input, output, pretty, |c| {
                        dead_code_elimination(c);
                        Ok(())
                    })
                }
            }
            Command::Destruct { input, output } => {
                self.run_single_pass(input, output, pretty, |c| ssa_destruction(c))
            }
        }
    }

    fn run_optimise(&self, input: &PathBuf, output: &PathBuf, stats: bool, config: OptimizerConfig) -> Result<()> {
        let pretty = config.output.pretty;
        let code = read_code(input)?;
        let optimizer = Optimizer::new(config);
        let (result, statistics) = optimizer.optimise(code)?;
        write_code(output, &result, pretty)?;

        if stats {
            for stage in &statistics.stages {
                eprintln!(
                    "{:<32} {:>6} -> {:<6} statements, {:>4} -> {:<4} phis, {:>8}us",
                    stage.name,
                    stage.statements_before,
                    stage.statements_after,
                    stage.phis_before,
                    stage.phis_after,
                    stage.elapsed.as_micros()
                );
            }
            eprintln!(
                "total: {} statements removed, {}us",
                statistics.total_statements_removed(),
                statistics.total_elapsed().as_micros()
            );
        }
        Ok(())
    }

    fn run_single_pass(
        &self,
        input: &PathBuf,
        output: &PathBuf,
        pretty: bool,
        pass: impl FnOnce(&mut Code) -> Result<()>,
    ) -> Result<()> {
        let mut code = read_code(input)?;
        pass(&mut code)?;
        write_code(output, &code, pretty)?;
        Ok(())
    }
}

fn read_code(path: &PathBuf) -> Result<Code> {
    info!(path = %path.display(), "reading input document");
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_code(path: &PathBuf, code: &Code, pretty: bool) -> Result<()> {
    info!(path = %path.display(), "writing output document");
    let text = if pretty {
        serde_json::to_string_pretty(code)?
    } else {
        serde_json::to_string(code)?
    };
    fs::write(path, text)?;
    Ok(())
}
