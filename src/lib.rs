//! # SSA optimizing middle-end
//!
//! A CFG-based intermediate representation with a full SSA pipeline: φ
//! insertion and dominator-tree renaming, sparse conditional constant
//! propagation, simple and aggressive dead-code elimination, and SSA
//! destruction back into conventional form.
//!
//! ## Architecture overview
//!
//! ```text
//! JSON document -> Code -> SSA builder -> CCP -> const-prop -> DCE -> aggressive DCE -> const-prop -> SSA destruction -> Code
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ssa_opt::{Code, Optimizer, OptimizerConfig};
//!
//! let text = std::fs::read_to_string("function.json")?;
//! let code: Code = serde_json::from_str(&text)?;
//!
//! let optimizer = Optimizer::new(OptimizerConfig::default());
//! let (optimised, stats) = optimizer.optimise(code)?;
//! println!("removed {} statements", stats.total_statements_removed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod common;
pub mod error;
pub mod graph;
pub mod ir;
pub mod passes;
pub mod pipeline;
pub mod ssa;

pub use common::OptimizerConfig;
pub use error::{Error, Result};
pub use graph::Graph;
pub use ir::{Block, Code, Operation};
pub use pipeline::{Optimizer, PipelineStatistics, StageStatistics};
pub use ssa::build_ssa;
