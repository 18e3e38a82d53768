//! Optimization passes: each module is one rewrite over [`crate::ir::Code`],
//! runnable standalone (see `cli`) or chained by [`crate::pipeline`].

mod aggressive_dce;
mod ccp;
mod constant_propagation;
mod dce;
mod destruct;

pub use aggressive_dce::aggressive_dead_code_elimination;
pub use ccp::conditional_constant_propagation;
pub use constant_propagation::constant_propagation;
pub use dce::dead_code_elimination;
pub use destruct::ssa_destruction;
