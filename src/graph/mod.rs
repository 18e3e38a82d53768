//! The graph engine: a directed graph with dominance-theory queries and the
//! control-dependence graph built on top of them.

mod cdg;
mod core;
mod dominance;

pub use core::{Graph, GraphError, NodeId};

use crate::error::Result;
use crate::ir::Code;

impl Graph {
    /// Build the CFG of a document: one node per block, one edge per
    /// `next_block` entry, rooted at the entry block.
    pub fn from_code(code: &Code) -> Result<Graph> {
        let mut g = Graph::new();
        for block in &code.blocks {
            g.add_node(&block.name);
        }
        for block in &code.blocks {
            for succ in &block.next_block {
                g.add_edge(&block.name, succ)?;
            }
        }
        if let Some(entry) = code.entry_name() {
            g.set_root(entry)?;
        }
        Ok(g)
    }
}
