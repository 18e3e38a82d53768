//! `Block` and `Code`: the document the pipeline reads and rewrites.

use serde::{Deserialize, Serialize};

use super::operation::Operation;

/// A named basic block: a straight-line statement list plus its successors.
///
/// A two-successor block lists them as `(taken, fall-through)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub code: Vec<Operation>,
    #[serde(default)]
    pub next_block: Vec<String>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: Vec::new(),
            next_block: Vec::new(),
        }
    }
}

/// The whole document: an ordered block list plus an optional entry marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Code {
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub starting_block: Option<String>,
}

impl Code {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            starting_block: None,
        }
    }

    /// The entry block's name: `starting_block` if set, else the first block.
    pub fn entry_name(&self) -> Option<&str> {
        self.starting_block
            .as_deref()
            .or_else(|| self.blocks.first().map(|b| b.name.as_str()))
    }

    pub fn block_index(&self, name: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.name == name)
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.name == name)
    }

    /// Remove blocks by name, preserving the relative order of the rest.
    pub fn remove_blocks(&mut self, names: &std::collections::BTreeSet<String>) {
        self.blocks.retain(|b| !names.contains(&b.name));
    }
}
