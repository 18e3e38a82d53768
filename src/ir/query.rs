//! Derived views over a [`Code`] document: variable def/use sites, and the
//! mark-then-sweep mutation idiom every pass built on top of this module
//! uses to avoid mutating `code.blocks` while iterating it.

use std::collections::{BTreeMap, BTreeSet};

use super::block::Code;
use super::error::IrError;
use super::operation::is_const_token;

/// `block name -> ordered list of predecessor block names`, built by a
/// literal scan of every `next_block` rather than the deduplicating
/// [`crate::graph::Graph`], so a φ's arity keeps agreeing with this list
/// exactly as built (I2) regardless of any dedup or reordering a general
/// graph abstraction might apply.
pub fn predecessor_lists(code: &Code) -> BTreeMap<String, Vec<String>> {
    let mut preds: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for block in &code.blocks {
        preds.entry(block.name.clone()).or_default();
    }
    for block in &code.blocks {
        for succ in &block.next_block {
            preds.entry(succ.clone()).or_default().push(block.name.clone());
        }
    }
    preds
}

/// Reject a document where some φ's arity disagrees with its block's
/// predecessor count (I2). Every pass that reads φ sources positionally
/// (renaming, CCP, SSA destruction) relies on this holding; call it before
/// trusting `op.srcs[i]` to line up with `predecessor_lists(code)[block][i]`.
pub fn validate_phi_arity(code: &Code) -> Result<(), IrError> {
    let preds = predecessor_lists(code);
    for block in &code.blocks {
        let pred_count = preds.get(&block.name).map(|p| p.len()).unwrap_or(0);
        for (index, op) in block.code.iter().enumerate() {
            if op.is_phi() && op.srcs.len() != pred_count {
                return Err(IrError::MalformedCfg {
                    reason: format!(
                        "phi at `{}`[{}] has {} source(s) but its block has {} predecessor(s)",
                        block.name,
                        index,
                        op.srcs.len(),
                        pred_count
                    ),
                });
            }
        }
    }
    Ok(())
}

/// A statement's location: the owning block's name and its index within it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Site {
    pub block: String,
    pub index: usize,
}

impl Site {
    pub fn new(block: impl Into<String>, index: usize) -> Self {
        Self {
            block: block.into(),
            index,
        }
    }
}

/// Where a variable is defined (if anywhere in the unit) and where it's read.
#[derive(Debug, Clone, Default)]
pub struct VarRecord {
    pub def: Option<Site>,
    pub uses: BTreeSet<Site>,
}

/// All variable def/use information for a document, rebuilt fresh per pass.
#[derive(Debug, Clone, Default)]
pub struct VarMap {
    records: BTreeMap<String, VarRecord>,
}

impl VarMap {
    pub fn build(code: &Code) -> Self {
        let mut records: BTreeMap<String, VarRecord> = BTreeMap::new();
        for block in &code.blocks {
            for (index, op) in block.code.iter().enumerate() {
                if let Some(dest) = &op.dest {
                    records.entry(dest.clone()).or_default().def = Some(Site::new(&block.name, index));
                }
                for src in &op.srcs {
                    if !is_const_token(src) {
                        records
                            .entry(src.clone())
                            .or_default()
                            .uses
                            .insert(Site::new(&block.name, index));
                    }
                }
            }
        }
        Self { records }
    }

    pub fn get(&self, name: &str) -> Option<&VarRecord> {
        self.records.get(name)
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.records.get(name).map(|r| !r.uses.is_empty()).unwrap_or(false)
    }

    pub fn def_site(&self, name: &str) -> Option<&Site> {
        self.records.get(name).and_then(|r| r.def.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(|s| s.as_str())
    }
}

/// Per-statement delete flags, keyed by site, so a pass can mark freely
/// while iterating blocks immutably and sweep in one pass afterward.
#[derive(Debug, Default)]
pub struct DeleteSet {
    marked: BTreeSet<Site>,
}

impl DeleteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, site: Site) {
        self.marked.insert(site);
    }

    pub fn is_marked(&self, site: &Site) -> bool {
        self.marked.contains(site)
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    /// Remove every marked statement from `code`, highest index first within
    /// each block so earlier indices in the same block stay valid.
    pub fn sweep(self, code: &mut Code) {
        let mut by_block: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for site in self.marked {
            by_block.entry(site.block).or_default().push(site.index);
        }
        for (block_name, mut indices) in by_block {
            if let Some(block) = code.block_mut(&block_name) {
                indices.sort_unstable_by(|a, b| b.cmp(a));
                for idx in indices {
                    if idx < block.code.len() {
                        block.code.remove(idx);
                    }
                }
            }
        }
    }
}
