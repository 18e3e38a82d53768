//! Simple (non-conditional) constant and copy propagation: §4.4.
//!
//! Grounded on `original_source/src/constant_propagation.py`, reshaped into
//! a worklist-to-fixed-point loop over the IR rather than a single flat
//! `while worklist:` queue, since a removed `MOV` shifts every later index
//! in its block and a site-keyed worklist would go stale across removals.
//! Each outer round re-discovers a fresh worklist of sites; the pass
//! terminates once a round folds, canonicalizes, or propagates nothing.

use crate::ir::{const_literal, Code, Operation};

/// Fold constant binary ops, canonicalize same-source φs to a `MOV`, and
/// propagate single-source copies until nothing changes.
pub fn constant_propagation(code: &mut Code) {
    loop {
        let mut changed = false;
        changed |= canonicalize_and_fold(code);
        changed |= propagate_one_copy(code);
        if !changed {
            break;
        }
    }
}

/// In place: φs whose sources are all the same value become a `MOV`;
/// foldable binary ops with two constant sources become a `MOV` of the
/// folded result. Neither step changes a block's statement count, so it's
/// safe to run directly over `iter_mut()`.
fn canonicalize_and_fold(code: &mut Code) -> bool {
    let mut changed = false;
    for block in code.blocks.iter_mut() {
        for stmt in block.code.iter_mut() {
            if stmt.is_phi() {
                if let Some(dest) = stmt.dest.clone() {
                    if let Some(val) = constant_phi_value(stmt) {
                        *stmt = Operation::mov(dest, val);
                        changed = true;
                        continue;
                    }
                }
            }
            if let Some(fold) = stmt.fold_op() {
                if let [a, b] = stmt.srcs.as_slice() {
                    if let Ok(folded) = fold.try_eval(a, b) {
                        let dest = stmt.dest.clone().expect("foldable op always has a dest");
                        *stmt = Operation::mov(dest, const_literal(folded));
                        changed = true;
                    }
                }
            }
        }
    }
    changed
}

/// A φ's sources are "constant" in the copy-propagation sense when they're
/// all syntactically the same token (the spec's "one value v"), not when
/// that token happens to be a `#`-literal.
fn constant_phi_value(phi: &Operation) -> Option<String> {
    let (first, rest) = phi.srcs.split_first()?;
    if rest.iter().all(|s| s == first) {
        Some(first.clone())
    } else {
        None
    }
}

/// Find one single-source `MOV dest, val`, delete it, and substitute `val`
/// for every other occurrence of `dest` in the document. Returns whether a
/// copy was propagated.
fn propagate_one_copy(code: &mut Code) -> bool {
    let mut found = None;
    'search: for (block_idx, block) in code.blocks.iter().enumerate() {
        for (stmt_idx, stmt) in block.code.iter().enumerate() {
            if stmt.is_mov() && stmt.srcs.len() == 1 {
                found = Some((block_idx, stmt_idx, stmt.dest.clone().unwrap(), stmt.srcs[0].clone()));
                break 'search;
            }
        }
    }
    let Some((block_idx, stmt_idx, dest, val)) = found else {
        return false;
    };
    code.blocks[block_idx].code.remove(stmt_idx);
    for block in code.blocks.iter_mut() {
        for stmt in block.code.iter_mut() {
            for field in stmt.fields_mut() {
                if *field == dest {
                    *field = val.clone();
                }
            }
        }
    }
    true
}
