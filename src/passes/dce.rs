//! Simple (non-aggressive) dead-code elimination: §4.6.
//!
//! Grounded on `original_source/src/dead_code_elimination.py`'s worklist
//! shape (`NO_SIDE_EFFECTS` check, re-enqueue operands of a removed def),
//! pulled through the crate's [`VarMap`]/[`DeleteSet`] idiom instead of the
//! Python's in-place `delete` flag on the statement dict.

use std::collections::{BTreeSet, VecDeque};

use crate::ir::{is_const_token, Code, DeleteSet, VarMap};

/// Remove pure defs with no remaining use, transitively.
///
/// Uses are checked against a running `deleted` set rather than the static
/// [`VarMap`] alone, so a chain of purely-dead definitions (`a <- ...; b <-
/// f(a);` with neither used) collapses in one pass instead of needing a
/// caller to loop this pass to a fixed point.
pub fn dead_code_elimination(code: &mut Code) {
    let var_map = VarMap::build(code);
    let mut worklist: VecDeque<String> = var_map.names().map(|s| s.to_string()).collect();
    let mut deleted: BTreeSet<_> = BTreeSet::new();
    let mut deletes = DeleteSet::new();

    while let Some(name) = worklist.pop_front() {
        let Some(record) = var_map.get(&name) else {
            continue;
        };
        let Some(def_site) = &record.def else {
            continue;
        };
        if deleted.contains(def_site) {
            continue;
        }
        let still_used = record.uses.iter().any(|site| !deleted.contains(site));
        if still_used {
            continue;
        }
        let Some(stmt) = code
            .block(&def_site.block)
            .and_then(|b| b.code.get(def_site.index))
        else {
            continue;
        };
        if !stmt.is_pure_for_simple_dce() {
            continue;
        }
        for src in &stmt.srcs {
            if !is_const_token(src) {
                worklist.push_back(src.clone());
            }
        }
        deletes.mark(def_site.clone());
        deleted.insert(def_site.clone());
    }

    deletes.sweep(code);
}
