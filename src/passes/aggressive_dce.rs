//! Aggressive dead-code elimination: §4.7.
//!
//! Grounded on `original_source/src/aggressive_dead_code_elimination.py`
//! (`mark_all`/`unmark_live`/`remove_unreachable_blocks`/`remove_dead_blocks`/
//! `remove_dead_variables`), extended to the full eight-step fixed point the
//! spec describes — the Python runs two of those steps once each from
//! `main()`; here the whole sequence loops until a round changes nothing,
//! since later steps (block deletion, empty-block concatenation) can expose
//! dead code the earlier steps in the same round couldn't see yet.

use std::collections::{BTreeSet, VecDeque};

use crate::error::Result;
use crate::graph::Graph;
use crate::ir::{is_const_token, Code, DeleteSet, Site, VarMap};

/// Run the eight-step mark/sweep sequence to a fixed point.
pub fn aggressive_dead_code_elimination(code: &mut Code) -> Result<()> {
    loop {
        let before = code.clone();
        run_round(code)?;
        if *code == before {
            return Ok(());
        }
    }
}

fn all_sites(code: &Code) -> BTreeSet<Site> {
    code.blocks
        .iter()
        .flat_map(|b| (0..b.code.len()).map(move |i| Site::new(&b.name, i)))
        .collect()
}

fn run_round(code: &mut Code) -> Result<()> {
    let graph = Graph::from_code(code)?;
    let cdg = graph.control_dependence_graph()?;
    let var_map = VarMap::build(code);

    // Steps 1-3: mark everything dead, unmark intrinsically live statements
    // and the transitive closure of the definitions they read.
    let mut dead = all_sites(code);
    let mut live_blocks: BTreeSet<String> = BTreeSet::new();
    let mut worklist: VecDeque<String> = VecDeque::new();

    for block in &code.blocks {
        for (index, op) in block.code.iter().enumerate() {
            if op.is_intrinsically_live() {
                dead.remove(&Site::new(&block.name, index));
                live_blocks.insert(block.name.clone());
                worklist.extend(op.srcs.iter().filter(|s| !is_const_token(s)).cloned());
            }
        }
    }
    while let Some(name) = worklist.pop_front() {
        let Some(def_site) = var_map.def_site(&name) else {
            continue;
        };
        if !dead.remove(def_site) {
            continue;
        }
        live_blocks.insert(def_site.block.clone());
        let Some(op) = code.block(&def_site.block).and_then(|b| b.code.get(def_site.index)) else {
            continue;
        };
        worklist.extend(op.srcs.iter().filter(|s| !is_const_token(s)).cloned());
    }

    // Step 4: a conditional branch survives if its taken arm is
    // control-dependent on reaching a block that still has a live statement.
    for block in &code.blocks {
        if block.next_block.len() < 2 {
            continue;
        }
        let taken_name = &block.next_block[0];
        for (index, op) in block.code.iter().enumerate() {
            if op.branch_cond().is_none() {
                continue;
            }
            let site = Site::new(&block.name, index);
            if !dead.contains(&site) {
                continue;
            }
            let Some(taken_id) = cdg.node_id(taken_name) else {
                continue;
            };
            let reaches_live = live_blocks
                .iter()
                .filter_map(|b| cdg.node_id(b))
                .any(|b| cdg.has_path(taken_id, b));
            if reaches_live {
                dead.remove(&site);
                live_blocks.insert(block.name.clone());
            }
        }
    }

    // Step 5: drop the taken edge of any conditional branch still marked
    // dead, then delete blocks no longer reachable from the entry.
    for block in code.blocks.iter_mut() {
        if block.next_block.len() < 2 {
            continue;
        }
        let branch_dead = block
            .code
            .iter()
            .enumerate()
            .any(|(i, op)| op.branch_cond().is_some() && dead.contains(&Site::new(&block.name, i)));
        if branch_dead {
            block.next_block = vec![block.next_block[1].clone()];
        }
    }
    prune_unreachable_blocks(code)?;

    // Step 6: sweep everything still marked dead (sites in blocks deleted by
    // step 5 are simply no-ops for `DeleteSet::sweep`).
    let mut deletes = DeleteSet::new();
    for site in dead {
        deletes.mark(site);
    }
    deletes.sweep(code);

    // Step 7: a name with no def-site (its definition lived in a block
    // step 5 deleted) whose every remaining use is a φ operand has that
    // operand dropped rather than left dangling.
    remove_dead_phi_operands(code);

    // Step 8: concatenate empty blocks into their single successor.
    delete_empty_blocks(code);

    Ok(())
}

fn prune_unreachable_blocks(code: &mut Code) -> Result<()> {
    let graph = Graph::from_code(code)?;
    let Some(entry) = graph.root() else {
        return Ok(());
    };
    let reachable: BTreeSet<String> = graph
        .node_ids()
        .filter(|&n| graph.has_path(entry, n))
        .map(|n| graph.name(n).to_string())
        .collect();
    code.blocks.retain(|b| reachable.contains(&b.name));
    for block in code.blocks.iter_mut() {
        block.next_block.retain(|s| reachable.contains(s));
    }
    Ok(())
}

fn remove_dead_phi_operands(code: &mut Code) {
    let var_map = VarMap::build(code);
    let mut to_strip: Vec<(Site, String)> = Vec::new();
    for name in var_map.names() {
        let record = var_map.get(name).unwrap();
        if record.def.is_some() || record.uses.is_empty() {
            continue;
        }
        let all_phi_operands = record.uses.iter().all(|site| {
            code.block(&site.block)
                .and_then(|b| b.code.get(site.index))
                .map(|op| op.is_phi())
                .unwrap_or(false)
        });
        if all_phi_operands {
            for site in &record.uses {
                to_strip.push((site.clone(), name.to_string()));
            }
        }
    }
    for (site, name) in to_strip {
        if let Some(op) = code.block_mut(&site.block).and_then(|b| b.code.get_mut(site.index)) {
            op.srcs.retain(|s| s != &name);
        }
    }
}

fn delete_empty_blocks(code: &mut Code) {
    loop {
        let empty: Vec<(String, String)> = code
            .blocks
            .iter()
            .filter(|b| b.code.is_empty() && b.next_block.len() == 1)
            .map(|b| (b.name.clone(), b.next_block[0].clone()))
            .collect();
        if empty.is_empty() {
            return;
        }
        let mut removed = BTreeSet::new();
        for (name, successor) in empty {
            for block in code.blocks.iter_mut() {
                for nb in block.next_block.iter_mut() {
                    if *nb == name {
                        *nb = successor.clone();
                    }
                }
            }
            if code.entry_name() == Some(name.as_str()) {
                code.starting_block = Some(successor);
            }
            removed.insert(name);
        }
        code.remove_blocks(&removed);
    }
}
