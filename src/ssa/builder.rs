//! φ-insertion and dominator-tree-walk renaming: the two phases that turn a
//! CFG with plain variable names into SSA form.
//!
//! Grounded on `insertPhis`/`renameVars` in `original_source/src/ssa.py`,
//! with two deliberate departures the spec calls for: renaming walks the
//! *dominator* tree rather than the Python's CFG-reachability DFS (the
//! Python's `done`-set DFS can visit a join before a dominating predecessor
//! has renamed its definitions), and the walk is iterative rather than
//! recursive so a deep CFG can't blow the stack.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::ir::{is_const_token, validate_phi_arity, Code, Operation};

use super::variable::SsaVariable;

/// Insert φ-functions, then rename every variable to `base-version` form.
pub fn build_ssa(code: &mut Code) -> Result<()> {
    validate_phi_arity(code)?;
    let graph = Graph::from_code(code)?;
    insert_phis(code, &graph)?;
    rename_variables(code, &graph)?;
    Ok(())
}

/// Place a φ at every block in the iterated dominance frontier of each
/// variable's definition sites, per Cytron et al.
fn insert_phis(code: &mut Code, graph: &Graph) -> Result<()> {
    let frontiers = graph.dominance_frontiers()?;

    let mut def_sites: BTreeMap<String, BTreeSet<NodeId>> = BTreeMap::new();
    for block in &code.blocks {
        let Some(id) = graph.node_id(&block.name) else {
            continue;
        };
        for op in &block.code {
            if let Some(dest) = &op.dest {
                def_sites.entry(dest.clone()).or_default().insert(id);
            }
        }
    }

    let mut has_phi: BTreeMap<NodeId, BTreeSet<String>> = BTreeMap::new();

    for (var, sites) in &def_sites {
        let mut worklist: BTreeSet<NodeId> = sites.clone();
        while let Some(n) = pop_first(&mut worklist) {
            let Some(frontier) = frontiers.get(&n) else {
                continue;
            };
            for &y in frontier {
                if has_phi.entry(y).or_default().contains(var) {
                    continue;
                }
                let pred_count = graph.predecessors(y).count();
                let block_name = graph.name(y).to_string();
                if let Some(block) = code.block_mut(&block_name) {
                    let phi = Operation::phi(var.clone(), vec![var.clone(); pred_count]);
                    block.code.insert(0, phi);
                }
                has_phi.get_mut(&y).unwrap().insert(var.clone());
                if !sites.contains(&y) {
                    worklist.insert(y);
                }
            }
        }
    }

    Ok(())
}

fn pop_first(set: &mut BTreeSet<NodeId>) -> Option<NodeId> {
    let first = *set.iter().next()?;
    set.remove(&first);
    Some(first)
}

/// Per-name monotonic counters and the version currently in scope.
#[derive(Default)]
struct RenameState {
    counters: BTreeMap<String, i64>,
    stacks: BTreeMap<String, Vec<i64>>,
}

impl RenameState {
    /// Current version in scope for `name`, auto-initializing to the
    /// sentinel `0` for names not yet seen (program inputs).
    fn top(&mut self, name: &str) -> i64 {
        *self
            .stacks
            .entry(name.to_string())
            .or_insert_with(|| vec![SsaVariable::sentinel(name).version])
            .last()
            .unwrap()
    }

    /// Mint and push a fresh version for `name`, returning it.
    fn push_new(&mut self, name: &str) -> i64 {
        let counter = self.counters.entry(name.to_string()).or_insert(0);
        *counter += 1;
        let version = *counter;
        self.stacks.entry(name.to_string()).or_insert_with(|| vec![0]).push(version);
        version
    }

    fn pop(&mut self, name: &str) {
        if let Some(stack) = self.stacks.get_mut(name) {
            stack.pop();
        }
    }
}

/// One dominator-tree-walk frame: which node we're in, its remaining
/// children, and which names this node pushed (to pop on the way out).
struct Frame {
    children: Vec<NodeId>,
    child_idx: usize,
    pushed: Vec<String>,
}

fn rename_variables(code: &mut Code, graph: &Graph) -> Result<()> {
    let tree = graph.dominator_tree()?;
    let root = graph.root().ok_or(crate::graph::GraphError::NoRoot)?;

    let mut state = RenameState::default();
    let pushed = rename_block(code, graph, root, &mut state)?;
    let mut stack = vec![(
        root,
        Frame {
            children: tree.get(&root).cloned().unwrap_or_default(),
            child_idx: 0,
            pushed,
        },
    )];

    while let Some((node, frame)) = stack.last_mut() {
        if frame.child_idx < frame.children.len() {
            let child = frame.children[frame.child_idx];
            frame.child_idx += 1;
            let child_pushed = rename_block(code, graph, child, &mut state)?;
            stack.push((
                child,
                Frame {
                    children: tree.get(&child).cloned().unwrap_or_default(),
                    child_idx: 0,
                    pushed: child_pushed,
                },
            ));
        } else {
            for name in &frame.pushed {
                state.pop(name);
            }
            let _ = node;
            stack.pop();
        }
    }

    Ok(())
}

/// Rename one block's own statements, then patch the φ sources this block
/// feeds into each of its successors. Returns the names this block pushed
/// new versions for, so the caller can pop them on backtrack.
fn rename_block(
    code: &mut Code,
    graph: &Graph,
    node: NodeId,
    state: &mut RenameState,
) -> Result<Vec<String>> {
    let block_name = graph.name(node).to_string();
    let mut pushed = Vec::new();

    if let Some(block) = code.block_mut(&block_name) {
        for stmt in block.code.iter_mut() {
            if !stmt.is_phi() {
                for src in stmt.srcs.iter_mut() {
                    if !is_const_token(src) {
                        let version = state.top(src);
                        *src = SsaVariable::new(src.as_str(), version).to_string();
                    }
                }
            }
            if let Some(dest) = stmt.dest.clone() {
                let version = state.push_new(&dest);
                pushed.push(dest.clone());
                stmt.dest = Some(SsaVariable::new(dest, version).to_string());
            }
        }
    }

    for succ in graph.successors(node) {
        let Some(idx) = graph.predecessors(succ).position(|p| p == node) else {
            continue;
        };
        let succ_name = graph.name(succ).to_string();
        if let Some(succ_block) = code.block_mut(&succ_name) {
            for stmt in succ_block.code.iter_mut() {
                if !stmt.is_phi() {
                    break;
                }
                if let Some(src) = stmt.srcs.get_mut(idx) {
                    if !is_const_token(src) {
                        let version = state.top(src);
                        *src = SsaVariable::new(src.as_str(), version).to_string();
                    }
                }
            }
        }
    }

    Ok(pushed)
}
