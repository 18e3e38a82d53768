//! Property-based tests for the invariants in SPEC_FULL.md §8 (P1-P8).
//!
//! Generators are deliberately narrow (fixed CFG shapes with randomized
//! constants/widths) rather than fully arbitrary graphs, since most
//! invariants here are about the transform's *semantics* on a given shape
//! rather than its robustness to arbitrary malformed documents.

use std::collections::BTreeSet;

use proptest::prelude::*;

use ssa_opt::graph::Graph;
use ssa_opt::ir::{Block, Code, Operation, VarMap};
use ssa_opt::{build_ssa, Optimizer, OptimizerConfig};

fn diamond_with_writes(then_writes: u32, else_writes: u32) -> Code {
    let mut entry = Block::new("entry");
    entry.code.push(Operation::new("CMP", None, vec!["a".into(), "b".into()]));
    entry.code.push(Operation::new("BEQ", None, vec![]));
    entry.next_block = vec!["then_".into(), "else_".into()];

    let mut then_ = Block::new("then_");
    for i in 0..then_writes.max(1) {
        then_.code.push(Operation::mov("v", format!("#{i}")));
    }
    then_.next_block = vec!["join".into()];

    let mut else_ = Block::new("else_");
    for i in 0..else_writes.max(1) {
        else_.code.push(Operation::mov("v", format!("#{}", i + 100)));
    }
    else_.next_block = vec!["join".into()];

    let mut join = Block::new("join");
    join.code.push(Operation::new("STR", None, vec!["v".into()]));

    Code::new(vec![entry, then_, else_, join])
}

proptest! {
    /// P1: every variable in post-SSA IR has at most one defining statement.
    #[test]
    fn p1_ssa_single_definition(then_writes in 1u32..4, else_writes in 1u32..4) {
        let mut code = diamond_with_writes(then_writes, else_writes);
        build_ssa(&mut code).unwrap();

        let var_map = VarMap::build(&code);
        for name in var_map.names() {
            let def_count = code
                .blocks
                .iter()
                .flat_map(|b| &b.code)
                .filter(|op| op.dest.as_deref() == Some(name))
                .count();
            prop_assert!(def_count <= 1, "{name} has {def_count} defs");
        }
    }

    /// P2: every phi's arity equals its block's predecessor count.
    #[test]
    fn p2_phi_arity_matches_predecessor_count(then_writes in 1u32..4, else_writes in 1u32..4) {
        let mut code = diamond_with_writes(then_writes, else_writes);
        build_ssa(&mut code).unwrap();
        let graph = Graph::from_code(&code).unwrap();

        for block in &code.blocks {
            let id = graph.node_id(&block.name).unwrap();
            let pred_count = graph.predecessors(id).count();
            for op in &block.code {
                if op.is_phi() {
                    prop_assert_eq!(op.srcs.len(), pred_count);
                }
            }
        }
    }

    /// P4: constant folding is sound — folding an arithmetic chain of known
    /// constants must compute the same value as evaluating it directly.
    #[test]
    fn p4_fold_soundness(a in -1000i64..1000, b in -1000i64..1000, c in -1000i64..1000) {
        let mut code = Code::new(vec![{
            let mut b0 = Block::new("b0");
            b0.code.push(Operation::mov("x", format!("#{a}")));
            b0.code.push(Operation::mov("y", format!("#{b}")));
            b0.code.push(Operation::new("ADD", Some("t".into()), vec!["x".into(), "y".into()]));
            b0.code.push(Operation::mov("z", format!("#{c}")));
            b0.code.push(Operation::new("MUL", Some("r".into()), vec!["t".into(), "z".into()]));
            b0.code.push(Operation::new("STR", None, vec!["r".into()]));
            b0
        }]);

        ssa_opt::passes::constant_propagation(&mut code);

        let expected = a.wrapping_add(b).wrapping_mul(c);
        let str_op = code.blocks[0].code.iter().find(|op| op.op == "STR").unwrap();
        let value: i64 = str_op.srcs[0].trim_start_matches('#').parse().unwrap();
        prop_assert_eq!(value, expected);
    }

    /// P6: after SSA destruction, no block contains a `phi` anywhere.
    #[test]
    fn p6_no_phi_survives_destruction(then_writes in 1u32..4, else_writes in 1u32..4) {
        let code = diamond_with_writes(then_writes, else_writes);
        let optimizer = Optimizer::new(OptimizerConfig::default());
        let (result, _) = optimizer.optimise(code).unwrap();

        prop_assert!(result.blocks.iter().flat_map(|b| &b.code).all(|op| !op.is_phi()));
    }
}

/// `a` dominates `b` iff `b` is reachable from `root` at all, and removing
/// node `a` from the graph severs that reachability (or `a == b`).
fn brute_force_dominates(edges: &[(usize, usize)], node_count: usize, root: usize, a: usize, b: usize) -> bool {
    if a == b {
        return reachable_excluding(edges, node_count, root, b, node_count);
    }
    !reachable_excluding(edges, node_count, root, b, a)
}

fn reachable_excluding(edges: &[(usize, usize)], node_count: usize, root: usize, target: usize, excluded: usize) -> bool {
    if root == excluded {
        return false;
    }
    let mut seen = vec![false; node_count];
    let mut stack = vec![root];
    seen[root] = true;
    while let Some(n) = stack.pop() {
        if n == target {
            return true;
        }
        for &(from, to) in edges {
            if from == n && to != excluded && !seen[to] {
                seen[to] = true;
                stack.push(to);
            }
        }
    }
    seen[target]
}

proptest! {
    /// P7: `dom(a, b)` holds iff every path from the root to `b` passes
    /// through `a`, checked against a brute-force reachability-with-removal
    /// characterization over small random graphs.
    #[test]
    fn p7_dominator_characterization(
        edge_bits in prop::collection::vec(any::<bool>(), 30),
    ) {
        const N: usize = 6;
        let mut graph = Graph::new();
        let names: Vec<String> = (0..N).map(|i| format!("n{i}")).collect();
        for name in &names {
            graph.add_node(name);
        }
        let mut edges: Vec<(usize, usize)> = Vec::new();
        let mut bit = 0;
        for i in 0..N {
            for j in 0..N {
                if i == j {
                    continue;
                }
                if edge_bits[bit % edge_bits.len()] {
                    edges.push((i, j));
                }
                bit += 1;
            }
        }
        for &(from, to) in &edges {
            let _ = graph.add_edge(&names[from], &names[to]);
        }
        graph.set_root(&names[0]).unwrap();

        let reachable_from_root: BTreeSet<usize> = (0..N)
            .filter(|&n| reachable_excluding(&edges, N, 0, n, N))
            .collect();

        for &b in &reachable_from_root {
            for a in 0..N {
                if !reachable_from_root.contains(&a) {
                    continue;
                }
                let id_a = graph.node_id(&names[a]).unwrap();
                let id_b = graph.node_id(&names[b]).unwrap();
                let expected = brute_force_dominates(&edges, N, 0, a, b);
                let actual = graph.dom(id_a, id_b).unwrap();
                prop_assert_eq!(actual, expected, "dom({a}, {b})");
            }
        }
    }
}

