//! End-to-end `optimise` pipeline scenarios (S1-S6).

use ssa_opt::ir::{Block, Code, Operation};
use ssa_opt::{Optimizer, OptimizerConfig};

fn run(code: Code) -> Code {
    let optimizer = Optimizer::new(OptimizerConfig::default());
    optimizer.optimise(code).expect("pipeline should not fail on well-formed input").0
}

fn single_block(ops: Vec<Operation>) -> Code {
    let mut b0 = Block::new("b0");
    b0.code = ops;
    Code::new(vec![b0])
}

/// S1. Trivial fold: `r2 = r0 + r1` with both constant should end up stored
/// as the folded literal, with every intermediate name gone.
#[test]
fn s1_trivial_fold() {
    let code = single_block(vec![
        Operation::mov("r0", "#1"),
        Operation::mov("r1", "#2"),
        Operation::new("ADD", Some("r2".into()), vec!["r0".into(), "r1".into()]),
        Operation::new("STR", None, vec!["r2".into()]),
    ]);

    let result = run(code);
    let b0 = result.block("b0").unwrap();
    assert_eq!(b0.code.len(), 1);
    assert_eq!(b0.code[0].op, "STR");
    assert_eq!(b0.code[0].srcs, vec!["#3".to_string()]);
}

/// S2. Dead pure definition: an `ADD` whose result is never read is removed,
/// the unrelated store survives untouched.
#[test]
fn s2_dead_pure_definition() {
    let code = single_block(vec![
        Operation::new("ADD", Some("r3".into()), vec!["r0".into(), "r1".into()]),
        Operation::new("STR", None, vec!["r0".into()]),
    ]);

    let result = run(code);
    let b0 = result.block("b0").unwrap();
    assert!(!b0.code.iter().any(|op| op.op == "ADD"));
    assert!(b0.code.iter().any(|op| op.op == "STR" && op.srcs == vec!["r0".to_string()]));
}

/// S3. Unreachable branch: a statically-equal `CMP`/`BEQ` always takes its
/// first successor, so the other arm is unreachable and gets deleted
/// entirely, along with the now-pointless comparison.
#[test]
fn s3_unreachable_branch() {
    let mut b0 = Block::new("b0");
    b0.code.push(Operation::mov("r0", "#1"));
    b0.code.push(Operation::mov("r1", "#1"));
    b0.code.push(Operation::new("CMP", None, vec!["r0".into(), "r1".into()]));
    b0.code.push(Operation::new("BEQ", None, vec![]));
    b0.next_block = vec!["b1".into(), "b2".into()];

    let mut b1 = Block::new("b1");
    b1.code.push(Operation::new("STR", None, vec!["r0".into()]));

    let mut b2 = Block::new("b2");
    b2.code.push(Operation::new("STR", None, vec!["#9".into()]));

    let result = run(Code::new(vec![b0, b1, b2]));

    assert!(result.block("b2").is_none());
    let b0 = result.block("b0").unwrap();
    assert!(!b0.code.iter().any(|op| op.is_cmp() || op.branch_cond().is_some()));
    assert!(result.blocks.iter().flat_map(|b| &b.code).any(|op| op.op == "STR"));
}

/// S4. Loop with phi: an induction variable entering from the preheader as
/// `#0` and from the back-edge as `i + 1` survives the round trip with the
/// same number of predecessor edges carrying it and no phi left behind.
#[test]
fn s4_loop_with_phi() {
    let mut preheader = Block::new("preheader");
    preheader.code.push(Operation::mov("i", "#0"));
    preheader.next_block = vec!["header".into()];

    let mut header = Block::new("header");
    header.code.push(Operation::new("CMP", None, vec!["i".into(), "#10".into()]));
    header.code.push(Operation::new("BLT", None, vec![]));
    header.next_block = vec!["body".into(), "exit".into()];

    let mut body = Block::new("body");
    body.code.push(Operation::new("ADD", Some("i".into()), vec!["i".into(), "#1".into()]));
    body.next_block = vec!["header".into()];

    let exit = Block::new("exit");

    let code = Code::new(vec![preheader, header, body, exit]);
    let result = run(code);

    assert!(result.blocks.iter().flat_map(|b| &b.code).all(|op| !op.is_phi()));
    assert!(result.block("body").is_some());
}

/// S5. Phi coalescing: `x1 <- phi(x0, x2)` with `x2 <- x1 + 1` in a
/// two-predecessor block reduces to one name and no phi after destruction.
#[test]
fn s5_phi_coalescing() {
    let mut entry = Block::new("entry");
    entry.code.push(Operation::new("CMP", None, vec!["a".into(), "b".into()]));
    entry.code.push(Operation::new("BEQ", None, vec![]));
    entry.next_block = vec!["left".into(), "right".into()];

    let mut left = Block::new("left");
    left.code.push(Operation::mov("x0", "#0"));
    left.next_block = vec!["loop_".into()];

    let mut right = Block::new("right");
    right.code.push(Operation::mov("x0", "#1"));
    right.next_block = vec!["loop_".into()];

    let mut loop_ = Block::new("loop_");
    loop_.code.push(Operation::phi("x1", vec!["x0".into(), "x2".into()]));
    loop_.code.push(Operation::new("ADD", Some("x2".into()), vec!["x1".into(), "#1".into()]));
    loop_.code.push(Operation::new("STR", None, vec!["x2".into()]));
    loop_.next_block = vec!["loop_".into()];

    let code = Code::new(vec![entry, left, right, loop_]);
    let result = run(code);

    assert!(result.blocks.iter().flat_map(|b| &b.code).all(|op| !op.is_phi()));
}

/// S6. CCP unreachable code: a constant-valued comparison makes one arm of
/// the branch dead; CCP should fold the comparison away and the pipeline
/// removes the unreachable arm entirely.
#[test]
fn s6_ccp_unreachable_code() {
    let mut b0 = Block::new("b0");
    b0.code.push(Operation::mov("r0", "#5"));
    b0.code.push(Operation::new("CMP", None, vec!["r0".into(), "#0".into()]));
    b0.code.push(Operation::new("BEQ", None, vec![]));
    b0.next_block = vec!["b_true".into(), "b_false".into()];

    let mut b_true = Block::new("b_true");
    b_true.code.push(Operation::new("return", None, vec!["#1".into()]));

    let mut b_false = Block::new("b_false");
    b_false.code.push(Operation::new("return", None, vec!["#2".into()]));

    let result = run(Code::new(vec![b0, b_true, b_false]));

    assert!(result.block("b_true").is_none());
    assert!(result
        .blocks
        .iter()
        .flat_map(|b| &b.code)
        .any(|op| op.op == "return" && op.srcs == vec!["#2".to_string()]));
}
