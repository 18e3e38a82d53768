//! The `Operation` record and the opcode-class predicates the passes dispatch on.
//!
//! The source material models every instruction as an open string-keyed
//! record with fields attached and removed at runtime. Here an operation is
//! a plain tagged value: a mnemonic, an optional destination, and a
//! positional list of source operands. Per-pass bookkeeping (delete flags,
//! lattice evidence, pending comparisons) lives in side tables the passes
//! own, not on this type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{FoldError, IrError};

/// A single three-address-ish instruction.
///
/// `srcs[0]` is `src1`, `srcs[1]` is `src2`, and so on; a φ has one source
/// per predecessor of its block, in predecessor order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub op: String,
    pub dest: Option<String>,
    pub srcs: Vec<String>,
}

impl Operation {
    pub fn new(op: impl Into<String>, dest: Option<String>, srcs: Vec<String>) -> Self {
        Self {
            op: op.into(),
            dest,
            srcs,
        }
    }

    /// `MOV dest, val`
    pub fn mov(dest: impl Into<String>, val: impl Into<String>) -> Self {
        Self::new("MOV", Some(dest.into()), vec![val.into()])
    }

    /// `phi dest, src1, src2, ...`
    pub fn phi(dest: impl Into<String>, srcs: Vec<String>) -> Self {
        Self::new("phi", Some(dest.into()), srcs)
    }

    pub fn is_phi(&self) -> bool {
        self.op == "phi"
    }

    pub fn is_mov(&self) -> bool {
        self.op == "MOV"
    }

    pub fn is_cmp(&self) -> bool {
        self.op == "CMP"
    }

    /// `ADD`, `SUB`, `RSB`, `MUL` — the opcodes constant-fold.
    pub fn fold_op(&self) -> Option<FoldOp> {
        match self.op.as_str() {
            "ADD" => Some(FoldOp::Add),
            "SUB" => Some(FoldOp::Sub),
            "RSB" => Some(FoldOp::Rsb),
            "MUL" => Some(FoldOp::Mul),
            _ => None,
        }
    }

    /// The conditional-branch predicate this opcode tests, if any.
    pub fn branch_cond(&self) -> Option<BranchCond> {
        match self.op.as_str() {
            "BEQ" => Some(BranchCond::Eq),
            "BNE" => Some(BranchCond::Ne),
            "BLT" => Some(BranchCond::Lt),
            "BLE" => Some(BranchCond::Le),
            "BGT" => Some(BranchCond::Gt),
            "BGE" => Some(BranchCond::Ge),
            _ => None,
        }
    }

    /// Whether this opcode is eligible for removal by simple DCE when its
    /// destination has no uses: `{MOV, ADD, SUB, RSB, MUL, phi}`.
    pub fn is_pure_for_simple_dce(&self) -> bool {
        matches!(self.op.as_str(), "MOV" | "ADD" | "SUB" | "RSB" | "MUL" | "phi")
    }

    /// Whether aggressive DCE must keep this statement regardless of use:
    /// `{STR, BX, BL, SWI, return, CMP}` plus any flag-setting `...S` opcode.
    pub fn is_intrinsically_live(&self) -> bool {
        matches!(self.op.as_str(), "STR" | "BX" | "BL" | "SWI" | "return" | "CMP")
            || self.op.ends_with('S')
    }

    /// Whether this statement ends a block's straight-line code, i.e. is a
    /// branch the destruction pass must insert copies *before*.
    pub fn is_terminator(&self) -> bool {
        self.op.starts_with('B')
    }

    /// Every source and destination field, in wire order, for callers doing
    /// blanket substitution.
    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.dest.iter_mut().chain(self.srcs.iter_mut())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOp {
    Add,
    Sub,
    Rsb,
    Mul,
}

impl FoldOp {
    /// Evaluate in wrapping signed 64-bit arithmetic. `Rsb` computes `b - a`.
    pub fn eval(self, a: i64, b: i64) -> i64 {
        match self {
            FoldOp::Add => a.wrapping_add(b),
            FoldOp::Sub => a.wrapping_sub(b),
            FoldOp::Rsb => b.wrapping_sub(a),
            FoldOp::Mul => a.wrapping_mul(b),
        }
    }

    /// Parse both operand tokens and fold, or report which one isn't an
    /// integer constant. Per §7 this is internal: every call site treats
    /// the error as a no-op rather than propagating it.
    pub fn try_eval(self, a: &str, b: &str) -> Result<i64, FoldError> {
        let av = parse_const(a).map_err(|_| FoldError::NonIntegerConstant(a.to_string()))?;
        let bv = parse_const(b).map_err(|_| FoldError::NonIntegerConstant(b.to_string()))?;
        Ok(self.eval(av, bv))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// `#7` → `Some(7)`; a bare variable name → `None`.
pub fn const_token(token: &str) -> Option<&str> {
    token.strip_prefix('#')
}

pub fn is_const_token(token: &str) -> bool {
    token.starts_with('#')
}

pub fn parse_const(token: &str) -> Result<i64, IrError> {
    let digits = const_token(token).ok_or_else(|| IrError::MalformedStatement {
        block: String::new(),
        index: 0,
        reason: format!("`{token}` is not a constant operand"),
    })?;
    digits.parse::<i64>().map_err(|_| IrError::MalformedStatement {
        block: String::new(),
        index: 0,
        reason: format!("non-integer constant payload `{token}`"),
    })
}

pub fn const_literal(value: i64) -> String {
    format!("#{value}")
}

/// Wire representation: `{"op": ..., "dest": ..., "src1": ..., "src2": ..., ...}`.
///
/// `src1..srcN` are read back by probing increasing indices rather than by
/// iterating map keys, so arity beyond nine sources (a φ with ten-plus
/// predecessors) doesn't fall prey to lexicographic key ordering.
#[derive(Serialize, Deserialize)]
struct OperationWire {
    op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest: Option<String>,
    #[serde(flatten)]
    srcs: BTreeMap<String, String>,
}

impl From<&Operation> for OperationWire {
    fn from(op: &Operation) -> Self {
        let srcs = op
            .srcs
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("src{}", i + 1), v.clone()))
            .collect();
        OperationWire {
            op: op.op.clone(),
            dest: op.dest.clone(),
            srcs,
        }
    }
}

impl From<OperationWire> for Operation {
    fn from(wire: OperationWire) -> Self {
        let mut srcs = Vec::new();
        let mut i = 1;
        while let Some(v) = wire.srcs.get(&format!("src{i}")) {
            srcs.push(v.clone());
            i += 1;
        }
        Operation {
            op: wire.op,
            dest: wire.dest,
            srcs,
        }
    }
}

impl Serialize for Operation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OperationWire::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        OperationWire::deserialize(deserializer).map(Operation::from)
    }
}
