//! Errors raised while querying or mutating the IR document.

use thiserror::Error;

/// Failures in the shape of the IR document itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    /// A statement is missing a required field, references an opcode that
    /// cannot be classified in the current context, or carries a constant
    /// operand that isn't a decimal integer.
    #[error("malformed statement in block `{block}` at index {index}: {reason}")]
    MalformedStatement {
        block: String,
        index: usize,
        reason: String,
    },

    /// The control-flow shape of the document is inconsistent: a successor
    /// name that doesn't resolve to a block, or a φ whose arity disagrees
    /// with its block's predecessor count.
    #[error("malformed control-flow graph: {reason}")]
    MalformedCfg { reason: String },
}

/// Internal, swallowed-at-use-site failure of constant folding.
///
/// Never escapes a pass boundary: callers that hit this treat the fold as a
/// no-op rather than propagating it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FoldError {
    #[error("non-integer constant: {0}")]
    NonIntegerConstant(String),
}
