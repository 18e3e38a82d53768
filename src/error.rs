//! Error types returned by the library.
//!
//! Most public APIs return [`crate::Result`], which uses [`Error`] as the
//! error type. The variants provide access to the more specific error
//! families raised by each component.

use std::io;

use thiserror::Error;

use crate::common::ConfigError;
use crate::graph::GraphError;
use crate::ir::IrError;

/// Convenient result alias for the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top level error surfaced by the library APIs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IR document was malformed or referenced an unknown block.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// A graph query failed (missing root, unknown node).
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Configuration file failed to load or parse.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O failure reading or writing a document.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The input document failed to parse as JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
