//! Error types shared across the workspace.
//!
//! Internal invariant violations (malformed IR construction, optimizer or
//! GCM invariant breaks, arena exhaustion) stay as `assert!`/`debug_assert!`
//! at the call site rather than `Result`s here. The error enums below cover
//! the failures a caller can legitimately recover from: malformed input,
//! unreachable procedures, and arena capacity configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("scratch pool exhausted: no arena available outside the caller's conflict set")]
    ScratchExhausted,
}

#[derive(Debug, Error)]
pub enum IndexVecError {
    #[error("index out of bounds: index {index}, length {length}")]
    OutOfBounds { index: usize, length: usize },
}

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("invalid diagnostic code: {0}")]
    InvalidCode(String),
}

pub type ArenaResult<T> = std::result::Result<T, ArenaError>;
pub type DiagnosticResult<T> = std::result::Result<T, DiagnosticError>;
