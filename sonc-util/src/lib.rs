//! Shared utilities for the `sonc` compiler workspace: a typed index-vector,
//! arena/scratch-pool primitives, spans, symbol interning, diagnostics, and
//! the crate's error types.

pub mod arena;
pub mod diagnostic;
pub mod error;
pub mod index_vec;
pub mod span;
pub mod symbol;

pub use diagnostic::{Diagnostic, DiagnosticHandler, Level};
pub use error::{ArenaError, DiagnosticError, IndexVecError};
pub use index_vec::{Idx, IndexVec};
pub use span::Span;
pub use symbol::{Symbol, SymbolInterner};
