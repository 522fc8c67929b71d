//! Driver-level error types.
//!
//! Internal compiler invariants stay as fatal assertions inside
//! `sonc-mir`/`sonc-util` and never reach here. What the driver can
//! legitimately recover from — a bad CLI invocation, a missing source
//! file, a lex/parse error, a malformed `sonc.toml` — is a `SoncError`
//! variant, propagated with `?` and reported at `main`'s outermost
//! boundary via `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoncError {
    #[error("failed to read {path}: {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Parse(#[from] sonc_front::ParseError),

    /// Surfaced if `make_proc`'s reachability check is ever relaxed from
    /// an assertion to a recoverable outcome.
    #[allow(dead_code)]
    #[error("compilation failed: start is unreachable from end")]
    CompilationFailed,
}

pub type Result<T> = std::result::Result<T, SoncError>;
