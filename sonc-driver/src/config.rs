//! `sonc.toml` configuration, merged under CLI flags (CLI > config file >
//! built-in default).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SoncError};

pub const CONFIG_FILE_NAME: &str = "sonc.toml";

/// Five MiB, enough headroom for the functions this compiler handles.
const DEFAULT_ARENA_SIZE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_arena_size_bytes")]
    pub arena_size_bytes: usize,

    #[serde(default = "default_optimize")]
    pub optimize: bool,
}

fn default_arena_size_bytes() -> usize {
    DEFAULT_ARENA_SIZE_BYTES
}

fn default_optimize() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            arena_size_bytes: default_arena_size_bytes(),
            optimize: default_optimize(),
        }
    }
}

impl Config {
    /// Looks for `sonc.toml` in the current directory, falling back to
    /// built-in defaults if it is absent.
    pub fn load() -> Result<Self> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SoncError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SoncError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_reference_arena_size() {
        let config = Config::default();
        assert_eq!(config.arena_size_bytes, 5 * 1024 * 1024);
        assert!(config.optimize);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_from_path_rejects_a_nonexistent_file() {
        let result = Config::load_from_path(Path::new("/nonexistent/sonc.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_from_path_parses_overridden_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "arena_size_bytes = 1024\noptimize = false\n").unwrap();
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.arena_size_bytes, 1024);
        assert!(!config.optimize);
    }
}
