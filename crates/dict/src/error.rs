// ABOUTME: Error types for dictionary-level operations.
// ABOUTME: Provides DictError covering file I/O, configuration, and selector problems.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use mdtools_markup::SelectorError;
use thiserror::Error;

/// Errors that abort a tidy or merge run. Malformed entry content never produces one.
#[derive(Debug, Error)]
pub enum DictError {
    /// A source, style, or config file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The output file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid JSON for its command.
    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The config parsed but failed validation; one message per line.
    #[error("invalid config:\n{0}")]
    Config(String),

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

impl DictError {
    pub fn read(path: impl AsRef<Path>, source: io::Error) -> Self {
        DictError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn write(path: impl AsRef<Path>, source: io::Error) -> Self {
        DictError::Write {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Joins every validation problem into a single `Config` error.
    pub fn config<I, S>(problems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: fmt::Display,
    {
        let joined = problems
            .into_iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        DictError::Config(joined)
    }
}

pub type Result<T> = std::result::Result<T, DictError>;
