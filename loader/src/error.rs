//! Error types for loading and dumping configuration files.

use std::path::PathBuf;

use config_tree_core::SchemaError;
use thiserror::Error;

/// Errors that can occur while reading or writing configuration files.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON parsing failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The loaded data does not fit the tree it is merged into.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Top-level document is neither a mapping nor empty.
    #[error("document {} is not a mapping", .0.display())]
    NotAMapping(PathBuf),

    /// Mapping key that is not a string.
    #[error("non-string key {key} in {}", .path.display())]
    NonStringKey { key: String, path: PathBuf },

    /// Base reference that is not a path string.
    #[error("base reference in {} must be a string", .0.display())]
    InvalidBase(PathBuf),

    /// Overlay mapping over a base value that is not a mapping.
    #[error("cannot inherit key {0:?} from base")]
    CannotInherit(String),
}

/// Convenience alias for results with [`LoadError`].
pub type Result<T> = std::result::Result<T, LoadError>;
