//! Error types for store and row source operations

use std::path::PathBuf;

/// Errors raised by an [`ObjectStore`](crate::ObjectStore) or [`RowSource`](crate::RowSource)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend failure
    #[error("store backend error: {0}")]
    Backend(String),

    /// Object failed validation on save
    #[error("validation failed for {type_name}: {reason}")]
    Validation { type_name: String, reason: String },

    /// Type is not declared by the schema
    #[error("unknown type: '{0}'")]
    UnknownType(String),

    /// Row file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Row file line is not a valid row
    #[error("parse error at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Create validation error
    pub fn validation(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}
