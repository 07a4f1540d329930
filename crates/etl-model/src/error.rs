//! Error types for the model crate

use std::path::PathBuf;

/// Errors raised while parsing model input (references, paths, schema documents)
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Reference string does not match any of the three grammars
    #[error("invalid reference: '{0}'")]
    InvalidReference(String),

    /// Mapping path is malformed
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Schema document is not valid YAML
    #[error("schema yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Schema document is not valid JSON
    #[error("schema json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ModelError {
    /// Create invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
