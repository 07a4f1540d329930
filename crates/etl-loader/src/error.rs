//! Error types for a load run
//!
//! Every variant aborts the enclosing `load()` call. The only failures that do
//! not are per-object lookup saves during commit, which go to the
//! [`ErrorListener`](crate::ErrorListener) instead.

use etl_model::ModelError;
use etl_store::StoreError;

/// Load error taxonomy
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Rows for one record disagree on the type name
    #[error("type mismatch for record '{record_id}': expected {expected}, found {found}")]
    TypeMismatch {
        record_id: String,
        expected: String,
        found: String,
    },

    /// Type unknown to the instance factory or schema
    #[error("type not found: '{0}'")]
    TypeNotFound(String),

    /// Malformed reference string
    #[error("invalid reference: '{0}'")]
    InvalidReference(String),

    /// Malformed date literal
    #[error("invalid timestamp '{value}' for field {field}")]
    InvalidTimestamp { field: String, value: String },

    /// Field path unknown to the type
    #[error("invalid field '{field}' for type {type_name}")]
    InvalidField { type_name: String, field: String },

    /// Literal cannot be coerced to the field's kind
    #[error("invalid value '{value}' for field {field}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Malformed mapping path
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Referenced object cannot be located
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Reference matches more than one candidate
    #[error("ambiguous reference: {0}")]
    AmbiguousReference(String),

    /// Target lookup declares no relationship type
    #[error("no lookup relationship declared for {field}")]
    LookupRelationshipNotFound { field: String },

    /// Target lookup's source field is not a registered lookup
    #[error("lookup source '{source_path}' not found for {field}")]
    LookupSourceNotFound { field: String, source_path: String },

    /// Relationship type declares no target lookup type
    #[error("no target lookup type for relationship {relationship}")]
    LookupRelationshipTargetNotFound { relationship: String },

    /// Lookup instance missing when linking a relationship
    #[error("lookup not found: {type_name} with code '{code}'")]
    LookupNotFound { type_name: String, code: String },

    /// Invalid loader configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Store or row source failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Model parse failure
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

impl LoadError {
    /// Create invalid field error
    pub fn invalid_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidField {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    /// Create invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error stems from vocabulary configuration or data
    #[inline]
    #[must_use]
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            Self::LookupRelationshipNotFound { .. }
                | Self::LookupSourceNotFound { .. }
                | Self::LookupRelationshipTargetNotFound { .. }
                | Self::LookupNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = LoadError::TypeMismatch {
            record_id: "X".into(),
            expected: "pet".into(),
            found: "person".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for record 'X': expected pet, found person"
        );
        assert!(LoadError::invalid_field("pet", "colour")
            .to_string()
            .contains("colour"));
    }

    #[test]
    fn lookup_errors_are_classified() {
        assert!(LoadError::LookupNotFound {
            type_name: "lookup.species".into(),
            code: "CANINE".into()
        }
        .is_lookup_error());
        assert!(!LoadError::ObjectNotFound("#x".into()).is_lookup_error());
    }
}
