//! Flat value rows
//!
//! A legacy export is a stream of [`ValueRow`]s. All rows sharing a record id
//! describe one target object and must agree on its type name.

use serde::{Deserialize, Serialize};

/// One field assignment for one record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRow {
    /// Record id, unique per target object within a load run
    pub record_id: String,
    /// Type name of the target object
    pub type_name: String,
    /// Field of the target object this row populates
    pub field_path: String,
    /// Literal value (reference string when `is_reference`)
    pub value: String,
    /// Value is a reference string
    #[serde(default)]
    pub is_reference: bool,
    /// Strip collection children populated by instantiation defaults
    #[serde(default)]
    pub remove_defaults: bool,
    /// Identifier assigned by the source system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    /// Position within a collection field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl ValueRow {
    /// Create a literal-valued row
    #[must_use]
    pub fn new(
        record_id: impl Into<String>,
        type_name: impl Into<String>,
        field_path: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            type_name: type_name.into(),
            field_path: field_path.into(),
            value: value.into(),
            is_reference: false,
            remove_defaults: false,
            legacy_id: None,
            index: None,
        }
    }

    /// Create a reference-valued row
    #[must_use]
    pub fn reference(
        record_id: impl Into<String>,
        type_name: impl Into<String>,
        field_path: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            is_reference: true,
            ..Self::new(record_id, type_name, field_path, reference)
        }
    }

    /// With legacy id
    #[inline]
    #[must_use]
    pub fn with_legacy_id(mut self, legacy_id: impl Into<String>) -> Self {
        self.legacy_id = Some(legacy_id.into());
        self
    }

    /// With collection index
    #[inline]
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// With default-children removal
    #[inline]
    #[must_use]
    pub fn with_remove_defaults(mut self) -> Self {
        self.remove_defaults = true;
        self
    }
}
