//! Row source seam

use crate::error::StoreError;
use etl_model::{FieldKey, ValueRow};

/// Flat rows exported from a legacy system
///
/// `page` serves the stream sorted by `(record id, type name)` so that the
/// rows of one record are contiguous.
pub trait RowSource: Send + Sync {
    /// Rows `[offset, offset + limit)` of the sorted stream
    ///
    /// # Errors
    /// Returns [`StoreError`] on read failure
    fn page(&self, offset: usize, limit: usize) -> Result<Vec<ValueRow>, StoreError>;

    /// All rows of one record
    ///
    /// # Errors
    /// Returns [`StoreError`] on read failure
    fn rows_for_record(&self, record_id: &str) -> Result<Vec<ValueRow>, StoreError>;

    /// All rows of every record carrying `legacy_id` whose type matches `type_pattern`
    ///
    /// # Errors
    /// Returns [`StoreError`] on read failure
    fn rows_for_legacy_id(
        &self,
        type_pattern: &str,
        legacy_id: &str,
    ) -> Result<Vec<ValueRow>, StoreError>;

    /// Distinct `(type, field)` pairs the rows populate
    ///
    /// # Errors
    /// Returns [`StoreError`] on read failure
    fn mapped_fields(&self) -> Result<Vec<FieldKey>, StoreError>;
}
