//! In-memory row source
//!
//! Rows are stable-sorted by `(record id, type name)` on construction so that
//! paging yields each record's rows contiguously. JSONL input holds one
//! [`ValueRow`] per line; blank lines and `//` comments are skipped.

use crate::error::StoreError;
use crate::source::RowSource;
use etl_model::{type_matches, FieldKey, ValueRow};
use indexmap::IndexSet;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Row source over rows held in memory
#[derive(Debug, Default)]
pub struct MemoryRowSource {
    rows: Vec<ValueRow>,
    pages_read: AtomicUsize,
}

impl MemoryRowSource {
    /// Create source, sorting rows by record id then type name
    #[must_use]
    pub fn new(mut rows: Vec<ValueRow>) -> Self {
        rows.sort_by(|a, b| {
            a.record_id
                .cmp(&b.record_id)
                .then_with(|| a.type_name.cmp(&b.type_name))
        });
        Self {
            rows,
            pages_read: AtomicUsize::new(0),
        }
    }

    /// Parse JSONL rows
    ///
    /// # Errors
    /// Returns [`StoreError::Parse`] with the 1-based line number of the first bad line
    pub fn from_jsonl_str(input: &str) -> Result<Self, StoreError> {
        let mut rows = Vec::new();
        for (number, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let row: ValueRow = serde_json::from_str(line).map_err(|source| StoreError::Parse {
                line: number + 1,
                source,
            })?;
            rows.push(row);
        }
        Ok(Self::new(rows))
    }

    /// Read and parse a JSONL file
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the file cannot be read, or a parse error
    pub fn from_jsonl_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_jsonl_str(&input)
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of `page` calls served
    #[inline]
    #[must_use]
    pub fn pages_read(&self) -> usize {
        self.pages_read.load(Ordering::Relaxed)
    }
}

impl RowSource for MemoryRowSource {
    fn page(&self, offset: usize, limit: usize) -> Result<Vec<ValueRow>, StoreError> {
        self.pages_read.fetch_add(1, Ordering::Relaxed);
        Ok(self.rows.iter().skip(offset).take(limit).cloned().collect())
    }

    fn rows_for_record(&self, record_id: &str) -> Result<Vec<ValueRow>, StoreError> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.record_id == record_id)
            .cloned()
            .collect())
    }

    fn rows_for_legacy_id(
        &self,
        type_pattern: &str,
        legacy_id: &str,
    ) -> Result<Vec<ValueRow>, StoreError> {
        let records: HashSet<&str> = self
            .rows
            .iter()
            .filter(|row| {
                row.legacy_id.as_deref() == Some(legacy_id)
                    && type_matches(type_pattern, &row.type_name)
            })
            .map(|row| row.record_id.as_str())
            .collect();
        Ok(self
            .rows
            .iter()
            .filter(|row| records.contains(row.record_id.as_str()))
            .cloned()
            .collect())
    }

    fn mapped_fields(&self) -> Result<Vec<FieldKey>, StoreError> {
        let fields: IndexSet<FieldKey> = self
            .rows
            .iter()
            .map(|row| FieldKey::new(row.type_name.clone(), row.field_path.trim_start_matches('/')))
            .collect();
        Ok(fields.into_iter().collect())
    }
}
