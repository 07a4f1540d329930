//! Row cursor
//!
//! Forward-only pass over the paged row stream. A cursor is consumed once;
//! there is no rewind.

use crate::error::LoadError;
use etl_model::ValueRow;
use etl_store::RowSource;
use std::collections::VecDeque;
use std::sync::Arc;

/// Paging cursor over a [`RowSource`]
pub struct RowCursor {
    source: Arc<dyn RowSource>,
    page_size: usize,
    offset: usize,
    page: VecDeque<ValueRow>,
    exhausted: bool,
    rows_read: usize,
}

impl std::fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCursor")
            .field("page_size", &self.page_size)
            .field("offset", &self.offset)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl RowCursor {
    /// Create cursor fetching `page_size` rows at a time
    #[must_use]
    pub fn new(source: Arc<dyn RowSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            offset: 0,
            page: VecDeque::new(),
            exhausted: false,
            rows_read: 0,
        }
    }

    /// Whether another row is available, fetching the next page if needed
    ///
    /// # Errors
    /// Propagates row source read failures
    pub fn has_next(&mut self) -> Result<bool, LoadError> {
        if self.page.is_empty() && !self.exhausted {
            self.fetch()?;
        }
        Ok(!self.page.is_empty())
    }

    /// Next row, or `None` at end of stream
    ///
    /// # Errors
    /// Propagates row source read failures
    pub fn next_row(&mut self) -> Result<Option<ValueRow>, LoadError> {
        if !self.has_next()? {
            return Ok(None);
        }
        self.rows_read += 1;
        Ok(self.page.pop_front())
    }

    /// Rows handed out so far
    #[inline]
    #[must_use]
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    fn fetch(&mut self) -> Result<(), LoadError> {
        let rows = self.source.page(self.offset, self.page_size)?;
        tracing::debug!(offset = self.offset, rows = rows.len(), "fetched row page");
        self.offset += rows.len();
        if rows.len() < self.page_size {
            self.exhausted = true;
        }
        self.page.extend(rows);
        Ok(())
    }
}

impl Iterator for RowCursor {
    type Item = Result<ValueRow, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
