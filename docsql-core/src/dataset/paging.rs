use crate::error::QueryResult;

use super::{BoxedDataSet, DataSet, HeaderRef, Row};

/// Skips the rows before a 1-based first row. The skip happens on the
/// first call to `advance`.
pub struct FirstRowDataSet {
    inner: BoxedDataSet,
    rows_to_skip: usize,
}

impl FirstRowDataSet {
    pub fn new(inner: BoxedDataSet, first_row: usize) -> Self {
        Self {
            inner,
            rows_to_skip: first_row.saturating_sub(1),
        }
    }
}

impl DataSet for FirstRowDataSet {
    fn header(&self) -> &HeaderRef {
        self.inner.header()
    }

    fn advance(&mut self) -> QueryResult<Option<Row>> {
        while self.rows_to_skip > 0 {
            self.rows_to_skip -= 1;
            if self.inner.advance()?.is_none() {
                self.rows_to_skip = 0;
                return Ok(None);
            }
        }
        self.inner.advance()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Stops after a fixed number of rows.
pub struct MaxRowsDataSet {
    inner: BoxedDataSet,
    remaining: usize,
}

impl MaxRowsDataSet {
    pub fn new(inner: BoxedDataSet, max_rows: usize) -> Self {
        Self {
            inner,
            remaining: max_rows,
        }
    }
}

impl DataSet for MaxRowsDataSet {
    fn header(&self) -> &HeaderRef {
        self.inner.header()
    }

    fn advance(&mut self) -> QueryResult<Option<Row>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let row = self.inner.advance()?;
        if row.is_some() {
            self.remaining -= 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
