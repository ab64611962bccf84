use std::fmt;

use crate::error::QueryResult;

use super::{BoxedDataSet, DataSet, HeaderRef, Row};

/// A predicate over rows.
pub trait RowFilter: Send + Sync + fmt::Debug {
    fn accept(&self, row: &Row) -> QueryResult<bool>;
}

/// Passes on the rows that satisfy every filter.
pub struct FilteredDataSet {
    inner: BoxedDataSet,
    filters: Vec<Box<dyn RowFilter>>,
}

impl FilteredDataSet {
    pub fn new(inner: BoxedDataSet, filters: Vec<Box<dyn RowFilter>>) -> Self {
        Self { inner, filters }
    }

    fn accepts(&self, row: &Row) -> QueryResult<bool> {
        for filter in &self.filters {
            if !filter.accept(row)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl DataSet for FilteredDataSet {
    fn header(&self) -> &HeaderRef {
        self.inner.header()
    }

    fn advance(&mut self) -> QueryResult<Option<Row>> {
        while let Some(row) = self.inner.advance()? {
            if self.accepts(&row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
