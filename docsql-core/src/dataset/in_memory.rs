use std::vec;

use crate::error::QueryResult;

use super::{DataSet, HeaderRef, Row};

/// Cursor over rows that are already materialized.
pub struct InMemoryDataSet {
    header: HeaderRef,
    rows: vec::IntoIter<Row>,
}

impl InMemoryDataSet {
    pub fn new(header: HeaderRef, rows: Vec<Row>) -> Self {
        Self {
            header,
            rows: rows.into_iter(),
        }
    }
}

impl DataSet for InMemoryDataSet {
    fn header(&self) -> &HeaderRef {
        &self.header
    }

    fn advance(&mut self) -> QueryResult<Option<Row>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) {
        self.rows = Vec::new().into_iter();
    }
}

/// A data set with no rows.
pub struct EmptyDataSet {
    header: HeaderRef,
}

impl EmptyDataSet {
    pub fn new(header: HeaderRef) -> Self {
        Self { header }
    }
}

impl DataSet for EmptyDataSet {
    fn header(&self) -> &HeaderRef {
        &self.header
    }

    fn advance(&mut self) -> QueryResult<Option<Row>> {
        Ok(None)
    }

    fn close(&mut self) {}
}
