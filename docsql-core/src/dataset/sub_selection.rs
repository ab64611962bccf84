use crate::error::QueryResult;

use super::{same_layout, BoxedDataSet, DataSet, DataSetHeader, HeaderRef, Row};

/// Re-projects every row of the wrapped data set onto another header.
pub struct SubSelectionDataSet {
    inner: BoxedDataSet,
    header: HeaderRef,
    pass_through: bool,
}

impl SubSelectionDataSet {
    pub fn new(inner: BoxedDataSet, header: HeaderRef) -> Self {
        let pass_through = same_layout(inner.select_items(), header.select_items());
        Self {
            inner,
            header,
            pass_through,
        }
    }
}

impl DataSet for SubSelectionDataSet {
    fn header(&self) -> &HeaderRef {
        &self.header
    }

    fn advance(&mut self) -> QueryResult<Option<Row>> {
        let row = self.inner.advance()?;
        if self.pass_through {
            return Ok(row);
        }
        row.map(|r| r.sub_selection(&self.header)).transpose()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
