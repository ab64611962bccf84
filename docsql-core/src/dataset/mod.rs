//! Forward-only row cursors.
//!
//! A [`DataSet`] yields rows shaped by its header, one at a time, and is
//! consumed exactly once. Decorators own the data set they wrap and
//! propagate [`DataSet::close`] to it.

mod filtered;
mod header;
mod in_memory;
mod paging;
mod row;
mod scalar_function;
mod sub_selection;

pub use filtered::{FilteredDataSet, RowFilter};
pub use header::{
    same_layout, CachingDataSetHeader, DataSetHeader, HeaderRef, Resolution, SimpleDataSetHeader,
};
pub use in_memory::{EmptyDataSet, InMemoryDataSet};
pub use paging::{FirstRowDataSet, MaxRowsDataSet};
pub use row::{Row, ScalarColumn, Style};
pub use scalar_function::ScalarFunctionDataSet;
pub use sub_selection::SubSelectionDataSet;

use crate::error::QueryResult;
use crate::query::SelectItem;
use crate::value::Value;

/// A single-pass cursor over rows.
pub trait DataSet: Send {
    fn header(&self) -> &HeaderRef;

    /// Next row, or `None` once exhausted.
    fn advance(&mut self) -> QueryResult<Option<Row>>;

    /// Release the underlying resources. Safe to call more than once.
    fn close(&mut self);

    fn select_items(&self) -> &[SelectItem] {
        self.header().select_items()
    }
}

pub type BoxedDataSet = Box<dyn DataSet>;

impl<D: DataSet + ?Sized> DataSet for Box<D> {
    fn header(&self) -> &HeaderRef {
        (**self).header()
    }

    fn advance(&mut self) -> QueryResult<Option<Row>> {
        (**self).advance()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Bulk helpers that drain a data set and close it, on success or error.
pub trait DataSetExt: DataSet {
    fn to_rows(&mut self) -> QueryResult<Vec<Row>> {
        let mut rows = Vec::new();
        let result = loop {
            match self.advance() {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break Ok(rows),
                Err(e) => break Err(e),
            }
        };
        self.close();
        result
    }

    fn to_object_arrays(&mut self) -> QueryResult<Vec<Vec<Value>>> {
        Ok(self.to_rows()?.into_iter().map(Row::into_values).collect())
    }

    fn rows(&mut self) -> RowIter<'_, Self>
    where
        Self: Sized,
    {
        RowIter { data_set: self }
    }
}

impl<D: DataSet + ?Sized> DataSetExt for D {}

/// Iterator over the remaining rows of a data set. Closes the set once it
/// is exhausted or fails.
pub struct RowIter<'a, D: DataSet> {
    data_set: &'a mut D,
}

impl<D: DataSet> Iterator for RowIter<'_, D> {
    type Item = QueryResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.data_set.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.data_set.close();
                None
            }
            Err(e) => {
                self.data_set.close();
                Some(Err(e))
            }
        }
    }
}

/// `next()` / `row()` / `close()` protocol over a data set.
///
/// The cursor closes its data set when dropped.
pub struct RowCursor {
    data_set: BoxedDataSet,
    current: Option<Row>,
    closed: bool,
}

impl RowCursor {
    pub fn new(data_set: BoxedDataSet) -> Self {
        Self {
            data_set,
            current: None,
            closed: false,
        }
    }

    pub fn header(&self) -> &HeaderRef {
        self.data_set.header()
    }

    /// Move to the next row; `false` once exhausted.
    pub fn next(&mut self) -> QueryResult<bool> {
        if self.closed {
            return Ok(false);
        }
        match self.data_set.advance() {
            Ok(row) => {
                self.current = row;
                Ok(self.current.is_some())
            }
            Err(e) => {
                self.current = None;
                self.close();
                Err(e)
            }
        }
    }

    /// The row reached by the last successful [`RowCursor::next`].
    pub fn row(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.data_set.close();
        }
    }

    pub fn to_rows(mut self) -> QueryResult<Vec<Row>> {
        self.closed = true;
        self.data_set.to_rows()
    }
}

impl Drop for RowCursor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts how often it was closed.
    struct Tracked {
        inner: InMemoryDataSet,
        closes: Arc<AtomicUsize>,
    }

    impl DataSet for Tracked {
        fn header(&self) -> &HeaderRef {
            self.inner.header()
        }

        fn advance(&mut self) -> QueryResult<Option<Row>> {
            self.inner.advance()
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close();
        }
    }

    fn tracked(values: &[i64]) -> (Tracked, Arc<AtomicUsize>) {
        let header = SimpleDataSetHeader::shared(vec![SelectItem::column(Column::new("t", "n"))]);
        let rows = values
            .iter()
            .map(|v| Row::new(header.clone(), vec![Value::from(*v)]))
            .collect();
        let closes = Arc::new(AtomicUsize::new(0));
        let tracked = Tracked {
            inner: InMemoryDataSet::new(header, rows),
            closes: closes.clone(),
        };
        (tracked, closes)
    }

    #[test]
    fn test_to_rows_closes() {
        let (mut data_set, closes) = tracked(&[1, 2, 3]);
        let values = data_set.to_object_arrays().unwrap();
        assert_eq!(values, vec![vec![Value::from(1)], vec![Value::from(2)], vec![Value::from(3)]]);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cursor_protocol() {
        let (data_set, closes) = tracked(&[7]);
        let mut cursor = RowCursor::new(Box::new(data_set));
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.row().map(|r| r.value(0)), Some(Value::from(7)));
        assert!(!cursor.next().unwrap());
        assert!(cursor.row().is_none());
        cursor.close();
        cursor.close();
        drop(cursor);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_row_iterator() {
        let (mut data_set, closes) = tracked(&[1, 2]);
        let collected: Vec<Row> = data_set.rows().collect::<QueryResult<_>>().unwrap();
        assert_eq!(collected.len(), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
