use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::query::SelectItem;

use super::{BoxedDataSet, CachingDataSetHeader, DataSet, DataSetHeader, HeaderRef, Row, ScalarColumn};

/// Prepends scalar function columns to the rows of the wrapped data set.
/// Function values are computed each time they are read.
pub struct ScalarFunctionDataSet {
    inner: BoxedDataSet,
    header: HeaderRef,
    functions: Arc<Vec<ScalarColumn>>,
}

impl ScalarFunctionDataSet {
    /// Fails, closing `inner`, when an item is not a scalar function or its
    /// input is missing from `inner`.
    pub fn new(mut inner: BoxedDataSet, scalar_items: Vec<SelectItem>) -> QueryResult<Self> {
        let functions = match Self::resolve_inputs(&inner, &scalar_items) {
            Ok(functions) => functions,
            Err(e) => {
                inner.close();
                return Err(e);
            }
        };

        let mut items = scalar_items;
        items.extend(inner.select_items().iter().cloned());
        Ok(Self {
            inner,
            header: CachingDataSetHeader::shared(items),
            functions: Arc::new(functions),
        })
    }

    fn resolve_inputs(inner: &BoxedDataSet, scalar_items: &[SelectItem]) -> QueryResult<Vec<ScalarColumn>> {
        let mut functions = Vec::with_capacity(scalar_items.len());
        for item in scalar_items {
            if item.scalar_function().is_none() {
                return Err(QueryError::ExecutionError(format!(
                    "{} is not a scalar function item",
                    item
                )));
            }
            let input = inner
                .header()
                .index_of(&item.replace_function(None))
                .ok_or_else(|| {
                    QueryError::ExecutionError(format!(
                        "Input of {} is not available in the data set",
                        item.sql_without_alias()
                    ))
                })?;
            functions.push(ScalarColumn {
                item: item.clone(),
                input,
            });
        }
        Ok(functions)
    }
}

impl DataSet for ScalarFunctionDataSet {
    fn header(&self) -> &HeaderRef {
        &self.header
    }

    fn advance(&mut self) -> QueryResult<Option<Row>> {
        Ok(self
            .inner
            .advance()?
            .map(|row| Row::scalar(self.header.clone(), self.functions.clone(), row)))
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DataSetExt, InMemoryDataSet, SimpleDataSetHeader};
    use crate::query::FunctionType;
    use crate::schema::Column;
    use crate::value::Value;

    #[test]
    fn test_prepends_function_columns() {
        let column = Column::new("t", "amount");
        let header = SimpleDataSetHeader::shared(vec![SelectItem::column(column.clone())]);
        let rows = vec![
            Row::new(header.clone(), vec![Value::from("12")]),
            Row::new(header.clone(), vec![Value::from("n/a")]),
        ];
        let inner = Box::new(InMemoryDataSet::new(header, rows));
        let to_number = SelectItem::function(FunctionType::ToNumber, column);

        let mut data_set = ScalarFunctionDataSet::new(inner, vec![to_number.clone()]).unwrap();
        assert_eq!(data_set.header().index_of(&to_number), Some(0));
        assert_eq!(
            data_set.to_object_arrays().unwrap(),
            vec![
                vec![Value::from(12), Value::from("12")],
                vec![Value::Null, Value::from("n/a")],
            ]
        );
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let header = SimpleDataSetHeader::shared(vec![SelectItem::column(Column::new("t", "a"))]);
        let inner = Box::new(InMemoryDataSet::new(header, vec![]));
        let item = SelectItem::function(FunctionType::ToString, Column::new("t", "b"));
        assert!(ScalarFunctionDataSet::new(inner, vec![item]).is_err());
    }
}
