//! Rows: one tuple of values shaped by a header.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::executor::BuiltinFunctions;
use crate::query::SelectItem;
use crate::value::Value;

use super::header::{DataSetHeader, HeaderRef, Resolution};

/// Presentation hints for a single cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl Style {
    pub fn is_plain(&self) -> bool {
        *self == Style::default()
    }
}

/// A scalar function column computed from a cell of the wrapped row.
#[derive(Debug, Clone)]
pub struct ScalarColumn {
    pub item: SelectItem,
    /// Index in the wrapped row's header of the function's input.
    pub input: usize,
}

#[derive(Debug, Clone)]
enum Cells {
    Values(Vec<Value>),
    /// Function columns come first and are evaluated on each access; the
    /// wrapped row supplies the remaining positions.
    Scalar {
        functions: Arc<Vec<ScalarColumn>>,
        inner: Box<Row>,
    },
}

#[derive(Debug, Clone)]
pub struct Row {
    header: HeaderRef,
    cells: Cells,
    styles: Option<Vec<Style>>,
}

impl Row {
    pub fn new(header: HeaderRef, values: Vec<Value>) -> Self {
        debug_assert_eq!(header.len(), values.len());
        Self {
            header,
            cells: Cells::Values(values),
            styles: None,
        }
    }

    pub fn with_styles(mut self, styles: Vec<Style>) -> Self {
        self.styles = Some(styles);
        self
    }

    pub(crate) fn scalar(header: HeaderRef, functions: Arc<Vec<ScalarColumn>>, inner: Row) -> Self {
        Self {
            header,
            cells: Cells::Scalar {
                functions,
                inner: Box::new(inner),
            },
            styles: None,
        }
    }

    pub fn header(&self) -> &HeaderRef {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.header.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }

    /// Value at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<Value> {
        match &self.cells {
            Cells::Values(values) => values.get(index).cloned(),
            Cells::Scalar { functions, inner } => match functions.get(index) {
                Some(column) => {
                    let input = inner.get(column.input).unwrap_or_default();
                    Some(apply_scalar(&column.item, &input))
                }
                None => inner.get(index - functions.len()),
            },
        }
    }

    /// Value at `index`; NULL past the end.
    pub fn value(&self, index: usize) -> Value {
        self.get(index).unwrap_or_default()
    }

    pub fn values(&self) -> Vec<Value> {
        match &self.cells {
            Cells::Values(values) => values.clone(),
            Cells::Scalar { .. } => (0..self.len()).map(|i| self.value(i)).collect(),
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self.cells {
            Cells::Values(values) => values,
            Cells::Scalar { .. } => self.values(),
        }
    }

    pub fn style(&self, index: usize) -> Option<&Style> {
        match (&self.styles, &self.cells) {
            (Some(styles), _) => styles.get(index),
            (None, Cells::Scalar { functions, inner }) if index >= functions.len() => {
                inner.style(index - functions.len())
            }
            _ => None,
        }
    }

    pub fn has_styles(&self) -> bool {
        match &self.cells {
            Cells::Scalar { inner, .. } if self.styles.is_none() => inner.has_styles(),
            _ => self.styles.is_some(),
        }
    }

    /// Value of `item` in this row.
    ///
    /// Scalar function items whose input column is present are computed on
    /// the fly; subquery references resolve through the item they wrap.
    pub fn evaluate(&self, item: &SelectItem) -> Option<Value> {
        self.locate(item).map(|(resolution, target)| {
            let value = self.value(resolution.index);
            if resolution.via_function_fallback {
                apply_scalar(target, &value)
            } else {
                value
            }
        })
    }

    fn locate<'a>(&self, item: &'a SelectItem) -> Option<(Resolution, &'a SelectItem)> {
        self.header
            .resolve(item)
            .map(|r| (r, item))
            .or_else(|| {
                item.subquery_select_item()
                    .and_then(|inner| self.header.resolve(inner).map(|r| (r, inner)))
            })
    }

    /// Project this row onto another header. Every item of `header` must be
    /// readable from this row.
    pub fn sub_selection(&self, header: &HeaderRef) -> QueryResult<Row> {
        let mut values = Vec::with_capacity(header.len());
        let mut styles = self.has_styles().then(|| Vec::with_capacity(header.len()));
        for item in header.select_items() {
            let value = self.evaluate(item).ok_or_else(|| {
                QueryError::ExecutionError(format!(
                    "Select item {} is not available",
                    item.sql_without_alias()
                ))
            })?;
            values.push(value);
            if let Some(styles) = styles.as_mut() {
                let style = self
                    .locate(item)
                    .and_then(|(r, _)| self.style(r.index))
                    .cloned()
                    .unwrap_or_default();
                styles.push(style);
            }
        }
        Ok(Row {
            header: header.clone(),
            cells: Cells::Values(values),
            styles,
        })
    }
}

fn apply_scalar(item: &SelectItem, input: &Value) -> Value {
    match item.scalar_function() {
        Some(function) => BuiltinFunctions::scalar(function, item.function_parameters(), input),
        None => input.clone(),
    }
}

/// Rows are value objects: equal when their values are.
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values() == other.values()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values().iter().map(Value::to_string).collect();
        write!(f, "Row[{}]", values.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SimpleDataSetHeader;
    use crate::query::{FromItem, FunctionType, Query};
    use crate::schema::{Column, ColumnType};

    fn name() -> SelectItem {
        SelectItem::column(Column::new("people", "name").with_type(ColumnType::Text))
    }

    fn age() -> SelectItem {
        SelectItem::column(Column::new("people", "age").with_type(ColumnType::Number))
    }

    fn sample() -> Row {
        Row::new(
            SimpleDataSetHeader::shared(vec![name(), age()]),
            vec![Value::from("Annabel"), Value::from(41)],
        )
    }

    #[test]
    fn test_value_equality() {
        let a = sample();
        let b = Row::new(
            SimpleDataSetHeader::shared(vec![name(), age()]),
            vec![Value::from("Annabel"), Value::from(41)],
        );
        assert_eq!(a, b);
        assert_eq!(a.value(5), Value::Null);
        assert_eq!(a.to_string(), "Row[Annabel,41]");
    }

    #[test]
    fn test_evaluate_scalar_function() {
        let row = sample();
        let initials = SelectItem::function(
            FunctionType::Substring,
            Column::new("people", "name").with_type(ColumnType::Text),
        )
        .with_function_parameters(vec![Value::from(1), Value::from(3)]);
        assert_eq!(row.evaluate(&initials), Some(Value::from("Ann")));
        assert_eq!(row.evaluate(&SelectItem::count_all()), None);
    }

    #[test]
    fn test_sub_selection_reorders_and_keeps_styles() {
        let bold = Style {
            bold: true,
            ..Style::default()
        };
        let row = sample().with_styles(vec![bold.clone(), Style::default()]);
        let target = SimpleDataSetHeader::shared(vec![age(), name().with_alias("who")]);
        let projected = row.sub_selection(&target).unwrap();
        assert_eq!(projected.values(), vec![Value::from(41), Value::from("Annabel")]);
        assert_eq!(projected.style(1), Some(&bold));
        assert!(projected.style(0).is_some_and(Style::is_plain));
    }

    #[test]
    fn test_sub_selection_through_subquery_reference() {
        let row = sample();
        let mut subquery = Query::new();
        subquery.select(age());
        let from_item = FromItem::subquery(subquery).with_alias("s");
        let outer = SelectItem::subquery(age(), &from_item).unwrap();
        let projected = row
            .sub_selection(&SimpleDataSetHeader::shared(vec![outer]))
            .unwrap();
        assert_eq!(projected.values(), vec![Value::from(41)]);
    }

    #[test]
    fn test_sub_selection_rejects_missing_item() {
        let row = sample();
        let boss = SelectItem::column(Column::new("people", "boss"));
        let result = row.sub_selection(&SimpleDataSetHeader::shared(vec![name(), boss]));
        assert!(matches!(result, Err(QueryError::ExecutionError(msg)) if msg.contains("boss")));
    }
}
