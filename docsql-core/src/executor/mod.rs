//! Executor module: relational operators and the post-processing
//! orchestrator.
//!
//! Rows come from an external [`RowSource`]; everything the source cannot do
//! natively (filtering, joins, grouping, ordering, paging) is done here over
//! [`DataSet`](crate::dataset::DataSet) streams.

mod builtins;
pub mod helpers;
mod postprocess;

pub use builtins::BuiltinFunctions;
pub use postprocess::{CompiledQuery, PostprocessExecutor};

use serde::{Deserialize, Serialize};

use crate::dataset::{BoxedDataSet, InMemoryDataSet, Row, SimpleDataSetHeader};
use crate::error::{QueryError, QueryResult};
use crate::query::{FilterItem, SelectItem};
use crate::schema::{Column, Table};
use crate::value::Value;

/// Resolves table tokens of a FROM clause to schema objects.
pub trait TableResolver {
    /// Look a table up by name; implementations decide how lenient the
    /// match is.
    fn table_by_qualified_label(&self, label: &str) -> Option<Table>;

    /// Names of every table, for listings.
    fn table_names(&self) -> Vec<String> {
        vec![]
    }
}

/// The data source the orchestrator delegates row production to.
pub trait RowSource: TableResolver {
    /// All rows of `table`, restricted to `columns` in that order. The
    /// header holds one unscoped column item per column.
    ///
    /// `max_rows` is a hint; sources may return more rows.
    fn materialize_columns(
        &self,
        table: &Table,
        columns: &[Column],
        max_rows: Option<usize>,
    ) -> QueryResult<BoxedDataSet>;

    /// Rows of `table` shaped by `select_items`, filtered by `where_items`
    /// and paged.
    ///
    /// The default reads the needed columns and post-processes the rest.
    fn materialize_table(
        &self,
        table: &Table,
        select_items: &[SelectItem],
        where_items: &[FilterItem],
        first_row: usize,
        max_rows: Option<usize>,
    ) -> QueryResult<BoxedDataSet> {
        let mut columns: Vec<Column> = Vec::new();
        let referenced = where_items.iter().flat_map(|f| f.referenced_items());
        for item in select_items.iter().chain(referenced) {
            if let Some(column) = item.get_column() {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        // Row counts only survive filtering and skipping when there is none.
        let source_limit = if where_items.is_empty() && first_row <= 1 {
            max_rows
        } else {
            None
        };
        let data_set = self.materialize_columns(table, &columns, source_limit)?;
        let data_set = helpers::filtered(data_set, where_items);
        let data_set = helpers::paged(data_set, first_row, max_rows);
        helpers::selection(select_items, data_set)
    }

    /// Count the rows of `table` matching `where_items` natively.
    /// `Ok(None)` declines and the orchestrator counts by itself.
    fn execute_count_query(
        &self,
        _table: &Table,
        _where_items: &[FilterItem],
        _approximation_allowed: bool,
    ) -> QueryResult<Option<u64>> {
        Ok(None)
    }

    /// Fetch the row whose primary key equals `key`, shaped by
    /// `select_items`. `Ok(None)` declines, also when the key is absent, and
    /// the orchestrator falls back to a scan.
    fn execute_primary_key_lookup(
        &self,
        _table: &Table,
        _select_items: &[SelectItem],
        _primary_key: &Column,
        _key: &Value,
    ) -> QueryResult<Option<Row>> {
        Ok(None)
    }
}

/// Switches for parser leniency and the acceleration hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    /// Accept raw expression select items (they must be aliased).
    pub allow_expression_select_items: bool,
    /// Offer `SELECT COUNT(*)` queries to [`RowSource::execute_count_query`].
    pub count_pushdown: bool,
    /// Offer primary-key equality queries to
    /// [`RowSource::execute_primary_key_lookup`].
    pub primary_key_lookup: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            allow_expression_select_items: false,
            count_pushdown: true,
            primary_key_lookup: true,
        }
    }
}

impl ExecutorOptions {
    /// Every shortcut disabled; all work goes through post-processing.
    pub fn postprocess_only() -> Self {
        Self {
            allow_expression_select_items: false,
            count_pushdown: false,
            primary_key_lookup: false,
        }
    }
}

/// In-memory row source for testing
#[derive(Debug, Default, Clone)]
pub struct InMemoryRowSource {
    tables: Vec<(Table, Vec<Vec<Value>>)>,
}

impl InMemoryRowSource {
    /// Create a new empty in-memory row source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with rows given in column order
    pub fn add_table(&mut self, table: Table, rows: Vec<Vec<Value>>) {
        self.tables.retain(|(t, _)| t.name != table.name);
        self.tables.push((table, rows));
    }

    pub fn with_table(mut self, table: Table, rows: Vec<Vec<Value>>) -> Self {
        self.add_table(table, rows);
        self
    }

    /// Append one row to an existing table
    pub fn insert(&mut self, table: &str, row: Vec<Value>) -> QueryResult<()> {
        let (_, rows) = self
            .tables
            .iter_mut()
            .find(|(t, _)| t.name == table)
            .ok_or_else(|| QueryError::TableNotFound(table.to_string()))?;
        rows.push(row);
        Ok(())
    }

    fn rows_of(&self, table: &Table) -> QueryResult<&[Vec<Value>]> {
        self.tables
            .iter()
            .find(|(t, _)| t.name == table.name)
            .map(|(_, rows)| rows.as_slice())
            .ok_or_else(|| QueryError::TableNotFound(table.name.clone()))
    }
}

impl TableResolver for InMemoryRowSource {
    fn table_by_qualified_label(&self, label: &str) -> Option<Table> {
        self.tables
            .iter()
            .map(|(t, _)| t)
            .find(|t| t.name == label)
            .or_else(|| {
                self.tables
                    .iter()
                    .map(|(t, _)| t)
                    .find(|t| t.name.eq_ignore_ascii_case(label))
            })
            .cloned()
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|(t, _)| t.name.clone()).collect()
    }
}

impl RowSource for InMemoryRowSource {
    fn materialize_columns(
        &self,
        table: &Table,
        columns: &[Column],
        max_rows: Option<usize>,
    ) -> QueryResult<BoxedDataSet> {
        let stored = self.rows_of(table)?;
        let indexes: Vec<Option<usize>> = columns.iter().map(|c| table.column_index(c)).collect();
        let header = SimpleDataSetHeader::shared(columns.iter().cloned().map(SelectItem::column).collect());

        let rows = stored
            .iter()
            .take(max_rows.unwrap_or(usize::MAX))
            .map(|values| {
                let projected = indexes
                    .iter()
                    .map(|i| i.and_then(|i| values.get(i)).cloned().unwrap_or_default())
                    .collect();
                Row::new(header.clone(), projected)
            })
            .collect();
        Ok(Box::new(InMemoryDataSet::new(header, rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSetExt;
    use crate::query::{FromItemRef, Operand, OperatorType};
    use crate::schema::ColumnType;

    fn people() -> Table {
        Table::new("people")
            .with_primary_key("id", ColumnType::Number)
            .with_column("name", ColumnType::Text)
    }

    fn source() -> InMemoryRowSource {
        InMemoryRowSource::new().with_table(
            people(),
            vec![
                vec![Value::from(1), Value::from("Ann")],
                vec![Value::from(2), Value::from("Bob")],
                vec![Value::from(3), Value::from("Cid")],
            ],
        )
    }

    #[test]
    fn test_table_lookup() {
        let source = source();
        assert!(source.table_by_qualified_label("people").is_some());
        assert!(source.table_by_qualified_label("PEOPLE").is_some());
        assert!(source.table_by_qualified_label("orders").is_none());
        assert_eq!(source.table_names(), vec!["people".to_string()]);
    }

    #[test]
    fn test_materialize_columns() {
        let source = source();
        let table = people();
        let mut data_set = source
            .materialize_columns(&table, &[table.columns[1].clone()], Some(2))
            .unwrap();
        assert_eq!(
            data_set.to_object_arrays().unwrap(),
            vec![vec![Value::from("Ann")], vec![Value::from("Bob")]]
        );
    }

    #[test]
    fn test_default_materialize_table() {
        let source = source();
        let table = people();
        let name = SelectItem::column_from(table.columns[1].clone(), FromItemRef::new("people"));
        let id = SelectItem::column(table.columns[0].clone());
        let filter = FilterItem::new(id, OperatorType::GreaterThan, Operand::Value(Value::from(1)));

        let mut data_set = source
            .materialize_table(&table, &[name], &[filter], 1, Some(1))
            .unwrap();
        assert_eq!(data_set.to_object_arrays().unwrap(), vec![vec![Value::from("Bob")]]);
    }

    #[test]
    fn test_insert_into_unknown_table() {
        let mut source = source();
        assert!(source.insert("people", vec![Value::from(4), Value::from("Dee")]).is_ok());
        assert!(matches!(
            source.insert("orders", vec![]),
            Err(QueryError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_options_defaults() {
        let options = ExecutorOptions::default();
        assert!(!options.allow_expression_select_items);
        assert!(options.count_pushdown && options.primary_key_lookup);
        let parsed: ExecutorOptions = serde_json::from_str(r#"{"count_pushdown": false}"#).unwrap();
        assert!(!parsed.count_pushdown);
        assert!(parsed.primary_key_lookup);
    }
}
