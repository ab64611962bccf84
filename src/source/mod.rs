//! File-backed documents exposed as queryable tables.
//!
//! A [`DocumentDataContext`] loads every registered file once, derives a
//! schema from the documents and serves rows to the query engine. Loaded
//! tables are cached until [`DocumentDataContext::refresh_schemas`] re-reads
//! the files.

mod delimited;
mod json;

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use docsql_core::dataset::{InMemoryDataSet, Row, SimpleDataSetHeader};
use docsql_core::executor::helpers;
use docsql_core::{
    BoxedDataSet, Column, ColumnType, DataSetExt, FilterItem, Operand, OperatorType, QueryError,
    QueryResult, RowSource, SelectItem, Table, TableResolver, Value,
};
use serde::{Deserialize, Serialize};

use crate::config::{Config, TableConfig};
use crate::error::{DocSqlError, DocSqlResult};

/// Top-level fields of one document, in document order.
pub type Document = Vec<(String, Value)>;

/// Primary key columns picked when none is configured, in order.
const DEFAULT_KEY_COLUMNS: &[&str] = &["_key", "id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// A JSON array of objects, or a single object
    Json,
    /// One JSON object per line
    Jsonl,
    /// Comma separated values with a header row
    Csv,
}

impl DocumentFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> DocSqlResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        extension.parse().map_err(|_| {
            DocSqlError::Config(format!(
                "Cannot tell the document format of {}, set `format` explicitly",
                path.display()
            ))
        })
    }
}

impl FromStr for DocumentFormat {
    type Err = DocSqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(DocumentFormat::Json),
            "jsonl" | "ndjson" => Ok(DocumentFormat::Jsonl),
            "csv" => Ok(DocumentFormat::Csv),
            other => Err(DocSqlError::Config(format!("Unknown document format: {}", other))),
        }
    }
}

/// Read every document of a file.
pub fn load_documents(path: &Path, format: DocumentFormat) -> DocSqlResult<Vec<Document>> {
    match format {
        DocumentFormat::Json => json::read_json(path),
        DocumentFormat::Jsonl => json::read_json_lines(path),
        DocumentFormat::Csv => delimited::read_csv(path),
    }
}

fn column_type_of(value: &Value) -> Option<ColumnType> {
    match value {
        Value::Null => None,
        Value::Boolean(_) => Some(ColumnType::Boolean),
        Value::Integer(_) | Value::Float(_) => Some(ColumnType::Number),
        Value::Text(_) => Some(ColumnType::Text),
        Value::Temporal(_) => Some(ColumnType::Temporal),
        Value::Other(_) => Some(ColumnType::Other),
    }
}

/// A table with its rows and the primary key index.
#[derive(Debug)]
struct LoadedTable {
    table: Table,
    rows: Vec<Vec<Value>>,
    key_column: Option<usize>,
    key_index: HashMap<Value, usize>,
}

impl LoadedTable {
    fn build(name: &str, documents: Vec<Document>, primary_key: Option<&str>) -> Self {
        let mut table = Table::new(name);
        let mut positions: HashMap<String, usize> = HashMap::new();
        for document in &documents {
            for (key, value) in document {
                match positions.get(key) {
                    Some(&i) => {
                        if table.columns[i].column_type.is_none() {
                            table.columns[i].column_type = column_type_of(value);
                        }
                    }
                    None => {
                        positions.insert(key.clone(), table.columns.len());
                        table.add_column(key.clone(), column_type_of(value));
                    }
                }
            }
        }

        let width = table.columns.len();
        let rows: Vec<Vec<Value>> = documents
            .into_iter()
            .map(|document| {
                let mut row = vec![Value::Null; width];
                for (key, value) in document {
                    if let Some(&i) = positions.get(&key) {
                        row[i] = value;
                    }
                }
                row
            })
            .collect();

        let key_column = match primary_key {
            Some(configured) => {
                let found = table.columns.iter().position(|c| c.name == configured);
                if found.is_none() {
                    tracing::warn!("Primary key column {} not found in table {}", configured, name);
                }
                found
            }
            None => DEFAULT_KEY_COLUMNS
                .iter()
                .find_map(|candidate| table.columns.iter().position(|c| c.name == *candidate)),
        };

        let mut key_index = HashMap::new();
        if let Some(column) = key_column {
            table.columns[column].primary_key = true;
            let mut duplicates = 0usize;
            for (position, row) in rows.iter().enumerate() {
                let key = &row[column];
                if key.is_null() {
                    continue;
                }
                if key_index.contains_key(key) {
                    duplicates += 1;
                } else {
                    key_index.insert(key.clone(), position);
                }
            }
            if duplicates > 0 {
                tracing::warn!(
                    "Table {} has {} duplicate values in primary key column {}",
                    name,
                    duplicates,
                    table.columns[column].name
                );
            }
        }

        Self {
            table,
            rows,
            key_column,
            key_index,
        }
    }

    fn full_row(&self, position: usize) -> Row {
        let header = SimpleDataSetHeader::shared(
            self.table.columns.iter().cloned().map(SelectItem::column).collect(),
        );
        Row::new(header, self.rows[position].clone())
    }
}

/// Serves JSON, JSON Lines and CSV files as tables.
#[derive(Debug, Default)]
pub struct DocumentDataContext {
    sources: Vec<TableConfig>,
    tables: DashMap<String, Arc<LoadedTable>>,
}

impl DocumentDataContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every table of `config`, paths resolved against its data
    /// directory.
    pub fn from_config(config: &Config) -> DocSqlResult<Self> {
        let mut context = Self::new();
        for table_config in &config.tables {
            let mut table_config = table_config.clone();
            table_config.path = config.resolve_path(&table_config.path);
            context.register(table_config)?;
        }
        Ok(context)
    }

    /// Load a file and expose it under `table_config.name`.
    pub fn register(&mut self, table_config: TableConfig) -> DocSqlResult<()> {
        if self
            .sources
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(&table_config.name))
        {
            return Err(DocSqlError::Config(format!(
                "Table {} is registered twice",
                table_config.name
            )));
        }
        let loaded = load_table(&table_config)?;
        self.tables.insert(table_config.name.clone(), Arc::new(loaded));
        self.sources.push(table_config);
        Ok(())
    }

    /// Re-read every registered file and rebuild its schema.
    pub fn refresh_schemas(&self) -> DocSqlResult<()> {
        for table_config in &self.sources {
            let loaded = load_table(table_config)?;
            self.tables.insert(table_config.name.clone(), Arc::new(loaded));
        }
        tracing::info!("Refreshed {} tables", self.sources.len());
        Ok(())
    }

    /// Number of rows in a table.
    pub fn row_count(&self, name: &str) -> DocSqlResult<usize> {
        self.lookup(name)
            .map(|loaded| loaded.rows.len())
            .ok_or_else(|| DocSqlError::TableNotRegistered(name.to_string()))
    }

    fn lookup(&self, label: &str) -> Option<Arc<LoadedTable>> {
        if let Some(entry) = self.tables.get(label) {
            return Some(Arc::clone(entry.value()));
        }
        self.tables
            .iter()
            .find(|entry| entry.key().eq_ignore_ascii_case(label))
            .map(|entry| Arc::clone(entry.value()))
    }

    fn loaded(&self, table: &Table) -> QueryResult<Arc<LoadedTable>> {
        self.tables
            .get(&table.name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| QueryError::TableNotFound(table.name.clone()))
    }
}

fn load_table(table_config: &TableConfig) -> DocSqlResult<LoadedTable> {
    let format = match table_config.format {
        Some(format) => format,
        None => DocumentFormat::from_path(&table_config.path)?,
    };
    let documents = load_documents(&table_config.path, format)?;
    tracing::info!(
        "Loaded {} documents into table {} from {}",
        documents.len(),
        table_config.name,
        table_config.path.display()
    );
    Ok(LoadedTable::build(
        &table_config.name,
        documents,
        table_config.primary_key.as_deref(),
    ))
}

/// `column = literal` with a plain column on the left.
fn is_single_equality(filter: &FilterItem) -> bool {
    !filter.is_compound()
        && filter.operator() == Some(OperatorType::EqualsTo)
        && matches!(filter.operand(), Some(Operand::Value(_)))
        && filter
            .select_item()
            .is_some_and(|item| item.get_function().is_none() && item.get_column().is_some())
}

impl TableResolver for DocumentDataContext {
    fn table_by_qualified_label(&self, label: &str) -> Option<Table> {
        self.lookup(label).map(|loaded| loaded.table.clone())
    }

    fn table_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }
}

impl RowSource for DocumentDataContext {
    fn materialize_columns(
        &self,
        table: &Table,
        columns: &[Column],
        max_rows: Option<usize>,
    ) -> QueryResult<BoxedDataSet> {
        let loaded = self.loaded(table)?;
        let indexes: Vec<Option<usize>> = columns
            .iter()
            .map(|c| loaded.table.column_index(c))
            .collect();
        let header = SimpleDataSetHeader::shared(
            columns.iter().cloned().map(SelectItem::column).collect(),
        );

        let rows = loaded
            .rows
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

    fn execute_count_query(
        &self,
        table: &Table,
        where_items: &[FilterItem],
        _approximation_allowed: bool,
    ) -> QueryResult<Option<u64>> {
        match where_items {
            [] => {
                let loaded = self.loaded(table)?;
                Ok(Some(loaded.rows.len() as u64))
            }
            [filter] if is_single_equality(filter) => {
                let Some(column) = filter.select_item().and_then(SelectItem::get_column) else {
                    return Ok(None);
                };
                let data_set = self.materialize_columns(table, std::slice::from_ref(column), None)?;
                let mut data_set = helpers::filtered(data_set, where_items);
                let count = data_set.to_rows()?.len();
                tracing::debug!("Counted {} rows of {} matching {}", count, table.name, filter);
                Ok(Some(count as u64))
            }
            _ => Ok(None),
        }
    }

    fn execute_primary_key_lookup(
        &self,
        table: &Table,
        _select_items: &[SelectItem],
        primary_key: &Column,
        key: &Value,
    ) -> QueryResult<Option<Row>> {
        let loaded = self.loaded(table)?;
        let Some(column) = loaded.key_column else {
            return Ok(None);
        };
        if loaded.table.columns[column].name != primary_key.name {
            return Ok(None);
        }
        Ok(loaded
            .key_index
            .get(key)
            .map(|&position| loaded.full_row(position)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, file: &str, content: &str) -> PathBuf {
        let path = dir.path().join(file);
        fs::write(&path, content).unwrap();
        path
    }

    fn table_config(name: &str, path: PathBuf) -> TableConfig {
        TableConfig {
            name: name.to_string(),
            path,
            format: None,
            primary_key: None,
        }
    }

    fn people_context(dir: &TempDir) -> DocumentDataContext {
        let path = write(
            dir,
            "people.json",
            r#"[
                {"id": 1, "name": "Ann", "age": 30},
                {"id": 2, "name": "Bob", "age": null, "email": "bob@example.com"},
                {"id": 3, "name": "Ann", "age": 41}
            ]"#,
        );
        let mut context = DocumentDataContext::new();
        context.register(table_config("people", path)).unwrap();
        context
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/b.json")).unwrap(),
            DocumentFormat::Json
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("b.NDJSON")).unwrap(),
            DocumentFormat::Jsonl
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("b.csv")).unwrap(),
            DocumentFormat::Csv
        );
        assert!(DocumentFormat::from_path(Path::new("b.txt")).is_err());
    }

    #[test]
    fn test_schema_union_of_keys() {
        let dir = TempDir::new().unwrap();
        let context = people_context(&dir);
        let table = context.table_by_qualified_label("people").unwrap();

        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "age", "email"]);
        assert_eq!(table.columns[2].column_type, Some(ColumnType::Number));
        assert_eq!(table.columns[3].column_type, Some(ColumnType::Text));
        assert!(table.columns[0].primary_key);
        assert_eq!(context.row_count("people").unwrap(), 3);
    }

    #[test]
    fn test_table_lookup_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let context = people_context(&dir);
        assert!(context.table_by_qualified_label("PEOPLE").is_some());
        assert!(context.table_by_qualified_label("nobody").is_none());
        assert_eq!(context.table_names(), vec!["people".to_string()]);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut context = people_context(&dir);
        let path = dir.path().join("people.json");
        assert!(matches!(
            context.register(table_config("People", path)),
            Err(DocSqlError::Config(_))
        ));
    }

    #[test]
    fn test_materialize_columns_fills_missing_with_null() {
        let dir = TempDir::new().unwrap();
        let context = people_context(&dir);
        let table = context.table_by_qualified_label("people").unwrap();
        let email = table.column_by_name("email").unwrap().clone();

        let mut data_set = context.materialize_columns(&table, &[email], None).unwrap();
        assert_eq!(
            data_set.to_object_arrays().unwrap(),
            vec![
                vec![Value::Null],
                vec![Value::from("bob@example.com")],
                vec![Value::Null],
            ]
        );
    }

    #[test]
    fn test_count_hook() {
        let dir = TempDir::new().unwrap();
        let context = people_context(&dir);
        let table = context.table_by_qualified_label("people").unwrap();
        let name = table.column_by_name("name").unwrap().clone();

        assert_eq!(context.execute_count_query(&table, &[], false).unwrap(), Some(3));

        let equals_ann = FilterItem::new(
            SelectItem::column(name.clone()),
            OperatorType::EqualsTo,
            Operand::Value(Value::from("Ann")),
        );
        assert_eq!(
            context.execute_count_query(&table, &[equals_ann], false).unwrap(),
            Some(2)
        );

        let like = FilterItem::new(
            SelectItem::column(name),
            OperatorType::Like,
            Operand::Value(Value::from("A%")),
        );
        assert_eq!(context.execute_count_query(&table, &[like], false).unwrap(), None);
    }

    #[test]
    fn test_primary_key_lookup() {
        let dir = TempDir::new().unwrap();
        let context = people_context(&dir);
        let table = context.table_by_qualified_label("people").unwrap();
        let id = table.column_by_name("id").unwrap().clone();

        let row = context
            .execute_primary_key_lookup(&table, &[], &id, &Value::from(2))
            .unwrap()
            .unwrap();
        assert_eq!(row.value(1), Value::from("Bob"));

        assert!(context
            .execute_primary_key_lookup(&table, &[], &id, &Value::from(9))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_configured_primary_key() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "codes.jsonl",
            "{\"id\": 1, \"code\": \"a\"}\n{\"id\": 2, \"code\": \"b\"}\n",
        );
        let mut context = DocumentDataContext::new();
        context
            .register(TableConfig {
                primary_key: Some("code".to_string()),
                ..table_config("codes", path)
            })
            .unwrap();

        let table = context.table_by_qualified_label("codes").unwrap();
        let keys: Vec<&str> = table.primary_keys().map(|c| c.name.as_str()).collect();
        assert_eq!(keys, vec!["code"]);
    }

    #[test]
    fn test_refresh_schemas_rereads_files() {
        let dir = TempDir::new().unwrap();
        let context = people_context(&dir);
        write(&dir, "people.json", r#"[{"id": 7, "nickname": "G"}]"#);

        assert_eq!(context.row_count("people").unwrap(), 3);
        context.refresh_schemas().unwrap();
        assert_eq!(context.row_count("people").unwrap(), 1);

        let table = context.table_by_qualified_label("people").unwrap();
        assert!(table.column_by_name("nickname").is_some());
        assert!(table.column_by_name("email").is_none());
    }
}
