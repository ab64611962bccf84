//! Schema objects handed out by row sources: tables and their columns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad type of a column, used to coerce literals while parsing filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Boolean,
    Temporal,
    Other,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Text => "TEXT",
            ColumnType::Number => "NUMBER",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Temporal => "TEMPORAL",
            ColumnType::Other => "OTHER",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Name of the owning table.
    pub table: String,
    pub column_type: Option<ColumnType>,
    #[serde(default)]
    pub primary_key: bool,
}

impl Column {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            column_type: None,
            primary_key: false,
        }
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn qualified_label(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Append a column owned by this table.
    pub fn add_column(&mut self, name: impl Into<String>, column_type: Option<ColumnType>) -> &mut Column {
        self.columns.push(Column {
            name: name.into(),
            table: self.name.clone(),
            column_type,
            primary_key: false,
        });
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    pub fn with_column(mut self, name: &str, column_type: ColumnType) -> Self {
        self.add_column(name, Some(column_type));
        self
    }

    pub fn with_primary_key(mut self, name: &str, column_type: ColumnType) -> Self {
        self.add_column(name, Some(column_type)).primary_key = true;
        self
    }

    /// Exact match first, then case-insensitive.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn column_index(&self, column: &Column) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column.name)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }
}
