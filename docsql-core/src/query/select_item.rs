//! Select items: the things a query retrieves.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{QueryError, QueryResult};
use crate::schema::{Column, ColumnType};
use crate::value::Value;

use super::from_item::{FromItem, FromItemKind};
use super::function::FunctionType;

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Stable handle assigned when a select item is constructed.
///
/// Clones share the handle. Any change other than the alias yields a new one,
/// so the handle can key identity caches in place of object addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    fn next() -> Self {
        ItemId(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Reference to a from item by its label (alias, else table name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FromItemRef(String);

impl FromItemRef {
    pub fn new(label: impl Into<String>) -> Self {
        FromItemRef(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, reference: &str) -> bool {
        self.0.eq_ignore_ascii_case(reference)
    }
}

impl fmt::Display for FromItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A column, function application, expression, or subquery reference that
/// a query selects.
#[derive(Debug, Clone)]
pub struct SelectItem {
    id: ItemId,
    column: Option<Column>,
    function: Option<FunctionType>,
    function_parameters: Vec<Value>,
    function_approximation_allowed: bool,
    expression: Option<String>,
    subquery_select_item: Option<Box<SelectItem>>,
    from_item: Option<FromItemRef>,
    alias: Option<String>,
}

impl SelectItem {
    fn build(
        column: Option<Column>,
        function: Option<FunctionType>,
        expression: Option<String>,
        subquery_select_item: Option<Box<SelectItem>>,
        from_item: Option<FromItemRef>,
    ) -> Self {
        Self {
            id: ItemId::next(),
            column,
            function,
            function_parameters: Vec::new(),
            function_approximation_allowed: false,
            expression,
            subquery_select_item,
            from_item,
            alias: None,
        }
    }

    pub fn column(column: Column) -> Self {
        Self::build(Some(column), None, None, None, None)
    }

    /// A column scoped to a specific from item, for disambiguation in joins.
    pub fn column_from(column: Column, from_item: FromItemRef) -> Self {
        Self::build(Some(column), None, None, None, Some(from_item))
    }

    pub fn function(function: FunctionType, column: Column) -> Self {
        Self::build(Some(column), Some(function), None, None, None)
    }

    pub fn function_from(function: FunctionType, column: Column, from_item: Option<FromItemRef>) -> Self {
        Self::build(Some(column), Some(function), None, None, from_item)
    }

    /// The canonical `COUNT(*)` item.
    pub fn count_all() -> Self {
        Self::build(None, Some(FunctionType::Count), Some("*".to_string()), None, None)
    }

    /// A raw expression item. Expression items must be aliased.
    pub fn expression(expression: impl Into<String>, alias: impl Into<String>) -> QueryResult<Self> {
        let alias = alias.into();
        if alias.trim().is_empty() {
            return Err(QueryError::ConfigurationError(
                "Expression-based select items require an alias".to_string(),
            ));
        }
        let mut item = Self::build(None, None, Some(expression.into()), None, None);
        item.alias = Some(alias);
        Ok(item)
    }

    /// A reference into the select clause of the subquery `from_item`, seen
    /// from the outer query. The item must be one the subquery selects.
    pub fn subquery(subquery_select_item: SelectItem, from_item: &FromItem) -> QueryResult<Self> {
        let FromItemKind::SubQuery(query) = from_item.kind() else {
            return Err(QueryError::ConfigurationError(format!(
                "{} is not a subquery",
                from_item.to_sql()
            )));
        };
        if !query
            .select_items()
            .iter()
            .any(|item| item.equals_ignore_alias(&subquery_select_item, true))
        {
            return Err(QueryError::ConfigurationError(format!(
                "Subquery {} does not select {}",
                from_item.to_sql(),
                subquery_select_item.sql_without_alias()
            )));
        }
        Ok(Self::build(
            None,
            None,
            None,
            Some(Box::new(subquery_select_item)),
            from_item.reference(),
        ))
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn without_alias(mut self) -> Self {
        self.alias = None;
        self
    }

    pub fn with_function_approximation_allowed(mut self, allowed: bool) -> Self {
        if self.function_approximation_allowed != allowed {
            self.function_approximation_allowed = allowed;
            self.id = ItemId::next();
        }
        self
    }

    pub fn with_function_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.function_parameters = parameters;
        self.id = ItemId::next();
        self
    }

    /// Same item with a different (or no) function and no alias.
    pub fn replace_function(&self, function: Option<FunctionType>) -> Self {
        let mut item = Self::build(
            self.column.clone(),
            function,
            self.expression.clone(),
            self.subquery_select_item.clone(),
            self.from_item.clone(),
        );
        if self.is_count_all() && function.is_none() {
            item.expression = None;
        }
        if function.is_some() {
            item.function_parameters = self.function_parameters.clone();
        }
        item
    }

    /// Same item in a different scope; used when a resolution pass assigns
    /// unscoped columns to their owning from item.
    pub fn with_from_item(&self, from_item: Option<FromItemRef>) -> Self {
        let mut item = self.clone();
        item.from_item = from_item;
        item.id = ItemId::next();
        item
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn get_column(&self) -> Option<&Column> {
        self.column.as_ref()
    }

    pub fn get_function(&self) -> Option<FunctionType> {
        self.function
    }

    pub fn aggregate_function(&self) -> Option<FunctionType> {
        self.function.filter(|f| f.is_aggregate())
    }

    pub fn scalar_function(&self) -> Option<FunctionType> {
        self.function.filter(|f| f.is_scalar())
    }

    pub fn function_parameters(&self) -> &[Value] {
        &self.function_parameters
    }

    pub fn is_function_approximation_allowed(&self) -> bool {
        self.function_approximation_allowed
    }

    pub fn get_expression(&self) -> Option<&str> {
        if self.is_count_all() {
            None
        } else {
            self.expression.as_deref()
        }
    }

    pub fn subquery_select_item(&self) -> Option<&SelectItem> {
        self.subquery_select_item.as_deref()
    }

    pub fn from_item(&self) -> Option<&FromItemRef> {
        self.from_item.as_ref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn is_count_all(&self) -> bool {
        self.function == Some(FunctionType::Count)
            && self.column.is_none()
            && self.subquery_select_item.is_none()
            && self.expression.as_deref() == Some("*")
    }

    /// Type the values of this item are expected to have, used to coerce
    /// literals compared against it.
    pub fn expected_column_type(&self) -> Option<ColumnType> {
        match self.function {
            Some(FunctionType::Count | FunctionType::Sum | FunctionType::Avg) => {
                Some(ColumnType::Number)
            }
            Some(FunctionType::ToNumber) => Some(ColumnType::Number),
            Some(FunctionType::ToString | FunctionType::Substring) => Some(ColumnType::Text),
            Some(FunctionType::ToDate) => Some(ColumnType::Temporal),
            Some(FunctionType::ToBoolean) => Some(ColumnType::Boolean),
            Some(FunctionType::MapValue) => None,
            _ => match (&self.column, &self.subquery_select_item) {
                (Some(column), _) => column.column_type,
                (None, Some(inner)) => inner.expected_column_type(),
                _ => None,
            },
        }
    }

    /// Structural equality without alias. `strict` additionally requires the
    /// same from-item scope.
    pub fn equals_ignore_alias(&self, other: &SelectItem, strict: bool) -> bool {
        if self.id == other.id {
            return true;
        }
        if strict && self.from_item != other.from_item {
            return false;
        }
        let subqueries_equal = match (&self.subquery_select_item, &other.subquery_select_item) {
            (Some(a), Some(b)) => a.equals_ignore_alias(b, strict),
            (None, None) => true,
            _ => false,
        };
        subqueries_equal
            && self.column == other.column
            && self.function == other.function
            && self.function_parameters == other.function_parameters
            && self.function_approximation_allowed == other.function_approximation_allowed
            && self.expression == other.expression
    }

    /// Display label used for column headings.
    pub fn label(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.sql_without_alias(),
        }
    }

    /// SQL for this item without the trailing `AS alias`.
    pub fn sql_without_alias(&self) -> String {
        let body = if let Some(inner) = &self.subquery_select_item {
            let inner_ref = match inner.alias() {
                Some(alias) => alias.to_string(),
                None => inner.sql_without_alias(),
            };
            match &self.from_item {
                Some(from) => format!("{}.{}", from, inner_ref),
                None => inner_ref,
            }
        } else if let Some(column) = &self.column {
            match &self.from_item {
                Some(from) => format!("{}.{}", from, column.name),
                None => column.name.clone(),
            }
        } else if let Some(expression) = &self.expression {
            expression.clone()
        } else {
            String::new()
        };

        match self.function {
            Some(function) => {
                let mut args = vec![body];
                args.extend(self.function_parameters.iter().map(Value::to_sql));
                let prefix = if self.function_approximation_allowed {
                    "APPROXIMATE "
                } else {
                    ""
                };
                format!("{}{}({})", prefix, function, args.join(", "))
            }
            None => body,
        }
    }

    pub fn to_sql(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.sql_without_alias(), alias),
            None => self.sql_without_alias(),
        }
    }
}

impl PartialEq for SelectItem {
    fn eq(&self, other: &Self) -> bool {
        self.alias == other.alias && self.equals_ignore_alias(other, true)
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
