//! Structured query model.
//!
//! A [`Query`] holds six ordered clauses (select, from, where, group by,
//! having, order by) plus paging. It is built by the parser or
//! programmatically and never mutated while it executes.

mod filter_item;
mod from_item;
mod function;
mod select_item;

pub use filter_item::{like_regex, FilterItem, LogicalOperator, Operand, OperatorType};
pub use from_item::{FromItem, FromItemKind, JoinItem, JoinType};
pub use function::FunctionType;
pub use select_item::{FromItemRef, ItemId, SelectItem};

use std::fmt;

use crate::error::QueryResult;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct GroupByItem {
    pub item: SelectItem,
}

impl GroupByItem {
    pub fn new(item: SelectItem) -> Self {
        Self { item }
    }
}

impl PartialEq for GroupByItem {
    fn eq(&self, other: &Self) -> bool {
        self.item.equals_ignore_alias(&other.item, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ascending => f.write_str("ASC"),
            Direction::Descending => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderByItem {
    pub item: SelectItem,
    pub direction: Direction,
}

impl OrderByItem {
    pub fn new(item: SelectItem, direction: Direction) -> Self {
        Self { item, direction }
    }

    pub fn ascending(item: SelectItem) -> Self {
        Self::new(item, Direction::Ascending)
    }

    pub fn descending(item: SelectItem) -> Self {
        Self::new(item, Direction::Descending)
    }

    pub fn is_ascending(&self) -> bool {
        self.direction == Direction::Ascending
    }
}

impl PartialEq for OrderByItem {
    fn eq(&self, other: &Self) -> bool {
        self.direction == other.direction && self.item.equals_ignore_alias(&other.item, true)
    }
}

/// The aggregate root of the query model.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    select: Vec<SelectItem>,
    distinct: bool,
    from: Vec<FromItem>,
    where_items: Vec<FilterItem>,
    group_by: Vec<GroupByItem>,
    having: Vec<FilterItem>,
    order_by: Vec<OrderByItem>,
    first_row: usize,
    max_rows: Option<usize>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            select: Vec::new(),
            distinct: false,
            from: Vec::new(),
            where_items: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            first_row: 1,
            max_rows: None,
        }
    }

    pub fn select(&mut self, item: SelectItem) -> &mut Self {
        self.select.push(item);
        self
    }

    /// Select every column of every from item added so far.
    pub fn select_all(&mut self) -> &mut Self {
        let mut items = Vec::new();
        for from_item in &self.from {
            for leaf in from_item.leaves() {
                items.extend(all_items_of(leaf));
            }
        }
        self.select.extend(items);
        self
    }

    pub fn set_distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    pub fn from(&mut self, item: FromItem) -> &mut Self {
        self.from.push(item);
        self
    }

    pub fn where_item(&mut self, item: FilterItem) -> &mut Self {
        self.where_items.push(item);
        self
    }

    pub fn group_by(&mut self, item: SelectItem) -> &mut Self {
        self.group_by.push(GroupByItem::new(item));
        self
    }

    pub fn having(&mut self, item: FilterItem) -> &mut Self {
        self.having.push(item);
        self
    }

    pub fn order_by(&mut self, item: OrderByItem) -> &mut Self {
        self.order_by.push(item);
        self
    }

    /// 1-based index of the first row returned. Values below 1 mean 1.
    pub fn set_first_row(&mut self, first_row: usize) -> &mut Self {
        self.first_row = first_row.max(1);
        self
    }

    pub fn set_max_rows(&mut self, max_rows: Option<usize>) -> &mut Self {
        self.max_rows = max_rows;
        self
    }

    pub fn select_items(&self) -> &[SelectItem] {
        &self.select
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn from_items(&self) -> &[FromItem] {
        &self.from
    }

    pub fn where_items(&self) -> &[FilterItem] {
        &self.where_items
    }

    pub fn group_by_items(&self) -> &[GroupByItem] {
        &self.group_by
    }

    pub fn having_items(&self) -> &[FilterItem] {
        &self.having
    }

    pub fn order_by_items(&self) -> &[OrderByItem] {
        &self.order_by
    }

    pub fn first_row(&self) -> usize {
        self.first_row
    }

    pub fn max_rows(&self) -> Option<usize> {
        self.max_rows
    }

    /// Select item carrying the given alias (case-insensitive).
    pub fn find_select_item_by_alias(&self, alias: &str) -> Option<&SelectItem> {
        self.select
            .iter()
            .find(|item| item.alias().is_some_and(|a| a.eq_ignore_ascii_case(alias)))
    }

    /// Resolve a reference (alias or table name) against the from clause.
    pub fn find_from_item(&self, reference: &str) -> Option<&FromItem> {
        self.from
            .iter()
            .find_map(|item| item.find_by_reference(reference))
    }

    /// Number of positional parameters in WHERE and HAVING.
    pub fn parameter_count(&self) -> usize {
        self.where_items
            .iter()
            .chain(&self.having)
            .map(FilterItem::parameter_count)
            .max()
            .unwrap_or(0)
    }

    /// Clone with every `?` operand replaced by the value at its position.
    pub fn with_parameters(&self, parameters: &[Value]) -> QueryResult<Query> {
        let mut query = self.clone();
        query.where_items = self
            .where_items
            .iter()
            .map(|f| f.with_parameters(parameters))
            .collect::<QueryResult<_>>()?;
        query.having = self
            .having
            .iter()
            .map(|f| f.with_parameters(parameters))
            .collect::<QueryResult<_>>()?;
        Ok(query)
    }

    /// Normalised copy: unscoped columns are scoped to the from item owning
    /// their table, aliases are dropped outside the select clause, and
    /// subqueries are resolved recursively.
    ///
    /// Two queries describing the same retrieval compare equal once resolved,
    /// whichever way their items were written.
    pub fn resolved(&self) -> Query {
        let leaves: Vec<&FromItem> = self.from.iter().flat_map(|f| f.leaves()).collect();
        let scope = |item: &SelectItem| scope_item(item, &leaves);

        Query {
            select: self.select.iter().map(scope).collect(),
            distinct: self.distinct,
            from: self.from.iter().map(|f| f.resolved(&scope)).collect(),
            where_items: self
                .where_items
                .iter()
                .map(|f| f.map_items(&|i| scope(i).without_alias()))
                .collect(),
            group_by: self
                .group_by
                .iter()
                .map(|g| GroupByItem::new(scope(&g.item).without_alias()))
                .collect(),
            having: self
                .having
                .iter()
                .map(|f| f.map_items(&|i| scope(i).without_alias()))
                .collect(),
            order_by: self
                .order_by
                .iter()
                .map(|o| OrderByItem::new(scope(&o.item).without_alias(), o.direction))
                .collect(),
            first_row: self.first_row,
            max_rows: self.max_rows,
        }
    }

    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&join_sql(self.select.iter().map(SelectItem::to_sql), ", "));
        sql.push_str(" FROM ");
        sql.push_str(&join_sql(self.from.iter().map(FromItem::to_sql), ", "));
        if !self.where_items.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&join_sql(self.where_items.iter().map(FilterItem::to_sql), " AND "));
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&join_sql(
                self.group_by.iter().map(|g| g.item.sql_without_alias()),
                ", ",
            ));
        }
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&join_sql(self.having.iter().map(FilterItem::to_sql), " AND "));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&join_sql(
                self.order_by
                    .iter()
                    .map(|o| format!("{} {}", o.item.sql_without_alias(), o.direction)),
                ", ",
            ));
        }
        if let Some(max_rows) = self.max_rows {
            sql.push_str(&format!(" LIMIT {}", max_rows));
        }
        if self.first_row > 1 {
            sql.push_str(&format!(" OFFSET {}", self.first_row - 1));
        }
        sql
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

fn join_sql(parts: impl Iterator<Item = String>, separator: &str) -> String {
    parts.collect::<Vec<_>>().join(separator)
}

/// Every column a leaf from item exposes, scoped to it.
pub(crate) fn all_items_of(from_item: &FromItem) -> Vec<SelectItem> {
    let reference = from_item.reference();
    match from_item.kind() {
        FromItemKind::Table(table) => table
            .columns
            .iter()
            .map(|column| match &reference {
                Some(r) => SelectItem::column_from(column.clone(), r.clone()),
                None => SelectItem::column(column.clone()),
            })
            .collect(),
        FromItemKind::SubQuery(query) => query
            .select_items()
            .iter()
            .filter_map(|inner| SelectItem::subquery(inner.clone(), from_item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn scope_item(item: &SelectItem, leaves: &[&FromItem]) -> SelectItem {
    if item.from_item().is_some() {
        return item.clone();
    }
    let Some(column) = item.get_column() else {
        return item.clone();
    };
    let mut owners = leaves.iter().filter(|leaf| {
        leaf.get_table()
            .is_some_and(|t| t.name == column.table && t.column_by_name(&column.name).is_some())
    });
    match (owners.next(), owners.next()) {
        (Some(owner), None) => item.with_from_item(owner.reference()),
        _ => item.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnType, Table};

    fn people() -> Table {
        Table::new("people")
            .with_primary_key("id", ColumnType::Number)
            .with_column("name", ColumnType::Text)
    }

    #[test]
    fn test_builder_and_sql() {
        let table = people();
        let name = SelectItem::column(table.columns[1].clone());
        let mut query = Query::new();
        query
            .from(FromItem::table(table.clone()))
            .select(name.clone())
            .select(SelectItem::count_all().with_alias("c"))
            .group_by(name.clone())
            .order_by(OrderByItem::descending(name.clone()))
            .set_max_rows(Some(10))
            .set_first_row(3);

        assert_eq!(
            query.to_sql(),
            "SELECT name, COUNT(*) AS c FROM people GROUP BY name ORDER BY name DESC LIMIT 10 OFFSET 2"
        );
        assert_eq!(query.first_row(), 3);
        assert!(query.find_select_item_by_alias("C").is_some());
    }

    #[test]
    fn test_select_all_scopes_items() {
        let mut query = Query::new();
        query.from(FromItem::table(people()).with_alias("p")).select_all();
        assert_eq!(query.select_items().len(), 2);
        assert_eq!(query.to_sql(), "SELECT p.id, p.name FROM people p");
    }

    #[test]
    fn test_resolved_scopes_unscoped_columns() {
        let table = people();
        let mut unscoped = Query::new();
        unscoped
            .from(FromItem::table(table.clone()))
            .select(SelectItem::column(table.columns[1].clone()));

        let mut scoped = Query::new();
        scoped.from(FromItem::table(table.clone())).select(SelectItem::column_from(
            table.columns[1].clone(),
            FromItemRef::new("people"),
        ));

        assert_ne!(unscoped, scoped);
        assert_eq!(unscoped.resolved(), scoped.resolved());
    }

    #[test]
    fn test_parameters() {
        let table = people();
        let id = SelectItem::column(table.columns[0].clone());
        let mut query = Query::new();
        query
            .from(FromItem::table(table))
            .select(id.clone())
            .where_item(FilterItem::new(id, OperatorType::EqualsTo, Operand::Parameter(0)));
        assert_eq!(query.parameter_count(), 1);

        let bound = query.with_parameters(&[Value::from(7)]).unwrap();
        assert_eq!(bound.to_sql(), "SELECT id FROM people WHERE id = 7");
        assert_eq!(bound.parameter_count(), 0);
    }

    #[test]
    fn test_set_first_row_floor() {
        let mut query = Query::new();
        query.set_first_row(0);
        assert_eq!(query.first_row(), 1);
        assert_eq!(query.max_rows(), None);
    }
}
