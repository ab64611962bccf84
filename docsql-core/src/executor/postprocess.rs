//! Query post-processing orchestrator.
//!
//! Plans the execution of a [`Query`] against a [`RowSource`]: acceleration
//! hooks first, then a straight table read for simple selects, and otherwise
//! the full pipeline
//! join → group/aggregate → having → (select → distinct → order | order → select) → page.

use crate::dataset::{
    BoxedDataSet, EmptyDataSet, InMemoryDataSet, Row, SimpleDataSetHeader, SubSelectionDataSet,
};
use crate::error::{QueryError, QueryResult};
use crate::parser::QueryParser;
use crate::query::{
    FilterItem, FromItem, FromItemKind, FromItemRef, JoinType, Operand, OperatorType, Query,
    SelectItem,
};
use crate::schema::{Column, Table};
use crate::value::Value;

use super::helpers::{
    aggregated, cartesian_product, distinct, filtered, grouped, left_join, ordered, paged,
    push_unique, right_join, selection,
};
use super::{ExecutorOptions, RowSource};

/// A query prepared once and executed with different parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    query: Query,
    parameter_count: usize,
}

impl CompiledQuery {
    pub fn new(query: Query) -> Self {
        let parameter_count = query.parameter_count();
        Self {
            query,
            parameter_count,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }
}

/// Executes queries by post-processing the rows a [`RowSource`] supplies.
pub struct PostprocessExecutor<S: RowSource> {
    source: S,
    options: ExecutorOptions,
}

impl<S: RowSource> PostprocessExecutor<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, ExecutorOptions::default())
    }

    pub fn with_options(source: S, options: ExecutorOptions) -> Self {
        Self { source, options }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Parse query text, resolving tables against the row source.
    pub fn parse(&self, sql: &str) -> QueryResult<Query> {
        QueryParser::new(&self.source)
            .allow_expression_select_items(self.options.allow_expression_select_items)
            .parse(sql)
    }

    pub fn execute_sql(&self, sql: &str) -> QueryResult<BoxedDataSet> {
        let query = self.parse(sql)?;
        self.execute(&query)
    }

    pub fn compile(&self, sql: &str) -> QueryResult<CompiledQuery> {
        Ok(CompiledQuery::new(self.parse(sql)?))
    }

    /// Execute a compiled query, binding `parameters` to its `?` operands
    /// in order of appearance.
    pub fn execute_compiled(&self, compiled: &CompiledQuery, parameters: &[Value]) -> QueryResult<BoxedDataSet> {
        if parameters.len() != compiled.parameter_count {
            return Err(QueryError::ExecutionError(format!(
                "Query expects {} parameters but {} were given",
                compiled.parameter_count,
                parameters.len()
            )));
        }
        let query = compiled.query.with_parameters(parameters)?;
        self.execute(&query)
    }

    pub fn execute(&self, query: &Query) -> QueryResult<BoxedDataSet> {
        tracing::debug!("Executing query: {}", query);
        if query.from_items().is_empty() {
            return Err(QueryError::ConfigurationError(format!(
                "Query has no FROM items: {}",
                query
            )));
        }
        if query.max_rows() == Some(0) {
            tracing::debug!("Max rows is 0, returning an empty data set");
            return Ok(Box::new(EmptyDataSet::new(SimpleDataSetHeader::shared(
                query.select_items().to_vec(),
            ))));
        }

        if let [from_item] = query.from_items() {
            if query.group_by_items().is_empty() && query.having_items().is_empty() {
                if let Some(table) = from_item.get_table() {
                    if let Some(data_set) = self.single_table_shortcut(query, table)? {
                        return Ok(data_set);
                    }
                }
            }
        }

        self.postprocess(query)
    }

    /// Count pushdown, primary key lookup and straight table reads.
    fn single_table_shortcut(&self, query: &Query, table: &Table) -> QueryResult<Option<BoxedDataSet>> {
        let select_items = query.select_items();
        let where_items = query.where_items();

        if self.options.count_pushdown && is_count_query(select_items, where_items) {
            let approximate = select_items[0].is_function_approximation_allowed();
            match self.source.execute_count_query(table, where_items, approximate)? {
                Some(count) => {
                    tracing::debug!("Count of {} answered by the source: {}", table.name, count);
                    let header = SimpleDataSetHeader::shared(select_items.to_vec());
                    let count = i64::try_from(count).map(Value::Integer).unwrap_or(Value::Float(count as f64));
                    let row = Row::new(header.clone(), vec![count]);
                    let data_set = Box::new(InMemoryDataSet::new(header, vec![row]));
                    return Ok(Some(paged(data_set, query.first_row(), query.max_rows())));
                }
                None => tracing::debug!("Source declined count of {}", table.name),
            }
        }

        if self.options.primary_key_lookup && is_simple_select(select_items) {
            if let Some((column, key)) = primary_key_condition(table, where_items) {
                match self
                    .source
                    .execute_primary_key_lookup(table, select_items, column, key)?
                {
                    Some(row) => {
                        tracing::debug!("Primary key lookup on {} answered by the source", table.name);
                        let data_set = Box::new(InMemoryDataSet::new(row.header().clone(), vec![row]));
                        let data_set = selection(select_items, data_set)?;
                        return Ok(Some(paged(data_set, query.first_row(), query.max_rows())));
                    }
                    None => tracing::debug!("Source declined primary key lookup on {}", table.name),
                }
            }
        }

        if is_simple_select(select_items) && !query.is_distinct() && query.order_by_items().is_empty() {
            tracing::debug!("Simple select, reading {} directly", table.name);
            let data_set = self.source.materialize_table(
                table,
                select_items,
                where_items,
                query.first_row(),
                query.max_rows(),
            )?;
            return Ok(Some(data_set));
        }
        Ok(None)
    }

    fn postprocess(&self, query: &Query) -> QueryResult<BoxedDataSet> {
        let mut work_items = Vec::new();
        for item in query.select_items() {
            push_unique(&mut work_items, item);
        }
        for filter in query.where_items() {
            for item in filter.referenced_items() {
                push_unique(&mut work_items, item);
            }
        }
        add_post_where_items(query, &mut work_items);

        let mut data_sets = Vec::with_capacity(query.from_items().len());
        for from_item in query.from_items() {
            match self.materialize_from_item(from_item, &work_items) {
                Ok(data_set) => data_sets.push(data_set),
                Err(e) => {
                    for mut data_set in data_sets {
                        data_set.close();
                    }
                    return Err(e);
                }
            }
        }

        let data_set = if data_sets.len() == 1 {
            let data_set = data_sets.remove(0);
            filtered(data_set, query.where_items())
        } else {
            cartesian_product(data_sets, query.where_items())?
        };

        // WHERE has been applied; its items are no longer needed.
        let mut work_items = query.select_items().to_vec();
        add_post_where_items(query, &mut work_items);

        let data_set = if query.group_by_items().is_empty() {
            aggregated(&work_items, data_set)?
        } else {
            grouped(&work_items, data_set, query.group_by_items())?
        };
        let data_set = filtered(data_set, query.having_items());

        let data_set = if query.is_distinct() {
            let data_set = selection(query.select_items(), data_set)?;
            let data_set = distinct(data_set)?;
            ordered(data_set, query.order_by_items())?
        } else {
            let data_set = ordered(data_set, query.order_by_items())?;
            selection(query.select_items(), data_set)?
        };

        Ok(paged(data_set, query.first_row(), query.max_rows()))
    }

    fn materialize_from_item(&self, from_item: &FromItem, work_items: &[SelectItem]) -> QueryResult<BoxedDataSet> {
        match from_item.kind() {
            FromItemKind::Table(table) => {
                let label = from_item.label().unwrap_or(&table.name);
                let mut needed = Vec::new();
                for item in work_items {
                    if let Some(column) = owned_column(item, label, table) {
                        push_unique(
                            &mut needed,
                            &SelectItem::column_from(column.clone(), FromItemRef::new(label)),
                        );
                    }
                }
                tracing::debug!("Materializing {} columns of {}", needed.len(), table.name);
                self.source.materialize_table(table, &needed, &[], 1, None)
            }
            FromItemKind::Join(join) => {
                let mut needed = work_items.to_vec();
                for item in join.left_on.iter().chain(&join.right_on) {
                    push_unique(&mut needed, item);
                }
                let mut left = self.materialize_from_item(&join.left, &needed)?;
                let right = match self.materialize_from_item(&join.right, &needed) {
                    Ok(right) => right,
                    Err(e) => {
                        left.close();
                        return Err(e);
                    }
                };
                let on = join.on_conditions();
                tracing::debug!("{} join on {} condition(s)", join.join_type, on.len());
                match join.join_type {
                    JoinType::Inner => cartesian_product(vec![left, right], &on),
                    JoinType::Left => left_join(left, right, &on),
                    JoinType::Right => right_join(left, right, &on),
                }
            }
            FromItemKind::SubQuery(subquery) => {
                let label = from_item.label();
                let mut needed = Vec::new();
                for item in work_items {
                    if item.subquery_select_item().is_none() {
                        continue;
                    }
                    let in_scope = match (item.from_item(), label) {
                        (Some(reference), Some(label)) => reference.matches(label),
                        (None, None) => true,
                        _ => false,
                    };
                    if in_scope {
                        push_unique(&mut needed, &base_item(item));
                    }
                }
                let data_set = self.execute(subquery)?;
                Ok(Box::new(SubSelectionDataSet::new(
                    data_set,
                    SimpleDataSetHeader::shared(needed),
                )))
            }
            FromItemKind::Expression(expression) => Err(QueryError::ConfigurationError(format!(
                "Cannot post-process FROM item that is neither table, join nor subquery: {}",
                expression
            ))),
        }
    }
}

/// Items of GROUP BY, HAVING and ORDER BY, added after `items`.
fn add_post_where_items(query: &Query, items: &mut Vec<SelectItem>) {
    for group in query.group_by_items() {
        push_unique(items, &group.item);
    }
    for filter in query.having_items() {
        for item in filter.referenced_items() {
            push_unique(items, item);
        }
    }
    for order in query.order_by_items() {
        push_unique(items, &order.item);
    }
}

/// Column of `table` that `item` reads, when `item` belongs to the from item
/// labelled `label`.
fn owned_column<'a>(item: &'a SelectItem, label: &str, table: &Table) -> Option<&'a Column> {
    if item.subquery_select_item().is_some() {
        return None;
    }
    let column = item.get_column()?;
    let owned = match item.from_item() {
        Some(reference) => reference.matches(label),
        None => column.table == table.name,
    };
    owned.then_some(column)
}

/// The item without function or alias.
fn base_item(item: &SelectItem) -> SelectItem {
    if item.get_function().is_some() {
        item.replace_function(None)
    } else {
        item.clone().without_alias()
    }
}

fn is_simple_select(select_items: &[SelectItem]) -> bool {
    select_items
        .iter()
        .all(|item| item.aggregate_function().is_none() && item.get_expression().is_none())
}

fn is_count_query(select_items: &[SelectItem], where_items: &[FilterItem]) -> bool {
    matches!(select_items, [item] if item.is_count_all())
        && where_items.len() <= 1
        && where_items
            .iter()
            .all(|w| !w.is_compound() && w.operator() == Some(OperatorType::EqualsTo))
}

/// `pk = literal` as the only WHERE item.
fn primary_key_condition<'a>(table: &'a Table, where_items: &'a [FilterItem]) -> Option<(&'a Column, &'a Value)> {
    let [FilterItem::Single {
        select_item,
        operator: OperatorType::EqualsTo,
        operand: Operand::Value(key),
    }] = where_items
    else {
        return None;
    };
    if key.is_null() || select_item.get_function().is_some() {
        return None;
    }
    let column = table.column_by_name(&select_item.get_column()?.name)?;
    column.primary_key.then_some((column, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSetExt;
    use crate::executor::{InMemoryRowSource, TableResolver};
    use crate::schema::ColumnType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn people() -> Table {
        Table::new("people")
            .with_primary_key("id", ColumnType::Number)
            .with_column("name", ColumnType::Text)
            .with_column("age", ColumnType::Number)
    }

    fn source() -> InMemoryRowSource {
        InMemoryRowSource::new().with_table(
            people(),
            vec![
                vec![Value::from(1), Value::from("Ann"), Value::from(30)],
                vec![Value::from(2), Value::from("Bob"), Value::from(25)],
                vec![Value::from(3), Value::from("Ann"), Value::from(41)],
            ],
        )
    }

    fn run(executor: &PostprocessExecutor<impl RowSource>, sql: &str) -> Vec<Vec<Value>> {
        executor.execute_sql(sql).unwrap().to_object_arrays().unwrap()
    }

    /// Answers both hooks and counts how often it was asked.
    struct HookSource {
        inner: InMemoryRowSource,
        counts: AtomicUsize,
        lookups: AtomicUsize,
    }

    impl TableResolver for HookSource {
        fn table_by_qualified_label(&self, label: &str) -> Option<Table> {
            self.inner.table_by_qualified_label(label)
        }
    }

    impl RowSource for HookSource {
        fn materialize_columns(&self, table: &Table, columns: &[Column], max_rows: Option<usize>) -> QueryResult<BoxedDataSet> {
            self.inner.materialize_columns(table, columns, max_rows)
        }

        fn execute_count_query(&self, _table: &Table, _where_items: &[FilterItem], _approximate: bool) -> QueryResult<Option<u64>> {
            self.counts.fetch_add(1, Ordering::SeqCst);
            Ok(Some(42))
        }

        fn execute_primary_key_lookup(
            &self,
            _table: &Table,
            select_items: &[SelectItem],
            _primary_key: &Column,
            key: &Value,
        ) -> QueryResult<Option<Row>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let header = SimpleDataSetHeader::shared(select_items.to_vec());
            let values = select_items.iter().map(|_| key.clone()).collect();
            Ok(Some(Row::new(header, values)))
        }
    }

    fn hook_source() -> HookSource {
        HookSource {
            inner: source(),
            counts: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_simple_select_with_paging() {
        let executor = PostprocessExecutor::new(source());
        assert_eq!(
            run(&executor, "SELECT name FROM people WHERE age > 26 LIMIT 1 OFFSET 1"),
            vec![vec![Value::from("Ann")]]
        );
    }

    #[test]
    fn test_group_by_count() {
        let executor = PostprocessExecutor::new(source());
        assert_eq!(
            run(&executor, "SELECT name, COUNT(*) FROM people GROUP BY name"),
            vec![
                vec![Value::from("Ann"), Value::from(2)],
                vec![Value::from("Bob"), Value::from(1)],
            ]
        );
    }

    #[test]
    fn test_having_and_order() {
        let executor = PostprocessExecutor::new(source());
        assert_eq!(
            run(
                &executor,
                "SELECT name, MAX(age) AS oldest FROM people GROUP BY name HAVING COUNT(*) > 1 ORDER BY name DESC"
            ),
            vec![vec![Value::from("Ann"), Value::from(41)]]
        );
    }

    #[test]
    fn test_distinct_then_order() {
        let executor = PostprocessExecutor::new(source());
        assert_eq!(
            run(&executor, "SELECT DISTINCT name FROM people ORDER BY name DESC"),
            vec![vec![Value::from("Bob")], vec![Value::from("Ann")]]
        );
    }

    #[test]
    fn test_count_without_hook_counts_rows() {
        let executor = PostprocessExecutor::new(source());
        assert_eq!(
            run(&executor, "SELECT COUNT(*) FROM people WHERE name = 'Ann'"),
            vec![vec![Value::from(2)]]
        );
    }

    #[test]
    fn test_count_hook() {
        let executor = PostprocessExecutor::new(hook_source());
        assert_eq!(run(&executor, "SELECT COUNT(*) FROM people"), vec![vec![Value::from(42)]]);
        assert_eq!(executor.source().counts.load(Ordering::SeqCst), 1);

        // compound WHERE is never offered to the hook
        let rows = run(&executor, "SELECT COUNT(*) FROM people WHERE name = 'Ann' OR age = 25");
        assert_eq!(rows, vec![vec![Value::from(3)]]);
        assert_eq!(executor.source().counts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_primary_key_hook() {
        let executor = PostprocessExecutor::new(hook_source());
        assert_eq!(run(&executor, "SELECT id FROM people WHERE id = 2"), vec![vec![Value::from(2)]]);
        assert_eq!(executor.source().lookups.load(Ordering::SeqCst), 1);

        // not the primary key
        run(&executor, "SELECT id FROM people WHERE age = 25");
        assert_eq!(executor.source().lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hooks_disabled_by_options() {
        let executor = PostprocessExecutor::with_options(hook_source(), ExecutorOptions::postprocess_only());
        assert_eq!(run(&executor, "SELECT COUNT(*) FROM people"), vec![vec![Value::from(3)]]);
        assert_eq!(executor.source().counts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_max_rows_zero() {
        let executor = PostprocessExecutor::new(source());
        let mut query = executor.parse("SELECT name FROM people").unwrap();
        query.set_max_rows(Some(0));
        let mut data_set = executor.execute(&query).unwrap();
        assert_eq!(data_set.select_items().len(), 1);
        assert!(data_set.to_rows().unwrap().is_empty());
    }

    #[test]
    fn test_subquery() {
        let executor = PostprocessExecutor::new(source());
        assert_eq!(
            run(
                &executor,
                "SELECT s.n, s.c FROM (SELECT name AS n, COUNT(*) AS c FROM people GROUP BY name) s WHERE s.c > 1"
            ),
            vec![vec![Value::from("Ann"), Value::from(2)]]
        );
    }

    #[test]
    fn test_expression_from_item_is_rejected() {
        let executor = PostprocessExecutor::new(source());
        let mut query = Query::new();
        query
            .from(FromItem::expression("generate_series(1, 3)"))
            .select(SelectItem::count_all());
        assert!(matches!(
            executor.execute(&query),
            Err(QueryError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_compiled_query() {
        let executor = PostprocessExecutor::new(source());
        let compiled = executor.compile("SELECT name FROM people WHERE age > ? ORDER BY name").unwrap();
        assert_eq!(compiled.parameter_count(), 1);

        let rows = executor
            .execute_compiled(&compiled, &[Value::from(26)])
            .unwrap()
            .to_object_arrays()
            .unwrap();
        assert_eq!(rows, vec![vec![Value::from("Ann")], vec![Value::from("Ann")]]);
        assert!(executor.execute_compiled(&compiled, &[]).is_err());
    }
}
