//! Relational operators over data sets.
//!
//! Every operator takes ownership of its input data sets. Operators that must
//! see all rows (joins, grouping, ordering) read them eagerly and close the
//! inputs, on success and on error alike.

use std::collections::HashMap;

use crate::dataset::{
    same_layout, BoxedDataSet, CachingDataSetHeader, DataSet, DataSetExt, DataSetHeader,
    EmptyDataSet, FilteredDataSet, FirstRowDataSet, HeaderRef, InMemoryDataSet, MaxRowsDataSet,
    Row, RowFilter, ScalarFunctionDataSet, SimpleDataSetHeader, SubSelectionDataSet,
};
use crate::error::{QueryError, QueryResult};
use crate::query::{FilterItem, GroupByItem, OrderByItem, SelectItem};
use crate::value::Value;

use super::BuiltinFunctions;

/// Whether `item` can be read from rows shaped by `header`.
pub fn is_resolvable(header: &dyn DataSetHeader, item: &SelectItem) -> bool {
    header.resolve(item).is_some()
        || item
            .subquery_select_item()
            .is_some_and(|inner| header.resolve(inner).is_some())
}

/// Append `item` unless a structurally equal item is already present.
pub fn push_unique(items: &mut Vec<SelectItem>, item: &SelectItem) {
    if !items.iter().any(|i| i.equals_ignore_alias(item, true)) {
        items.push(item.clone());
    }
}

fn close_all(data_sets: impl IntoIterator<Item = BoxedDataSet>) {
    for mut data_set in data_sets {
        data_set.close();
    }
}

/// Rows that satisfy every filter.
pub fn filtered(data_set: BoxedDataSet, filters: &[FilterItem]) -> BoxedDataSet {
    if filters.is_empty() {
        return data_set;
    }
    let filters: Vec<Box<dyn RowFilter>> = filters
        .iter()
        .map(|f| Box::new(f.clone()) as Box<dyn RowFilter>)
        .collect();
    Box::new(FilteredDataSet::new(data_set, filters))
}

/// Skip to the 1-based `first_row`, then cap at `max_rows`.
pub fn paged(data_set: BoxedDataSet, first_row: usize, max_rows: Option<usize>) -> BoxedDataSet {
    let mut data_set = data_set;
    if first_row > 1 {
        data_set = Box::new(FirstRowDataSet::new(data_set, first_row));
    }
    if let Some(max_rows) = max_rows {
        data_set = Box::new(MaxRowsDataSet::new(data_set, max_rows));
    }
    data_set
}

/// Shape `data_set` into exactly `select_items`.
///
/// Scalar function items not present verbatim get a function stage first.
pub fn selection(select_items: &[SelectItem], data_set: BoxedDataSet) -> QueryResult<BoxedDataSet> {
    if same_layout(data_set.select_items(), select_items) {
        return Ok(data_set);
    }

    let mut scalar_items = Vec::new();
    for item in select_items {
        if item.scalar_function().is_none() {
            continue;
        }
        let present = data_set
            .header()
            .resolve(item)
            .is_some_and(|r| !r.via_function_fallback);
        if !present && data_set.header().index_of(&item.replace_function(None)).is_some() {
            push_unique(&mut scalar_items, &item.clone().without_alias());
        }
    }

    let mut data_set: BoxedDataSet = if scalar_items.is_empty() {
        data_set
    } else {
        Box::new(ScalarFunctionDataSet::new(data_set, scalar_items)?)
    };
    if let Some(missing) = select_items
        .iter()
        .find(|item| !is_resolvable(data_set.header().as_ref(), item))
    {
        data_set.close();
        return Err(QueryError::ExecutionError(format!(
            "Select item {} is not available",
            missing.sql_without_alias()
        )));
    }
    let header = SimpleDataSetHeader::shared(select_items.to_vec());
    Ok(Box::new(SubSelectionDataSet::new(data_set, header)))
}

/// Nested loop over a streamed outer side and a materialized inner side.
struct NestedLoopDataSet {
    outer: BoxedDataSet,
    inner_rows: Vec<Row>,
    inner_width: usize,
    header: HeaderRef,
    filters: Vec<FilterItem>,
    /// Emit a null-padded row for outer rows without any match.
    pad_unmatched: bool,
    current: Option<Row>,
    position: usize,
    matched: bool,
}

impl NestedLoopDataSet {
    fn combine(&self, outer: &Row, inner: Option<&Row>) -> Row {
        let mut values = outer.values();
        match inner {
            Some(inner) => values.extend(inner.values()),
            None => values.extend(std::iter::repeat(Value::Null).take(self.inner_width)),
        }
        Row::new(self.header.clone(), values)
    }

    fn accepts(&self, row: &Row) -> QueryResult<bool> {
        for filter in &self.filters {
            if !filter.evaluate(row)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl DataSet for NestedLoopDataSet {
    fn header(&self) -> &HeaderRef {
        &self.header
    }

    fn advance(&mut self) -> QueryResult<Option<Row>> {
        loop {
            let Some(outer) = self.current.as_ref() else {
                match self.outer.advance()? {
                    Some(row) => {
                        self.current = Some(row);
                        self.position = 0;
                        self.matched = false;
                        continue;
                    }
                    None => return Ok(None),
                }
            };

            while self.position < self.inner_rows.len() {
                let candidate = self.combine(outer, Some(&self.inner_rows[self.position]));
                self.position += 1;
                if self.accepts(&candidate)? {
                    self.matched = true;
                    return Ok(Some(candidate));
                }
            }

            let padded = (self.pad_unmatched && !self.matched).then(|| self.combine(outer, None));
            self.current = None;
            if padded.is_some() {
                return Ok(padded);
            }
        }
    }

    fn close(&mut self) {
        self.current = None;
        self.inner_rows.clear();
        self.outer.close();
    }
}

fn concat_items(left: &[SelectItem], right: &[SelectItem]) -> Vec<SelectItem> {
    left.iter().chain(right).cloned().collect()
}

/// Cartesian product of `data_sets`, left to right, keeping the rows that
/// satisfy `filters`.
///
/// Each filter is applied at the first join stage whose combined columns
/// cover every item it references. A single input is only filtered.
pub fn cartesian_product(data_sets: Vec<BoxedDataSet>, filters: &[FilterItem]) -> QueryResult<BoxedDataSet> {
    let all_items: Vec<SelectItem> = data_sets
        .iter()
        .flat_map(|ds| ds.select_items().iter().cloned())
        .collect();

    let mut remaining = data_sets.into_iter();
    let Some(first) = remaining.next() else {
        return Err(QueryError::ConfigurationError(
            "Cartesian product needs at least one data set".to_string(),
        ));
    };
    if remaining.len() == 0 {
        return Ok(filtered(first, filters));
    }

    let mut pending: Vec<FilterItem> = filters.to_vec();
    let mut outer = first;
    while let Some(mut inner) = remaining.next() {
        let inner_items = inner.select_items().to_vec();
        let inner_rows = match inner.to_rows() {
            Ok(rows) => rows,
            Err(e) => {
                outer.close();
                close_all(remaining);
                return Err(e);
            }
        };
        if inner_rows.is_empty() {
            tracing::debug!("Empty join input, no rows can result");
            outer.close();
            close_all(remaining);
            return Ok(Box::new(EmptyDataSet::new(CachingDataSetHeader::shared(all_items))));
        }

        let header = CachingDataSetHeader::shared(concat_items(outer.select_items(), &inner_items));
        let (applicable, not_yet): (Vec<_>, Vec<_>) = pending.into_iter().partition(|f| {
            f.referenced_items()
                .iter()
                .all(|item| is_resolvable(header.as_ref(), item))
        });
        pending = not_yet;

        outer = Box::new(NestedLoopDataSet {
            outer,
            inner_rows,
            inner_width: inner_items.len(),
            header,
            filters: applicable,
            pad_unmatched: false,
            current: None,
            position: 0,
            matched: false,
        });
    }

    // Filters naming items no input supplies fail when evaluated.
    Ok(filtered(outer, &pending))
}

/// Every left row joined with the right rows satisfying `on`, or with nulls
/// when none does.
pub fn left_join(mut left: BoxedDataSet, mut right: BoxedDataSet, on: &[FilterItem]) -> QueryResult<BoxedDataSet> {
    let right_items = right.select_items().to_vec();
    let right_rows = match right.to_rows() {
        Ok(rows) => rows,
        Err(e) => {
            left.close();
            return Err(e);
        }
    };
    let header = CachingDataSetHeader::shared(concat_items(left.select_items(), &right_items));
    if right_rows.is_empty() {
        tracing::debug!("Right side of left join is empty, padding left rows");
    }
    Ok(Box::new(NestedLoopDataSet {
        outer: left,
        inner_rows: right_rows,
        inner_width: right_items.len(),
        header,
        filters: on.to_vec(),
        pad_unmatched: true,
        current: None,
        position: 0,
        matched: false,
    }))
}

/// Left join with the sides swapped, re-projected to left-then-right order.
pub fn right_join(left: BoxedDataSet, right: BoxedDataSet, on: &[FilterItem]) -> QueryResult<BoxedDataSet> {
    let items = concat_items(left.select_items(), right.select_items());
    let swapped = left_join(right, left, on)?;
    selection(&items, swapped)
}

/// Accumulates the inputs of one aggregate select item.
struct AggregateInput {
    item: SelectItem,
    input: Option<SelectItem>,
}

impl AggregateInput {
    fn for_items(select_items: &[SelectItem]) -> QueryResult<Vec<AggregateInput>> {
        let mut aggregates: Vec<SelectItem> = Vec::new();
        for item in select_items.iter().filter(|i| i.aggregate_function().is_some()) {
            if item.get_expression().is_some() {
                return Err(QueryError::ExecutionError(format!(
                    "Aggregating expressions is not supported: {}",
                    item.sql_without_alias()
                )));
            }
            push_unique(&mut aggregates, item);
        }
        Ok(aggregates
            .into_iter()
            .map(|item| {
                let input = (!item.is_count_all()).then(|| item.replace_function(None));
                AggregateInput { item, input }
            })
            .collect())
    }

    /// The value this row contributes; count-all contributes a placeholder.
    fn read(&self, row: &Row) -> QueryResult<Value> {
        match &self.input {
            None => Ok(Value::Boolean(true)),
            Some(input) => row.evaluate(input).ok_or_else(|| {
                QueryError::ExecutionError(format!(
                    "Input of {} is not available",
                    self.item.sql_without_alias()
                ))
            }),
        }
    }

    fn result(&self, values: &[Value]) -> Value {
        match self.item.aggregate_function() {
            Some(function) => BuiltinFunctions::aggregate(function, values),
            None => Value::Null,
        }
    }
}

struct Group {
    key: Vec<Value>,
    inputs: Vec<Vec<Value>>,
}

/// One row per distinct group key with the aggregates of `select_items`,
/// then shaped into `select_items`. Groups keep first-seen order.
pub fn grouped(
    select_items: &[SelectItem],
    mut data_set: BoxedDataSet,
    group_by: &[GroupByItem],
) -> QueryResult<BoxedDataSet> {
    let aggregates = match AggregateInput::for_items(select_items) {
        Ok(aggregates) => aggregates,
        Err(e) => {
            data_set.close();
            return Err(e);
        }
    };
    let group_items: Vec<SelectItem> = group_by.iter().map(|g| g.item.clone()).collect();

    let mut items = group_items.clone();
    items.extend(aggregates.iter().map(|a| a.item.clone()));
    let header = CachingDataSetHeader::shared(items);
    if let Some(loose) = select_items
        .iter()
        .find(|item| !is_resolvable(header.as_ref(), item))
    {
        data_set.close();
        return Err(QueryError::ExecutionError(format!(
            "{} must appear in GROUP BY or be used in an aggregate function",
            loose.sql_without_alias()
        )));
    }

    let outcome = collect_groups(&mut data_set, &group_items, &aggregates);
    data_set.close();
    let groups = outcome?;
    tracing::debug!("Grouped into {} groups", groups.len());

    if groups.is_empty() {
        return selection(select_items, Box::new(EmptyDataSet::new(header)));
    }
    let rows = groups
        .into_iter()
        .map(|group| {
            let mut values = group.key;
            values.extend(aggregates.iter().zip(&group.inputs).map(|(a, inputs)| a.result(inputs)));
            Row::new(header.clone(), values)
        })
        .collect();
    selection(select_items, Box::new(InMemoryDataSet::new(header, rows)))
}

fn collect_groups(
    data_set: &mut BoxedDataSet,
    group_items: &[SelectItem],
    aggregates: &[AggregateInput],
) -> QueryResult<Vec<Group>> {
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    while let Some(row) = data_set.advance()? {
        let key = group_items
            .iter()
            .map(|item| {
                row.evaluate(item).ok_or_else(|| {
                    QueryError::ExecutionError(format!(
                        "GROUP BY item {} is not available",
                        item.sql_without_alias()
                    ))
                })
            })
            .collect::<QueryResult<Vec<Value>>>()?;
        let position = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Group {
                key,
                inputs: vec![Vec::new(); aggregates.len()],
            });
            groups.len() - 1
        });
        for (aggregate, inputs) in aggregates.iter().zip(groups[position].inputs.iter_mut()) {
            inputs.push(aggregate.read(&row)?);
        }
    }
    Ok(groups)
}

/// Ungrouped aggregation over `select_items`.
///
/// Without aggregates the input is returned untouched. With only aggregates
/// a single row results, even from no input. Mixed selections keep the input
/// rows and repeat the aggregate results on each of them.
pub fn aggregated(select_items: &[SelectItem], mut data_set: BoxedDataSet) -> QueryResult<BoxedDataSet> {
    let aggregates = match AggregateInput::for_items(select_items) {
        Ok(aggregates) => aggregates,
        Err(e) => {
            data_set.close();
            return Err(e);
        }
    };
    if aggregates.is_empty() {
        return Ok(data_set);
    }
    let only_aggregates = select_items.iter().all(|i| i.aggregate_function().is_some());
    if let Some(missing) = select_items
        .iter()
        .filter(|i| i.aggregate_function().is_none())
        .find(|i| !is_resolvable(data_set.header().as_ref(), i))
    {
        data_set.close();
        return Err(QueryError::ExecutionError(format!(
            "Select item {} is not available",
            missing.sql_without_alias()
        )));
    }

    let mut inputs: Vec<Vec<Value>> = vec![Vec::new(); aggregates.len()];
    let mut retained: Vec<Row> = Vec::new();
    let outcome = (|| -> QueryResult<()> {
        while let Some(row) = data_set.advance()? {
            for (aggregate, values) in aggregates.iter().zip(inputs.iter_mut()) {
                values.push(aggregate.read(&row)?);
            }
            if !only_aggregates {
                retained.push(row);
            }
        }
        Ok(())
    })();
    data_set.close();
    outcome?;

    let results: Vec<Value> = aggregates
        .iter()
        .zip(&inputs)
        .map(|(a, values)| a.result(values))
        .collect();
    let header = CachingDataSetHeader::shared(select_items.to_vec());

    let value_of = |item: &SelectItem, row: Option<&Row>| -> Value {
        match aggregates.iter().position(|a| a.item.equals_ignore_alias(item, true)) {
            Some(i) => results[i].clone(),
            None => row.and_then(|r| r.evaluate(item)).unwrap_or_default(),
        }
    };

    let rows: Vec<Row> = if retained.is_empty() {
        vec![Row::new(
            header.clone(),
            select_items.iter().map(|item| value_of(item, None)).collect(),
        )]
    } else {
        retained
            .iter()
            .map(|row| {
                Row::new(
                    header.clone(),
                    select_items.iter().map(|item| value_of(item, Some(row))).collect(),
                )
            })
            .collect()
    };
    Ok(Box::new(InMemoryDataSet::new(header, rows)))
}

/// Unique rows, as a grouping over every column.
pub fn distinct(data_set: BoxedDataSet) -> QueryResult<BoxedDataSet> {
    let items = data_set.select_items().to_vec();
    let group_by: Vec<GroupByItem> = items.iter().cloned().map(GroupByItem::new).collect();
    grouped(&items, data_set, &group_by)
}

/// Rows sorted by `order_by`, stable across equal keys.
pub fn ordered(mut data_set: BoxedDataSet, order_by: &[OrderByItem]) -> QueryResult<BoxedDataSet> {
    if order_by.is_empty() {
        return Ok(data_set);
    }
    let header = data_set.header().clone();
    if let Some(missing) = order_by
        .iter()
        .find(|o| !is_resolvable(header.as_ref(), &o.item))
    {
        data_set.close();
        return Err(QueryError::ExecutionError(format!(
            "ORDER BY item {} is not available",
            missing.item.sql_without_alias()
        )));
    }

    let rows = data_set.to_rows()?;
    if rows.is_empty() {
        return Ok(Box::new(EmptyDataSet::new(header)));
    }

    let mut keyed: Vec<(Vec<Value>, Row)> = rows
        .into_iter()
        .map(|row| {
            let key = order_by
                .iter()
                .map(|o| row.evaluate(&o.item).unwrap_or_default())
                .collect();
            (key, row)
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        for ((left, right), order) in a.iter().zip(b).zip(order_by) {
            let ordering = left.compare(right);
            let ordering = if order.is_ascending() {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });

    let rows = keyed.into_iter().map(|(_, row)| row).collect();
    Ok(Box::new(InMemoryDataSet::new(header, rows)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FromItemRef, FunctionType, Operand, OperatorType};
    use crate::schema::{Column, ColumnType};

    fn column(table: &str, name: &str) -> SelectItem {
        SelectItem::column_from(Column::new(table, name), FromItemRef::new(table))
    }

    fn data_set(items: Vec<SelectItem>, rows: Vec<Vec<Value>>) -> BoxedDataSet {
        let header = SimpleDataSetHeader::shared(items);
        let rows = rows.into_iter().map(|r| Row::new(header.clone(), r)).collect();
        Box::new(InMemoryDataSet::new(header, rows))
    }

    fn values(data_set: BoxedDataSet) -> Vec<Vec<Value>> {
        let mut data_set = data_set;
        data_set.to_object_arrays().unwrap()
    }

    fn ints(rows: &[&[i64]]) -> Vec<Vec<Value>> {
        rows.iter()
            .map(|r| r.iter().map(|v| Value::from(*v)).collect())
            .collect()
    }

    fn eq(left: SelectItem, right: SelectItem) -> FilterItem {
        FilterItem::new(left, OperatorType::EqualsTo, Operand::SelectItem(Box::new(right)))
    }

    #[test]
    fn test_paging_identity() {
        let n = column("t", "n");
        let rows = ints(&[&[1], &[2], &[3]]);
        let paged_all = paged(data_set(vec![n.clone()], rows.clone()), 1, None);
        assert_eq!(values(paged_all), rows);

        let page = paged(data_set(vec![n], ints(&[&[1], &[2], &[3], &[4], &[5]])), 2, Some(2));
        assert_eq!(values(page), ints(&[&[2], &[3]]));
    }

    #[test]
    fn test_single_input_cartesian_is_identity() {
        let n = column("t", "n");
        let rows = ints(&[&[1], &[2]]);
        let product = cartesian_product(vec![data_set(vec![n], rows.clone())], &[]).unwrap();
        assert_eq!(values(product), rows);
    }

    #[test]
    fn test_cartesian_product_with_filters() {
        let a_id = column("a", "id");
        let b_id = column("b", "id");
        let a = data_set(vec![a_id.clone()], ints(&[&[1], &[2]]));
        let b = data_set(vec![b_id.clone()], ints(&[&[1], &[2], &[3]]));

        let all = cartesian_product(
            vec![data_set(vec![a_id.clone()], ints(&[&[1], &[2]])), data_set(vec![b_id.clone()], ints(&[&[1], &[2], &[3]]))],
            &[],
        )
        .unwrap();
        assert_eq!(values(all).len(), 6);

        let joined = cartesian_product(vec![a, b], &[eq(a_id, b_id)]).unwrap();
        assert_eq!(values(joined), ints(&[&[1, 1], &[2, 2]]));
    }

    #[test]
    fn test_cartesian_product_with_empty_input() {
        let a = data_set(vec![column("a", "id")], ints(&[&[1]]));
        let b = data_set(vec![column("b", "id")], vec![]);
        let product = cartesian_product(vec![a, b], &[]).unwrap();
        assert_eq!(product.select_items().len(), 2);
        assert!(values(product).is_empty());
    }

    #[test]
    fn test_filter_waits_for_all_columns() {
        let a_id = column("a", "id");
        let c_id = column("c", "id");
        let a = data_set(vec![a_id.clone()], ints(&[&[1], &[2]]));
        let b = data_set(vec![column("b", "x")], ints(&[&[7]]));
        let c = data_set(vec![c_id.clone()], ints(&[&[2]]));
        let joined = cartesian_product(vec![a, b, c], &[eq(a_id, c_id)]).unwrap();
        assert_eq!(values(joined), ints(&[&[2, 7, 2]]));
    }

    #[test]
    fn test_left_join_totality() {
        let l_id = column("l", "id");
        let r_id = column("r", "id");
        let left = data_set(vec![l_id.clone()], ints(&[&[1], &[2]]));
        let right = data_set(vec![r_id.clone()], ints(&[&[2], &[2]]));
        let joined = left_join(left, right, &[eq(l_id.clone(), r_id.clone())]).unwrap();
        assert_eq!(
            values(joined),
            vec![
                vec![Value::from(1), Value::Null],
                vec![Value::from(2), Value::from(2)],
                vec![Value::from(2), Value::from(2)],
            ]
        );

        let left = data_set(vec![l_id.clone()], ints(&[&[1]]));
        let empty = data_set(vec![r_id.clone()], vec![]);
        let joined = left_join(left, empty, &[eq(l_id, r_id)]).unwrap();
        assert_eq!(values(joined), vec![vec![Value::from(1), Value::Null]]);
    }

    #[test]
    fn test_right_join_keeps_column_order() {
        let l_id = column("l", "id");
        let r_id = column("r", "id");
        let left = data_set(vec![l_id.clone()], ints(&[&[1]]));
        let right = data_set(vec![r_id.clone()], ints(&[&[1], &[3]]));
        let joined = right_join(left, right, &[eq(l_id, r_id)]).unwrap();
        assert_eq!(
            values(joined),
            vec![
                vec![Value::from(1), Value::from(1)],
                vec![Value::Null, Value::from(3)],
            ]
        );
    }

    #[test]
    fn test_grouping_partition() {
        let name = column("people", "name");
        let count = SelectItem::count_all();
        let input = data_set(
            vec![name.clone()],
            vec![vec![Value::from("Ann")], vec![Value::from("Bob")], vec![Value::from("Ann")]],
        );
        let result = grouped(
            &[name.clone(), count],
            input,
            &[GroupByItem::new(name)],
        )
        .unwrap();
        assert_eq!(
            values(result),
            vec![
                vec![Value::from("Ann"), Value::from(2)],
                vec![Value::from("Bob"), Value::from(1)],
            ]
        );
    }

    #[test]
    fn test_grouping_empty_input() {
        let name = column("people", "name");
        let input = data_set(vec![name.clone()], vec![]);
        let result = grouped(&[name.clone()], input, &[GroupByItem::new(name)]).unwrap();
        assert!(values(result).is_empty());
    }

    #[test]
    fn test_grouping_rejects_loose_column() {
        let name = column("people", "name");
        let boss = column("people", "boss");
        let input = data_set(
            vec![name.clone(), boss.clone()],
            vec![vec![Value::from("Bob"), Value::from(1)]],
        );
        let result = grouped(
            &[name.clone(), boss, SelectItem::count_all()],
            input,
            &[GroupByItem::new(name)],
        );
        assert!(matches!(result, Err(QueryError::ExecutionError(msg)) if msg.contains("boss")));
    }

    #[test]
    fn test_aggregates_over_empty_input() {
        let n = Column::new("t", "n").with_type(ColumnType::Number);
        let items = vec![
            SelectItem::count_all(),
            SelectItem::function(FunctionType::Sum, n.clone()),
            SelectItem::function(FunctionType::Avg, n.clone()),
        ];
        let input = data_set(vec![SelectItem::column(n)], vec![]);
        let result = aggregated(&items, input).unwrap();
        assert_eq!(values(result), vec![vec![Value::from(0), Value::from(0), Value::Null]]);
    }

    #[test]
    fn test_mixed_aggregation_splices_results() {
        let n = Column::new("t", "n").with_type(ColumnType::Number);
        let plain = SelectItem::column(n.clone());
        let max = SelectItem::function(FunctionType::Max, n);
        let input = data_set(vec![plain.clone()], ints(&[&[1], &[5]]));
        let result = aggregated(&[plain, max], input).unwrap();
        assert_eq!(values(result), ints(&[&[1, 5], &[5, 5]]));
    }

    #[test]
    fn test_expression_aggregate_is_rejected() {
        let input = data_set(vec![column("t", "n")], vec![]);
        let item = SelectItem::expression("n + 1", "m")
            .unwrap()
            .replace_function(Some(FunctionType::Sum));
        assert!(aggregated(&[item], input).is_err());
    }

    #[test]
    fn test_distinct_is_idempotent() {
        let n = column("t", "n");
        let input = data_set(vec![n.clone()], ints(&[&[1], &[2], &[1], &[3], &[2]]));
        let once = distinct(input).unwrap();
        let once_values = values(once);
        assert_eq!(once_values, ints(&[&[1], &[2], &[3]]));

        let twice = distinct(distinct(data_set(vec![n], once_values.clone())).unwrap()).unwrap();
        assert_eq!(values(twice), once_values);
    }

    #[test]
    fn test_ordering_directions() {
        let a = column("t", "a");
        let b = column("t", "b");
        let input = data_set(
            vec![a.clone(), b.clone()],
            ints(&[&[1, 1], &[2, 0], &[1, 3]]),
        );
        let result = ordered(
            input,
            &[OrderByItem::ascending(a), OrderByItem::descending(b)],
        )
        .unwrap();
        assert_eq!(values(result), ints(&[&[1, 3], &[1, 1], &[2, 0]]));
    }

    #[test]
    fn test_ordering_rejects_unknown_item() {
        let input = data_set(vec![column("t", "a")], ints(&[&[1]]));
        let result = ordered(input, &[OrderByItem::ascending(column("t", "zzz"))]);
        assert!(matches!(result, Err(QueryError::ExecutionError(_))));
    }

    #[test]
    fn test_ordering_mixed_numbers_and_text() {
        let code = column("t", "code");
        let rows: Vec<Vec<Value>> = (0..5000)
            .map(|i| {
                if i % 2 == 0 {
                    vec![Value::from(i * 37 % 1009)]
                } else {
                    vec![Value::from(format!("{}", i * 53 % 997))]
                }
            })
            .chain([vec![Value::from("n/a")], vec![Value::Null]])
            .collect();
        let input = data_set(vec![code.clone()], rows);
        let sorted = values(ordered(input, &[OrderByItem::ascending(code)]).unwrap());

        assert_eq!(sorted.len(), 5002);
        assert_eq!(sorted[0], vec![Value::Null]);
        assert_eq!(sorted[5001], vec![Value::from("n/a")]);
        for pair in sorted.windows(2) {
            assert_ne!(pair[0][0].compare(&pair[1][0]), std::cmp::Ordering::Greater);
        }
    }

    #[test]
    fn test_selection_rejects_missing_item() {
        let input = data_set(vec![column("t", "a")], ints(&[&[1]]));
        let result = selection(&[column("t", "zzz")], input);
        assert!(matches!(result, Err(QueryError::ExecutionError(msg)) if msg.contains("zzz")));
    }

    #[test]
    fn test_selection_adds_scalar_functions() {
        let amount = Column::new("t", "amount");
        let input = data_set(vec![SelectItem::column(amount.clone())], vec![vec![Value::from("42")]]);
        let as_number = SelectItem::function(FunctionType::ToNumber, amount).with_alias("n");
        let result = selection(&[as_number], input).unwrap();
        assert_eq!(result.select_items()[0].alias(), Some("n"));
        assert_eq!(values(result), vec![vec![Value::from(42)]]);
    }

    #[test]
    fn test_selection_without_change_is_pass_through() {
        let n = column("t", "n");
        let input = data_set(vec![n.clone()], ints(&[&[1]]));
        let header_before = input.header().clone();
        let result = selection(&[n], input).unwrap();
        assert!(std::sync::Arc::ptr_eq(&header_before, result.header()));
    }
}
