//! WHERE / HAVING predicates.

use std::fmt;

use regex::Regex;

use crate::dataset::{Row, RowFilter};
use crate::error::{QueryError, QueryResult};
use crate::value::Value;

use super::select_item::SelectItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorType {
    EqualsTo,
    DifferentFrom,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
}

impl OperatorType {
    /// Operators recognised by the filter parser, with the text they are
    /// written as. Word operators are matched space-delimited.
    pub const ALL: &'static [OperatorType] = &[
        OperatorType::EqualsTo,
        OperatorType::DifferentFrom,
        OperatorType::LessThan,
        OperatorType::LessThanOrEqual,
        OperatorType::GreaterThan,
        OperatorType::GreaterThanOrEqual,
        OperatorType::Like,
        OperatorType::NotLike,
        OperatorType::In,
        OperatorType::NotIn,
    ];

    pub fn sql(&self) -> &'static str {
        match self {
            OperatorType::EqualsTo => "=",
            OperatorType::DifferentFrom => "<>",
            OperatorType::LessThan => "<",
            OperatorType::LessThanOrEqual => "<=",
            OperatorType::GreaterThan => ">",
            OperatorType::GreaterThanOrEqual => ">=",
            OperatorType::Like => "LIKE",
            OperatorType::NotLike => "NOT LIKE",
            OperatorType::In => "IN",
            OperatorType::NotIn => "NOT IN",
        }
    }

    /// Alternative spellings accepted on input.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            OperatorType::DifferentFrom => &["!="],
            OperatorType::EqualsTo => &["=="],
            _ => &[],
        }
    }

    pub fn is_word(&self) -> bool {
        self.sql().chars().all(|c| c.is_ascii_alphabetic() || c == ' ')
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => f.write_str("AND"),
            LogicalOperator::Or => f.write_str("OR"),
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    List(Vec<Value>),
    SelectItem(Box<SelectItem>),
    /// Positional `?` placeholder, numbered from 0 in order of appearance.
    Parameter(usize),
}

impl Operand {
    pub fn to_sql(&self) -> String {
        match self {
            Operand::Value(value) => value.to_sql(),
            Operand::List(values) => {
                let values: Vec<String> = values.iter().map(Value::to_sql).collect();
                format!("({})", values.join(", "))
            }
            Operand::SelectItem(item) => item.sql_without_alias(),
            Operand::Parameter(_) => "?".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterItem {
    Single {
        select_item: SelectItem,
        operator: OperatorType,
        operand: Operand,
    },
    Compound {
        operator: LogicalOperator,
        children: Vec<FilterItem>,
    },
}

impl FilterItem {
    pub fn new(select_item: SelectItem, operator: OperatorType, operand: Operand) -> Self {
        FilterItem::Single {
            select_item,
            operator,
            operand,
        }
    }

    pub fn compound(operator: LogicalOperator, children: Vec<FilterItem>) -> Self {
        FilterItem::Compound { operator, children }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, FilterItem::Compound { .. })
    }

    /// Select item on the left-hand side of a simple comparison.
    pub fn select_item(&self) -> Option<&SelectItem> {
        match self {
            FilterItem::Single { select_item, .. } => Some(select_item),
            FilterItem::Compound { .. } => None,
        }
    }

    pub fn operator(&self) -> Option<OperatorType> {
        match self {
            FilterItem::Single { operator, .. } => Some(*operator),
            FilterItem::Compound { .. } => None,
        }
    }

    pub fn operand(&self) -> Option<&Operand> {
        match self {
            FilterItem::Single { operand, .. } => Some(operand),
            FilterItem::Compound { .. } => None,
        }
    }

    /// Every select item the predicate reads, including column operands and
    /// the items of nested children.
    pub fn referenced_items(&self) -> Vec<&SelectItem> {
        match self {
            FilterItem::Single {
                select_item,
                operand,
                ..
            } => {
                let mut items = vec![select_item];
                if let Operand::SelectItem(other) = operand {
                    items.push(other.as_ref());
                }
                items
            }
            FilterItem::Compound { children, .. } => {
                children.iter().flat_map(|c| c.referenced_items()).collect()
            }
        }
    }

    /// Highest parameter index used plus one.
    pub fn parameter_count(&self) -> usize {
        match self {
            FilterItem::Single {
                operand: Operand::Parameter(index),
                ..
            } => index + 1,
            FilterItem::Single { .. } => 0,
            FilterItem::Compound { children, .. } => children
                .iter()
                .map(FilterItem::parameter_count)
                .max()
                .unwrap_or(0),
        }
    }

    /// Copy with every parameter replaced by the matching value.
    pub fn with_parameters(&self, parameters: &[Value]) -> QueryResult<FilterItem> {
        match self {
            FilterItem::Single {
                select_item,
                operator,
                operand: Operand::Parameter(index),
            } => {
                let value = parameters.get(*index).ok_or_else(|| {
                    QueryError::ExecutionError(format!(
                        "No value supplied for parameter {} in filter: {}",
                        index + 1,
                        self
                    ))
                })?;
                let operand = match (operator, value) {
                    (OperatorType::In | OperatorType::NotIn, Value::Other(serde_json::Value::Array(values))) => {
                        Operand::List(values.iter().cloned().map(Value::from).collect())
                    }
                    _ => Operand::Value(value.clone()),
                };
                Ok(FilterItem::new(select_item.clone(), *operator, operand))
            }
            FilterItem::Single { .. } => Ok(self.clone()),
            FilterItem::Compound { operator, children } => {
                let children = children
                    .iter()
                    .map(|c| c.with_parameters(parameters))
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(FilterItem::compound(*operator, children))
            }
        }
    }

    /// Copy with every referenced select item passed through `f`.
    pub fn map_items(&self, f: &dyn Fn(&SelectItem) -> SelectItem) -> FilterItem {
        match self {
            FilterItem::Single {
                select_item,
                operator,
                operand,
            } => {
                let operand = match operand {
                    Operand::SelectItem(other) => Operand::SelectItem(Box::new(f(other))),
                    other => other.clone(),
                };
                FilterItem::new(f(select_item), *operator, operand)
            }
            FilterItem::Compound { operator, children } => FilterItem::compound(
                *operator,
                children.iter().map(|c| c.map_items(f)).collect(),
            ),
        }
    }

    pub fn evaluate(&self, row: &Row) -> QueryResult<bool> {
        match self {
            FilterItem::Compound { operator, children } => {
                for child in children {
                    let accepted = child.evaluate(row)?;
                    match operator {
                        LogicalOperator::And if !accepted => return Ok(false),
                        LogicalOperator::Or if accepted => return Ok(true),
                        _ => {}
                    }
                }
                Ok(matches!(operator, LogicalOperator::And) || children.is_empty())
            }
            FilterItem::Single {
                select_item,
                operator,
                operand,
            } => {
                let left = resolve(row, select_item)?;
                let right = match operand {
                    Operand::Value(value) => value.clone(),
                    Operand::SelectItem(item) => resolve(row, item)?,
                    Operand::List(values) => {
                        return Ok(evaluate_list(&left, *operator, values));
                    }
                    Operand::Parameter(index) => {
                        return Err(QueryError::ExecutionError(format!(
                            "Parameter {} is not bound; compile the query and supply values",
                            index + 1
                        )))
                    }
                };
                Ok(evaluate_comparison(&left, *operator, &right))
            }
        }
    }

    pub fn to_sql(&self) -> String {
        match self {
            FilterItem::Single {
                select_item,
                operator,
                operand,
            } => {
                let left = select_item.sql_without_alias();
                match (operator, operand) {
                    (OperatorType::EqualsTo, Operand::Value(Value::Null)) => {
                        format!("{} IS NULL", left)
                    }
                    (OperatorType::DifferentFrom, Operand::Value(Value::Null)) => {
                        format!("{} IS NOT NULL", left)
                    }
                    (OperatorType::In | OperatorType::NotIn, Operand::Value(value)) => {
                        format!("{} {} ({})", left, operator, value.to_sql())
                    }
                    _ => format!("{} {} {}", left, operator, operand.to_sql()),
                }
            }
            FilterItem::Compound { operator, children } => {
                let children: Vec<String> = children.iter().map(FilterItem::to_sql).collect();
                format!("({})", children.join(&format!(" {} ", operator)))
            }
        }
    }
}

fn resolve(row: &Row, item: &SelectItem) -> QueryResult<Value> {
    row.evaluate(item).ok_or_else(|| {
        QueryError::ExecutionError(format!(
            "Filter references {} which is not part of the row",
            item.sql_without_alias()
        ))
    })
}

fn evaluate_list(left: &Value, operator: OperatorType, values: &[Value]) -> bool {
    if left.is_null() {
        return false;
    }
    let found = values.iter().any(|v| left.loose_eq(v));
    match operator {
        OperatorType::NotIn => !found,
        OperatorType::In => found,
        // other operators against a list hold when any element satisfies them
        other => values.iter().any(|v| evaluate_comparison(left, other, v)),
    }
}

fn evaluate_comparison(left: &Value, operator: OperatorType, right: &Value) -> bool {
    use std::cmp::Ordering;

    match operator {
        OperatorType::EqualsTo if right.is_null() => left.is_null(),
        OperatorType::DifferentFrom if right.is_null() => !left.is_null(),
        _ if left.is_null() || right.is_null() => false,
        OperatorType::EqualsTo => left.loose_eq(right),
        OperatorType::DifferentFrom => !left.loose_eq(right),
        OperatorType::LessThan => left.compare_loose(right) == Ordering::Less,
        OperatorType::LessThanOrEqual => left.compare_loose(right) != Ordering::Greater,
        OperatorType::GreaterThan => left.compare_loose(right) == Ordering::Greater,
        OperatorType::GreaterThanOrEqual => left.compare_loose(right) != Ordering::Less,
        OperatorType::Like => like_matches(&left.to_string(), &right.to_string()),
        OperatorType::NotLike => !like_matches(&left.to_string(), &right.to_string()),
        OperatorType::In => left.loose_eq(right),
        OperatorType::NotIn => !left.loose_eq(right),
    }
}

/// Compile a LIKE pattern (`%` any run, `_` one character) into an anchored regex.
pub fn like_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut regex_pattern = String::from("(?s)^");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '%' | '_' => {
                regex_pattern.push_str(&regex::escape(&literal));
                literal.clear();
                regex_pattern.push_str(if c == '%' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    regex_pattern.push_str(&regex::escape(&literal));
    regex_pattern.push('$');
    Regex::new(&regex_pattern)
}

fn like_matches(text: &str, pattern: &str) -> bool {
    match like_regex(pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            tracing::warn!("Invalid LIKE pattern '{}': {}", pattern, e);
            false
        }
    }
}

impl RowFilter for FilterItem {
    fn accept(&self, row: &Row) -> QueryResult<bool> {
        self.evaluate(row)
    }
}

impl fmt::Display for FilterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
