//! WHERE and HAVING predicates.
//!
//! A clause is split on top-level `AND`, each segment becoming one filter.
//! Within a segment `OR` binds first, then `AND`, recursing into
//! parenthesised groups.

use crate::error::{QueryError, QueryResult};
use crate::query::{FilterItem, LogicalOperator, Operand, OperatorType, Query, SelectItem};
use crate::schema::ColumnType;
use crate::value::{parse_number, parse_temporal, Value};

use super::tokenizer::{find_first_of, parse_literal, split_top_level, unwrap_parentheses};
use super::QueryParser;

impl QueryParser<'_> {
    pub(super) fn parse_filters(&self, query: &Query, clause: &str, text: &str) -> QueryResult<Vec<FilterItem>> {
        split_top_level(text, " AND ")
            .into_iter()
            .map(|segment| self.parse_filter(query, clause, segment))
            .collect()
    }

    fn parse_filter(&self, query: &Query, clause: &str, text: &str) -> QueryResult<FilterItem> {
        if let Some(inner) = unwrap_parentheses(text) {
            return self.parse_filter(query, clause, inner);
        }
        for (delimiter, operator) in [(" OR ", LogicalOperator::Or), (" AND ", LogicalOperator::And)] {
            let parts = split_top_level(text, delimiter);
            if parts.len() > 1 {
                let children = parts
                    .into_iter()
                    .map(|part| self.parse_filter(query, clause, part))
                    .collect::<QueryResult<Vec<_>>>()?;
                return Ok(FilterItem::compound(operator, children));
            }
        }
        self.parse_comparison(query, clause, text)
    }

    fn parse_comparison(&self, query: &Query, clause: &str, text: &str) -> QueryResult<FilterItem> {
        for (suffix, operator) in [
            (" IS NOT NULL", OperatorType::DifferentFrom),
            (" IS NULL", OperatorType::EqualsTo),
        ] {
            if let Some(left) = strip_suffix_ignore_case(text, suffix) {
                let item = self.filter_item(query, clause, left, text)?;
                return Ok(FilterItem::new(item, operator, Operand::Value(Value::Null)));
            }
        }

        let (operator, start, end) = find_operator(text).ok_or_else(|| QueryError::unparsable(clause, text))?;
        let item = self.filter_item(query, clause, &text[..start], text)?;
        let operand = self.parse_operand(query, clause, &item, operator, text[end..].trim(), text)?;
        Ok(FilterItem::new(item, operator, operand))
    }

    fn filter_item(&self, query: &Query, clause: &str, token: &str, text: &str) -> QueryResult<SelectItem> {
        self.resolve_reference(query, token.trim())?
            .ok_or_else(|| QueryError::unparsable(clause, text))
    }

    fn parse_operand(
        &self,
        query: &Query,
        clause: &str,
        item: &SelectItem,
        operator: OperatorType,
        operand: &str,
        text: &str,
    ) -> QueryResult<Operand> {
        if operand == "?" {
            return Ok(Operand::Parameter(self.take_parameter()));
        }

        let column_type = item.expected_column_type();
        if matches!(operator, OperatorType::In | OperatorType::NotIn) {
            let list = unwrap_parentheses(operand).ok_or_else(|| QueryError::unparsable(clause, text))?;
            let values = split_top_level(list, ",")
                .into_iter()
                .map(|value| {
                    parse_literal(value)
                        .map(|value| coerce_literal(value, column_type))
                        .ok_or_else(|| QueryError::unparsable(clause, text))
                })
                .collect::<QueryResult<Vec<_>>>()?;
            return Ok(Operand::List(values));
        }

        if let Some(value) = parse_literal(operand) {
            return Ok(match operator {
                OperatorType::Like | OperatorType::NotLike => Operand::Value(value),
                _ => Operand::Value(coerce_literal(value, column_type)),
            });
        }

        let other = self.filter_item(query, clause, operand, text)?;
        Ok(Operand::SelectItem(Box::new(other)))
    }
}

/// Operator spellings, longest first so that `<=` wins over `<`.
fn operator_patterns() -> Vec<(String, OperatorType)> {
    let mut patterns: Vec<(String, OperatorType)> = OperatorType::ALL
        .iter()
        .flat_map(|operator| {
            let primary = if operator.is_word() {
                format!(" {} ", operator.sql())
            } else {
                operator.sql().to_string()
            };
            std::iter::once(primary)
                .chain(operator.aliases().iter().map(|alias| alias.to_string()))
                .map(move |pattern| (pattern, *operator))
        })
        .collect();
    patterns.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    patterns
}

/// Leftmost top-level operator with its byte span.
fn find_operator(text: &str) -> Option<(OperatorType, usize, usize)> {
    let patterns = operator_patterns();
    let spellings: Vec<&str> = patterns.iter().map(|(pattern, _)| pattern.as_str()).collect();
    let (found, start, end) = find_first_of(text, &spellings)?;
    patterns
        .iter()
        .find(|(pattern, _)| pattern == found)
        .map(|(_, operator)| (*operator, start, end))
}

fn strip_suffix_ignore_case<'t>(text: &'t str, suffix: &str) -> Option<&'t str> {
    let split = text.len().checked_sub(suffix.len())?;
    text.get(split..)
        .filter(|tail| tail.eq_ignore_ascii_case(suffix))
        .map(|_| &text[..split])
}

/// Convert a textual literal to the type of the item it is compared with.
fn coerce_literal(value: Value, column_type: Option<ColumnType>) -> Value {
    let converted = match (column_type, &value) {
        (Some(ColumnType::Number), Value::Text(text)) => parse_number(text),
        (Some(ColumnType::Temporal), Value::Text(text)) => parse_temporal(text).map(Value::Temporal),
        (Some(ColumnType::Boolean), Value::Text(_) | Value::Integer(_)) => value.to_boolean().map(Value::Boolean),
        _ => None,
    };
    converted.unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_operator_prefers_longest_and_leftmost() {
        assert_eq!(find_operator("a <= 3"), Some((OperatorType::LessThanOrEqual, 2, 4)));
        assert_eq!(find_operator("a != 3").map(|(op, ..)| op), Some(OperatorType::DifferentFrom));
        assert_eq!(
            find_operator("name NOT LIKE '%a%'").map(|(op, ..)| op),
            Some(OperatorType::NotLike)
        );
        assert_eq!(
            find_operator("name = 'a < b'").map(|(op, ..)| op),
            Some(OperatorType::EqualsTo)
        );
        assert_eq!(find_operator("id IN (1, 2)").map(|(op, ..)| op), Some(OperatorType::In));
        assert_eq!(find_operator("name"), None);
    }

    #[test]
    fn test_coerce_literal() {
        assert_eq!(coerce_literal(Value::from("42"), Some(ColumnType::Number)), Value::from(42));
        assert_eq!(coerce_literal(Value::from("n/a"), Some(ColumnType::Number)), Value::from("n/a"));
        assert_eq!(coerce_literal(Value::from(1), Some(ColumnType::Boolean)), Value::from(true));
        assert!(matches!(
            coerce_literal(Value::from("2024-02-01"), Some(ColumnType::Temporal)),
            Value::Temporal(_)
        ));
        assert_eq!(coerce_literal(Value::from("42"), None), Value::from("42"));
    }
}
