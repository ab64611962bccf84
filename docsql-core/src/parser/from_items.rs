//! FROM items: tables, subqueries and join chains.

use crate::error::{QueryError, QueryResult};
use crate::query::{FromItem, JoinType, Query, SelectItem};

use super::select_items::resolve_column;
use super::tokenizer::{
    find_keyword, find_keywords, find_pattern, matching_paren, split_top_level,
    strip_keyword_prefix, unquote_identifier, unwrap_parentheses,
};
use super::QueryParser;

impl QueryParser<'_> {
    /// Comma-separated items are cross joined by the executor.
    pub(super) fn parse_from_clause(&self, query: &mut Query, text: &str) -> QueryResult<()> {
        for token in split_top_level(text, ",") {
            let item = self.parse_from_item(query, token)?;
            query.from(item);
        }
        Ok(())
    }

    fn parse_from_item(&self, query: &Query, token: &str) -> QueryResult<FromItem> {
        let joins = find_keywords(token, "JOIN");
        if joins.is_empty() {
            self.parse_simple_from_item(token)
        } else {
            self.parse_join_chain(query, token, &joins)
        }
    }

    fn parse_simple_from_item(&self, token: &str) -> QueryResult<FromItem> {
        let token = token.trim();
        if token.starts_with('(') {
            let close = matching_paren(token, 0).ok_or_else(|| QueryError::unparsable("FROM", token))?;
            let inner = token[1..close].trim();
            let item = if strip_keyword_prefix(inner, "SELECT").is_some() {
                FromItem::subquery(self.parse(inner)?)
            } else {
                self.parse_from_item(&Query::new(), inner)?
            };
            return Ok(match parse_alias(&token[close + 1..], token)? {
                Some(alias) => item.with_alias(alias),
                None => item,
            });
        }

        let (name, rest) = split_table_name(token);
        let name = unquote_identifier(name);
        if name.is_empty() {
            return Err(QueryError::unparsable("FROM", token));
        }
        let table = self
            .resolver
            .table_by_qualified_label(name)
            .ok_or_else(|| QueryError::ParseError(format!("No such table: {}", name)))?;
        let item = FromItem::table(table);
        Ok(match parse_alias(rest, token)? {
            Some(alias) => item.with_alias(alias),
            None => item,
        })
    }

    /// `a [type] JOIN b ON … [type] JOIN c ON …`, folded left to right.
    fn parse_join_chain(&self, query: &Query, token: &str, joins: &[(usize, usize)]) -> QueryResult<FromItem> {
        let (first, mut join_type) = split_join_type(&token[..joins[0].0], token)?;
        let mut left = self.parse_simple_from_item(first)?;

        for (i, &(_, end)) in joins.iter().enumerate() {
            let segment = match joins.get(i + 1) {
                Some(&(next, _)) => &token[end..next],
                None => &token[end..],
            };
            let (segment, next_type) = if i + 1 < joins.len() {
                split_join_type(segment, token)?
            } else {
                (segment.trim(), JoinType::Inner)
            };

            let (right_text, conditions) = match find_keyword(segment, "ON", 0) {
                Some((start, on_end)) => (&segment[..start], segment[on_end..].trim()),
                None => {
                    return Err(QueryError::ParseError(format!(
                        "Join is missing an ON clause: {}",
                        token
                    )))
                }
            };
            let right = self.parse_simple_from_item(right_text)?;
            let (left_on, right_on) = join_conditions(query, &left, &right, conditions)?;
            tracing::trace!("{} join of {} and {}", join_type, left, right);
            left = FromItem::join(join_type, left, right, left_on, right_on)?;
            join_type = next_type;
        }
        Ok(left)
    }
}

/// Split the join type keyword(s) off the end of the text preceding `JOIN`.
fn split_join_type<'t>(text: &'t str, token: &str) -> QueryResult<(&'t str, JoinType)> {
    let text = text.trim();
    let (rest, word) = last_word(text);
    let (rest, word, outer) = if word.eq_ignore_ascii_case("OUTER") {
        let (rest, word) = last_word(rest);
        (rest, word, true)
    } else {
        (rest, word, false)
    };

    match JoinType::from_keyword(word) {
        Some(JoinType::Inner) if outer => Err(QueryError::unparsable("JOIN", token)),
        Some(join_type) => Ok((rest, join_type)),
        None if word.eq_ignore_ascii_case("FULL") || word.eq_ignore_ascii_case("CROSS") => {
            Err(QueryError::ParseError(format!(
                "Unsupported join type {}: {}",
                word.to_ascii_uppercase(),
                token
            )))
        }
        None if outer => Err(QueryError::unparsable("JOIN", token)),
        None => Ok((text, JoinType::Inner)),
    }
}

fn last_word(text: &str) -> (&str, &str) {
    text.rsplit_once(' ')
        .map(|(rest, word)| (rest.trim(), word))
        .unwrap_or(("", text))
}

/// ON items of a join, each condition `x = y` oriented left side first.
fn join_conditions(
    query: &Query,
    left: &FromItem,
    right: &FromItem,
    conditions: &str,
) -> QueryResult<(Vec<SelectItem>, Vec<SelectItem>)> {
    let mut scope = query.clone();
    scope.from(left.clone()).from(right.clone());

    let conditions = unwrap_parentheses(conditions).unwrap_or(conditions);
    let mut left_on = Vec::new();
    let mut right_on = Vec::new();
    for condition in split_top_level(conditions, " AND ") {
        let condition = unwrap_parentheses(condition).unwrap_or(condition);
        let (start, end) = find_pattern(condition, "=").ok_or_else(|| QueryError::unparsable("JOIN", condition))?;
        let resolve = |text: &str| -> QueryResult<SelectItem> {
            resolve_column(&scope, unquote_identifier(text.trim()))?
                .ok_or_else(|| QueryError::unparsable("JOIN", condition))
        };
        let first = resolve(&condition[..start])?;
        let second = resolve(&condition[end..])?;
        if belongs_to(&first, right) && !belongs_to(&second, right) {
            left_on.push(second);
            right_on.push(first);
        } else {
            left_on.push(first);
            right_on.push(second);
        }
    }
    Ok((left_on, right_on))
}

fn belongs_to(item: &SelectItem, from_item: &FromItem) -> bool {
    from_item.leaves().iter().any(|leaf| match item.from_item() {
        Some(reference) => leaf.label().is_some_and(|label| reference.matches(label)),
        None => match (item.get_column(), leaf.get_table()) {
            (Some(column), Some(table)) => column.table == table.name,
            _ => false,
        },
    })
}

/// Table name (possibly quoted) and whatever follows it.
fn split_table_name(token: &str) -> (&str, &str) {
    let closing = match token.chars().next() {
        Some('"') => Some('"'),
        Some('`') => Some('`'),
        Some('[') => Some(']'),
        _ => None,
    };
    if let Some(closing) = closing {
        if let Some(end) = token[1..].find(closing) {
            return (&token[..end + 2], &token[end + 2..]);
        }
    }
    token.split_once(' ').unwrap_or((token, ""))
}

/// Optional `[AS] alias` after a table or subquery.
fn parse_alias(text: &str, token: &str) -> QueryResult<Option<String>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let alias = strip_keyword_prefix(text, "AS").unwrap_or(text);
    let unquoted = unquote_identifier(alias);
    if unquoted.is_empty() || (unquoted == alias && alias.contains(' ')) {
        return Err(QueryError::unparsable("FROM", token));
    }
    Ok(Some(unquoted.to_string()))
}
