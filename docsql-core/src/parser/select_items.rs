//! SELECT, GROUP BY and ORDER BY items, plus the column and function
//! resolution the filter and join parsers share.

use crate::error::{QueryError, QueryResult};
use crate::query::{
    all_items_of, Direction, FromItem, FromItemKind, FromItemRef, FunctionType, OrderByItem, Query,
    SelectItem,
};
use crate::schema::{Column, ColumnType};
use crate::value::Value;

use super::tokenizer::{
    matching_paren, parse_literal, split_alias, split_top_level, strip_keyword_prefix,
    unquote_identifier,
};
use super::QueryParser;

impl QueryParser<'_> {
    pub(super) fn parse_select_clause(&self, query: &mut Query, text: &str) -> QueryResult<()> {
        let text = match strip_keyword_prefix(text, "DISTINCT") {
            Some(rest) => {
                query.set_distinct(true);
                rest
            }
            None => text,
        };

        for token in split_top_level(text, ",") {
            self.parse_select_item(query, token)?;
        }
        if query.select_items().is_empty() {
            return Err(QueryError::unparsable("SELECT", text));
        }
        Ok(())
    }

    fn parse_select_item(&self, query: &mut Query, token: &str) -> QueryResult<()> {
        if token == "*" {
            query.select_all();
            return Ok(());
        }
        if let Some(prefix) = token.strip_suffix(".*") {
            let from_item = query
                .find_from_item(unquote_identifier(prefix))
                .ok_or_else(|| QueryError::unparsable("SELECT", token))?;
            let items: Vec<SelectItem> = from_item.leaves().into_iter().flat_map(all_items_of).collect();
            for item in items {
                query.select(item);
            }
            return Ok(());
        }

        let (expression, alias) = split_alias(token);
        let item = match self.resolve_item(query, expression)? {
            Some(item) => match alias {
                Some(alias) => item.with_alias(alias),
                None => item,
            },
            None if self.allow_expression_select_items => {
                SelectItem::expression(expression, alias.unwrap_or_default())?
            }
            None => return Err(QueryError::unparsable("SELECT", token)),
        };
        query.select(item);
        Ok(())
    }

    pub(super) fn parse_group_by_clause(&self, query: &mut Query, text: &str) -> QueryResult<()> {
        for token in split_top_level(text, ",") {
            let item = self
                .resolve_reference(query, token)?
                .ok_or_else(|| QueryError::unparsable("GROUP BY", token))?;
            query.group_by(item);
        }
        Ok(())
    }

    pub(super) fn parse_order_by_clause(&self, query: &mut Query, text: &str) -> QueryResult<()> {
        for token in split_top_level(text, ",") {
            let (expression, direction) = split_direction(token);
            let item = self
                .resolve_reference(query, expression)?
                .ok_or_else(|| QueryError::unparsable("ORDER BY", token))?;
            query.order_by(OrderByItem::new(item, direction));
        }
        Ok(())
    }

    /// A select-clause alias, else any item [`Self::resolve_item`] accepts.
    pub(super) fn resolve_reference(&self, query: &Query, token: &str) -> QueryResult<Option<SelectItem>> {
        if let Some(item) = query.find_select_item_by_alias(unquote_identifier(token)) {
            return Ok(Some(item.clone()));
        }
        self.resolve_item(query, token)
    }

    /// Resolve `COUNT(*)`, a function call over a column, or a column.
    ///
    /// `Ok(None)` means the text names nothing known; errors are reserved for
    /// malformed function calls and ambiguous columns.
    pub(super) fn resolve_item(&self, query: &Query, text: &str) -> QueryResult<Option<SelectItem>> {
        let text = text.trim();
        if let Some(rest) = strip_keyword_prefix(text, "APPROXIMATE") {
            return Ok(self
                .resolve_item(query, rest)?
                .map(|item| item.with_function_approximation_allowed(true)));
        }

        if let Some((name, arguments)) = split_function_call(text) {
            let Some(function) = FunctionType::from_name(name) else {
                return Ok(None);
            };
            if function == FunctionType::Count && arguments == "*" {
                return Ok(Some(SelectItem::count_all()));
            }
            return self.resolve_function(query, function, arguments, text).map(Some);
        }

        resolve_column(query, unquote_identifier(text))
    }

    fn resolve_function(
        &self,
        query: &Query,
        function: FunctionType,
        arguments: &str,
        text: &str,
    ) -> QueryResult<SelectItem> {
        let mut arguments = split_top_level(arguments, ",").into_iter();
        let target = arguments
            .next()
            .ok_or_else(|| QueryError::unparsable("function", text))?;
        let inner = resolve_column(query, unquote_identifier(target))?
            .filter(|item| item.get_function().is_none())
            .ok_or_else(|| QueryError::unparsable("function", text))?;

        let parameters = arguments
            .map(|argument| parse_literal(argument).ok_or_else(|| QueryError::unparsable("function", text)))
            .collect::<QueryResult<Vec<Value>>>()?;

        let item = inner.replace_function(Some(function));
        Ok(if parameters.is_empty() {
            item
        } else {
            item.with_function_parameters(parameters)
        })
    }
}

/// `NAME(arguments)` spanning all of `text`.
fn split_function_call(text: &str) -> Option<(&str, &str)> {
    let open = text.find('(')?;
    let name = text[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    (matching_paren(text, open)? == text.len() - 1).then(|| (name, text[open + 1..text.len() - 1].trim()))
}

fn split_direction(token: &str) -> (&str, Direction) {
    match token.rsplit_once(' ') {
        Some((expression, word)) if word.eq_ignore_ascii_case("DESC") => (expression, Direction::Descending),
        Some((expression, word)) if word.eq_ignore_ascii_case("ASC") => (expression, Direction::Ascending),
        _ => (token, Direction::Ascending),
    }
}

/// Resolve a possibly qualified column name.
///
/// The longest dotted prefix naming a from item qualifies the rest; an
/// unqualified name must belong to exactly one from item.
pub(super) fn resolve_column(query: &Query, name: &str) -> QueryResult<Option<SelectItem>> {
    for (dot, _) in name.rmatch_indices('.') {
        let prefix = unquote_identifier(&name[..dot]);
        if let Some(from_item) = query.find_from_item(prefix) {
            return Ok(resolve_in(from_item, unquote_identifier(&name[dot + 1..]), true));
        }
    }

    let mut candidates: Vec<SelectItem> = query
        .from_items()
        .iter()
        .flat_map(FromItem::leaves)
        .filter_map(|leaf| resolve_in(leaf, name, false))
        .collect();
    match candidates.len() {
        0 | 1 => Ok(candidates.pop()),
        _ => Err(QueryError::ParseError(format!(
            "Ambiguous column reference: {}",
            name
        ))),
    }
}

/// Resolve `name` inside one from item. Table columns are scoped only when
/// the reference was qualified; subquery references are always scoped.
fn resolve_in(from_item: &FromItem, name: &str, qualified: bool) -> Option<SelectItem> {
    match from_item.kind() {
        FromItemKind::Table(table) => {
            let scope = if qualified { from_item.reference() } else { None };
            if let Some(column) = table.column_by_name(name) {
                return Some(scoped_column(column.clone(), scope));
            }
            // `doc.address.city` reads into a document column
            let (head, path) = name.split_once('.')?;
            let column = table.column_by_name(head)?;
            if !matches!(column.column_type, None | Some(ColumnType::Other)) {
                return None;
            }
            Some(
                SelectItem::function_from(FunctionType::MapValue, column.clone(), scope)
                    .with_function_parameters(vec![Value::from(path)]),
            )
        }
        FromItemKind::SubQuery(subquery) => {
            let inner = subquery.find_select_item_by_alias(name).or_else(|| {
                subquery.select_items().iter().find(|item| {
                    item.alias().is_none()
                        && (item.sql_without_alias().eq_ignore_ascii_case(name)
                            || (item.get_function().is_none()
                                && item.get_column().is_some_and(|c| c.name.eq_ignore_ascii_case(name))))
                })
            })?;
            SelectItem::subquery(inner.clone(), from_item).ok()
        }
        FromItemKind::Join(_) => from_item
            .leaves()
            .into_iter()
            .find_map(|leaf| resolve_in(leaf, name, qualified)),
        FromItemKind::Expression(_) => None,
    }
}

fn scoped_column(column: Column, scope: Option<FromItemRef>) -> SelectItem {
    match scope {
        Some(reference) => SelectItem::column_from(column, reference),
        None => SelectItem::column(column),
    }
}
