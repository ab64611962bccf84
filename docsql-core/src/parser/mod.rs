//! Parser for the SQL subset.
//!
//! Clause keywords are located in fixed order at parenthesis depth zero and
//! outside quoted text; each clause is then handed to its own item parser:
//! - from_items: tables, subqueries and join chains
//! - select_items: SELECT, GROUP BY and ORDER BY items
//! - filters: WHERE and HAVING predicates
//!
//! FROM is parsed first so that column references in every other clause can
//! be resolved against the tables it names.

mod filters;
mod from_items;
mod select_items;
mod tokenizer;


use std::cell::Cell;

use crate::error::{QueryError, QueryResult};
use crate::executor::TableResolver;
use crate::query::Query;

/// Clause keywords in the order they must appear.
const CLAUSES: [&str; 8] = [
    "SELECT", "FROM", "WHERE", "GROUP BY", "HAVING", "ORDER BY", "LIMIT", "OFFSET",
];

/// Parses query text into a [`Query`], resolving tables through a
/// [`TableResolver`].
pub struct QueryParser<'a> {
    resolver: &'a dyn TableResolver,
    allow_expression_select_items: bool,
    next_parameter: Cell<usize>,
}

impl<'a> QueryParser<'a> {
    pub fn new(resolver: &'a dyn TableResolver) -> Self {
        Self {
            resolver,
            allow_expression_select_items: false,
            next_parameter: Cell::new(0),
        }
    }

    /// Accept unrecognised select items as raw expressions, provided they
    /// carry an alias.
    pub fn allow_expression_select_items(mut self, allow: bool) -> Self {
        self.allow_expression_select_items = allow;
        self
    }

    /// Parse a query. Subqueries number their `?` parameters on their own.
    pub fn parse(&self, sql: &str) -> QueryResult<Query> {
        let sql = tokenizer::normalize_whitespace(sql)?;
        let outer_parameters = self.next_parameter.replace(0);
        let result = self.parse_normalized(&sql);
        self.next_parameter.set(outer_parameters);
        result
    }

    fn parse_normalized(&self, sql: &str) -> QueryResult<Query> {
        let clauses = locate_clauses(sql)?;
        let clause = |keyword: &str| {
            clauses
                .iter()
                .find(|(k, _)| *k == keyword)
                .map(|(_, text)| *text)
        };

        let mut query = Query::new();
        if let Some(from) = clause("FROM") {
            self.parse_from_clause(&mut query, from)?;
        }
        if let Some(select) = clause("SELECT") {
            self.parse_select_clause(&mut query, select)?;
        }
        if let Some(text) = clause("WHERE") {
            for filter in self.parse_filters(&query, "WHERE", text)? {
                query.where_item(filter);
            }
        }
        if let Some(text) = clause("GROUP BY") {
            self.parse_group_by_clause(&mut query, text)?;
        }
        if let Some(text) = clause("HAVING") {
            for filter in self.parse_filters(&query, "HAVING", text)? {
                query.having(filter);
            }
        }
        if let Some(text) = clause("ORDER BY") {
            self.parse_order_by_clause(&mut query, text)?;
        }
        if let Some(text) = clause("LIMIT") {
            query.set_max_rows(Some(parse_count("LIMIT", text)?));
        }
        if let Some(text) = clause("OFFSET") {
            let first_row = parse_count("OFFSET", text)?
                .checked_add(1)
                .ok_or_else(|| QueryError::ParseError(format!("OFFSET {} is too large", text.trim())))?;
            query.set_first_row(first_row);
        }

        tracing::trace!("Parsed query: {}", query);
        Ok(query)
    }

    fn take_parameter(&self) -> usize {
        let index = self.next_parameter.get();
        self.next_parameter.set(index + 1);
        index
    }
}

/// Parse a query with default options.
pub fn parse(resolver: &dyn TableResolver, sql: &str) -> QueryResult<Query> {
    QueryParser::new(resolver).parse(sql)
}

/// Text of each clause present, keyed by its keyword.
fn locate_clauses(sql: &str) -> QueryResult<Vec<(&'static str, &str)>> {
    let mut located: Vec<(&'static str, usize, usize)> = Vec::new();
    let mut from = 0;
    for keyword in CLAUSES {
        if let Some((start, end)) = tokenizer::find_keyword(sql, keyword, from) {
            located.push((keyword, start, end));
            from = end;
        }
    }

    match located.first() {
        Some(("SELECT", 0, _)) => {}
        Some(("SELECT", start, _)) => {
            return Err(QueryError::unparsable("query", &sql[..*start]));
        }
        _ => {
            return Err(QueryError::ParseError(format!(
                "SELECT clause not found in query: {}",
                sql
            )))
        }
    }
    if !located.iter().any(|(keyword, _, _)| *keyword == "FROM") {
        return Err(QueryError::ParseError(format!(
            "FROM clause not found in query: {}",
            sql
        )));
    }

    let mut clauses = Vec::with_capacity(located.len());
    for (i, (keyword, _, end)) in located.iter().enumerate() {
        let next = located.get(i + 1).map_or(sql.len(), |(_, start, _)| *start);
        let text = sql[*end..next].trim();
        if text.is_empty() {
            return Err(QueryError::ParseError(format!(
                "Empty {} clause in query: {}",
                keyword, sql
            )));
        }
        clauses.push((*keyword, text));
    }
    Ok(clauses)
}

fn parse_count(clause: &str, text: &str) -> QueryResult<usize> {
    text.trim()
        .parse::<usize>()
        .map_err(|_| QueryError::unparsable(clause, text))
}
