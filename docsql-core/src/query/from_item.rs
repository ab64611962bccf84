//! From items: tables, joins and subqueries that supply rows.

use std::fmt;

use crate::error::{QueryError, QueryResult};
use crate::schema::Table;

use super::filter_item::{FilterItem, Operand, OperatorType};
use super::select_item::{FromItemRef, SelectItem};
use super::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_uppercase().as_str() {
            "INNER" => Some(JoinType::Inner),
            "LEFT" => Some(JoinType::Left),
            "RIGHT" => Some(JoinType::Right),
            _ => None,
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
        };
        f.write_str(keyword)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinItem {
    pub join_type: JoinType,
    pub left: FromItem,
    pub right: FromItem,
    /// Parallel to `right_on`; each pair is one equality condition.
    pub left_on: Vec<SelectItem>,
    pub right_on: Vec<SelectItem>,
}

impl JoinItem {
    /// The ON conditions as equality filters between the paired items.
    pub fn on_conditions(&self) -> Vec<FilterItem> {
        self.left_on
            .iter()
            .zip(&self.right_on)
            .map(|(left, right)| {
                FilterItem::new(
                    left.clone(),
                    OperatorType::EqualsTo,
                    Operand::SelectItem(Box::new(right.clone())),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromItemKind {
    Table(Table),
    Join(Box<JoinItem>),
    SubQuery(Box<Query>),
    /// Raw source expression; accepted by the model but not executable by
    /// the post-processing engine.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromItem {
    kind: FromItemKind,
    alias: Option<String>,
}

impl FromItem {
    pub fn table(table: Table) -> Self {
        Self {
            kind: FromItemKind::Table(table),
            alias: None,
        }
    }

    pub fn subquery(query: Query) -> Self {
        Self {
            kind: FromItemKind::SubQuery(Box::new(query)),
            alias: None,
        }
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            kind: FromItemKind::Expression(expression.into()),
            alias: None,
        }
    }

    /// Join two from items on pairwise equality of `left_on[i]` and `right_on[i]`.
    pub fn join(
        join_type: JoinType,
        left: FromItem,
        right: FromItem,
        left_on: Vec<SelectItem>,
        right_on: Vec<SelectItem>,
    ) -> QueryResult<Self> {
        if left_on.len() != right_on.len() {
            return Err(QueryError::ConfigurationError(format!(
                "Join has {} left ON items but {} right ON items",
                left_on.len(),
                right_on.len()
            )));
        }
        if left_on.is_empty() {
            return Err(QueryError::ConfigurationError(format!(
                "Join between {} and {} has no ON conditions",
                left, right
            )));
        }
        Ok(Self {
            kind: FromItemKind::Join(Box::new(JoinItem {
                join_type,
                left,
                right,
                left_on,
                right_on,
            })),
            alias: None,
        })
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn kind(&self) -> &FromItemKind {
        &self.kind
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn get_table(&self) -> Option<&Table> {
        match &self.kind {
            FromItemKind::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn get_subquery(&self) -> Option<&Query> {
        match &self.kind {
            FromItemKind::SubQuery(query) => Some(query),
            _ => None,
        }
    }

    pub fn get_join(&self) -> Option<&JoinItem> {
        match &self.kind {
            FromItemKind::Join(join) => Some(join),
            _ => None,
        }
    }

    /// Alias, or table name for unaliased tables.
    pub fn label(&self) -> Option<&str> {
        match (&self.alias, &self.kind) {
            (Some(alias), _) => Some(alias),
            (None, FromItemKind::Table(table)) => Some(&table.name),
            _ => None,
        }
    }

    /// Scope handle given to select items drawn from this item.
    pub fn reference(&self) -> Option<FromItemRef> {
        self.label().map(FromItemRef::new)
    }

    /// Find the item (this one or a joined descendant) that `reference` names.
    /// Aliases win over table names.
    pub fn find_by_reference(&self, reference: &str) -> Option<&FromItem> {
        let leaves = self.leaves();
        leaves
            .iter()
            .find(|item| item.alias().is_some_and(|a| a == reference))
            .or_else(|| {
                leaves
                    .iter()
                    .find(|item| item.alias().is_some_and(|a| a.eq_ignore_ascii_case(reference)))
            })
            .or_else(|| {
                leaves.iter().find(|item| {
                    item.alias.is_none()
                        && item.get_table().is_some_and(|t| t.name.eq_ignore_ascii_case(reference))
                })
            })
            .copied()
    }

    /// Non-join items reachable from this one, left to right.
    pub fn leaves(&self) -> Vec<&FromItem> {
        match &self.kind {
            FromItemKind::Join(join) => {
                let mut leaves = join.left.leaves();
                leaves.extend(join.right.leaves());
                leaves
            }
            _ => vec![self],
        }
    }

    /// Copy with subqueries resolved and join ON items passed through `scope`.
    pub(super) fn resolved(&self, scope: &dyn Fn(&SelectItem) -> SelectItem) -> FromItem {
        let kind = match &self.kind {
            FromItemKind::SubQuery(query) => FromItemKind::SubQuery(Box::new(query.resolved())),
            FromItemKind::Join(join) => FromItemKind::Join(Box::new(JoinItem {
                join_type: join.join_type,
                left: join.left.resolved(scope),
                right: join.right.resolved(scope),
                left_on: join.left_on.iter().map(|i| scope(i).without_alias()).collect(),
                right_on: join.right_on.iter().map(|i| scope(i).without_alias()).collect(),
            })),
            other => other.clone(),
        };
        FromItem {
            kind,
            alias: self.alias.clone(),
        }
    }

    pub fn to_sql(&self) -> String {
        let body = match &self.kind {
            FromItemKind::Table(table) => table.name.clone(),
            FromItemKind::SubQuery(query) => format!("({})", query.to_sql()),
            FromItemKind::Expression(expression) => expression.clone(),
            FromItemKind::Join(join) => {
                let conditions: Vec<String> = join
                    .left_on
                    .iter()
                    .zip(&join.right_on)
                    .map(|(l, r)| format!("{} = {}", l.sql_without_alias(), r.sql_without_alias()))
                    .collect();
                format!(
                    "{} {} JOIN {} ON {}",
                    join.left.to_sql(),
                    join.join_type,
                    join.right.to_sql(),
                    conditions.join(" AND ")
                )
            }
        };
        match (&self.alias, &self.kind) {
            (Some(alias), FromItemKind::Join(_)) | (Some(alias), FromItemKind::Expression(_)) => {
                tracing::trace!("alias '{}' on {} is not rendered", alias, body);
                body
            }
            (Some(alias), _) => format!("{} {}", body, alias),
            (None, _) => body,
        }
    }
}

impl fmt::Display for FromItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
