//! Column layout of a data set.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::query::{ItemId, SelectItem};
use crate::schema::Column;

/// Where a looked-up item was found in a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub index: usize,
    /// The looked-up item carries a scalar function and only its function-less form
    /// was found; the caller must apply the function to the cell.
    pub via_function_fallback: bool,
}

/// Ordered, index-addressable list of select items.
///
/// Lookups fall back through identity, strict structural equality and loose
/// structural equality, then retry without a scalar function.
pub trait DataSetHeader: Send + Sync + fmt::Debug {
    fn select_items(&self) -> &[SelectItem];

    fn resolve(&self, item: &SelectItem) -> Option<Resolution>;

    fn index_of_column(&self, column: &Column) -> Option<usize>;

    fn index_of(&self, item: &SelectItem) -> Option<usize> {
        self.resolve(item).map(|r| r.index)
    }

    fn len(&self) -> usize {
        self.select_items().len()
    }

    fn is_empty(&self) -> bool {
        self.select_items().is_empty()
    }

    fn get(&self, index: usize) -> Option<&SelectItem> {
        self.select_items().get(index)
    }
}

pub type HeaderRef = Arc<dyn DataSetHeader>;

/// Same items in the same order with the same aliases.
pub fn same_layout(a: &[SelectItem], b: &[SelectItem]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

fn find(items: &[SelectItem], item: &SelectItem) -> Option<usize> {
    items
        .iter()
        .position(|candidate| candidate.id() == item.id())
        .or_else(|| items.iter().position(|c| c.equals_ignore_alias(item, true)))
        .or_else(|| items.iter().position(|c| c.equals_ignore_alias(item, false)))
}

pub(crate) fn resolve_index(items: &[SelectItem], item: &SelectItem) -> Option<Resolution> {
    if let Some(index) = find(items, item) {
        return Some(Resolution {
            index,
            via_function_fallback: false,
        });
    }
    if item.scalar_function().is_some() {
        let stripped = item.replace_function(None);
        return find(items, &stripped).map(|index| Resolution {
            index,
            via_function_fallback: true,
        });
    }
    None
}

fn column_index(items: &[SelectItem], column: &Column) -> Option<usize> {
    let plain = |item: &SelectItem| item.get_function().is_none();
    items
        .iter()
        .position(|item| plain(item) && item.get_column() == Some(column))
        .or_else(|| {
            items.iter().position(|item| {
                plain(item)
                    && item.get_column().is_some_and(|c| {
                        c.name.eq_ignore_ascii_case(&column.name)
                            && c.table.eq_ignore_ascii_case(&column.table)
                    })
            })
        })
}

/// Linear-scan header, cheap to build.
#[derive(Debug, Clone)]
pub struct SimpleDataSetHeader {
    items: Vec<SelectItem>,
}

impl SimpleDataSetHeader {
    pub fn new(items: Vec<SelectItem>) -> Self {
        Self { items }
    }

    pub fn shared(items: Vec<SelectItem>) -> HeaderRef {
        Arc::new(Self::new(items))
    }
}

impl DataSetHeader for SimpleDataSetHeader {
    fn select_items(&self) -> &[SelectItem] {
        &self.items
    }

    fn resolve(&self, item: &SelectItem) -> Option<Resolution> {
        resolve_index(&self.items, item)
    }

    fn index_of_column(&self, column: &Column) -> Option<usize> {
        column_index(&self.items, column)
    }
}

/// Header that memoises lookups, for headers queried once per row in join
/// and grouping loops. Shared across threads, hence the concurrent maps.
#[derive(Debug)]
pub struct CachingDataSetHeader {
    items: Vec<SelectItem>,
    item_cache: DashMap<ItemId, Option<Resolution>>,
    column_cache: DashMap<Column, Option<usize>>,
}

impl CachingDataSetHeader {
    pub fn new(items: Vec<SelectItem>) -> Self {
        Self {
            items,
            item_cache: DashMap::new(),
            column_cache: DashMap::new(),
        }
    }

    pub fn shared(items: Vec<SelectItem>) -> HeaderRef {
        Arc::new(Self::new(items))
    }
}

impl DataSetHeader for CachingDataSetHeader {
    fn select_items(&self) -> &[SelectItem] {
        &self.items
    }

    fn resolve(&self, item: &SelectItem) -> Option<Resolution> {
        // Item ids change whenever anything but the alias changes, and the
        // alias plays no part in resolution.
        if let Some(cached) = self.item_cache.get(&item.id()) {
            return *cached;
        }
        let resolution = resolve_index(&self.items, item);
        self.item_cache.insert(item.id(), resolution);
        resolution
    }

    fn index_of_column(&self, column: &Column) -> Option<usize> {
        if let Some(cached) = self.column_cache.get(column) {
            return *cached;
        }
        let index = column_index(&self.items, column);
        self.column_cache.insert(column.clone(), index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FromItemRef, FunctionType};
    use crate::schema::ColumnType;

    fn name_column() -> Column {
        Column::new("people", "name").with_type(ColumnType::Text)
    }

    fn age_column() -> Column {
        Column::new("people", "age").with_type(ColumnType::Number)
    }

    #[test]
    fn test_resolution_tiers() {
        let scoped_name = SelectItem::column_from(name_column(), FromItemRef::new("p"));
        let age = SelectItem::column(age_column());
        let header = SimpleDataSetHeader::new(vec![age.clone(), scoped_name.clone()]);

        // identity
        assert_eq!(header.index_of(&age.clone().with_alias("years")), Some(0));
        // strict structural
        let same_scope = SelectItem::column_from(name_column(), FromItemRef::new("p"));
        assert_eq!(header.index_of(&same_scope), Some(1));
        // loose structural
        assert_eq!(header.index_of(&SelectItem::column(name_column())), Some(1));
        // unknown
        assert_eq!(header.index_of(&SelectItem::count_all()), None);
    }

    #[test]
    fn test_scalar_function_fallback() {
        let name = SelectItem::column(name_column());
        let header = SimpleDataSetHeader::new(vec![name]);
        let lookup = SelectItem::function(FunctionType::ToString, name_column());
        assert_eq!(
            header.resolve(&lookup),
            Some(Resolution {
                index: 0,
                via_function_fallback: true
            })
        );
        // aggregates are never stripped
        let max = SelectItem::function(FunctionType::Max, name_column());
        assert_eq!(header.resolve(&max), None);
    }

    #[test]
    fn test_strict_tier_prefers_matching_scope() {
        let p_name = SelectItem::column_from(name_column(), FromItemRef::new("p"));
        let q_name = SelectItem::column_from(name_column(), FromItemRef::new("q"));
        let header = CachingDataSetHeader::new(vec![p_name, q_name]);
        let lookup = SelectItem::column_from(name_column(), FromItemRef::new("q"));
        assert_eq!(header.index_of(&lookup), Some(1));
        // cached answer stays the same
        assert_eq!(header.index_of(&lookup), Some(1));
    }

    #[test]
    fn test_index_of_column() {
        let header = CachingDataSetHeader::new(vec![
            SelectItem::function(FunctionType::Max, age_column()),
            SelectItem::column(age_column()),
        ]);
        assert_eq!(header.index_of_column(&age_column()), Some(1));
        assert_eq!(header.index_of_column(&Column::new("PEOPLE", "AGE")), Some(1));
        assert_eq!(header.index_of_column(&name_column()), None);
    }

    #[test]
    fn test_same_layout() {
        let a = vec![SelectItem::column(name_column())];
        let b = vec![SelectItem::column(name_column()).with_alias("n")];
        assert!(same_layout(&a, &a.clone()));
        assert!(!same_layout(&a, &b));
    }
}
