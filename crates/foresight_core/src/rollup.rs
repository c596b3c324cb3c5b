//! Project date roll-up.
//!
//! A project's span is `min(start)` / `max(end)` over every task below it.
//! Intermediate projects are transparent: only task dates are read, so
//! projects can be rolled up in any order. Results are recomputed in full
//! from a snapshot; nothing is cached between calls.

use crate::hierarchy::{HierarchyError, HierarchyIndex};
use crate::model::item::{DateSpan, Item, ItemId};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from roll-up computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollupError {
    /// Project has no task anywhere in its subtree.
    NoLeafDescendants(ItemId),
    Hierarchy(HierarchyError),
}

impl Display for RollupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoLeafDescendants(id) => write!(f, "project {id} has no task descendants"),
            Self::Hierarchy(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RollupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoLeafDescendants(_) => None,
            Self::Hierarchy(err) => Some(err),
        }
    }
}

impl From<HierarchyError> for RollupError {
    fn from(value: HierarchyError) -> Self {
        Self::Hierarchy(value)
    }
}

/// Computes the span of `aggregate_id` from its task descendants.
pub fn recompute_aggregate_dates(
    index: &HierarchyIndex,
    aggregate_id: &str,
) -> Result<DateSpan, RollupError> {
    let leaves = index.leaf_descendants(aggregate_id)?;
    span_of(leaves.iter().copied())
        .ok_or_else(|| RollupError::NoLeafDescendants(aggregate_id.to_string()))
}

/// Rolls up every project in `items` and returns the items with derived
/// spans written onto the projects. Fails on the first project without tasks.
pub fn rollup_projects(items: Vec<Item>) -> Result<Vec<Item>, RollupError> {
    let index = HierarchyIndex::build(items);

    let mut project_ids: Vec<&str> = index
        .items()
        .filter(|item| !item.is_task())
        .map(|item| item.id.as_str())
        .collect();
    project_ids.sort_unstable();

    let mut spans = HashMap::with_capacity(project_ids.len());
    for id in project_ids {
        spans.insert(id.to_string(), recompute_aggregate_dates(&index, id)?);
    }

    let mut items = index.into_items();
    for item in &mut items {
        if let Some(span) = spans.get(&item.id) {
            item.set_date_span(*span);
        }
    }
    Ok(items)
}

fn span_of<'a>(leaves: impl IntoIterator<Item = &'a Item>) -> Option<DateSpan> {
    leaves
        .into_iter()
        .filter_map(Item::date_span)
        .reduce(|acc, span| DateSpan {
            start: acc.start.min(span.start),
            end: acc.end.max(span.end),
        })
}

#[cfg(test)]
mod tests {
    use super::{recompute_aggregate_dates, rollup_projects, RollupError};
    use crate::hierarchy::HierarchyIndex;
    use crate::model::item::{DateSpan, Item};
    use time::macros::date;
    use time::Date;

    fn task(id: &str, parent: &str, start: Date, end: Date) -> Item {
        Item::task(id, id, Some(parent.to_string()), DateSpan { start, end })
    }

    #[test]
    fn span_is_min_start_and_max_end_of_tasks() {
        let index = HierarchyIndex::build([
            Item::project("p", "P", None),
            task("t1", "p", date!(2024 - 01 - 01), date!(2024 - 01 - 10)),
            task("t2", "p", date!(2024 - 01 - 05), date!(2024 - 01 - 20)),
        ]);
        let span = recompute_aggregate_dates(&index, "p").unwrap();
        assert_eq!(span.start, date!(2024 - 01 - 01));
        assert_eq!(span.end, date!(2024 - 01 - 20));
    }

    #[test]
    fn nested_projects_are_transparent() {
        let index = HierarchyIndex::build([
            Item::project("root", "Root", None),
            Item::project("mid", "Mid", Some("root".to_string())),
            // Stale dates on an intermediate project must not leak upward.
            Item {
                start_date: Some(date!(2020 - 01 - 01)),
                end_date: Some(date!(2030 - 01 - 01)),
                ..Item::project("stale", "Stale", Some("root".to_string()))
            },
            task("t1", "mid", date!(2024 - 03 - 01), date!(2024 - 03 - 04)),
            task("t2", "stale", date!(2024 - 02 - 10), date!(2024 - 02 - 11)),
        ]);
        let span = recompute_aggregate_dates(&index, "root").unwrap();
        assert_eq!(span.start, date!(2024 - 02 - 10));
        assert_eq!(span.end, date!(2024 - 03 - 04));
    }

    #[test]
    fn project_without_tasks_fails() {
        let index = HierarchyIndex::build([
            Item::project("root", "Root", None),
            Item::project("empty", "Empty", Some("root".to_string())),
        ]);
        assert_eq!(
            recompute_aggregate_dates(&index, "empty"),
            Err(RollupError::NoLeafDescendants("empty".to_string()))
        );
    }

    #[test]
    fn rollup_projects_writes_every_project_span() {
        let items = rollup_projects(vec![
            Item::project("root", "Root", None),
            Item::project("p", "P", Some("root".to_string())),
            task("t1", "p", date!(2024 - 01 - 02), date!(2024 - 01 - 03)),
            task("t2", "root", date!(2024 - 01 - 01), date!(2024 - 01 - 02)),
        ])
        .unwrap();

        let find = |id: &str| items.iter().find(|item| item.id == id).unwrap();
        assert_eq!(find("p").start_date, Some(date!(2024 - 01 - 02)));
        assert_eq!(find("p").end_date, Some(date!(2024 - 01 - 03)));
        assert_eq!(find("root").start_date, Some(date!(2024 - 01 - 01)));
        assert_eq!(find("root").end_date, Some(date!(2024 - 01 - 03)));
        assert_eq!(find("t2").end_date, Some(date!(2024 - 01 - 02)));
    }
}
