//! Schedule use-case service.
//!
//! # Responsibility
//! - Be the only entry point that changes the item hierarchy.
//! - Enforce structural invariants before anything is written.
//! - Derive project dates through the roll-up engine.
//!
//! # Invariants
//! - The root item is never deleted.
//! - A project never loses its last task through `delete_item`.
//! - Every validation error is raised before the first store write.
//! - At most one structural mutation runs at a time; reads are not locked.
//! - Adding, deleting or re-dating a task does not refresh ancestor
//!   project dates. Callers opt in through `recompute_ancestors`.

use crate::completion::{self, CompletionError, CompletionStatus};
use crate::hierarchy::{HierarchyError, HierarchyIndex};
use crate::ingest::{normalize_parent, ItemRecord, RecordError};
use crate::model::item::{
    format_iso_date, parse_iso_date, DateSpan, Item, ItemId, ItemKind, ItemValidationError,
};
use crate::rollup::{recompute_aggregate_dates, rollup_projects, RollupError};
use crate::store::{ItemStore, StoreError, WriteBatch};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::Date;

/// Errors from schedule service operations.
#[derive(Debug)]
pub enum ScheduleError {
    /// Referenced item does not exist.
    NotFound(ItemId),
    /// Target is the tree root.
    RootDeletion(ItemId),
    /// Deleting this task would leave its parent without tasks.
    LastChildTask { task_id: ItemId, parent_id: ItemId },
    /// Project would exist without any task descendant.
    NoLeafDescendants(ItemId),
    /// Start date would come after end date.
    InvalidRange { id: ItemId, start: Date, end: Date },
    /// Input is not a `YYYY-MM-DD` calendar date.
    InvalidDate(String),
    /// Parent links form a cycle.
    CyclicHierarchy(ItemId),
    /// Item has no resolved start/end dates.
    UnresolvedDates(ItemId),
    /// Item id is already used.
    DuplicateId(ItemId),
    /// Parent item does not exist.
    ParentNotFound(ItemId),
    /// Parent exists but is a task.
    ParentMustBeProject(ItemId),
    /// Item kind is neither `TASK` nor `PROJECT`.
    UnknownKind { id: ItemId, value: String },
    /// Item fails model validation.
    InvalidItem(ItemValidationError),
    /// Store-level failure.
    Store(StoreError),
}

impl ScheduleError {
    /// Stable machine-readable code for callers to branch on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::RootDeletion(_) => "root_deletion",
            Self::LastChildTask { .. } => "last_child_task",
            Self::NoLeafDescendants(_) => "no_leaf_descendants",
            Self::InvalidRange { .. } => "invalid_range",
            Self::InvalidDate(_) => "invalid_date",
            Self::CyclicHierarchy(_) => "cyclic_hierarchy",
            Self::UnresolvedDates(_) => "unresolved_dates",
            Self::DuplicateId(_) => "duplicate_id",
            Self::ParentNotFound(_) => "parent_not_found",
            Self::ParentMustBeProject(_) => "parent_must_be_project",
            Self::UnknownKind { .. } => "unknown_kind",
            Self::InvalidItem(_) => "invalid_item",
            Self::Store(_) => "store_error",
        }
    }
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::RootDeletion(id) => write!(f, "cannot delete root item: {id}"),
            Self::LastChildTask { task_id, parent_id } => write!(
                f,
                "task {task_id} is the only task under project {parent_id}; cannot delete it"
            ),
            Self::NoLeafDescendants(id) => write!(f, "project {id} has no task descendants"),
            Self::InvalidRange { id, start, end } => write!(
                f,
                "item {id} start date {} would be after end date {}",
                format_iso_date(*start),
                format_iso_date(*end)
            ),
            Self::InvalidDate(value) => {
                write!(f, "invalid date `{value}`; expected YYYY-MM-DD")
            }
            Self::CyclicHierarchy(id) => write!(f, "cyclic hierarchy detected at item {id}"),
            Self::UnresolvedDates(id) => write!(f, "item {id} has unresolved dates"),
            Self::DuplicateId(id) => write!(f, "item id already exists: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent item not found: {id}"),
            Self::ParentMustBeProject(id) => write!(f, "parent item must be a project: {id}"),
            Self::UnknownKind { id, value } => {
                write!(f, "item {id} has unknown type `{value}`")
            }
            Self::InvalidItem(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScheduleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidItem(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ScheduleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Validation(err) => err.into(),
            other => Self::Store(other),
        }
    }
}

impl From<ItemValidationError> for ScheduleError {
    fn from(value: ItemValidationError) -> Self {
        match value {
            ItemValidationError::InvertedRange { id, start, end } => {
                Self::InvalidRange { id, start, end }
            }
            other => Self::InvalidItem(other),
        }
    }
}

impl From<HierarchyError> for ScheduleError {
    fn from(value: HierarchyError) -> Self {
        match value {
            HierarchyError::CyclicHierarchy(id) => Self::CyclicHierarchy(id),
        }
    }
}

impl From<RollupError> for ScheduleError {
    fn from(value: RollupError) -> Self {
        match value {
            RollupError::NoLeafDescendants(id) => Self::NoLeafDescendants(id),
            RollupError::Hierarchy(err) => err.into(),
        }
    }
}

impl From<CompletionError> for ScheduleError {
    fn from(value: CompletionError) -> Self {
        match value {
            CompletionError::UnresolvedDates(id) => Self::UnresolvedDates(id),
        }
    }
}

impl From<RecordError> for ScheduleError {
    fn from(value: RecordError) -> Self {
        match value {
            RecordError::UnknownKind { uid, value } => Self::UnknownKind { id: uid, value },
            RecordError::InvalidDate { value, .. } => Self::InvalidDate(value),
            RecordError::Validation(err) => err.into(),
        }
    }
}

/// Request model for inserting one item.
///
/// Dates are raw `YYYY-MM-DD` strings; they are required for tasks and
/// ignored for projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    pub parent_id: Option<ItemId>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl NewItem {
    pub fn task(
        id: impl Into<ItemId>,
        name: impl Into<String>,
        parent_id: impl Into<ItemId>,
        start_date: impl Into<String>,
        end_date: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Task,
            parent_id: Some(parent_id.into()),
            start_date: Some(start_date.into()),
            end_date: Some(end_date.into()),
        }
    }

    pub fn project(
        id: impl Into<ItemId>,
        name: impl Into<String>,
        parent_id: Option<ItemId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Project,
            parent_id,
            start_date: None,
            end_date: None,
        }
    }
}

/// Schedule service facade over one item store.
pub struct ScheduleService<S: ItemStore> {
    store: S,
    mutation_lock: Mutex<()>,
}

impl<S: ItemStore> ScheduleService<S> {
    /// Creates service from store implementation.
    pub fn new(store: S) -> Self {
        Self {
            store,
            mutation_lock: Mutex::new(()),
        }
    }

    /// Replaces the whole hierarchy with `records`.
    ///
    /// Every record is validated and every project rolled up before the
    /// store is touched; any failure aborts the whole batch. A `parentUid`
    /// naming no record in the batch is kept as a pending link for a later
    /// `add_item`. Returns the number of stored items.
    pub fn ingest(&self, records: Vec<ItemRecord>) -> Result<usize, ScheduleError> {
        let _guard = self.lock_mutations();
        let record_count = records.len();
        let result = self.ingest_locked(records);
        match &result {
            Ok(count) => info!(
                "event=items_ingest module=service status=ok item_count={count}"
            ),
            Err(err) => warn!(
                "event=items_ingest module=service status=rejected record_count={} error_code={} error={}",
                record_count,
                err.code(),
                err
            ),
        }
        result
    }

    /// Inserts one item.
    ///
    /// A new project must already have at least one task below it, i.e.
    /// existing items naming it as parent. Ancestor dates are not refreshed.
    pub fn add_item(&self, request: NewItem) -> Result<Item, ScheduleError> {
        let _guard = self.lock_mutations();
        let id = request.id.clone();
        let result = self.add_item_locked(request);
        log_outcome("item_add", &id, &result);
        result
    }

    /// Loads one item.
    pub fn get_item(&self, id: &str) -> Result<Item, ScheduleError> {
        self.store
            .get(id)?
            .ok_or_else(|| ScheduleError::NotFound(id.to_string()))
    }

    /// Deletes one item.
    ///
    /// - Task: rejected when it is the last task under its parent project.
    /// - Project: direct children move one level up to the project's parent.
    pub fn delete_item(&self, id: &str) -> Result<(), ScheduleError> {
        let _guard = self.lock_mutations();
        let result = self.delete_item_locked(id);
        log_outcome("item_delete", id, &result);
        result
    }

    /// Completion of one item as of `date` (`YYYY-MM-DD`).
    pub fn completion_status(&self, id: &str, date: &str) -> Result<CompletionStatus, ScheduleError> {
        let item = self.get_item(id)?;
        let query = parse_input_date(date)?;
        Ok(completion::completion(&item, query)?)
    }

    /// Overwrites the start date; rejected when it would pass the end date.
    pub fn update_start_date(&self, id: &str, date: &str) -> Result<Item, ScheduleError> {
        let _guard = self.lock_mutations();
        let result = self.update_dates_locked(id, date, DateBound::Start);
        log_outcome("item_update_start", id, &result);
        result
    }

    /// Overwrites the end date; rejected when it would precede the start date.
    pub fn update_end_date(&self, id: &str, date: &str) -> Result<Item, ScheduleError> {
        let _guard = self.lock_mutations();
        let result = self.update_dates_locked(id, date, DateBound::End);
        log_outcome("item_update_end", id, &result);
        result
    }

    /// Full current item set, ordered by id.
    pub fn hierarchy(&self) -> Result<Vec<Item>, ScheduleError> {
        let mut items = self.store.all()?;
        items.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(items)
    }

    /// Re-derives the dates of `id` (when it is a project) and of every
    /// project above it, in one atomic write. Returns the recomputed ids,
    /// nearest first.
    pub fn recompute_ancestors(&self, id: &str) -> Result<Vec<ItemId>, ScheduleError> {
        let _guard = self.lock_mutations();
        let result = self.recompute_ancestors_locked(id);
        log_outcome("item_recompute_ancestors", id, &result);
        result
    }

    fn ingest_locked(&self, records: Vec<ItemRecord>) -> Result<usize, ScheduleError> {
        let mut items = Vec::with_capacity(records.len());
        let mut seen = HashSet::new();
        for record in records {
            let item = record.into_item()?;
            if !seen.insert(item.id.clone()) {
                return Err(ScheduleError::DuplicateId(item.id));
            }
            items.push(item);
        }

        let kinds: HashMap<&str, ItemKind> = items
            .iter()
            .map(|item| (item.id.as_str(), item.kind))
            .collect();
        // Parents missing from the batch stay pending until `add_item`
        // creates the project.
        for item in &items {
            if let Some(parent_id) = &item.parent_id {
                if kinds.get(parent_id.as_str()) == Some(&ItemKind::Task) {
                    return Err(ScheduleError::ParentMustBeProject(parent_id.clone()));
                }
            }
        }

        let items = rollup_projects(items)?;
        self.store.replace_all(&items)?;
        Ok(items.len())
    }

    fn add_item_locked(&self, request: NewItem) -> Result<Item, ScheduleError> {
        if self.store.get(&request.id)?.is_some() {
            return Err(ScheduleError::DuplicateId(request.id));
        }

        let parent_id = normalize_parent(request.parent_id);
        if let Some(parent_id) = &parent_id {
            self.ensure_parent_is_project(parent_id)?;
        }

        let item = match request.kind {
            ItemKind::Task => {
                let span = DateSpan {
                    start: parse_input_date(request.start_date.as_deref().unwrap_or_default())?,
                    end: parse_input_date(request.end_date.as_deref().unwrap_or_default())?,
                };
                let item = Item::task(request.id, request.name, parent_id, span);
                item.validate()?;
                item
            }
            ItemKind::Project => {
                let mut item = Item::project(request.id, request.name, parent_id);
                item.validate()?;

                // Roll up against the tree as it would look with the project
                // linked in, so pre-existing children are counted.
                let mut snapshot = self.store.all()?;
                snapshot.push(item.clone());
                let index = HierarchyIndex::build(snapshot);
                let span = recompute_aggregate_dates(&index, &item.id)?;
                item.set_date_span(span);
                item
            }
        };

        self.store.put(&item)?;
        Ok(item)
    }

    fn delete_item_locked(&self, id: &str) -> Result<(), ScheduleError> {
        let item = self.get_item(id)?;
        if item.is_root() {
            return Err(ScheduleError::RootDeletion(item.id));
        }
        let parent_id = item.parent_id.clone().unwrap_or_default();

        match item.kind {
            ItemKind::Task => {
                let index = HierarchyIndex::build(self.store.all()?);
                // A task still waiting for its project protects nothing.
                if index.get(&parent_id).is_none() {
                    self.store.delete(&item.id)?;
                    return Ok(());
                }
                let sibling_tasks = index.leaf_descendants(&parent_id)?.len();
                if sibling_tasks <= 1 {
                    return Err(ScheduleError::LastChildTask {
                        task_id: item.id,
                        parent_id,
                    });
                }
                self.store.delete(&item.id)?;
            }
            ItemKind::Project => {
                let index = HierarchyIndex::build(self.store.all()?);
                let upserts = index
                    .children_of(&item.id)
                    .into_iter()
                    .map(|child| Item {
                        parent_id: Some(parent_id.clone()),
                        ..child.clone()
                    })
                    .collect();
                self.store.apply(&WriteBatch {
                    upserts,
                    removals: vec![item.id],
                })?;
            }
        }
        Ok(())
    }

    fn update_dates_locked(
        &self,
        id: &str,
        date: &str,
        bound: DateBound,
    ) -> Result<Item, ScheduleError> {
        let mut item = self.get_item(id)?;
        let input = parse_input_date(date)?;
        let span = item
            .date_span()
            .ok_or_else(|| ScheduleError::UnresolvedDates(item.id.clone()))?;

        let updated = match bound {
            DateBound::Start => DateSpan { start: input, ..span },
            DateBound::End => DateSpan { end: input, ..span },
        };
        if updated.start > updated.end {
            return Err(ScheduleError::InvalidRange {
                id: item.id,
                start: updated.start,
                end: updated.end,
            });
        }

        item.set_date_span(updated);
        self.store.put(&item)?;
        Ok(item)
    }

    fn recompute_ancestors_locked(&self, id: &str) -> Result<Vec<ItemId>, ScheduleError> {
        let index = HierarchyIndex::build(self.store.all()?);
        let item = index
            .get(id)
            .ok_or_else(|| ScheduleError::NotFound(id.to_string()))?;

        let mut targets = vec![item];
        targets.extend(index.ancestors(id)?);

        let mut upserts = Vec::new();
        for target in targets.into_iter().filter(|target| !target.is_task()) {
            let span = recompute_aggregate_dates(&index, &target.id)?;
            let mut updated = target.clone();
            updated.set_date_span(span);
            upserts.push(updated);
        }

        let recomputed: Vec<ItemId> = upserts.iter().map(|item| item.id.clone()).collect();
        if !upserts.is_empty() {
            self.store.apply(&WriteBatch {
                upserts,
                removals: Vec::new(),
            })?;
        }
        Ok(recomputed)
    }

    fn ensure_parent_is_project(&self, parent_id: &str) -> Result<(), ScheduleError> {
        let parent = self
            .store
            .get(parent_id)?
            .ok_or_else(|| ScheduleError::ParentNotFound(parent_id.to_string()))?;
        if parent.is_task() {
            return Err(ScheduleError::ParentMustBeProject(parent_id.to_string()));
        }
        Ok(())
    }

    fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        // The guard protects no data, so a poisoned lock is still usable.
        self.mutation_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
enum DateBound {
    Start,
    End,
}

/// Parses a caller-supplied `YYYY-MM-DD` date.
pub fn parse_input_date(value: &str) -> Result<Date, ScheduleError> {
    parse_iso_date(value).map_err(|_| ScheduleError::InvalidDate(value.to_string()))
}

fn log_outcome<T>(event: &str, item_id: &str, result: &Result<T, ScheduleError>) {
    match result {
        Ok(_) => info!("event={event} module=service status=ok item_id={item_id}"),
        Err(err) => warn!(
            "event={} module=service status=rejected item_id={} error_code={} error={}",
            event,
            item_id,
            err.code(),
            err
        ),
    }
}
