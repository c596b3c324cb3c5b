//! Work item domain model.
//!
//! # Responsibility
//! - Define the canonical record for tasks (leaves) and projects (aggregates).
//! - Provide ISO calendar date helpers shared by every input boundary.
//!
//! # Invariants
//! - `id` is stable and never reused for another item in one store.
//! - A task always carries both dates with `start_date <= end_date`.
//! - A project's dates are derived from its task descendants, never input.
//! - `parent_id == None` marks the tree root.
//!
//! # See also
//! - crate::rollup

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

/// Stable identifier for every work item.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type ItemId = String;

const ISO_DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Parses an ISO-8601 calendar date (`YYYY-MM-DD`).
pub fn parse_iso_date(value: &str) -> Result<Date, time::error::Parse> {
    Date::parse(value, ISO_DATE_FORMAT)
}

/// Formats a calendar date as `YYYY-MM-DD`.
pub fn format_iso_date(date: Date) -> String {
    // The format only contains numeric components, so formatting cannot fail
    // for any representable date.
    date.format(ISO_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// Item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    /// Leaf work item with directly assigned dates.
    Task,
    /// Aggregate item whose dates roll up from descendant tasks.
    Project,
}

impl ItemKind {
    /// Returns the external wire name (`TASK` / `PROJECT`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "TASK",
            Self::Project => "PROJECT",
        }
    }

    /// Parses the external wire name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "TASK" => Some(Self::Task),
            "PROJECT" => Some(Self::Project),
            _ => None,
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved start/end pair of one item. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: Date,
    pub end: Date,
}

impl DateSpan {
    /// Number of calendar days covered, counting both ends.
    pub fn inclusive_days(&self) -> i64 {
        (self.end - self.start).whole_days() + 1
    }
}

/// Validation errors for item projection rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    /// Item id is empty after trim.
    BlankId,
    /// Task is missing its start or end date.
    MissingTaskDates(ItemId),
    /// Start date is after end date.
    InvertedRange { id: ItemId, start: Date, end: Date },
    /// Item names itself as parent.
    SelfParent(ItemId),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "item id must not be blank"),
            Self::MissingTaskDates(id) => write!(f, "task {id} requires start and end dates"),
            Self::InvertedRange { id, start, end } => write!(
                f,
                "item {id} start date {} is after end date {}",
                format_iso_date(*start),
                format_iso_date(*end)
            ),
            Self::SelfParent(id) => write!(f, "item {id} cannot be its own parent"),
        }
    }
}

impl Error for ItemValidationError {}

/// Canonical work item record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Serialized as `uid` to match the external record naming.
    #[serde(rename = "uid")]
    pub id: ItemId,
    pub name: String,
    /// Serialized as `type` to match the external record naming.
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Authoritative for tasks, derived for projects.
    #[serde(default, with = "iso_date::option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "iso_date::option")]
    pub end_date: Option<Date>,
    /// Owning project. `None` means tree root.
    #[serde(rename = "parentUid", default)]
    pub parent_id: Option<ItemId>,
}

impl Item {
    /// Creates a task with its authoritative date span.
    pub fn task(
        id: impl Into<ItemId>,
        name: impl Into<String>,
        parent_id: Option<ItemId>,
        span: DateSpan,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Task,
            start_date: Some(span.start),
            end_date: Some(span.end),
            parent_id,
        }
    }

    /// Creates a project with unresolved dates; a roll-up fills them in.
    pub fn project(id: impl Into<ItemId>, name: impl Into<String>, parent_id: Option<ItemId>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Project,
            start_date: None,
            end_date: None,
            parent_id,
        }
    }

    pub fn is_task(&self) -> bool {
        self.kind == ItemKind::Task
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns both dates when resolved.
    pub fn date_span(&self) -> Option<DateSpan> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some(DateSpan { start, end }),
            _ => None,
        }
    }

    pub fn set_date_span(&mut self, span: DateSpan) {
        self.start_date = Some(span.start);
        self.end_date = Some(span.end);
    }

    /// Checks item-local invariants.
    ///
    /// Project dates are not checked for presence: they stay unresolved until
    /// the first roll-up.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.id.trim().is_empty() {
            return Err(ItemValidationError::BlankId);
        }
        if self.parent_id.as_deref() == Some(self.id.as_str()) {
            return Err(ItemValidationError::SelfParent(self.id.clone()));
        }
        if self.is_task() && self.date_span().is_none() {
            return Err(ItemValidationError::MissingTaskDates(self.id.clone()));
        }
        if let Some(span) = self.date_span() {
            if span.start > span.end {
                return Err(ItemValidationError::InvertedRange {
                    id: self.id.clone(),
                    start: span.start,
                    end: span.end,
                });
            }
        }
        Ok(())
    }
}
