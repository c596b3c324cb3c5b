//! Time-elapsed completion percentage.
//!
//! Completion is a function of calendar position only: the share of an
//! item's inclusive day span that lies before the query date.

use crate::model::item::{DateSpan, Item, ItemId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::Date;

/// Percentage in `0..=100`, displayed as `NN%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompletionStatus(u8);

impl CompletionStatus {
    pub const NOT_STARTED: Self = Self(0);
    pub const COMPLETE: Self = Self(100);

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl Display for CompletionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// Item has no resolved start/end pair.
    UnresolvedDates(ItemId),
}

impl Display for CompletionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedDates(id) => write!(f, "item {id} has unresolved dates"),
        }
    }
}

impl Error for CompletionError {}

/// Completion of `item` as of `query`.
pub fn completion(item: &Item, query: Date) -> Result<CompletionStatus, CompletionError> {
    let span = item
        .date_span()
        .ok_or_else(|| CompletionError::UnresolvedDates(item.id.clone()))?;
    Ok(span_completion(span, query))
}

/// Completion of a resolved span as of `query`.
///
/// - `query <= start` -> 0
/// - `query > end` -> 100
/// - otherwise `floor(elapsed / total * 100)` with `total` counting the end
///   day and `elapsed = query - start`.
pub fn span_completion(span: DateSpan, query: Date) -> CompletionStatus {
    if query <= span.start {
        return CompletionStatus::NOT_STARTED;
    }
    if query > span.end {
        return CompletionStatus::COMPLETE;
    }

    let total_days = span.inclusive_days() as f64;
    let elapsed_days = (query - span.start).whole_days() as f64;
    // Truncated toward zero; elapsed < total keeps it below 100.
    CompletionStatus(((elapsed_days / total_days) * 100.0) as u8)
}
