//! External item records accepted by bulk ingestion.
//!
//! # Responsibility
//! - Deserialize the `{ "items": [...] }` document shape produced by upstream
//!   exports (`uid, name, type, startDate, endDate, parentUid`).
//! - Convert raw records into validated `Item`s.
//!
//! # Invariants
//! - Task dates must parse as `YYYY-MM-DD`; project input dates are ignored.
//! - A missing, `null`, `"null"` or blank `parentUid` marks the root.

use crate::model::item::{parse_iso_date, Item, ItemId, ItemKind, ItemValidationError};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::Date;

/// One raw record as found in an items document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub parent_uid: Option<String>,
}

/// Envelope of a bulk items document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemsDocument {
    pub items: Vec<ItemRecord>,
}

/// Parses an items document from JSON text.
pub fn parse_items_document(json: &str) -> Result<ItemsDocument, serde_json::Error> {
    serde_json::from_str(json)
}

/// Errors converting one record into an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// `type` is neither `TASK` nor `PROJECT`.
    UnknownKind { uid: ItemId, value: String },
    /// Task date is missing or not an ISO calendar date.
    InvalidDate { uid: ItemId, value: String },
    Validation(ItemValidationError),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKind { uid, value } => {
                write!(f, "record {uid} has unknown type `{value}`")
            }
            Self::InvalidDate { uid, value } => {
                write!(f, "record {uid} has invalid date `{value}`")
            }
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl ItemRecord {
    pub fn task(
        uid: impl Into<String>,
        name: impl Into<String>,
        parent_uid: Option<&str>,
        start_date: &str,
        end_date: &str,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            kind: ItemKind::Task.as_str().to_string(),
            start_date: Some(start_date.to_string()),
            end_date: Some(end_date.to_string()),
            parent_uid: parent_uid.map(str::to_string),
        }
    }

    pub fn project(uid: impl Into<String>, name: impl Into<String>, parent_uid: Option<&str>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            kind: ItemKind::Project.as_str().to_string(),
            start_date: None,
            end_date: None,
            parent_uid: parent_uid.map(str::to_string),
        }
    }

    /// Converts into a validated item. Project dates stay unresolved until
    /// roll-up.
    pub fn into_item(self) -> Result<Item, RecordError> {
        let kind = ItemKind::parse(&self.kind).ok_or_else(|| RecordError::UnknownKind {
            uid: self.uid.clone(),
            value: self.kind.clone(),
        })?;

        let (start_date, end_date) = match kind {
            ItemKind::Task => (
                Some(parse_record_date(&self.uid, self.start_date.as_deref())?),
                Some(parse_record_date(&self.uid, self.end_date.as_deref())?),
            ),
            ItemKind::Project => (None, None),
        };

        let item = Item {
            id: self.uid,
            name: self.name,
            kind,
            start_date,
            end_date,
            parent_id: normalize_parent(self.parent_uid),
        };
        item.validate().map_err(RecordError::Validation)?;
        Ok(item)
    }
}

/// Maps every root marker form to `None`.
pub fn normalize_parent(parent_uid: Option<String>) -> Option<ItemId> {
    parent_uid.filter(|value| {
        let trimmed = value.trim();
        !trimmed.is_empty() && trimmed != "null"
    })
}

fn parse_record_date(uid: &str, value: Option<&str>) -> Result<Date, RecordError> {
    let value = value.unwrap_or_default();
    parse_iso_date(value).map_err(|_| RecordError::InvalidDate {
        uid: uid.to_string(),
        value: value.to_string(),
    })
}
