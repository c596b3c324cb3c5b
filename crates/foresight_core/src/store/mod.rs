//! Item store contracts and backends.
//!
//! # Responsibility
//! - Define the id -> item mapping every other component reads and mutates.
//! - Isolate storage details (memory map, SQLite rows) from hierarchy logic.
//!
//! # Invariants
//! - Write paths must call `Item::validate()` before mutating anything.
//! - `replace_all` and `apply` are atomic for readers: either the old or the
//!   new content is visible, never a mix.
//! - `all()` has no ordering guarantee.

use crate::db::DbError;
use crate::model::item::{Item, ItemId, ItemValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryItemStore;
pub use sqlite::SqliteItemStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from item store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Item rejected by model validation before the write.
    Validation(ItemValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target item does not exist.
    NotFound(ItemId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid item.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "item store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ItemValidationError> for StoreError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Multi-item write applied as one atomic unit.
///
/// Upserts are applied before removals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub upserts: Vec<Item>,
    pub removals: Vec<ItemId>,
}

/// Storage contract for work items.
pub trait ItemStore {
    /// Loads one item by id.
    fn get(&self, id: &str) -> StoreResult<Option<Item>>;
    /// Inserts or overwrites one item.
    fn put(&self, item: &Item) -> StoreResult<()>;
    /// Removes one item; `NotFound` when absent.
    fn delete(&self, id: &str) -> StoreResult<()>;
    /// Returns every stored item in unspecified order.
    fn all(&self) -> StoreResult<Vec<Item>>;
    /// Replaces the entire content atomically.
    fn replace_all(&self, items: &[Item]) -> StoreResult<()>;
    /// Applies a multi-item write atomically.
    fn apply(&self, batch: &WriteBatch) -> StoreResult<()>;
}

fn validate_all<'a>(items: impl IntoIterator<Item = &'a Item>) -> StoreResult<()> {
    for item in items {
        item.validate()?;
    }
    Ok(())
}
