//! Core domain logic for Foresight project scheduling.
//! This crate is the single source of truth for hierarchy and roll-up
//! invariants.

pub mod completion;
pub mod db;
pub mod hierarchy;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod rollup;
pub mod service;
pub mod store;

pub use completion::{completion, span_completion, CompletionError, CompletionStatus};
pub use hierarchy::{HierarchyError, HierarchyIndex};
pub use ingest::{parse_items_document, ItemRecord, ItemsDocument, RecordError};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::item::{
    format_iso_date, parse_iso_date, DateSpan, Item, ItemId, ItemKind, ItemValidationError,
};
pub use rollup::{recompute_aggregate_dates, rollup_projects, RollupError};
pub use service::schedule_service::{NewItem, ScheduleError, ScheduleService};
pub use store::{
    ItemStore, MemoryItemStore, SqliteItemStore, StoreError, StoreResult, WriteBatch,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
