//! SQLite-backed item store.
//!
//! # Invariants
//! - Dates are persisted as `YYYY-MM-DD` text, `NULL` when unresolved.
//! - Multi-row writes run inside one immediate transaction.
//! - Read paths reject invalid persisted rows instead of masking them.

use super::{validate_all, ItemStore, StoreError, StoreResult, WriteBatch};
use crate::db::migrations::latest_version;
use crate::model::item::{format_iso_date, parse_iso_date, Item, ItemKind};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use time::Date;

const ITEM_SELECT_SQL: &str = "SELECT
    uid,
    name,
    type,
    start_date,
    end_date,
    parent_uid
FROM items";

const ITEM_UPSERT_SQL: &str = "INSERT INTO items (
        uid,
        name,
        type,
        start_date,
        end_date,
        parent_uid
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(uid) DO UPDATE SET
        name = excluded.name,
        type = excluded.type,
        start_date = excluded.start_date,
        end_date = excluded.end_date,
        parent_uid = excluded.parent_uid;";

/// Item store persisted in the `items` table of a migrated connection.
pub struct SqliteItemStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl ItemStore for SqliteItemStore<'_> {
    fn get(&self, id: &str) -> StoreResult<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE uid = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn put(&self, item: &Item) -> StoreResult<()> {
        item.validate()?;
        upsert_item(self.conn, item)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let changed = self.conn.execute("DELETE FROM items WHERE uid = ?1;", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn all(&self) -> StoreResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!("{ITEM_SELECT_SQL};"))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn replace_all(&self, items: &[Item]) -> StoreResult<()> {
        validate_all(items)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM items;", [])?;
        for item in items {
            upsert_item(&tx, item)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn apply(&self, batch: &WriteBatch) -> StoreResult<()> {
        validate_all(&batch.upserts)?;

        // Dropping the transaction on an early return rolls it back.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for item in &batch.upserts {
            upsert_item(&tx, item)?;
        }
        for id in &batch.removals {
            let changed = tx.execute("DELETE FROM items WHERE uid = ?1;", [id])?;
            if changed == 0 {
                return Err(StoreError::NotFound(id.clone()));
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert_item(conn: &Connection, item: &Item) -> StoreResult<()> {
    conn.execute(
        ITEM_UPSERT_SQL,
        params![
            item.id.as_str(),
            item.name.as_str(),
            item.kind.as_str(),
            item.start_date.map(format_iso_date),
            item.end_date.map(format_iso_date),
            item.parent_id.as_deref(),
        ],
    )?;
    Ok(())
}

fn parse_item_row(row: &Row<'_>) -> StoreResult<Item> {
    let type_text: String = row.get("type")?;
    let kind = ItemKind::parse(&type_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid item type `{type_text}` in items.type"))
    })?;

    let item = Item {
        id: row.get("uid")?,
        name: row.get("name")?,
        kind,
        start_date: parse_date_column(row.get("start_date")?, "items.start_date")?,
        end_date: parse_date_column(row.get("end_date")?, "items.end_date")?,
        parent_id: row.get("parent_uid")?,
    };
    item.validate()?;
    Ok(item)
}

fn parse_date_column(value: Option<String>, column: &'static str) -> StoreResult<Option<Date>> {
    value
        .map(|text| {
            parse_iso_date(&text)
                .map_err(|_| StoreError::InvalidData(format!("invalid date `{text}` in {column}")))
        })
        .transpose()
}
