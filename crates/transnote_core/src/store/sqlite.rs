//! SQLite-backed preference store.
//!
//! # Invariants
//! - One connection is shared behind a mutex; edits run inside an immediate
//!   transaction so concurrent processes cannot interleave either.
//! - The change notification is sent before the mutex is released.

use super::{EditDecision, PreferenceStore, StoreChange, StoreError, StoreResult};
use super::CHANGE_CHANNEL_CAPACITY;
use crate::db::{open_db, open_db_in_memory, DbResult};
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::broadcast;

pub struct SqlitePreferenceStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl SqlitePreferenceStore {
    /// Opens (and migrates) the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        open_db(path).map(Self::from_connection)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        open_db_in_memory().map(Self::from_connection)
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            conn: Mutex::new(conn),
            changes,
        }
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn edit(
        &self,
        key: &str,
        edit: &mut dyn FnMut(Option<&str>) -> EditDecision,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = tx
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        let next = match edit(current.as_deref()) {
            EditDecision::Write(next) => next,
            EditDecision::Keep => {
                tx.rollback()?;
                debug!("event=store_edit module=store status=kept key={key}");
                return Ok(false);
            }
        };

        tx.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, next.as_str()],
        )
        .map_err(|err| {
            error!("event=store_edit module=store status=error key={key} error={err}");
            err
        })?;
        tx.commit()?;

        debug!(
            "event=store_edit module=store status=ok key={key} bytes={}",
            next.len()
        );
        // Sent under the connection lock so notifications follow commit order.
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            value: next,
        });
        drop(conn);
        Ok(true)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
