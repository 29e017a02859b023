//! Key-value preference store contracts.
//!
//! # Responsibility
//! - Define the external store collaborator the repository persists through.
//! - Broadcast the committed value of a key after every successful edit.
//!
//! # Invariants
//! - `edit` is a read-modify-write transaction for one key: no other edit on
//!   the same store interleaves between its read and its write.
//! - A change notification is sent only after the write is committed, and
//!   every committed write is notified even when the value did not change.
//! - Notifications for one store arrive in commit order, so the last value a
//!   subscriber receives is the stored value.
//! - A rejected edit (`EditDecision::Keep`) writes and notifies nothing.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::broadcast;

mod memory;
mod sqlite;

pub use memory::MemoryPreferenceStore;
pub use sqlite::SqlitePreferenceStore;

/// Buffered change notifications per subscriber before it starts lagging.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store transport errors.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Store state lock was poisoned by a panicking writer.
    Poisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Poisoned => write!(f, "preference store lock poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Poisoned => None,
        }
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

/// Committed value of one key, delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    pub value: String,
}

/// Outcome of an edit closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditDecision {
    /// Replace the key with this value and notify subscribers.
    Write(String),
    /// Leave the key untouched.
    Keep,
}

/// External key-value persistence collaborator.
///
/// Implementations are blocking; async callers run them on a blocking pool.
pub trait PreferenceStore: Send + Sync {
    /// Reads the current value of `key`, `None` when never written.
    fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Runs one read-modify-write transaction on `key`.
    ///
    /// Returns `true` when a value was written.
    fn edit(
        &self,
        key: &str,
        edit: &mut dyn FnMut(Option<&str>) -> EditDecision,
    ) -> StoreResult<bool>;

    /// Subscribes to committed changes of every key.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;

    /// Unconditionally replaces `key`.
    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        self.edit(key, &mut |_| EditDecision::Write(value.to_string()))
            .map(|_| ())
    }
}
