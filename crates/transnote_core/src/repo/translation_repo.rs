//! Translation list repository over a preference store.
//!
//! # Responsibility
//! - Own the canonical entry list persisted under one store key.
//! - Run every mutation as a read-modify-write edit of the whole blob.
//! - Rebroadcast the committed list on the response stream and every failure
//!   on the error stream.
//!
//! # Invariants
//! - A mutation never confirms itself: responses come only from the store's
//!   change notifications, re-decoded from the committed blob.
//! - A failed mutation writes nothing and emits exactly one error.
//! - Positions are validated against the list read inside the edit, not
//!   against whatever the caller last saw.

use crate::model::translation::{
    decode_entries, encode_entries, EntryList, TranslationEntry, EMPTY_LIST_BLOB,
};
use crate::store::{EditDecision, PreferenceStore, StoreChange};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Store key holding the serialized entry list.
pub const TRANSLATIONS_KEY: &str = "translations";

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub type RepoResult<T> = Result<T, RepoError>;

/// Failures published on the repository error stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// Store read/write fault; not retried.
    StorageAccess(String),
    /// Stored blob could not be decoded into an entry list.
    InvalidData(String),
    /// Position is not valid for the list at the time of the edit.
    OutOfRange { index: usize, len: usize },
    /// Operation has no implementation.
    NotImplemented(&'static str),
}

impl RepoError {
    /// Stable error code for notices and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StorageAccess(_) => "storage_access",
            Self::InvalidData(_) => "invalid_data",
            Self::OutOfRange { .. } => "out_of_range",
            Self::NotImplemented(_) => "not_implemented",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageAccess(message) => write!(f, "storage access failed: {message}"),
            Self::InvalidData(message) => write!(f, "invalid stored translations: {message}"),
            Self::OutOfRange { index, len } => {
                write!(f, "position {index} is out of range for {len} entries")
            }
            Self::NotImplemented(operation) => write!(f, "{operation} is not implemented"),
        }
    }
}

impl Error for RepoError {}

/// Repository contract shared by every interactor.
///
/// Operations return once the store write has settled; results arrive on the
/// shared broadcast streams.
#[async_trait]
pub trait TranslationRepository: Send + Sync {
    fn responses(&self) -> broadcast::Receiver<EntryList>;
    fn errors(&self) -> broadcast::Receiver<RepoError>;

    async fn on_get_translations(&self);
    async fn on_new_group(&self, title: String);
    async fn on_new_translation(&self, from: String, to: String);
    async fn on_delete_group_at_position(&self, index: usize);
    async fn on_delete_translation_at_position(&self, index: usize);
}

/// Repository persisting the list as one JSON blob in a [`PreferenceStore`].
///
/// Must be created inside a tokio runtime: construction spawns the store
/// watcher task, which is aborted on drop.
pub struct StoreTranslationRepository {
    store: Arc<dyn PreferenceStore>,
    key: String,
    responses: broadcast::Sender<EntryList>,
    errors: broadcast::Sender<RepoError>,
    watcher: JoinHandle<()>,
}

impl StoreTranslationRepository {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self::with_key(store, TRANSLATIONS_KEY)
    }

    pub fn with_key(store: Arc<dyn PreferenceStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (responses, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (errors, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let watcher = tokio::spawn(watch_store(
            store.subscribe(),
            key.clone(),
            responses.clone(),
            errors.clone(),
        ));

        Self {
            store,
            key,
            responses,
            errors,
            watcher,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads and decodes the stored list without emitting anything.
    pub async fn snapshot(&self) -> RepoResult<EntryList> {
        let store = Arc::clone(&self.store);
        let key = self.key.clone();
        let stored = tokio::task::spawn_blocking(move || store.read(&key))
            .await
            .map_err(|err| RepoError::StorageAccess(format!("store task failed: {err}")))?
            .map_err(|err| RepoError::StorageAccess(err.to_string()))?;

        decode_entries(stored.as_deref().unwrap_or(EMPTY_LIST_BLOB))
            .map_err(|err| RepoError::InvalidData(err.to_string()))
    }

    /// Rewrites the stored blob unchanged so subscribers receive it again.
    async fn refresh(&self) -> RepoResult<()> {
        self.edit_blob(|current| {
            Ok(current.unwrap_or(EMPTY_LIST_BLOB).to_string())
        })
        .await
    }

    /// Decodes, applies `apply`, and re-encodes the list in one store edit.
    async fn mutate(
        &self,
        mut apply: impl FnMut(&mut EntryList) -> RepoResult<()> + Send + 'static,
    ) -> RepoResult<()> {
        self.edit_blob(move |current| {
            let mut entries = decode_entries(current.unwrap_or(EMPTY_LIST_BLOB))
                .map_err(|err| RepoError::InvalidData(err.to_string()))?;
            apply(&mut entries)?;
            encode_entries(&entries).map_err(|err| RepoError::InvalidData(err.to_string()))
        })
        .await
    }

    async fn edit_blob(
        &self,
        mut next_blob: impl FnMut(Option<&str>) -> RepoResult<String> + Send + 'static,
    ) -> RepoResult<()> {
        let store = Arc::clone(&self.store);
        let key = self.key.clone();

        tokio::task::spawn_blocking(move || {
            let mut failure = None;
            store
                .edit(&key, &mut |current| match next_blob(current) {
                    Ok(blob) => EditDecision::Write(blob),
                    Err(err) => {
                        failure = Some(err);
                        EditDecision::Keep
                    }
                })
                .map_err(|err| RepoError::StorageAccess(err.to_string()))?;
            failure.map_or(Ok(()), Err)
        })
        .await
        .map_err(|err| RepoError::StorageAccess(format!("store task failed: {err}")))?
    }

    fn settle(&self, operation: &'static str, result: RepoResult<()>) {
        match result {
            Ok(()) => debug!("event=repo_write module=repo status=ok operation={operation}"),
            Err(err) => {
                warn!(
                    "event=repo_write module=repo status=error operation={operation} error_code={} error={}",
                    err.code(),
                    err
                );
                let _ = self.errors.send(err);
            }
        }
    }
}

impl Drop for StoreTranslationRepository {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[async_trait]
impl TranslationRepository for StoreTranslationRepository {
    fn responses(&self) -> broadcast::Receiver<EntryList> {
        self.responses.subscribe()
    }

    fn errors(&self) -> broadcast::Receiver<RepoError> {
        self.errors.subscribe()
    }

    async fn on_get_translations(&self) {
        let result = self.refresh().await;
        self.settle("get_translations", result);
    }

    async fn on_new_group(&self, title: String) {
        let entry = TranslationEntry::group(title);
        let result = self
            .mutate(move |entries| {
                entries.push(entry.clone());
                Ok(())
            })
            .await;
        self.settle("add_group", result);
    }

    async fn on_new_translation(&self, from: String, to: String) {
        // Pairs land at the top level; there is no notion of a current group.
        let entry = TranslationEntry::pair(from, to);
        let result = self
            .mutate(move |entries| {
                entries.push(entry.clone());
                Ok(())
            })
            .await;
        self.settle("add_translation", result);
    }

    async fn on_delete_group_at_position(&self, index: usize) {
        let result = self
            .mutate(move |entries| {
                if index >= entries.len() {
                    return Err(RepoError::OutOfRange {
                        index,
                        len: entries.len(),
                    });
                }
                entries.remove(index);
                Ok(())
            })
            .await;
        self.settle("remove_group", result);
    }

    async fn on_delete_translation_at_position(&self, _index: usize) {
        self.settle(
            "remove_translation",
            Err(RepoError::NotImplemented("remove_translation")),
        );
    }
}

async fn watch_store(
    mut changes: broadcast::Receiver<StoreChange>,
    key: String,
    responses: broadcast::Sender<EntryList>,
    errors: broadcast::Sender<RepoError>,
) {
    loop {
        match changes.recv().await {
            Ok(change) if change.key == key => match decode_entries(&change.value) {
                Ok(entries) => {
                    debug!(
                        "event=repo_emit module=repo status=ok entries={}",
                        entries.len()
                    );
                    let _ = responses.send(entries);
                }
                Err(err) => {
                    warn!("event=repo_emit module=repo status=error error_code=invalid_data error={err}");
                    let _ = errors.send(RepoError::InvalidData(err.to_string()));
                }
            },
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("event=repo_watch module=repo status=lagged skipped={skipped}");
            }
            Err(RecvError::Closed) => {
                info!("event=repo_watch module=repo status=closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;

    #[test]
    fn out_of_range_message_names_index_and_length() {
        let err = RepoError::OutOfRange { index: 4, len: 2 };
        assert_eq!(err.code(), "out_of_range");
        assert_eq!(err.to_string(), "position 4 is out of range for 2 entries");
    }
}
