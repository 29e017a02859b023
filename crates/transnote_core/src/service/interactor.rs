//! Per-operation interactors over the translation repository.
//!
//! # Responsibility
//! - Forward one request kind to the repository.
//! - Re-emit only the repository emission that answers this interactor's own
//!   pending request.
//!
//! # Invariants
//! - The awaiting flag is set before the request is submitted and cleared by
//!   the first response or error observed afterwards, whichever comes first.
//! - Emissions observed while not awaiting are dropped.
//! - At most one outstanding request per interactor instance; an overlapping
//!   second call re-arms the same flag, so only one of the two results is
//!   re-emitted and it may belong to either call.

use crate::model::translation::EntryList;
use crate::repo::translation_repo::{RepoError, TranslationRepository};
use async_trait::async_trait;
use log::{debug, warn};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

const RELAY_CHANNEL_CAPACITY: usize = 16;

/// Single-operation facade consumed by the session reducer.
#[async_trait]
pub trait Interactor<T: Send + 'static>: Send + Sync {
    fn responses(&self) -> broadcast::Receiver<EntryList>;
    fn errors(&self) -> broadcast::Receiver<RepoError>;

    /// Submits one request; the result arrives on `responses` or `errors`.
    async fn interact(&self, request: T);
}

/// One repository operation an interactor can be bound to.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    type Request: Send + 'static;

    /// Stable operation name for log lines and notices.
    const NAME: &'static str;

    async fn submit(repository: &dyn TranslationRepository, request: Self::Request);
}

pub struct GetTranslations;
pub struct AddGroup;
pub struct RemoveGroup;
pub struct AddTranslation;
pub struct RemoveTranslation;

#[async_trait]
impl Operation for GetTranslations {
    type Request = ();
    const NAME: &'static str = "get_translations";

    async fn submit(repository: &dyn TranslationRepository, _request: ()) {
        repository.on_get_translations().await;
    }
}

#[async_trait]
impl Operation for AddGroup {
    type Request = String;
    const NAME: &'static str = "add_group";

    async fn submit(repository: &dyn TranslationRepository, title: String) {
        repository.on_new_group(title).await;
    }
}

#[async_trait]
impl Operation for RemoveGroup {
    type Request = usize;
    const NAME: &'static str = "remove_group";

    async fn submit(repository: &dyn TranslationRepository, index: usize) {
        repository.on_delete_group_at_position(index).await;
    }
}

#[async_trait]
impl Operation for AddTranslation {
    type Request = (String, String);
    const NAME: &'static str = "add_translation";

    async fn submit(repository: &dyn TranslationRepository, pair: (String, String)) {
        let (from, to) = pair;
        repository.on_new_translation(from, to).await;
    }
}

#[async_trait]
impl Operation for RemoveTranslation {
    type Request = usize;
    const NAME: &'static str = "remove_translation";

    async fn submit(repository: &dyn TranslationRepository, index: usize) {
        repository.on_delete_translation_at_position(index).await;
    }
}

/// Interactor bound to the repository's shared broadcast streams.
///
/// Construction spawns two relay tasks (responses, errors); both are aborted
/// on drop.
pub struct RepositoryInteractor<O: Operation> {
    repository: Arc<dyn TranslationRepository>,
    awaiting: Arc<AtomicBool>,
    responses: broadcast::Sender<EntryList>,
    errors: broadcast::Sender<RepoError>,
    relays: [JoinHandle<()>; 2],
    _operation: PhantomData<fn() -> O>,
}

pub type GetTranslationsInteractor = RepositoryInteractor<GetTranslations>;
pub type AddGroupInteractor = RepositoryInteractor<AddGroup>;
pub type RemoveGroupInteractor = RepositoryInteractor<RemoveGroup>;
pub type AddTranslationInteractor = RepositoryInteractor<AddTranslation>;
pub type RemoveTranslationInteractor = RepositoryInteractor<RemoveTranslation>;

impl<O: Operation> RepositoryInteractor<O> {
    pub fn new(repository: Arc<dyn TranslationRepository>) -> Self {
        let awaiting = Arc::new(AtomicBool::new(false));
        let (responses, _) = broadcast::channel(RELAY_CHANNEL_CAPACITY);
        let (errors, _) = broadcast::channel(RELAY_CHANNEL_CAPACITY);

        let relays = [
            tokio::spawn(relay(
                O::NAME,
                repository.responses(),
                responses.clone(),
                Arc::clone(&awaiting),
            )),
            tokio::spawn(relay(
                O::NAME,
                repository.errors(),
                errors.clone(),
                Arc::clone(&awaiting),
            )),
        ];

        Self {
            repository,
            awaiting,
            responses,
            errors,
            relays,
            _operation: PhantomData,
        }
    }

    /// Whether a submitted request has not been answered yet.
    pub fn is_awaiting(&self) -> bool {
        self.awaiting.load(Ordering::Acquire)
    }
}

impl<O: Operation> Drop for RepositoryInteractor<O> {
    fn drop(&mut self) {
        for relay in &self.relays {
            relay.abort();
        }
    }
}

#[async_trait]
impl<O: Operation> Interactor<O::Request> for RepositoryInteractor<O> {
    fn responses(&self) -> broadcast::Receiver<EntryList> {
        self.responses.subscribe()
    }

    fn errors(&self) -> broadcast::Receiver<RepoError> {
        self.errors.subscribe()
    }

    async fn interact(&self, request: O::Request) {
        if self.awaiting.swap(true, Ordering::AcqRel) {
            warn!(
                "event=interact module=interactor status=overlap operation={}",
                O::NAME
            );
        }
        debug!(
            "event=interact module=interactor status=start operation={}",
            O::NAME
        );
        O::submit(self.repository.as_ref(), request).await;
    }
}

async fn relay<T: Clone>(
    operation: &'static str,
    mut source: broadcast::Receiver<T>,
    sink: broadcast::Sender<T>,
    awaiting: Arc<AtomicBool>,
) {
    loop {
        match source.recv().await {
            Ok(value) => {
                if awaiting.swap(false, Ordering::AcqRel) {
                    let _ = sink.send(value);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    "event=relay module=interactor status=lagged operation={operation} skipped={skipped}"
                );
            }
            Err(RecvError::Closed) => break,
        }
    }
}
