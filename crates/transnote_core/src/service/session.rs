//! Translation session: the intent reducer behind the translation screen.
//!
//! # Responsibility
//! - Turn intents into buffer edits or interactor calls.
//! - Apply interactor emissions to one observable `SessionState`.
//! - Surface interactor failures as a user-visible notice.
//!
//! # Invariants
//! - All state lives in one watch channel owned by the session; handlers
//!   mutate it only through `send_modify`.
//! - Saving a group or translation does not change the view state.
//! - Pending buffers are cleared only by the answer to a `Save*` intent;
//!   direct adds leave them untouched.
//! - Every task the session spawns is aborted when it is shut down or dropped.

use crate::model::session::{Intent, Notice, SavedSession, SessionState, ViewState};
use crate::model::translation::EntryList;
use crate::repo::translation_repo::{RepoError, TranslationRepository};
use crate::service::interactor::{
    AddGroup, AddGroupInteractor, AddTranslation, AddTranslationInteractor, GetTranslations,
    GetTranslationsInteractor, Interactor, Operation, RemoveGroup, RemoveGroupInteractor,
    RemoveTranslation, RemoveTranslationInteractor,
};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Identifier attached to every log line of one session.
pub type SessionId = Uuid;

/// The five interactors a session drives.
#[derive(Clone)]
pub struct SessionInteractors {
    pub get_translations: Arc<dyn Interactor<()>>,
    pub add_group: Arc<dyn Interactor<String>>,
    pub remove_group: Arc<dyn Interactor<usize>>,
    pub add_translation: Arc<dyn Interactor<(String, String)>>,
    pub remove_translation: Arc<dyn Interactor<usize>>,
}

impl SessionInteractors {
    /// Binds one interactor per operation to the same repository.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_repository(repository: Arc<dyn TranslationRepository>) -> Self {
        Self {
            get_translations: Arc::new(GetTranslationsInteractor::new(Arc::clone(&repository))),
            add_group: Arc::new(AddGroupInteractor::new(Arc::clone(&repository))),
            remove_group: Arc::new(RemoveGroupInteractor::new(Arc::clone(&repository))),
            add_translation: Arc::new(AddTranslationInteractor::new(Arc::clone(&repository))),
            remove_translation: Arc::new(RemoveTranslationInteractor::new(repository)),
        }
    }
}

struct SessionCore {
    id: SessionId,
    interactors: SessionInteractors,
    state: Arc<watch::Sender<SessionState>>,
    /// Set when the pending add-group request came from `SaveNewGroup`.
    clear_group_title: Arc<AtomicBool>,
    /// Set when the pending add-translation request came from `SaveNewTranslation`.
    clear_translation: Arc<AtomicBool>,
}

/// One UI session bound to a set of interactors.
pub struct TranslationSession {
    core: Arc<SessionCore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TranslationSession {
    /// Starts a session, restoring `saved` verbatim or issuing a fresh get-all.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(interactors: SessionInteractors, saved: Option<SavedSession>) -> Self {
        let restored = saved.is_some();
        let (state, _) = watch::channel(saved.map(SavedSession::restore).unwrap_or_default());
        let state = Arc::new(state);
        let clear_group_title = Arc::new(AtomicBool::new(false));
        let clear_translation = Arc::new(AtomicBool::new(false));

        let mut tasks = Vec::with_capacity(11);
        tasks.extend(collect::<GetTranslations>(
            interactors.get_translations.as_ref(),
            &state,
            |state, entries| {
                state.translations = entries;
                state.view_state = ViewState::ShowList;
            },
        ));
        let clear = Arc::clone(&clear_group_title);
        tasks.extend(collect::<AddGroup>(
            interactors.add_group.as_ref(),
            &state,
            move |state, entries| {
                state.translations = entries;
                if clear.swap(false, Ordering::AcqRel) {
                    state.group_title.clear();
                }
            },
        ));
        tasks.extend(collect::<RemoveGroup>(
            interactors.remove_group.as_ref(),
            &state,
            |state, entries| state.translations = entries,
        ));
        let clear = Arc::clone(&clear_translation);
        tasks.extend(collect::<AddTranslation>(
            interactors.add_translation.as_ref(),
            &state,
            move |state, entries| {
                state.translations = entries;
                if clear.swap(false, Ordering::AcqRel) {
                    state.translation_from.clear();
                    state.translation_to.clear();
                }
            },
        ));
        tasks.extend(collect::<RemoveTranslation>(
            interactors.remove_translation.as_ref(),
            &state,
            |state, entries| state.translations = entries,
        ));

        let session = Self {
            core: Arc::new(SessionCore {
                id: Uuid::new_v4(),
                interactors,
                state,
                clear_group_title,
                clear_translation,
            }),
            tasks: Mutex::new(tasks),
        };
        info!(
            "event=session_start module=session status=ok session_id={} restored={}",
            session.core.id, restored
        );

        if !restored {
            session.emit(Intent::GetTranslations);
        }
        session
    }

    pub fn id(&self) -> SessionId {
        self.core.id
    }

    /// Handles one intent and returns once any repository write has settled.
    ///
    /// The resulting list (or notice) is applied asynchronously when the
    /// interactor re-emits; observe it through [`TranslationSession::watch`].
    pub async fn dispatch(&self, intent: Intent) {
        self.core.dispatch(intent).await;
    }

    /// Handles one intent on a session-owned task.
    pub fn emit(&self, intent: Intent) {
        let core = Arc::clone(&self.core);
        let handle = tokio::spawn(async move { core.dispatch(intent).await });
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|task| !task.is_finished());
            tasks.push(handle);
        }
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.core.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.core.state.borrow().clone()
    }

    /// Captures the fields restored by [`TranslationSession::start`].
    pub fn save(&self) -> SavedSession {
        SavedSession::capture(&self.core.state.borrow())
    }

    /// Cancels every pending task of this session.
    pub fn shutdown(self) {
        info!(
            "event=session_shutdown module=session status=ok session_id={}",
            self.core.id
        );
    }
}

impl Drop for TranslationSession {
    fn drop(&mut self) {
        let tasks = match self.tasks.get_mut() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        };
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl SessionCore {
    async fn dispatch(&self, intent: Intent) {
        debug!(
            "event=intent module=session status=start session_id={} intent={}",
            self.id,
            intent.name()
        );

        match intent {
            Intent::GetTranslations => self.interactors.get_translations.interact(()).await,
            Intent::NewGroup(title) => {
                self.clear_group_title.store(false, Ordering::Release);
                self.interactors.add_group.interact(title).await;
            }
            Intent::NewTranslation { from, to } => {
                self.clear_translation.store(false, Ordering::Release);
                self.interactors.add_translation.interact((from, to)).await;
            }
            Intent::RequestNewGroup => self.update(|state| {
                state.view_state = ViewState::RequestNewGroup;
                state.group_title.clear();
            }),
            Intent::NewGroupPending(title) => self.update(|state| state.group_title = title),
            Intent::SaveNewGroup => {
                let title = self.state.borrow().group_title.clone();
                self.clear_group_title.store(true, Ordering::Release);
                self.interactors.add_group.interact(title).await;
            }
            Intent::RequestNewTranslation => self.update(|state| {
                state.view_state = ViewState::RequestNewTranslation;
                state.translation_from.clear();
                state.translation_to.clear();
            }),
            Intent::NewTranslationFromPending(text) => {
                self.update(|state| state.translation_from = text)
            }
            Intent::NewTranslationToPending(text) => self.update(|state| state.translation_to = text),
            Intent::SaveNewTranslation => {
                let pair = {
                    let state = self.state.borrow();
                    (state.translation_from.clone(), state.translation_to.clone())
                };
                self.clear_translation.store(true, Ordering::Release);
                self.interactors.add_translation.interact(pair).await;
            }
            Intent::DeleteGroupAtPosition(index) => {
                self.interactors.remove_group.interact(index).await
            }
            Intent::DeleteTranslationAtPosition(index) => {
                self.interactors.remove_translation.interact(index).await
            }
            Intent::DismissNotice => self.update(|state| state.notice = None),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(apply);
    }
}

/// Spawns the response and error collectors for one interactor.
fn collect<O: Operation>(
    interactor: &dyn Interactor<O::Request>,
    state: &Arc<watch::Sender<SessionState>>,
    on_response: impl Fn(&mut SessionState, EntryList) + Send + 'static,
) -> [JoinHandle<()>; 2] {
    [
        tokio::spawn(apply_responses(
            interactor.responses(),
            Arc::clone(state),
            on_response,
        )),
        tokio::spawn(apply_errors(O::NAME, interactor.errors(), Arc::clone(state))),
    ]
}

async fn apply_responses<F>(
    mut responses: broadcast::Receiver<EntryList>,
    state: Arc<watch::Sender<SessionState>>,
    on_response: F,
) where
    F: Fn(&mut SessionState, EntryList) + Send + 'static,
{
    loop {
        match responses.recv().await {
            Ok(entries) => state.send_modify(|state| {
                on_response(state, entries);
                state.revision += 1;
            }),
            Err(RecvError::Lagged(skipped)) => {
                warn!("event=session_apply module=session status=lagged skipped={skipped}");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn apply_errors(
    operation: &'static str,
    mut errors: broadcast::Receiver<RepoError>,
    state: Arc<watch::Sender<SessionState>>,
) {
    loop {
        match errors.recv().await {
            Ok(err) => {
                warn!(
                    "event=session_notice module=session status=error operation={operation} error_code={} error={}",
                    err.code(),
                    err
                );
                state.send_modify(|state| {
                    state.notice = Some(Notice::from_error(operation, &err));
                    state.revision += 1;
                });
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("event=session_notice module=session status=lagged skipped={skipped}");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
