use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use transnote_core::{
    encode_entries, EntryList, Intent, Interactor, MemoryPreferenceStore, PreferenceStore,
    RepoError, SavedSession, SessionInteractors, SessionState, StoreTranslationRepository,
    TranslationEntry, TranslationSession, ViewState, TRANSLATIONS_KEY,
};

const WAIT: Duration = Duration::from_secs(2);

async fn wait_for_revision(rx: &mut watch::Receiver<SessionState>, revision: u64) -> SessionState {
    timeout(WAIT, rx.wait_for(|state| state.revision >= revision))
        .await
        .expect("session update timed out")
        .expect("session closed")
        .clone()
}

fn seeded_store(entries: &[TranslationEntry]) -> Arc<MemoryPreferenceStore> {
    Arc::new(MemoryPreferenceStore::with_value(
        TRANSLATIONS_KEY,
        encode_entries(entries).unwrap(),
    ))
}

fn start_on(store: Arc<MemoryPreferenceStore>, saved: Option<SavedSession>) -> TranslationSession {
    let repository = Arc::new(StoreTranslationRepository::new(store));
    TranslationSession::start(SessionInteractors::from_repository(repository), saved)
}

/// Interactor that answers every request with a fixed outcome.
struct ScriptedInteractor {
    outcome: Result<EntryList, RepoError>,
    responses: broadcast::Sender<EntryList>,
    errors: broadcast::Sender<RepoError>,
}

impl ScriptedInteractor {
    fn new(outcome: Result<EntryList, RepoError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            responses: broadcast::channel(8).0,
            errors: broadcast::channel(8).0,
        })
    }
}

#[async_trait]
impl<T: Send + 'static> Interactor<T> for ScriptedInteractor {
    fn responses(&self) -> broadcast::Receiver<EntryList> {
        self.responses.subscribe()
    }

    fn errors(&self) -> broadcast::Receiver<RepoError> {
        self.errors.subscribe()
    }

    async fn interact(&self, _request: T) {
        match self.outcome.clone() {
            Ok(entries) => {
                let _ = self.responses.send(entries);
            }
            Err(err) => {
                let _ = self.errors.send(err);
            }
        }
    }
}

fn scripted(
    get_all: Arc<ScriptedInteractor>,
    add_group: Arc<ScriptedInteractor>,
) -> SessionInteractors {
    let idle = ScriptedInteractor::new(Ok(Vec::new()));
    SessionInteractors {
        get_translations: get_all,
        add_group,
        remove_group: idle.clone(),
        add_translation: idle.clone(),
        remove_translation: idle,
    }
}

#[tokio::test]
async fn fresh_session_loads_list_and_shows_it() {
    let store = seeded_store(&[
        TranslationEntry::group("English to Spanish"),
        TranslationEntry::pair("Hi!", "Hola"),
    ]);
    let session = start_on(store, None);
    let mut rx = session.watch();

    let state = wait_for_revision(&mut rx, 1).await;

    assert_eq!(state.view_state, ViewState::ShowList);
    assert_eq!(state.translations.len(), 2);
    assert_eq!(state.notice, None);
}

#[tokio::test]
async fn save_new_group_clears_buffer_and_keeps_view_state() {
    let session = start_on(Arc::new(MemoryPreferenceStore::new()), None);
    let mut rx = session.watch();
    wait_for_revision(&mut rx, 1).await;

    session.dispatch(Intent::RequestNewGroup).await;
    session
        .dispatch(Intent::NewGroupPending("English to Spanish".to_string()))
        .await;
    assert_eq!(session.snapshot().group_title, "English to Spanish");

    session.dispatch(Intent::SaveNewGroup).await;
    let state = wait_for_revision(&mut rx, 2).await;

    assert_eq!(
        state.translations,
        vec![TranslationEntry::group("English to Spanish")]
    );
    assert_eq!(state.group_title, "");
    assert_eq!(state.view_state, ViewState::RequestNewGroup);
}

#[tokio::test]
async fn save_new_translation_appends_pair_and_clears_both_buffers() {
    let session = start_on(seeded_store(&[TranslationEntry::group("Greetings")]), None);
    let mut rx = session.watch();
    wait_for_revision(&mut rx, 1).await;

    session.dispatch(Intent::RequestNewTranslation).await;
    assert_eq!(session.snapshot().view_state, ViewState::RequestNewTranslation);
    session
        .dispatch(Intent::NewTranslationFromPending("Hello".to_string()))
        .await;
    session
        .dispatch(Intent::NewTranslationToPending("Hola".to_string()))
        .await;
    session.dispatch(Intent::SaveNewTranslation).await;

    let state = wait_for_revision(&mut rx, 2).await;
    assert_eq!(
        state.translations,
        vec![
            TranslationEntry::group("Greetings"),
            TranslationEntry::pair("Hello", "Hola"),
        ]
    );
    assert_eq!(state.translation_from, "");
    assert_eq!(state.translation_to, "");
    assert_eq!(state.view_state, ViewState::RequestNewTranslation);
}

#[tokio::test]
async fn request_intents_reset_pending_buffers() {
    let session = start_on(Arc::new(MemoryPreferenceStore::new()), None);
    let mut rx = session.watch();
    wait_for_revision(&mut rx, 1).await;

    session
        .dispatch(Intent::NewGroupPending("stale".to_string()))
        .await;
    session
        .dispatch(Intent::NewTranslationFromPending("old".to_string()))
        .await;
    session.dispatch(Intent::RequestNewGroup).await;
    assert_eq!(session.snapshot().group_title, "");
    assert_eq!(session.snapshot().translation_from, "old");

    session.dispatch(Intent::RequestNewTranslation).await;
    assert_eq!(session.snapshot().translation_from, "");
}

#[tokio::test]
async fn delete_group_updates_list() {
    let session = start_on(
        seeded_store(&[
            TranslationEntry::group("GroupA"),
            TranslationEntry::group("GroupB"),
        ]),
        None,
    );
    let mut rx = session.watch();
    wait_for_revision(&mut rx, 1).await;

    session.dispatch(Intent::DeleteGroupAtPosition(0)).await;

    let state = wait_for_revision(&mut rx, 2).await;
    assert_eq!(state.translations, vec![TranslationEntry::group("GroupB")]);
}

#[tokio::test]
async fn failures_become_notices_until_dismissed() {
    let store = seeded_store(&[TranslationEntry::group("Only")]);
    let session = start_on(store.clone(), None);
    let mut rx = session.watch();
    wait_for_revision(&mut rx, 1).await;

    session.dispatch(Intent::DeleteGroupAtPosition(3)).await;
    let state = wait_for_revision(&mut rx, 2).await;
    let notice = state.notice.expect("out of range should raise a notice");
    assert_eq!(notice.operation, "remove_group");
    assert_eq!(notice.kind, "out_of_range");
    assert_eq!(state.translations, vec![TranslationEntry::group("Only")]);

    session.dispatch(Intent::DeleteTranslationAtPosition(0)).await;
    let state = wait_for_revision(&mut rx, 3).await;
    let notice = state.notice.expect("remove translation should raise a notice");
    assert_eq!(notice.operation, "remove_translation");
    assert_eq!(notice.kind, "not_implemented");

    session.dispatch(Intent::DismissNotice).await;
    assert_eq!(session.snapshot().notice, None);
    assert_eq!(
        store.read(TRANSLATIONS_KEY).unwrap().as_deref(),
        Some(r#"[{"type":"group","title":"Only","translations":[]}]"#)
    );
}

#[tokio::test]
async fn restored_session_skips_initial_load() {
    let store = seeded_store(&[TranslationEntry::group("from store")]);
    let saved = SavedSession {
        view_state: ViewState::RequestNewGroup.ordinal(),
        group_title: "half typed".to_string(),
        translation_from: String::new(),
        translation_to: String::new(),
        translations: vec![TranslationEntry::group("from snapshot")],
    };

    let session = start_on(store, Some(saved.clone()));
    tokio::time::sleep(Duration::from_millis(150)).await;

    let state = session.snapshot();
    assert_eq!(state.revision, 0);
    assert_eq!(state.view_state, ViewState::RequestNewGroup);
    assert_eq!(state.group_title, "half typed");
    assert_eq!(state.translations, saved.translations);
    assert_eq!(session.save(), saved);
}

#[tokio::test]
async fn explicit_get_translations_returns_to_list_view() {
    let session = start_on(Arc::new(MemoryPreferenceStore::new()), None);
    let mut rx = session.watch();
    wait_for_revision(&mut rx, 1).await;

    session.dispatch(Intent::RequestNewGroup).await;
    session.dispatch(Intent::GetTranslations).await;

    let state = wait_for_revision(&mut rx, 2).await;
    assert_eq!(state.view_state, ViewState::ShowList);
}

#[tokio::test]
async fn direct_add_intents_bypass_buffers() {
    let session = start_on(Arc::new(MemoryPreferenceStore::new()), None);
    let mut rx = session.watch();
    wait_for_revision(&mut rx, 1).await;

    session
        .dispatch(Intent::NewGroupPending("draft".to_string()))
        .await;
    session
        .dispatch(Intent::NewTranslationFromPending("half".to_string()))
        .await;
    session
        .dispatch(Intent::NewTranslationToPending("medio".to_string()))
        .await;

    session.dispatch(Intent::NewGroup("Numbers".to_string())).await;
    let state = wait_for_revision(&mut rx, 2).await;
    assert_eq!(state.group_title, "draft");

    session
        .dispatch(Intent::NewTranslation {
            from: "one".to_string(),
            to: "uno".to_string(),
        })
        .await;

    let state = wait_for_revision(&mut rx, 3).await;
    assert_eq!(
        state.translations,
        vec![
            TranslationEntry::group("Numbers"),
            TranslationEntry::pair("one", "uno"),
        ]
    );
    assert_eq!(state.group_title, "draft");
    assert_eq!(state.translation_from, "half");
    assert_eq!(state.translation_to, "medio");

    session.dispatch(Intent::SaveNewGroup).await;
    let state = wait_for_revision(&mut rx, 4).await;
    assert_eq!(state.group_title, "");
    assert_eq!(state.translation_from, "half");
}

#[tokio::test]
async fn scripted_error_surfaces_as_notice() {
    let get_all = ScriptedInteractor::new(Ok(vec![TranslationEntry::group("English to French")]));
    let add_group = ScriptedInteractor::new(Err(RepoError::StorageAccess("disk full".to_string())));
    let session = TranslationSession::start(scripted(get_all, add_group), None);
    let mut rx = session.watch();

    let loaded = wait_for_revision(&mut rx, 1).await;
    assert_eq!(loaded.translations.len(), 1);

    session
        .dispatch(Intent::NewGroupPending("English to German".to_string()))
        .await;
    session.dispatch(Intent::SaveNewGroup).await;

    let state = wait_for_revision(&mut rx, 2).await;
    let notice = state.notice.expect("storage failure should raise a notice");
    assert_eq!(notice.operation, "add_group");
    assert_eq!(notice.kind, "storage_access");
    assert!(notice.message.contains("disk full"));
    assert_eq!(state.group_title, "English to German");
}

#[tokio::test]
async fn shutdown_releases_session_state() {
    let session = start_on(Arc::new(MemoryPreferenceStore::new()), None);
    let mut rx = session.watch();
    wait_for_revision(&mut rx, 1).await;

    session.shutdown();

    let closed = timeout(WAIT, async {
        loop {
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "state channel should close after shutdown");
}

#[tokio::test]
async fn emit_runs_intents_on_session_tasks() {
    let session = start_on(Arc::new(MemoryPreferenceStore::new()), None);
    let mut rx = session.watch();
    wait_for_revision(&mut rx, 1).await;

    session.emit(Intent::NewGroup("Weather".to_string()));

    let state = wait_for_revision(&mut rx, 2).await;
    assert_eq!(state.translations, vec![TranslationEntry::group("Weather")]);
}
