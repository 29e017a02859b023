use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use transnote_core::service::interactor::{
    AddGroupInteractor, AddTranslationInteractor, GetTranslationsInteractor,
    RemoveGroupInteractor, RemoveTranslationInteractor,
};
use transnote_core::{
    Interactor, MemoryPreferenceStore, PreferenceStore, RepoError, StoreTranslationRepository,
    TranslationEntry, TranslationRepository, TRANSLATIONS_KEY,
};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(150);

async fn next<T: Clone>(rx: &mut broadcast::Receiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("emission timed out")
        .expect("channel closed")
}

async fn assert_quiet<T: Clone + std::fmt::Debug>(rx: &mut broadcast::Receiver<T>) {
    if let Ok(value) = timeout(QUIET, rx.recv()).await {
        panic!("unexpected emission: {value:?}");
    }
}

async fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> usize {
    let mut count = 0;
    while let Ok(Ok(_)) = timeout(QUIET, rx.recv()).await {
        count += 1;
    }
    count
}

fn repository(store: Arc<MemoryPreferenceStore>) -> Arc<dyn TranslationRepository> {
    Arc::new(StoreTranslationRepository::new(store))
}

#[tokio::test]
async fn interactor_relays_answer_to_its_own_request() {
    let repo = repository(Arc::new(MemoryPreferenceStore::new()));
    let add_group = AddGroupInteractor::new(repo);
    let mut responses = add_group.responses();

    add_group.interact("English to German".to_string()).await;

    assert_eq!(
        next(&mut responses).await,
        vec![TranslationEntry::group("English to German")]
    );
    assert!(!add_group.is_awaiting());
}

#[tokio::test]
async fn sibling_interactors_ignore_each_others_emissions() {
    let repo = repository(Arc::new(MemoryPreferenceStore::new()));
    let get_all = GetTranslationsInteractor::new(Arc::clone(&repo));
    let add_group = AddGroupInteractor::new(Arc::clone(&repo));
    let remove_group = RemoveGroupInteractor::new(repo);

    let mut get_all_responses = get_all.responses();
    let mut add_responses = add_group.responses();
    let mut add_errors = add_group.errors();
    let mut remove_errors = remove_group.errors();

    add_group.interact("Food".to_string()).await;
    assert_eq!(next(&mut add_responses).await.len(), 1);
    assert_quiet(&mut get_all_responses).await;

    remove_group.interact(5).await;
    assert_eq!(
        next(&mut remove_errors).await,
        RepoError::OutOfRange { index: 5, len: 1 }
    );
    assert_quiet(&mut add_errors).await;
}

#[tokio::test]
async fn emissions_while_idle_are_dropped() {
    let store = Arc::new(MemoryPreferenceStore::new());
    let get_all = GetTranslationsInteractor::new(repository(store.clone()));
    let mut responses = get_all.responses();

    store
        .write(TRANSLATIONS_KEY, r#"[{"type":"pair","from":"x","to":"y"}]"#)
        .unwrap();
    assert_quiet(&mut responses).await;

    get_all.interact(()).await;
    assert_eq!(
        next(&mut responses).await,
        vec![TranslationEntry::pair("x", "y")]
    );
}

#[tokio::test]
async fn add_translation_and_get_all_round_trip() {
    let repo = repository(Arc::new(MemoryPreferenceStore::new()));
    let add_translation = AddTranslationInteractor::new(Arc::clone(&repo));
    let get_all = GetTranslationsInteractor::new(repo);
    let mut added = add_translation.responses();
    let mut listed = get_all.responses();

    add_translation
        .interact(("Hello".to_string(), "Hola".to_string()))
        .await;
    next(&mut added).await;

    get_all.interact(()).await;
    assert_eq!(
        next(&mut listed).await,
        vec![TranslationEntry::pair("Hello", "Hola")]
    );
}

#[tokio::test]
async fn remove_translation_interactor_reports_not_implemented() {
    let repo = repository(Arc::new(MemoryPreferenceStore::new()));
    let remove_translation = RemoveTranslationInteractor::new(repo);
    let mut responses = remove_translation.responses();
    let mut errors = remove_translation.errors();

    remove_translation.interact(0).await;

    assert_eq!(
        next(&mut errors).await,
        RepoError::NotImplemented("remove_translation")
    );
    assert_quiet(&mut responses).await;
    assert!(!remove_translation.is_awaiting());
}

/// Two overlapping calls on one interactor share a single awaiting flag, so
/// the second call's result can be swallowed. Both writes still land.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_calls_on_one_interactor_may_swallow_a_result() {
    let store = Arc::new(MemoryPreferenceStore::new());
    let add_group = Arc::new(AddGroupInteractor::new(repository(store.clone())));
    let mut responses = add_group.responses();

    let first = {
        let add_group = Arc::clone(&add_group);
        tokio::spawn(async move { add_group.interact("A".to_string()).await })
    };
    let second = {
        let add_group = Arc::clone(&add_group);
        tokio::spawn(async move { add_group.interact("B".to_string()).await })
    };
    first.await.unwrap();
    second.await.unwrap();

    let relayed = drain(&mut responses).await;
    assert!((1..=2).contains(&relayed), "relayed {relayed} responses");

    let persisted =
        transnote_core::decode_entries(&store.read(TRANSLATIONS_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(persisted.len(), 2);
}
