//! FFI use-case API for the Flutter translation screen.
//!
//! # Responsibility
//! - Expose one process-wide translation session to Dart via FRB.
//! - Translate FFI intents into core intents and core state into flat views.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - At most one session is open per process.
//! - A dispatch that goes through the repository waits at most
//!   `SETTLE_TIMEOUT` for the answer; a view whose `revision` did not advance
//!   means the answer is still pending and `session_snapshot` should be polled.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::runtime::Runtime;
use transnote_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Intent, SavedSession, SessionInteractors, SessionState, SqlitePreferenceStore,
    StoreTranslationRepository, TranslationEntry, TranslationSession, ViewState,
};

const DB_FILE_NAME: &str = "transnote.sqlite3";
const DB_PATH_ENV: &str = "TRANSNOTE_DB_PATH";
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static RUNTIME: OnceLock<Result<Runtime, String>> = OnceLock::new();
static SESSION: Mutex<Option<TranslationSession>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns an empty string on success and the error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Intent shape accepted from Dart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIntent {
    GetTranslations,
    NewGroup { title: String },
    NewTranslation { from: String, to: String },
    RequestNewGroup,
    NewGroupPending { title: String },
    SaveNewGroup,
    RequestNewTranslation,
    NewTranslationFromPending { text: String },
    NewTranslationToPending { text: String },
    SaveNewTranslation,
    DeleteGroupAtPosition { position: u32 },
    DeleteTranslationAtPosition { position: u32 },
    DismissNotice,
}

impl From<SessionIntent> for Intent {
    fn from(value: SessionIntent) -> Self {
        match value {
            SessionIntent::GetTranslations => Intent::GetTranslations,
            SessionIntent::NewGroup { title } => Intent::NewGroup(title),
            SessionIntent::NewTranslation { from, to } => Intent::NewTranslation { from, to },
            SessionIntent::RequestNewGroup => Intent::RequestNewGroup,
            SessionIntent::NewGroupPending { title } => Intent::NewGroupPending(title),
            SessionIntent::SaveNewGroup => Intent::SaveNewGroup,
            SessionIntent::RequestNewTranslation => Intent::RequestNewTranslation,
            SessionIntent::NewTranslationFromPending { text } => {
                Intent::NewTranslationFromPending(text)
            }
            SessionIntent::NewTranslationToPending { text } => {
                Intent::NewTranslationToPending(text)
            }
            SessionIntent::SaveNewTranslation => Intent::SaveNewTranslation,
            SessionIntent::DeleteGroupAtPosition { position } => {
                Intent::DeleteGroupAtPosition(position as usize)
            }
            SessionIntent::DeleteTranslationAtPosition { position } => {
                Intent::DeleteTranslationAtPosition(position as usize)
            }
            SessionIntent::DismissNotice => Intent::DismissNotice,
        }
    }
}

/// One list row as rendered by Dart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryItem {
    /// `group` or `pair`.
    pub kind: String,
    /// Group title or pair source phrase.
    pub label: String,
    /// Pair target phrase; `None` for groups.
    pub translation: Option<String>,
    /// Number of nested pairs; `0` for pairs.
    pub pair_count: u32,
}

/// Flattened session state envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Whether the call itself succeeded.
    pub ok: bool,
    /// Human-readable diagnostics for failed calls.
    pub message: String,
    /// `show_list`, `request_new_group` or `request_new_translation`.
    pub view_state: String,
    pub group_title: String,
    pub translation_from: String,
    pub translation_to: String,
    pub entries: Vec<EntryItem>,
    /// Last failure surfaced to the user, if not dismissed.
    pub notice: Option<String>,
    pub revision: u64,
}

impl SessionView {
    fn from_state(state: &SessionState) -> Self {
        Self {
            ok: true,
            message: String::new(),
            view_state: view_state_label(state.view_state).to_string(),
            group_title: state.group_title.clone(),
            translation_from: state.translation_from.clone(),
            translation_to: state.translation_to.clone(),
            entries: state.translations.iter().map(to_entry_item).collect(),
            notice: state.notice.as_ref().map(|notice| notice.message.clone()),
            revision: state.revision,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            view_state: view_state_label(ViewState::ShowList).to_string(),
            group_title: String::new(),
            translation_from: String::new(),
            translation_to: String::new(),
            entries: Vec::new(),
            notice: None,
            revision: 0,
        }
    }
}

/// Opens the process-wide session.
///
/// `saved_state` is the string previously returned by `session_save`; when
/// absent (or unreadable) the list is loaded from storage instead.
/// Calling this while a session is open returns the open session's view.
#[flutter_rust_bridge::frb(sync)]
pub fn session_open(saved_state: Option<String>) -> SessionView {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(err) => return SessionView::failure(format!("session_open failed: {err}")),
    };
    let mut slot = match SESSION.lock() {
        Ok(slot) => slot,
        Err(_) => return SessionView::failure("session_open failed: session lock poisoned"),
    };
    if let Some(session) = slot.as_ref() {
        return SessionView::from_state(&session.snapshot());
    }

    let saved = saved_state
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| match SavedSession::from_json(raw) {
            Ok(saved) => Some(saved),
            Err(err) => {
                log::warn!("event=session_open module=ffi status=discard_saved error={err}");
                None
            }
        });
    let restored = saved.is_some();

    let store = match SqlitePreferenceStore::open(resolve_db_path()) {
        Ok(store) => Arc::new(store),
        Err(err) => return SessionView::failure(format!("session_open failed: {err}")),
    };

    let session = {
        let _guard = runtime.enter();
        let repository = Arc::new(StoreTranslationRepository::new(store));
        TranslationSession::start(SessionInteractors::from_repository(repository), saved)
    };
    if !restored {
        runtime.block_on(wait_past_revision(&session, 0));
    }

    let view = SessionView::from_state(&session.snapshot());
    *slot = Some(session);
    view
}

/// Applies one intent to the open session and returns the resulting view.
#[flutter_rust_bridge::frb(sync)]
pub fn session_dispatch(intent: SessionIntent) -> SessionView {
    with_session("session_dispatch", |runtime, session| {
        let intent = Intent::from(intent);
        let revision = session.snapshot().revision;
        let needs_repository = intent.needs_repository();

        runtime.block_on(async {
            session.dispatch(intent).await;
            if needs_repository {
                wait_past_revision(session, revision).await;
            }
        });
        SessionView::from_state(&session.snapshot())
    })
}

/// Returns the open session's current view.
#[flutter_rust_bridge::frb(sync)]
pub fn session_snapshot() -> SessionView {
    with_session("session_snapshot", |_, session| {
        SessionView::from_state(&session.snapshot())
    })
}

/// Serializes the open session for app suspend; empty when none is open.
#[flutter_rust_bridge::frb(sync)]
pub fn session_save() -> String {
    let slot = match SESSION.lock() {
        Ok(slot) => slot,
        Err(_) => return String::new(),
    };
    slot.as_ref()
        .and_then(|session| session.save().to_json().ok())
        .unwrap_or_default()
}

/// Closes the open session; returns whether one was open.
#[flutter_rust_bridge::frb(sync)]
pub fn session_close() -> bool {
    let session = match SESSION.lock() {
        Ok(mut slot) => slot.take(),
        Err(_) => None,
    };
    match session {
        Some(session) => {
            session.shutdown();
            true
        }
        None => false,
    }
}

fn with_session(
    operation: &str,
    f: impl FnOnce(&Runtime, &TranslationSession) -> SessionView,
) -> SessionView {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(err) => return SessionView::failure(format!("{operation} failed: {err}")),
    };
    let slot = match SESSION.lock() {
        Ok(slot) => slot,
        Err(_) => return SessionView::failure(format!("{operation} failed: session lock poisoned")),
    };
    match slot.as_ref() {
        Some(session) => f(runtime, session),
        None => SessionView::failure(format!("{operation} failed: no open session")),
    }
}

async fn wait_past_revision(session: &TranslationSession, revision: u64) {
    let mut rx = session.watch();
    let settled = tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(|state| state.revision > revision))
        .await
        .map(|result| result.is_ok())
        .unwrap_or(false);
    if !settled {
        log::warn!(
            "event=session_settle module=ffi status=pending revision={revision} timeout_ms={}",
            SETTLE_TIMEOUT.as_millis()
        );
    }
}

fn runtime() -> Result<&'static Runtime, String> {
    RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("transnote-ffi")
                .enable_time()
                .build()
                .map_err(|err| format!("failed to build runtime: {err}"))
        })
        .as_ref()
        .map_err(Clone::clone)
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn to_entry_item(entry: &TranslationEntry) -> EntryItem {
    match entry {
        TranslationEntry::Group(group) => EntryItem {
            kind: entry.kind().to_string(),
            label: group.title.clone(),
            translation: None,
            pair_count: u32::try_from(group.translations.len()).unwrap_or(u32::MAX),
        },
        TranslationEntry::Pair(pair) => EntryItem {
            kind: entry.kind().to_string(),
            label: pair.from.clone(),
            translation: Some(pair.to.clone()),
            pair_count: 0,
        },
    }
}

fn view_state_label(view_state: ViewState) -> &'static str {
    match view_state {
        ViewState::ShowList => "show_list",
        ViewState::RequestNewGroup => "request_new_group",
        ViewState::RequestNewTranslation => "request_new_translation",
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, init_logging, ping, session_close, session_dispatch, session_open,
        session_save, session_snapshot, SessionIntent,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        assert!(!init_logging("verbose".to_string(), "/tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn session_lifecycle_round_trip() {
        let title = unique_token("ffi-group");

        let opened = session_open(None);
        assert!(opened.ok, "{}", opened.message);
        assert_eq!(opened.view_state, "show_list");
        let initial_len = opened.entries.len();

        let requested = session_dispatch(SessionIntent::RequestNewGroup);
        assert_eq!(requested.view_state, "request_new_group");
        session_dispatch(SessionIntent::NewGroupPending {
            title: title.clone(),
        });
        let saved_group = session_dispatch(SessionIntent::SaveNewGroup);
        assert_eq!(saved_group.entries.len(), initial_len + 1);
        assert_eq!(saved_group.entries[initial_len].label, title);
        assert_eq!(saved_group.group_title, "");

        let failed = session_dispatch(SessionIntent::DeleteTranslationAtPosition { position: 0 });
        assert!(failed.notice.is_some());
        let dismissed = session_dispatch(SessionIntent::DismissNotice);
        assert!(dismissed.notice.is_none());

        let saved = session_save();
        assert!(!saved.is_empty());
        assert!(session_close());
        assert!(!session_snapshot().ok);

        let restored = session_open(Some(saved));
        assert!(restored.ok, "{}", restored.message);
        assert_eq!(restored.view_state, "request_new_group");
        assert_eq!(restored.entries.len(), initial_len + 1);

        let deleted = session_dispatch(SessionIntent::DeleteGroupAtPosition {
            position: initial_len as u32,
        });
        assert_eq!(deleted.entries.len(), initial_len);
        assert!(session_close());
        assert!(!session_close());
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
