//! Core domain logic for translation notes.
//! This crate owns the entry list, its persistence, and the intent reducer;
//! UI shells only submit intents and observe session state.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::session::{Intent, Notice, SavedSession, SessionState, ViewState};
pub use model::translation::{
    decode_entries, encode_entries, EntryList, TranslationEntry, TranslationGroup,
    TranslationPair,
};
pub use repo::translation_repo::{
    RepoError, RepoResult, StoreTranslationRepository, TranslationRepository, TRANSLATIONS_KEY,
};
pub use service::interactor::{Interactor, RepositoryInteractor};
pub use service::session::{SessionId, SessionInteractors, TranslationSession};
pub use store::{
    EditDecision, MemoryPreferenceStore, PreferenceStore, SqlitePreferenceStore, StoreChange,
    StoreError, StoreResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
