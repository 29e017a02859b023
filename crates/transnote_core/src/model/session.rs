//! UI-facing session model: view modes, intents, observable state.
//!
//! # Responsibility
//! - Define the reducer vocabulary shared by core, FFI and CLI callers.
//! - Provide the saved-state shape used across app suspend/resume.
//!
//! # Invariants
//! - Exactly one `ViewState` is active at a time.
//! - `ViewState` ordinals are stable: unknown ordinals restore as `ShowList`.

use crate::model::translation::EntryList;
use crate::repo::translation_repo::RepoError;
use serde::{Deserialize, Serialize};

/// Current UI mode of the translation screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    /// Translation list is shown.
    #[default]
    ShowList,
    /// User is typing a new group title.
    RequestNewGroup,
    /// User is typing a new from/to pair.
    RequestNewTranslation,
}

impl ViewState {
    /// Stable ordinal used in saved session state.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::ShowList => 0,
            Self::RequestNewGroup => 1,
            Self::RequestNewTranslation => 2,
        }
    }

    /// Inverse of [`ViewState::ordinal`]; unknown values fall back to `ShowList`.
    pub fn from_ordinal(value: u8) -> Self {
        match value {
            1 => Self::RequestNewGroup,
            2 => Self::RequestNewTranslation,
            _ => Self::ShowList,
        }
    }
}

/// Discrete user or system action submitted to the session reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    GetTranslations,
    NewGroup(String),
    NewTranslation { from: String, to: String },
    RequestNewGroup,
    NewGroupPending(String),
    SaveNewGroup,
    RequestNewTranslation,
    NewTranslationFromPending(String),
    NewTranslationToPending(String),
    SaveNewTranslation,
    DeleteGroupAtPosition(usize),
    DeleteTranslationAtPosition(usize),
    DismissNotice,
}

impl Intent {
    /// Stable intent name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetTranslations => "get_translations",
            Self::NewGroup(_) => "new_group",
            Self::NewTranslation { .. } => "new_translation",
            Self::RequestNewGroup => "request_new_group",
            Self::NewGroupPending(_) => "new_group_pending",
            Self::SaveNewGroup => "save_new_group",
            Self::RequestNewTranslation => "request_new_translation",
            Self::NewTranslationFromPending(_) => "new_translation_from_pending",
            Self::NewTranslationToPending(_) => "new_translation_to_pending",
            Self::SaveNewTranslation => "save_new_translation",
            Self::DeleteGroupAtPosition(_) => "delete_group_at_position",
            Self::DeleteTranslationAtPosition(_) => "delete_translation_at_position",
            Self::DismissNotice => "dismiss_notice",
        }
    }

    /// Whether handling this intent goes through an interactor round trip.
    pub fn needs_repository(&self) -> bool {
        matches!(
            self,
            Self::GetTranslations
                | Self::NewGroup(_)
                | Self::NewTranslation { .. }
                | Self::SaveNewGroup
                | Self::SaveNewTranslation
                | Self::DeleteGroupAtPosition(_)
                | Self::DeleteTranslationAtPosition(_)
        )
    }
}

/// Failure shown to the user after an interactor reported an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Interactor operation that failed (`add_group`, `remove_group`, ...).
    pub operation: &'static str,
    /// Stable error code (`storage_access`, `out_of_range`, ...).
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl Notice {
    pub fn from_error(operation: &'static str, err: &RepoError) -> Self {
        Self {
            operation,
            kind: err.code(),
            message: err.to_string(),
        }
    }
}

/// Observable state held by one translation session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub view_state: ViewState,
    pub group_title: String,
    pub translation_from: String,
    pub translation_to: String,
    pub translations: EntryList,
    pub notice: Option<Notice>,
    /// Incremented every time an interactor emission is applied.
    pub revision: u64,
}

/// Snapshot persisted when the app is suspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub view_state: u8,
    #[serde(default)]
    pub group_title: String,
    #[serde(default)]
    pub translation_from: String,
    #[serde(default)]
    pub translation_to: String,
    #[serde(default)]
    pub translations: EntryList,
}

impl SavedSession {
    pub fn capture(state: &SessionState) -> Self {
        Self {
            view_state: state.view_state.ordinal(),
            group_title: state.group_title.clone(),
            translation_from: state.translation_from.clone(),
            translation_to: state.translation_to.clone(),
            translations: state.translations.clone(),
        }
    }

    /// Rebuilds session state; notices and revision are not carried over.
    pub fn restore(self) -> SessionState {
        SessionState {
            view_state: ViewState::from_ordinal(self.view_state),
            group_title: self.group_title,
            translation_from: self.translation_from,
            translation_to: self.translation_to,
            translations: self.translations,
            notice: None,
            revision: 0,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
