//! Core use-case services.
//!
//! # Responsibility
//! - Bind one interactor per repository operation.
//! - Reduce UI intents into session state through those interactors.
//!
//! # See also
//! - `repo::translation_repo` for the persistence contract.

pub mod interactor;
pub mod session;
