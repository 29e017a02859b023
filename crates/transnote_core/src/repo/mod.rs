//! Repository layer over the preference store.
//!
//! # Responsibility
//! - Define the translation list persistence contract used by interactors.
//! - Keep blob encoding and store access out of the service layer.
//!
//! # Invariants
//! - Failures are reported on the repository error stream, never swallowed.

pub mod translation_repo;
