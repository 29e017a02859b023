//! Domain model for translation notes.
//!
//! # Responsibility
//! - Define the persisted entry list shape.
//! - Define the reducer vocabulary (view state, intents, saved state).
//!
//! # Invariants
//! - Entry variants are a closed set; every consumer matches exhaustively.

pub mod session;
pub mod translation;
