//! Flutter bridge surface for `transnote_core`.

pub mod api;
