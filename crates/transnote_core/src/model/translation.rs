//! Translation entry domain model and its persisted JSON form.
//!
//! # Responsibility
//! - Define the closed set of entry shapes shown in the translation list.
//! - Encode/decode the whole list as the single stored blob.
//!
//! # Invariants
//! - List order is display order; duplicates are allowed.
//! - Decoding ignores unknown fields and treats an empty blob as an empty list.
//! - A group's `translations` defaults to empty when absent.

use serde::{Deserialize, Serialize};

/// Blob value used when the store has no value for the list key.
pub const EMPTY_LIST_BLOB: &str = "[]";

/// One from/to phrase pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationPair {
    pub from: String,
    pub to: String,
}

impl TranslationPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Named group of phrase pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationGroup {
    pub title: String,
    #[serde(default)]
    pub translations: Vec<TranslationPair>,
}

impl TranslationGroup {
    /// Creates a group with no pairs yet.
    pub fn empty(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            translations: Vec::new(),
        }
    }
}

/// One row of the translation list.
///
/// Serialized with a `type` tag (`group` or `pair`) so both shapes can share
/// one JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranslationEntry {
    Group(TranslationGroup),
    Pair(TranslationPair),
}

impl TranslationEntry {
    pub fn group(title: impl Into<String>) -> Self {
        Self::Group(TranslationGroup::empty(title))
    }

    pub fn pair(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Pair(TranslationPair::new(from, to))
    }

    /// Short label used in list rendering and log lines.
    pub fn label(&self) -> &str {
        match self {
            Self::Group(group) => group.title.as_str(),
            Self::Pair(pair) => pair.from.as_str(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Group(_) => "group",
            Self::Pair(_) => "pair",
        }
    }
}

/// Ordered list persisted under one store key.
pub type EntryList = Vec<TranslationEntry>;

/// Decodes a stored blob into an entry list.
///
/// An empty (or whitespace-only) blob decodes as an empty list.
pub fn decode_entries(blob: &str) -> Result<EntryList, serde_json::Error> {
    if blob.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(blob)
}

/// Encodes an entry list into the stored blob form.
pub fn encode_entries(entries: &[TranslationEntry]) -> Result<String, serde_json::Error> {
    serde_json::to_string(entries)
}

#[cfg(test)]
mod tests {
    use super::{decode_entries, encode_entries, TranslationEntry};

    #[test]
    fn blank_blob_decodes_as_empty_list() {
        assert!(decode_entries("").unwrap().is_empty());
        assert!(decode_entries("  \n").unwrap().is_empty());
    }

    #[test]
    fn encoded_group_carries_type_tag() {
        let blob = encode_entries(&[TranslationEntry::group("Verbs")]).unwrap();
        assert_eq!(blob, r#"[{"type":"group","title":"Verbs","translations":[]}]"#);
    }

    #[test]
    fn label_uses_title_or_source_phrase() {
        assert_eq!(TranslationEntry::group("Colors").label(), "Colors");
        assert_eq!(TranslationEntry::pair("red", "rojo").label(), "red");
    }
}
