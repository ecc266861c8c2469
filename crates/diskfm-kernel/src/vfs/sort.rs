//! Ordering of directory listings.
//!
//! Callers pass a key name and a signed direction flag (the shape query
//! strings arrive in); internally both become enums. Unknown key names fall
//! back to [`SortKey::Path`], a negative flag means descending.
//!
//! Directories have no size; for [`SortKey::Size`] they compare as size 0, so
//! ascending order puts them before every non-empty file.

use serde::Serialize;
use std::cmp::Ordering;
use strum::{Display, EnumString};

use super::types::EntryMetadata;

/// Field to order entries by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, EnumString, Display)]
pub enum SortKey {
    #[default]
    #[strum(serialize = "path")]
    #[serde(rename = "path")]
    Path,
    #[strum(serialize = "size")]
    #[serde(rename = "size")]
    Size,
    #[strum(serialize = "mimeType")]
    #[serde(rename = "mimeType")]
    MimeType,
}

impl SortKey {
    /// Parse a key name, falling back to `Path` for anything unrecognised.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Negative is descending; zero and positive are ascending.
    pub fn from_sign(sign: i64) -> Self {
        if sign < 0 {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }

    pub fn sign(&self) -> i64 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SortOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Build from the external `by`/`order` pair; both are optional.
    pub fn from_query(by: Option<&str>, order: Option<i64>) -> Self {
        Self {
            key: by.map(SortKey::from_name).unwrap_or_default(),
            direction: order.map(SortDirection::from_sign).unwrap_or_default(),
        }
    }

    /// Compare two entries under this order.
    pub fn compare(&self, a: &EntryMetadata, b: &EntryMetadata) -> Ordering {
        let ordering = match self.key {
            SortKey::Path => a.path().cmp(b.path()),
            SortKey::Size => a.size_bytes.unwrap_or(0).cmp(&b.size_bytes.unwrap_or(0)),
            SortKey::MimeType => a.mime_type.cmp(&b.mime_type),
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Stable sort: entries equal under the key keep their input order, in
/// either direction.
pub fn sort_entries(mut entries: Vec<EntryMetadata>, order: SortOrder) -> Vec<EntryMetadata> {
    entries.sort_by(|a, b| order.compare(a, b));
    entries
}
