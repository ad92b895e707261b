use crate::shortcode::ShortCode;
use serde::{Deserialize, Serialize};

/// A stored URL record.
///
/// The serialized field names are the on-disk format of the file backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The short code the record resolves from.
    #[serde(rename = "short_url")]
    pub code: ShortCode,
    /// The original URL that was shortened.
    #[serde(rename = "url")]
    pub original_url: String,
    /// The owner who first submitted the URL.
    #[serde(rename = "user_id")]
    pub owner: String,
    /// Tombstone flag. Only ever flips from `false` to `true`.
    #[serde(default)]
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates an active record.
    pub fn new(code: ShortCode, original_url: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            code,
            original_url: original_url.into(),
            owner: owner.into(),
            deleted: false,
        }
    }
}

/// Result of adding a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The record was inserted under this code.
    Inserted(ShortCode),
    /// The URL was already stored; carries the code of the existing record.
    Duplicate(ShortCode),
}

impl AddOutcome {
    pub fn code(&self) -> &ShortCode {
        match self {
            AddOutcome::Inserted(code) | AddOutcome::Duplicate(code) => code,
        }
    }

    pub fn into_code(self) -> ShortCode {
        match self {
            AddOutcome::Inserted(code) | AddOutcome::Duplicate(code) => code,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, AddOutcome::Duplicate(_))
    }
}

/// A request to tombstone `code` on behalf of `owner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteRequest {
    pub code: ShortCode,
    pub owner: String,
}

impl DeleteRequest {
    pub fn new(code: ShortCode, owner: impl Into<String>) -> Self {
        Self {
            code,
            owner: owner.into(),
        }
    }
}

/// Per-request results of a batch delete, aligned with the request slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    tombstoned: Vec<bool>,
}

impl DeleteOutcome {
    pub fn new(tombstoned: Vec<bool>) -> Self {
        Self { tombstoned }
    }

    /// Number of records this call moved from active to deleted.
    pub fn mutated_count(&self) -> usize {
        self.tombstoned.iter().filter(|flag| **flag).count()
    }

    /// Whether the request at `index` tombstoned its record.
    pub fn is_tombstoned(&self, index: usize) -> bool {
        self.tombstoned.get(index).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.tombstoned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tombstoned.is_empty()
    }

    pub fn into_flags(self) -> Vec<bool> {
        self.tombstoned
    }
}

/// Aggregate counters over a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of stored records, tombstones included.
    pub urls: u64,
    /// Number of distinct owners.
    pub users: u64,
}
