//! Document representation.
//!
//! A DocumentRecord is one indexed file: where it lives, which category
//! it was found under, its text at the last sync, and the fingerprint
//! that text was read with.

use crate::hasher::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of category directories under an indexed root.
///
/// Categories are a partition key and a traversal root, nothing more.
/// The declaration order is the order a sync walks them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Metadata,
    CodeIndex,
    DebugHistory,
    Patterns,
    Qa,
    Cheatsheets,
    Delta,
    Anchors,
}

impl Category {
    /// Every category, in processing order.
    pub const ALL: [Category; 8] = [
        Self::Metadata,
        Self::CodeIndex,
        Self::DebugHistory,
        Self::Patterns,
        Self::Qa,
        Self::Cheatsheets,
        Self::Delta,
        Self::Anchors,
    ];

    /// The label, which is also the subdirectory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::CodeIndex => "code_index",
            Self::DebugHistory => "debug_history",
            Self::Patterns => "patterns",
            Self::Qa => "qa",
            Self::Cheatsheets => "cheatsheets",
            Self::Delta => "delta",
            Self::Anchors => "anchors",
        }
    }

    /// Short human description of what lives in the category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Metadata => "Component analysis and system docs",
            Self::CodeIndex => "Code relationships and mappings",
            Self::DebugHistory => "Debug sessions and fixes",
            Self::Patterns => "Implementation patterns",
            Self::Qa => "Questions and answers",
            Self::Cheatsheets => "Quick references",
            Self::Delta => "Change logs and updates",
            Self::Anchors => "Important code locations",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Store-assigned identifier shared by a record and its search entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl DocId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Big-endian key bytes, so ids sort numerically in the store.
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 8] = bytes.try_into().ok()?;
        Some(Self(u64::from_be_bytes(arr)))
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A document as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocId,

    /// Path relative to the indexed root, with `/` separators. Natural key.
    pub path: String,

    /// Category the file was discovered under. Fixed for the record's life.
    pub category: Category,

    pub title: String,

    /// Full text at the last sync.
    pub content: String,

    /// Fingerprint of the bytes `content` was decoded from.
    pub fingerprint: Fingerprint,

    /// When the store last wrote this record.
    pub indexed_at: DateTime<Utc>,

    /// Filesystem mtime captured at read time. Informational only.
    pub file_modified: Option<DateTime<Utc>>,
}

/// Everything the caller supplies for an upsert. The store fills in the
/// id and `indexed_at`.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub path: String,
    pub category: Category,
    pub title: String,
    pub content: String,
    pub fingerprint: Fingerprint,
    pub file_modified: Option<DateTime<Utc>>,
}
