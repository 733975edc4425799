//! Derived search representation.
//!
//! Each document record has exactly one `SearchEntry` holding its
//! title, content and category, plus one posting per distinct term in
//! that text. Entries and postings are only ever written from inside a
//! `DocumentStore` transaction; this module exposes the staging helpers
//! for that and a read-only API for everyone else.

use crate::error::StoreError;
use docmirror_core::{Category, DocId, DocumentRecord};
use serde::{Deserialize, Serialize};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::Tree;
use std::collections::BTreeSet;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

/// Separates the term from the id in a posting key. Never part of a word.
const TERM_SEPARATOR: u8 = 0;

/// The searchable projection of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub path: String,
    pub title: String,
    pub content: String,
    pub category: Category,
}

impl SearchEntry {
    pub fn from_record(record: &DocumentRecord) -> Self {
        Self {
            path: record.path.clone(),
            title: record.title.clone(),
            content: record.content.clone(),
            category: record.category,
        }
    }

    /// Distinct normalised terms across title, content and category.
    pub fn terms(&self) -> BTreeSet<String> {
        tokenize(&self.title)
            .chain(tokenize(&self.content))
            .chain(tokenize(self.category.as_str()))
            .collect()
    }

    /// Whether this entry still mirrors the given record.
    pub fn matches(&self, record: &DocumentRecord) -> bool {
        self.path == record.path
            && self.title == record.title
            && self.content == record.content
            && self.category == record.category
    }
}

/// Splits text into lower-cased Unicode words.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.unicode_words().map(str::to_lowercase)
}

fn term_prefix(term: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(term.len() + 1);
    key.extend_from_slice(term.as_bytes());
    key.push(TERM_SEPARATOR);
    key
}

pub(crate) fn posting_key(term: &str, id: DocId) -> Vec<u8> {
    let mut key = term_prefix(term);
    key.extend_from_slice(&id.to_key());
    key
}

/// Pulls the id back out of a posting key.
pub(crate) fn posting_id(key: &[u8]) -> Option<DocId> {
    if key.len() < 9 {
        return None;
    }
    DocId::from_key(&key[key.len() - 8..])
}

fn abort<E: Into<StoreError>>(e: E) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(e.into())
}

/// Stages a new entry and its postings.
pub(crate) fn stage_insert(
    entries: &TransactionalTree,
    postings: &TransactionalTree,
    id: DocId,
    entry: &SearchEntry,
) -> ConflictableTransactionResult<(), StoreError> {
    let bytes = bincode::serialize(entry).map_err(abort)?;
    entries.insert(&id.to_key()[..], bytes)?;
    for term in entry.terms() {
        postings.insert(posting_key(&term, id), Vec::<u8>::new())?;
    }
    Ok(())
}

/// Stages removal of an entry and every posting derived from it.
///
/// Returns false if there was no entry for `id`.
pub(crate) fn stage_remove(
    entries: &TransactionalTree,
    postings: &TransactionalTree,
    id: DocId,
) -> ConflictableTransactionResult<bool, StoreError> {
    let Some(old) = entries.remove(&id.to_key()[..])? else {
        return Ok(false);
    };
    let old: SearchEntry = bincode::deserialize(&old).map_err(abort)?;
    for term in old.terms() {
        postings.remove(posting_key(&term, id))?;
    }
    Ok(true)
}

/// Stages a full replacement: the old entry and postings go, the new
/// ones arrive, all inside the caller's transaction.
pub(crate) fn stage_replace(
    entries: &TransactionalTree,
    postings: &TransactionalTree,
    id: DocId,
    entry: &SearchEntry,
) -> ConflictableTransactionResult<(), StoreError> {
    stage_remove(entries, postings, id)?;
    stage_insert(entries, postings, id, entry)
}

/// Read-only handle on the derived representation.
#[derive(Clone)]
pub struct SearchIndex {
    pub(crate) entries: Tree,
    pub(crate) postings: Tree,
}

impl SearchIndex {
    pub(crate) fn new(entries: Tree, postings: Tree) -> Self {
        Self { entries, postings }
    }

    /// Number of searchable entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetches the entry for a document id.
    pub fn entry(&self, id: DocId) -> Result<Option<SearchEntry>, StoreError> {
        match self.entries.get(id.to_key())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Ids of every entry containing `term` as a whole word.
    ///
    /// The term is normalised the same way document text is.
    pub fn lookup(&self, term: &str) -> Result<Vec<DocId>, StoreError> {
        let Some(term) = tokenize(term).next() else {
            return Ok(Vec::new());
        };

        let mut ids = Vec::new();
        for item in self.postings.scan_prefix(term_prefix(&term)) {
            let (key, _) = item?;
            match posting_id(&key) {
                Some(id) => ids.push(id),
                None => {
                    return Err(StoreError::Corrupted(format!(
                        "malformed posting key for term '{}'",
                        term
                    )))
                }
            }
        }
        Ok(ids)
    }

    /// Ids of every entry whose title or content contains `needle`,
    /// ignoring case. A full scan.
    pub fn contains(&self, needle: &str) -> Result<Vec<DocId>, StoreError> {
        let needle = needle.to_lowercase();
        let mut ids = Vec::new();
        for item in self.entries.iter() {
            let (key, value) = item?;
            let entry: SearchEntry = bincode::deserialize(&value)?;
            if entry.title.to_lowercase().contains(&needle)
                || entry.content.to_lowercase().contains(&needle)
            {
                let id = DocId::from_key(&key)
                    .ok_or_else(|| StoreError::Corrupted("malformed entry key".into()))?;
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Drops postings whose entry no longer exists.
    ///
    /// Returns the number of postings reclaimed.
    pub(crate) fn reclaim_postings(&self) -> Result<usize, StoreError> {
        let mut reclaimed = 0;
        for item in self.postings.iter() {
            let (key, _) = item?;
            let dangling = match posting_id(&key) {
                Some(id) => !self.entries.contains_key(id.to_key())?,
                None => true,
            };
            if dangling {
                self.postings.remove(&key)?;
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            debug!("Reclaimed {} dangling postings", reclaimed);
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_normalises_case() {
        let terms: Vec<String> = tokenize("Hello, World! hello").collect();
        assert_eq!(terms, vec!["hello", "world", "hello"]);
    }

    #[test]
    fn test_terms_include_category() {
        let entry = SearchEntry {
            path: "qa/faq.md".into(),
            title: "FAQ".into(),
            content: "Why sled? Because.".into(),
            category: Category::DebugHistory,
        };
        let terms = entry.terms();
        assert!(terms.contains("faq"));
        assert!(terms.contains("sled"));
        assert!(terms.contains("debug_history"));
    }

    #[test]
    fn test_posting_key_round_trip() {
        let key = posting_key("sled", DocId::new(42));
        assert!(key.starts_with(&term_prefix("sled")));
        assert_eq!(posting_id(&key), Some(DocId::new(42)));
        assert_eq!(posting_id(b"x"), None);
    }

    #[test]
    fn test_prefix_does_not_match_longer_terms() {
        let key = posting_key("sledge", DocId::new(1));
        assert!(!key.starts_with(&term_prefix("sled")));
    }
}
