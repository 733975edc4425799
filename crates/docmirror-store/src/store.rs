use crate::consistency::ConsistencyReport;
use crate::error::StoreError;
use crate::search::{self, SearchEntry, SearchIndex};
use chrono::Utc;
use docmirror_core::{Category, DocId, DocumentRecord, Fingerprint, NewDocument};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::{Db, Transactional, Tree};
use std::collections::{BTreeMap, HashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const DOCS_TREE: &str = "docs";
const HEADS_TREE: &str = "doc_heads";
const ENTRIES_TREE: &str = "search_entries";
const POSTINGS_TREE: &str = "search_postings";
const META_TREE: &str = "meta";

const VERSION_KEY: &[u8] = b"format_version";
const LAST_OPTIMIZED_KEY: &[u8] = b"last_optimized";

/// On-disk layout version. Bumped whenever a tree's encoding changes.
const FORMAT_VERSION: u32 = 2;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(DocId),
    Updated(DocId),
}

impl UpsertOutcome {
    pub fn id(&self) -> DocId {
        match self {
            Self::Inserted(id) | Self::Updated(id) => *id,
        }
    }
}

/// The part of a record a sync pass reads for every file, kept apart
/// from the content so change detection never decodes document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RecordHead {
    id: DocId,
    fingerprint: Fingerprint,
}

impl RecordHead {
    fn of(record: &DocumentRecord) -> Self {
        Self {
            id: record.id,
            fingerprint: record.fingerprint.clone(),
        }
    }
}

/// Durable path → record storage.
///
/// Every mutation commits the record, its head and its search entry in
/// one sled transaction across the `docs`, `doc_heads`, `search_entries`
/// and `search_postings` trees, so no reader can see one without the
/// others.
pub struct DocumentStore {
    db: Db,
    docs: Tree,
    heads: Tree,
    meta: Tree,
    index: SearchIndex,
}

fn decode<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
) -> ConflictableTransactionResult<T, StoreError> {
    bincode::deserialize(bytes)
        .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))
}

impl DocumentStore {
    /// Opens or creates a document store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        let docs = db.open_tree(DOCS_TREE)?;
        let heads = db.open_tree(HEADS_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        let index = SearchIndex::new(db.open_tree(ENTRIES_TREE)?, db.open_tree(POSTINGS_TREE)?);

        match meta.get(VERSION_KEY)? {
            Some(bytes) => {
                let found: u32 = bincode::deserialize(&bytes)?;
                if found != FORMAT_VERSION {
                    return Err(StoreError::Version {
                        found,
                        expected: FORMAT_VERSION,
                    });
                }
            }
            None => {
                meta.insert(VERSION_KEY, bincode::serialize(&FORMAT_VERSION)?)?;
            }
        }

        debug!(
            "Opened store at {} ({} records)",
            path.as_ref().display(),
            docs.len()
        );

        Ok(Self {
            db,
            docs,
            heads,
            meta,
            index,
        })
    }

    /// Read-only access to the derived search representation.
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Stored fingerprint for a path, if the path is indexed.
    pub fn fingerprint(&self, path: &str) -> Result<Option<Fingerprint>, StoreError> {
        match self.heads.get(path.as_bytes())? {
            Some(bytes) => {
                let head: RecordHead = bincode::deserialize(&bytes)?;
                Ok(Some(head.fingerprint))
            }
            None => Ok(None),
        }
    }

    /// Fetches a full record by path.
    pub fn get(&self, path: &str) -> Result<Option<DocumentRecord>, StoreError> {
        match self.docs.get(path.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Inserts a new record or fully replaces an existing one.
    ///
    /// An existing record keeps its id and category; content, title,
    /// fingerprint and timestamps are replaced. `indexed_at` is set here.
    /// The search entry is replaced in the same transaction.
    pub fn upsert(&self, doc: &NewDocument) -> Result<UpsertOutcome, StoreError> {
        // Unused when the path already exists.
        let fresh_id = DocId::new(self.db.generate_id()?);
        let indexed_at = Utc::now();
        let key = doc.path.as_bytes();

        let trees = (
            &self.docs,
            &self.heads,
            &self.index.entries,
            &self.index.postings,
        );
        let outcome = trees.transaction(
            |(docs, heads, entries, postings)| -> ConflictableTransactionResult<UpsertOutcome, StoreError> {
                let existing: Option<DocumentRecord> = match docs.get(key)? {
                    Some(bytes) => Some(decode(&bytes)?),
                    None => None,
                };

                let (id, category) = match &existing {
                    Some(old) => (old.id, old.category),
                    None => (fresh_id, doc.category),
                };

                let record = DocumentRecord {
                    id,
                    path: doc.path.clone(),
                    category,
                    title: doc.title.clone(),
                    content: doc.content.clone(),
                    fingerprint: doc.fingerprint.clone(),
                    indexed_at,
                    file_modified: doc.file_modified,
                };
                let bytes = bincode::serialize(&record)
                    .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                docs.insert(key, bytes)?;
                let head = bincode::serialize(&RecordHead::of(&record))
                    .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                heads.insert(key, head)?;

                let entry = SearchEntry::from_record(&record);
                if existing.is_some() {
                    search::stage_replace(entries, postings, id, &entry)?;
                    Ok(UpsertOutcome::Updated(id))
                } else {
                    search::stage_insert(entries, postings, id, &entry)?;
                    Ok(UpsertOutcome::Inserted(id))
                }
            },
        )?;

        debug!("Upserted {} ({:?})", doc.path, outcome);
        Ok(outcome)
    }

    /// Removes a record and its search entry.
    ///
    /// Returns false if the path was not indexed.
    pub fn remove(&self, path: &str) -> Result<bool, StoreError> {
        let key = path.as_bytes();

        let trees = (
            &self.docs,
            &self.heads,
            &self.index.entries,
            &self.index.postings,
        );
        let removed = trees.transaction(
            |(docs, heads, entries, postings)| -> ConflictableTransactionResult<bool, StoreError> {
                heads.remove(key)?;
                let Some(bytes) = docs.remove(key)? else {
                    return Ok(false);
                };
                let record: DocumentRecord = decode(&bytes)?;
                search::stage_remove(entries, postings, record.id)?;
                Ok(true)
            },
        )?;

        if removed {
            debug!("Removed {}", path);
        }
        Ok(removed)
    }

    /// Every indexed path with its record id, in key order. Reads heads
    /// only.
    pub fn paths(&self) -> Result<Vec<(String, DocId)>, StoreError> {
        let mut paths = Vec::with_capacity(self.heads.len());
        for item in self.heads.iter() {
            let (key, value) = item?;
            let path = String::from_utf8(key.to_vec())
                .map_err(|_| StoreError::Corrupted("non-UTF-8 path key".into()))?;
            let head: RecordHead = bincode::deserialize(&value)?;
            paths.push((path, head.id));
        }
        Ok(paths)
    }

    /// Every record, in path order.
    pub fn records(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut records = Vec::with_capacity(self.docs.len());
        for item in self.docs.iter() {
            let (_key, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Record count per category. Categories with no records are absent.
    pub fn category_counts(&self) -> Result<BTreeMap<Category, usize>, StoreError> {
        let mut counts = BTreeMap::new();
        for record in self.records()? {
            *counts.entry(record.category).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Compacts the search representation after a sync pass.
    ///
    /// Maintenance only: reclaims postings that no longer point at an
    /// entry, stamps the optimisation time and flushes to disk.
    pub fn optimize(&self) -> Result<usize, StoreError> {
        let reclaimed = self.index.reclaim_postings()?;
        self.meta
            .insert(LAST_OPTIMIZED_KEY, Utc::now().to_rfc3339().as_bytes())?;
        self.db.flush()?;
        info!("Optimized search index ({} postings reclaimed)", reclaimed);
        Ok(reclaimed)
    }

    /// When `optimize` last ran, as RFC 3339.
    pub fn last_optimized(&self) -> Result<Option<String>, StoreError> {
        match self.meta.get(LAST_OPTIMIZED_KEY)? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    /// Flushes all pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Checks that records and search entries mirror each other.
    pub fn verify(&self) -> Result<ConsistencyReport, StoreError> {
        let mut report = ConsistencyReport::default();
        let mut record_ids = HashSet::new();

        for record in self.records()? {
            report.records += 1;
            record_ids.insert(record.id);

            let head = match self.heads.get(record.path.as_bytes())? {
                Some(bytes) => Some(bincode::deserialize::<RecordHead>(&bytes)?),
                None => None,
            };
            if head.as_ref() != Some(&RecordHead::of(&record)) {
                report.stale_heads.push(record.path.clone());
            }

            match self.index.entry(record.id)? {
                Some(entry) if entry.matches(&record) => {}
                Some(_) => report.mismatched.push(record.path),
                None => report.missing_entries.push(record.path),
            }
        }

        for item in self.heads.iter() {
            let (key, _) = item?;
            if !self.docs.contains_key(&key)? {
                report
                    .stale_heads
                    .push(String::from_utf8_lossy(&key).into_owned());
            }
        }

        for item in self.index.entries.iter() {
            let (key, value) = item?;
            report.entries += 1;
            let id = DocId::from_key(&key)
                .ok_or_else(|| StoreError::Corrupted("malformed entry key".into()))?;
            if !record_ids.contains(&id) {
                report.orphan_entries.push(id.0);
            }

            let entry: SearchEntry = bincode::deserialize(&value)?;
            for term in entry.terms() {
                if !self
                    .index
                    .postings
                    .contains_key(search::posting_key(&term, id))?
                {
                    report.missing_postings += 1;
                }
            }
        }

        for item in self.index.postings.iter() {
            let (key, _) = item?;
            match search::posting_id(&key) {
                Some(id) if self.index.entries.contains_key(id.to_key())? => {}
                _ => report.dangling_postings += 1,
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmirror_core::fingerprint_bytes;
    use tempfile::tempdir;

    fn doc(path: &str, category: Category, content: &str) -> NewDocument {
        NewDocument {
            path: path.to_string(),
            category,
            title: format!("Title of {}", path),
            content: content.to_string(),
            fingerprint: fingerprint_bytes(content.as_bytes()),
            file_modified: None,
        }
    }

    #[test]
    fn test_insert_then_update() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let first = store
            .upsert(&doc("qa/a.md", Category::Qa, "alpha beta"))
            .unwrap();
        assert!(matches!(first, UpsertOutcome::Inserted(_)));

        let second = store
            .upsert(&doc("qa/a.md", Category::Qa, "gamma"))
            .unwrap();
        assert_eq!(second, UpsertOutcome::Updated(first.id()));

        assert_eq!(store.len(), 1);
        let record = store.get("qa/a.md").unwrap().unwrap();
        assert_eq!(record.content, "gamma");
        assert_eq!(record.fingerprint, fingerprint_bytes(b"gamma"));
    }

    #[test]
    fn test_update_keeps_category() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        store
            .upsert(&doc("patterns/p.md", Category::Patterns, "one"))
            .unwrap();
        store
            .upsert(&doc("patterns/p.md", Category::Delta, "two"))
            .unwrap();

        let record = store.get("patterns/p.md").unwrap().unwrap();
        assert_eq!(record.category, Category::Patterns);
    }

    #[test]
    fn test_update_replaces_search_entry() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let id = store
            .upsert(&doc("qa/a.md", Category::Qa, "alpha beta"))
            .unwrap()
            .id();
        assert_eq!(store.index().lookup("alpha").unwrap(), vec![id]);

        store
            .upsert(&doc("qa/a.md", Category::Qa, "gamma"))
            .unwrap();
        assert!(store.index().lookup("alpha").unwrap().is_empty());
        assert_eq!(store.index().lookup("GAMMA").unwrap(), vec![id]);

        let entry = store.index().entry(id).unwrap().unwrap();
        assert_eq!(entry.content, "gamma");
        assert!(store.verify().unwrap().is_consistent());
    }

    #[test]
    fn test_remove_drops_entry_and_postings() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let id = store
            .upsert(&doc("delta/log.md", Category::Delta, "release notes"))
            .unwrap()
            .id();
        assert!(store.remove("delta/log.md").unwrap());
        assert!(!store.remove("delta/log.md").unwrap());

        assert!(store.is_empty());
        assert!(store.index().is_empty());
        assert!(store.index().entry(id).unwrap().is_none());
        assert!(store.index().lookup("release").unwrap().is_empty());
        assert_eq!(store.index.postings.len(), 0);
    }

    #[test]
    fn test_paths_and_counts() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        store.upsert(&doc("qa/b.md", Category::Qa, "b")).unwrap();
        store.upsert(&doc("qa/a.md", Category::Qa, "a")).unwrap();
        store
            .upsert(&doc("anchors/c.md", Category::Anchors, "c"))
            .unwrap();

        let paths: Vec<String> = store.paths().unwrap().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["anchors/c.md", "qa/a.md", "qa/b.md"]);

        let counts = store.category_counts().unwrap();
        assert_eq!(counts.get(&Category::Qa), Some(&2));
        assert_eq!(counts.get(&Category::Anchors), Some(&1));
        assert_eq!(counts.get(&Category::Delta), None);
    }

    #[test]
    fn test_contains_is_substring_and_case_insensitive() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let id = store
            .upsert(&doc("qa/a.md", Category::Qa, "Connection pooling"))
            .unwrap()
            .id();
        store.upsert(&doc("qa/b.md", Category::Qa, "other")).unwrap();

        assert_eq!(store.index().contains("POOL").unwrap(), vec![id]);
    }

    #[test]
    fn test_reopen_preserves_records() {
        let dir = tempdir().unwrap();
        {
            let store = DocumentStore::open(dir.path()).unwrap();
            store.upsert(&doc("qa/a.md", Category::Qa, "kept")).unwrap();
            store.flush().unwrap();
        }

        let store = DocumentStore::open(dir.path()).unwrap();
        assert_eq!(
            store.fingerprint("qa/a.md").unwrap(),
            Some(fingerprint_bytes(b"kept"))
        );
        assert_eq!(store.fingerprint("qa/missing.md").unwrap(), None);
    }

    #[test]
    fn test_verify_detects_orphans_both_ways() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let id = store
            .upsert(&doc("qa/a.md", Category::Qa, "text"))
            .unwrap()
            .id();
        assert!(store.verify().unwrap().is_consistent());

        // Record without entry.
        store.index.entries.remove(id.to_key()).unwrap();
        let report = store.verify().unwrap();
        assert_eq!(report.missing_entries, vec!["qa/a.md".to_string()]);
        assert!(report.dangling_postings > 0);

        // Entry without record.
        let stray = SearchEntry {
            path: "qa/ghost.md".into(),
            title: "Ghost".into(),
            content: "boo".into(),
            category: Category::Qa,
        };
        store
            .index
            .entries
            .insert(DocId::new(9999).to_key(), bincode::serialize(&stray).unwrap())
            .unwrap();
        let report = store.verify().unwrap();
        assert_eq!(report.orphan_entries, vec![9999]);
        assert!(report.missing_postings > 0);
        assert!(!report.is_consistent());
    }

    #[test]
    fn test_optimize_reclaims_dangling_postings() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let id = store
            .upsert(&doc("qa/a.md", Category::Qa, "one two"))
            .unwrap()
            .id();
        store.upsert(&doc("qa/b.md", Category::Qa, "three")).unwrap();
        assert_eq!(store.optimize().unwrap(), 0);

        let terms = store.index().entry(id).unwrap().unwrap().terms().len();
        store.index.entries.remove(id.to_key()).unwrap();
        assert_eq!(store.optimize().unwrap(), terms);
        assert!(store.last_optimized().unwrap().is_some());
        assert!(store.index().lookup("three").unwrap().len() == 1);
    }

    #[test]
    fn test_heads_follow_upsert_and_remove() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let id = store
            .upsert(&doc("qa/a.md", Category::Qa, "first"))
            .unwrap()
            .id();
        store.upsert(&doc("qa/a.md", Category::Qa, "second")).unwrap();
        assert_eq!(store.heads.len(), 1);
        assert_eq!(store.paths().unwrap(), vec![("qa/a.md".to_string(), id)]);

        // Change detection and path listing never touch the full record.
        store.docs.insert("qa/a.md", vec![0xffu8; 3]).unwrap();
        assert_eq!(
            store.fingerprint("qa/a.md").unwrap(),
            Some(fingerprint_bytes(b"second"))
        );
        assert_eq!(store.paths().unwrap().len(), 1);
        assert!(store.get("qa/a.md").is_err());

        store.docs.remove("qa/a.md").unwrap();
        store.upsert(&doc("qa/b.md", Category::Qa, "other")).unwrap();
        assert!(!store.remove("qa/a.md").unwrap());
        assert!(store.remove("qa/b.md").unwrap());
        assert!(store.heads.is_empty());
        assert_eq!(store.fingerprint("qa/b.md").unwrap(), None);
    }

    #[test]
    fn test_verify_detects_stale_heads() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let id = store.upsert(&doc("qa/a.md", Category::Qa, "text")).unwrap().id();
        let stale = RecordHead {
            id,
            fingerprint: fingerprint_bytes(b"older text"),
        };
        store
            .heads
            .insert("qa/a.md", bincode::serialize(&stale).unwrap())
            .unwrap();
        store
            .heads
            .insert("qa/ghost.md", bincode::serialize(&stale).unwrap())
            .unwrap();

        let report = store.verify().unwrap();
        assert_eq!(
            report.stale_heads,
            vec!["qa/a.md".to_string(), "qa/ghost.md".to_string()]
        );
        assert!(!report.is_consistent());
    }

    #[test]
    fn test_rejects_unknown_format_version() {
        let dir = tempdir().unwrap();
        {
            let store = DocumentStore::open(dir.path()).unwrap();
            store
                .meta
                .insert(VERSION_KEY, bincode::serialize(&99u32).unwrap())
                .unwrap();
            store.flush().unwrap();
        }

        let err = DocumentStore::open(dir.path()).err().unwrap();
        assert!(matches!(err, StoreError::Version { found: 99, .. }));
    }
}
