//! Incremental synchronization.
//!
//! Walks every category directory, re-indexes the files whose content
//! fingerprint changed, then prunes records whose file is gone.

use crate::error::{FileError, SyncError};
use crate::walker::{is_walkable_file, walk_category};
use chrono::{DateTime, Utc};
use docmirror_core::{
    extract_title, fingerprint_bytes, fingerprint_file, is_indexable_path, Category, NewDocument,
    ReadError,
};
use docmirror_store::{DocumentStore, UpsertOutcome};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a run treats files whose fingerprint is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Skip unchanged files.
    #[default]
    Incremental,
    /// Rewrite every discovered file regardless of fingerprint.
    Full,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => write!(f, "incremental"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Options for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Directory containing the category subdirectories.
    pub root: PathBuf,

    /// Location of the sled store.
    pub store_path: PathBuf,

    pub mode: SyncMode,

    /// Follow symbolic links when walking category directories.
    pub follow_symlinks: bool,
}

impl SyncOptions {
    /// Incremental options with the store at its default location.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let store_path = Self::default_store_path(&root);
        Self {
            root,
            store_path,
            mode: SyncMode::default(),
            follow_symlinks: false,
        }
    }

    /// `<root>/.docmirror/store`
    pub fn default_store_path(root: &Path) -> PathBuf {
        root.join(".docmirror").join("store")
    }
}

/// Per-category counts for one run.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: Category,

    /// Files seen for the first time.
    pub indexed: usize,

    /// Known files rewritten because their content changed (or a full
    /// rebuild was requested).
    pub updated: usize,

    /// Known files skipped because their fingerprint matched.
    pub unchanged: usize,
}

impl CategoryReport {
    fn new(category: Category) -> Self {
        Self {
            category,
            indexed: 0,
            updated: 0,
            unchanged: 0,
        }
    }
}

/// Result of a sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub categories: Vec<CategoryReport>,

    /// Records deleted because their file no longer exists.
    pub pruned: usize,

    /// Records in the store once the run finished.
    pub total_records: usize,

    /// Files that were skipped because of an error, with the reason.
    pub errors: Vec<(String, String)>,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn indexed(&self) -> usize {
        self.categories.iter().map(|c| c.indexed).sum()
    }

    pub fn updated(&self) -> usize {
        self.categories.iter().map(|c| c.updated).sum()
    }

    pub fn unchanged(&self) -> usize {
        self.categories.iter().map(|c| c.unchanged).sum()
    }

    /// Whether the run wrote or deleted anything.
    pub fn has_changes(&self) -> bool {
        self.indexed() + self.updated() + self.pruned > 0
    }
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Unchanged,
    Inserted,
    Updated,
    NotIndexable,
}

/// Keeps a store in step with the files under a root.
///
/// Built per run with explicit paths; owns the store handle for as long
/// as it lives.
pub struct SyncEngine {
    root: PathBuf,
    store: DocumentStore,
    mode: SyncMode,
    follow_symlinks: bool,
}

impl SyncEngine {
    /// Validates the root and opens the store.
    ///
    /// Fails before anything is written if the root is unusable or the
    /// store can't be opened.
    pub fn open(options: SyncOptions) -> Result<Self, SyncError> {
        check_root(&options.root)?;

        if let Some(parent) = options.store_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let store =
            DocumentStore::open(&options.store_path).map_err(|source| SyncError::StoreOpen {
                path: options.store_path.clone(),
                source,
            })?;

        Ok(Self {
            root: options.root,
            store,
            mode: options.mode,
            follow_symlinks: options.follow_symlinks,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn set_mode(&mut self, mode: SyncMode) {
        self.mode = mode;
    }

    /// Runs one full pass: every category, then reconciliation and
    /// index maintenance.
    pub fn run(&self) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let mut report = SyncReport::default();

        info!("Starting {} sync of {}", self.mode, self.root.display());

        for category in Category::ALL {
            let stats = self.sync_category(category, &mut report.errors);
            if stats.indexed + stats.updated > 0 {
                info!(
                    "{}: {} indexed, {} updated",
                    category, stats.indexed, stats.updated
                );
            }
            report.categories.push(stats);
        }

        report.pruned = self.reconcile(&mut report.errors)?;
        if report.pruned > 0 {
            info!("Pruned {} deleted files", report.pruned);
        }

        if let Err(e) = self.store.optimize() {
            warn!("Index optimization failed: {}", e);
        }
        self.store.flush()?;

        report.total_records = self.store.len();
        let duration = start.elapsed();
        report.duration_ms = duration.as_millis() as u64;

        info!(
            "Synced {} indexed, {} updated, {} unchanged, {} pruned ({} records) in {:?}",
            report.indexed(),
            report.updated(),
            report.unchanged(),
            report.pruned,
            report.total_records,
            duration
        );

        Ok(report)
    }

    fn sync_category(
        &self,
        category: Category,
        errors: &mut Vec<(String, String)>,
    ) -> CategoryReport {
        let mut stats = CategoryReport::new(category);

        for path in walk_category(&self.root, category, self.follow_symlinks) {
            match self.sync_file(&path, category) {
                Ok(FileOutcome::Inserted) => stats.indexed += 1,
                Ok(FileOutcome::Updated) => stats.updated += 1,
                Ok(FileOutcome::Unchanged) => stats.unchanged += 1,
                Ok(FileOutcome::NotIndexable) => {}
                Err(e) => {
                    warn!("Failed to index {}: {}", path.display(), e);
                    errors.push((path.display().to_string(), e.to_string()));
                }
            }
        }

        stats
    }

    fn sync_file(&self, path: &Path, category: Category) -> Result<FileOutcome, FileError> {
        if !is_indexable_path(path) {
            return Ok(FileOutcome::NotIndexable);
        }

        let rel_path = self.relative_path(path)?;
        let current = fingerprint_file(path)?;
        let existing = self.store.fingerprint(&rel_path)?;

        if existing.as_ref() == Some(&current) && self.mode == SyncMode::Incremental {
            debug!("Unchanged: {}", rel_path);
            return Ok(FileOutcome::Unchanged);
        }

        let bytes = fs::read(path).map_err(|e| ReadError::io(path, e))?;
        // The record describes exactly the bytes decoded below, even if the
        // file moved on since it was fingerprinted.
        let fingerprint = fingerprint_bytes(&bytes);
        let content = String::from_utf8(bytes).map_err(|e| ReadError::decode(path, e))?;
        let title = extract_title(&content, path);
        let file_modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let doc = NewDocument {
            path: rel_path,
            category,
            title,
            content,
            fingerprint,
            file_modified,
        };

        match self.store.upsert(&doc)? {
            UpsertOutcome::Inserted(_) => {
                debug!("Indexed: {}", doc.path);
                Ok(FileOutcome::Inserted)
            }
            UpsertOutcome::Updated(_) => {
                debug!("Updated: {}", doc.path);
                Ok(FileOutcome::Updated)
            }
        }
    }

    /// Deletes every record whose path a walk would no longer yield: the
    /// file is gone, or it is now a directory, a dangling link, or sits
    /// under a link that isn't followed.
    fn reconcile(&self, errors: &mut Vec<(String, String)>) -> Result<usize, SyncError> {
        let mut pruned = 0;

        for (path, id) in self.store.paths()? {
            match is_walkable_file(&self.root, &path, self.follow_symlinks) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!("Cannot check {}, keeping it: {}", path, e);
                    continue;
                }
            }

            debug!("Removing deleted file {} ({})", path, id);
            match self.store.remove(&path) {
                Ok(true) => pruned += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to remove {}: {}", path, e);
                    errors.push((path, e.to_string()));
                }
            }
        }

        Ok(pruned)
    }

    /// Root-relative path with `/` separators.
    fn relative_path(&self, path: &Path) -> Result<String, FileError> {
        let rel = path
            .strip_prefix(&self.root)
            .map_err(|_| FileError::OutsideRoot)?;

        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or(FileError::NonUtf8Path)?),
                _ => return Err(FileError::OutsideRoot),
            }
        }
        Ok(parts.join("/"))
    }
}

fn check_root(root: &Path) -> Result<(), SyncError> {
    let invalid = |reason: String| SyncError::InvalidRoot {
        path: root.to_path_buf(),
        reason,
    };

    let meta = fs::metadata(root).map_err(|e| invalid(e.to_string()))?;
    if !meta.is_dir() {
        return Err(invalid("not a directory".into()));
    }
    fs::read_dir(root).map_err(|e| invalid(e.to_string()))?;
    Ok(())
}
