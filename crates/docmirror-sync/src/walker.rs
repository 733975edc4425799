//! Category directory walking.
//!
//! Yields every indexable regular file under one category directory,
//! including symlinks whose target is a regular file. Symlinked
//! directories are only descended into when `follow_symlinks` is set.
//! Nothing is remembered between walks; each sync starts from scratch.

use docmirror_core::{is_indexable_path, Category};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Lazy walk over one category's indexable files.
///
/// Entries come out in filesystem order. A missing category directory
/// produces an empty walk.
pub struct CategoryWalk {
    inner: Option<walkdir::IntoIter>,
}

impl CategoryWalk {
    /// Starts a walk of `root/<category>`.
    pub fn new(root: &Path, category: Category, follow_symlinks: bool) -> Self {
        let dir = root.join(category.as_str());
        if !dir.is_dir() {
            debug!("Category directory {} not present", dir.display());
            return Self { inner: None };
        }

        let inner = WalkDir::new(dir).follow_links(follow_symlinks).into_iter();
        Self { inner: Some(inner) }
    }
}

impl Iterator for CategoryWalk {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let inner = self.inner.as_mut()?;
        loop {
            let entry = match inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && resolves_to_file(entry.path()));
            if !is_file {
                continue;
            }

            if !is_indexable_path(entry.path()) {
                continue;
            }

            return Some(entry.into_path());
        }
    }
}

/// Walks a category directory under `root`.
pub fn walk_category(root: &Path, category: Category, follow_symlinks: bool) -> CategoryWalk {
    CategoryWalk::new(root, category, follow_symlinks)
}

fn resolves_to_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

fn absent_if_not_found(e: io::Error) -> io::Result<bool> {
    if e.kind() == io::ErrorKind::NotFound {
        Ok(false)
    } else {
        Err(e)
    }
}

/// Whether a walk of `root` would still yield the file at `rel_path`
/// (a `/`-separated path whose first component is the category).
///
/// Applies the same rules as [`CategoryWalk`]: every directory below the
/// category must be a real directory, or a symlink to one when
/// `follow_symlinks` is set, and the leaf must be a regular file or a
/// symlink to one. A missing component means "no". Other I/O errors are
/// returned so the caller can decide not to act on an unknown answer.
pub fn is_walkable_file(root: &Path, rel_path: &str, follow_symlinks: bool) -> io::Result<bool> {
    let mut parts: Vec<&str> = rel_path.split('/').collect();
    let Some(file_name) = parts.pop() else {
        return Ok(false);
    };
    if parts.is_empty() || file_name.is_empty() {
        return Ok(false);
    }

    let mut current = root.to_path_buf();
    for (depth, dir) in parts.iter().enumerate() {
        current.push(dir);
        let meta = match fs::symlink_metadata(&current) {
            Ok(meta) => meta,
            Err(e) => return absent_if_not_found(e),
        };

        if meta.file_type().is_symlink() {
            // The category directory itself may be a link; deeper links
            // are only walked when following is enabled.
            if depth > 0 && !follow_symlinks {
                return Ok(false);
            }
            match fs::metadata(&current) {
                Ok(target) if target.is_dir() => {}
                Ok(_) => return Ok(false),
                Err(e) => return absent_if_not_found(e),
            }
        } else if !meta.is_dir() {
            return Ok(false);
        }
    }

    current.push(file_name);
    match fs::metadata(&current) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) => absent_if_not_found(e),
    }
}
