//! Errors that abort a whole sync run.
//!
//! Per-file problems never show up here; they are collected in the
//! run report instead.

use docmirror_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The root to index doesn't exist, isn't a directory, or can't be listed.
    #[error("cannot index '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// The store couldn't be opened or created at the given location.
    #[error("cannot open store at '{path}': {source}")]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// The store failed outside any single file's write.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure confined to one file. The file is skipped and the run
/// carries on.
#[derive(Error, Debug)]
pub enum FileError {
    #[error(transparent)]
    Read(#[from] docmirror_core::ReadError),

    #[error("path is not valid UTF-8")]
    NonUtf8Path,

    #[error("path is outside the indexed root")]
    OutsideRoot,

    #[error("store write failed: {0}")]
    Store(#[from] StoreError),
}
