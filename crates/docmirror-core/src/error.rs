//! Error types for reading source documents.
//!
//! These are file-level failures. A sync run treats every one of them
//! as "skip this file and keep going".

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Convenience type for functions that read a single document.
pub type Result<T> = std::result::Result<T, ReadError>;

/// Things that can go wrong when reading one document from disk.
#[derive(Error, Debug)]
pub enum ReadError {
    /// Couldn't open or read the file. Covers permission problems and
    /// files that vanished between discovery and read.
    #[error("failed to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid UTF-8 text.
    #[error("file '{path}' is not valid UTF-8: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl ReadError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a decode error with the path for context.
    pub fn decode(path: impl Into<PathBuf>, source: std::string::FromUtf8Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    /// The file this error is about.
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Decode { path, .. } => path.as_path(),
        }
    }
}
