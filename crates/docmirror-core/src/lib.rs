//! Docmirror Core - document model and per-file analysis
//!
//! This crate holds the pieces of Docmirror that only ever look at a
//! single file: what a document record is, which files are worth
//! indexing, how a file's bytes are fingerprinted, and how a display
//! title is derived from its text.
//!
//! # Example
//!
//! ```no_run
//! use docmirror_core::{extract_title, fingerprint_file};
//! use std::path::Path;
//!
//! let path = Path::new("notes/setup_guide.md");
//! let fingerprint = fingerprint_file(path).unwrap();
//! let title = extract_title("# Setup\nSteps...", path);
//! println!("{} {}", title, fingerprint);
//! ```

pub mod document;
pub mod error;
pub mod formats;
pub mod hasher;
pub mod title;

pub use document::{Category, DocId, DocumentRecord, NewDocument};
pub use error::{ReadError, Result};
pub use formats::{is_indexable, is_indexable_path, indexable_extensions};
pub use hasher::{fingerprint_bytes, fingerprint_file, Fingerprint};
pub use title::extract_title;
