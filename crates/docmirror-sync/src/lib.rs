//! Docmirror Sync - keeping the index in step with the filesystem
//!
//! This crate handles the file system side of things:
//! - Walking category directories to find indexable documents
//! - Deciding per file whether it is new, changed or unchanged
//! - Pruning records whose file has been deleted
//!
//! # Example
//!
//! ```no_run
//! use docmirror_sync::{SyncEngine, SyncOptions};
//!
//! let engine = SyncEngine::open(SyncOptions::new("./kb")).unwrap();
//! let report = engine.run().unwrap();
//! println!("{} indexed, {} pruned", report.indexed(), report.pruned);
//! ```

mod engine;
mod error;
mod walker;

pub use engine::{CategoryReport, SyncEngine, SyncMode, SyncOptions, SyncReport};
pub use error::{FileError, SyncError};
pub use walker::{is_walkable_file, walk_category, CategoryWalk};
