//! Docmirror Store - durable documents and their search representation
//!
//! The document store is the source of truth for what is indexed. It
//! owns the derived search index outright: every insert, update and
//! delete of a record is mirrored into the index inside the same sled
//! transaction, so callers never issue a second write and the two can
//! never drift apart.
//!
//! # Example
//!
//! ```no_run
//! use docmirror_core::{fingerprint_bytes, Category, NewDocument};
//! use docmirror_store::DocumentStore;
//!
//! let store = DocumentStore::open(".docmirror/store").unwrap();
//! store
//!     .upsert(&NewDocument {
//!         path: "qa/deploy.md".into(),
//!         category: Category::Qa,
//!         title: "Deploy".into(),
//!         content: "How do we deploy?".into(),
//!         fingerprint: fingerprint_bytes(b"How do we deploy?"),
//!         file_modified: None,
//!     })
//!     .unwrap();
//! println!("{:?}", store.index().lookup("deploy").unwrap());
//! ```

mod consistency;
mod error;
mod search;
mod store;

pub use consistency::ConsistencyReport;
pub use error::StoreError;
pub use search::{tokenize, SearchEntry, SearchIndex};
pub use store::{DocumentStore, UpsertOutcome};
