//! Content fingerprints.
//!
//! A fingerprint is the SHA-256 of a file's raw bytes, rendered as
//! lowercase hex. It is the only signal used to decide whether a file
//! changed since the last sync; mtimes are never consulted.

use crate::error::{ReadError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Files are streamed through a buffer of this size.
const CHUNK_SIZE: usize = 8 * 1024;

/// Content-addressed digest of a document's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    fn from_hasher(hasher: Sha256) -> Self {
        let digest = hasher.finalize();
        Self(format!("{:x}", digest))
    }

    /// The hex rendering of the digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprints bytes that are already in memory.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint::from_hasher(hasher)
}

/// Fingerprints a file on disk.
///
/// Memory use does not depend on the file size. Read errors are returned
/// as-is with the path attached.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path).map_err(|e| ReadError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReadError::io(path, e)),
        };
        hasher.update(&buf[..n]);
    }

    Ok(Fingerprint::from_hasher(hasher))
}
