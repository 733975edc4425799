//! Store/index consistency checks.
//!
//! Every record must have exactly one search entry with identical text,
//! every entry must belong to a record, and every term of an entry must
//! have its posting. A transactional store never violates this; the
//! check exists for `docmirror verify` and for tests.

use serde::Serialize;

/// Outcome of [`DocumentStore::verify`](crate::DocumentStore::verify).
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConsistencyReport {
    /// Number of document records examined.
    pub records: usize,

    /// Number of search entries examined.
    pub entries: usize,

    /// Paths of records with no search entry.
    pub missing_entries: Vec<String>,

    /// Ids of search entries with no record.
    pub orphan_entries: Vec<u64>,

    /// Paths whose entry text differs from the record.
    pub mismatched: Vec<String>,

    /// Paths whose head (id and fingerprint) is missing, disagrees with
    /// the record, or has no record.
    pub stale_heads: Vec<String>,

    /// Postings that point at an entry which does not exist.
    pub dangling_postings: usize,

    /// Entry terms that have no posting.
    pub missing_postings: usize,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_entries.is_empty()
            && self.orphan_entries.is_empty()
            && self.mismatched.is_empty()
            && self.stale_heads.is_empty()
            && self.dangling_postings == 0
            && self.missing_postings == 0
    }

    /// Total number of individual violations.
    pub fn violation_count(&self) -> usize {
        self.missing_entries.len()
            + self.orphan_entries.len()
            + self.mismatched.len()
            + self.stale_heads.len()
            + self.dangling_postings
            + self.missing_postings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_report_is_consistent() {
        let report = ConsistencyReport::default();
        assert!(report.is_consistent());
        assert_eq!(report.violation_count(), 0);
    }

    #[test]
    fn test_violations_are_counted() {
        let report = ConsistencyReport {
            missing_entries: vec!["qa/a.md".into()],
            orphan_entries: vec![7, 8],
            stale_heads: vec!["qa/b.md".into()],
            dangling_postings: 3,
            ..Default::default()
        };
        assert!(!report.is_consistent());
        assert_eq!(report.violation_count(), 7);
    }
}
