//! Indexable file formats.
//!
//! Only plain text documents end up in the index. Everything else found
//! under a category directory (images, archives, editor swap files) is
//! silently passed over.

use std::path::Path;

/// Checks if a file extension belongs to an indexable text format.
pub fn is_indexable(extension: &str) -> bool {
    matches!(
        extension.to_lowercase().as_str(),
        // Markdown
        "md" | "markdown"
        // Plain text
        | "txt"
    )
}

/// Checks a path's extension against the allow-list.
///
/// Files without an extension are never indexable.
pub fn is_indexable_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(is_indexable)
        .unwrap_or(false)
}

/// Lists all indexable file extensions.
pub fn indexable_extensions() -> &'static [&'static str] {
    &["md", "txt", "markdown"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        for ext in indexable_extensions() {
            assert!(is_indexable(ext));
        }
        assert!(!is_indexable("png"));
        assert!(!is_indexable("rs"));
    }

    #[test]
    fn test_extension_case_is_ignored() {
        assert!(is_indexable_path(Path::new("NOTES.MD")));
        assert!(is_indexable_path(Path::new("a/b/readme.Txt")));
    }

    #[test]
    fn test_paths_without_extension() {
        assert!(!is_indexable_path(Path::new("Makefile")));
        assert!(!is_indexable_path(Path::new("notes/.md.swp")));
        assert!(!is_indexable_path(Path::new("diagram.png")));
    }
}
