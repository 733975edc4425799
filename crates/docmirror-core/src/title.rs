//! Title extraction.
//!
//! A cheap heuristic, not a markdown parser: the first `# ` heading in
//! the opening lines wins, otherwise the filename is prettified.

use std::path::Path;

/// Only this many lines are ever inspected for a heading.
const HEADING_SCAN_LINES: usize = 10;

const FALLBACK_TITLE: &str = "Untitled";

/// Derives a display title for a document.
///
/// Never fails and never returns an empty string. A heading that is
/// blank after trimming is skipped.
///
/// # Example
///
/// ```
/// use docmirror_core::extract_title;
/// use std::path::Path;
///
/// assert_eq!(extract_title("# Hello World\nbody", Path::new("x.md")), "Hello World");
/// assert_eq!(extract_title("", Path::new("my_notes-v2.md")), "My Notes V2");
/// ```
pub fn extract_title(content: &str, path: &Path) -> String {
    for line in content.split('\n').take(HEADING_SCAN_LINES) {
        if let Some(rest) = line.strip_prefix("# ") {
            let heading = rest.trim();
            if !heading.is_empty() {
                return heading.to_string();
            }
        }
    }

    title_from_filename(path)
}

fn title_from_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let spaced = stem.replace(['_', '-'], " ");
    let title = title_case(spaced.trim());

    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

/// Upper-cases a letter that follows a non-letter, lower-cases the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;

    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_wins() {
        let title = extract_title("# Hello World\nbody", Path::new("ignored.md"));
        assert_eq!(title, "Hello World");
    }

    #[test]
    fn test_heading_is_trimmed() {
        let title = extract_title("intro\n#   Spaced Out  \r\n", Path::new("x.md"));
        assert_eq!(title, "Spaced Out");
    }

    #[test]
    fn test_filename_fallback() {
        let title = extract_title("no heading here", Path::new("notes/my_notes-v2.md"));
        assert_eq!(title, "My Notes V2");
    }

    #[test]
    fn test_empty_content_uses_filename() {
        assert_eq!(extract_title("", Path::new("quick-ref.txt")), "Quick Ref");
    }

    #[test]
    fn test_only_first_ten_lines_are_scanned() {
        let mut content = "line\n".repeat(10);
        content.push_str("# Too Late\n");
        assert_eq!(extract_title(&content, Path::new("late_heading.md")), "Late Heading");

        let mut content = "line\n".repeat(9);
        content.push_str("# Just In Time\n");
        assert_eq!(extract_title(&content, Path::new("x.md")), "Just In Time");
    }

    #[test]
    fn test_deeper_headings_do_not_count() {
        let title = extract_title("## Section\n#NoSpace\n", Path::new("api_cheatsheet.md"));
        assert_eq!(title, "Api Cheatsheet");
    }

    #[test]
    fn test_blank_heading_is_skipped() {
        let title = extract_title("#   \n# Real\n", Path::new("x.md"));
        assert_eq!(title, "Real");
    }

    #[test]
    fn test_title_case_mixed() {
        assert_eq!(title_case("hELLO wORLD"), "Hello World");
        assert_eq!(title_case("v2x release"), "V2X Release");
    }

    #[test]
    fn test_never_empty() {
        assert_eq!(extract_title("", Path::new("___.md")), FALLBACK_TITLE);
        assert_eq!(extract_title("", Path::new("")), FALLBACK_TITLE);
    }
}
