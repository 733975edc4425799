//! CLI command implementations.

use colored::Colorize;
use docmirror_core::Category;
use docmirror_store::DocumentStore;
use docmirror_sync::{SyncEngine, SyncMode, SyncOptions, SyncReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn store_path(root: &Path, db: Option<PathBuf>) -> PathBuf {
    db.unwrap_or_else(|| SyncOptions::default_store_path(root))
}

/// Sync the index with the files under `root`.
pub fn sync(root: &Path, db: Option<PathBuf>, full: bool, follow_symlinks: bool) -> Result<()> {
    let options = SyncOptions {
        root: root.to_path_buf(),
        store_path: store_path(root, db),
        mode: if full {
            SyncMode::Full
        } else {
            SyncMode::Incremental
        },
        follow_symlinks,
    };

    println!("{} {}", "Syncing".cyan(), root.display());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("Scanning categories ({} mode)...", options.mode));

    let engine = SyncEngine::open(options)?;
    let report = engine.run();
    spinner.finish_and_clear();

    print_report(&report?);
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("{}", "-".repeat(50));
    for stats in &report.categories {
        if stats.indexed + stats.updated == 0 {
            continue;
        }
        println!(
            "  {:15} : {} indexed, {} updated",
            stats.category.to_string(),
            stats.indexed.to_string().cyan(),
            stats.updated.to_string().cyan()
        );
    }

    if report.pruned > 0 {
        println!("  Cleaned up {} deleted files", report.pruned.to_string().cyan());
    }
    println!("{}", "-".repeat(50));

    println!(
        "{} {} documents in index ({} indexed, {} updated, {} unchanged) in {}ms",
        "✓".green(),
        report.total_records.to_string().cyan(),
        report.indexed(),
        report.updated(),
        report.unchanged().to_string().dimmed(),
        report.duration_ms
    );

    if !report.errors.is_empty() {
        println!("\n{} files skipped:", "⚠".yellow());
        for (file, error) in report.errors.iter().take(5) {
            println!("  {} - {}", file.red(), error);
        }
        if report.errors.len() > 5 {
            println!("  ... and {} more", report.errors.len() - 5);
        }
    }
}

fn open_existing(root: &Path, db: Option<PathBuf>) -> Result<Option<DocumentStore>> {
    let path = store_path(root, db);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(DocumentStore::open(&path)?))
}

/// Show record counts per category.
pub fn status(root: &Path, db: Option<PathBuf>, json: bool) -> Result<()> {
    let Some(store) = open_existing(root, db)? else {
        println!(
            "{} Not indexed yet. Run {} first",
            "⚠".yellow(),
            "docmirror sync".cyan()
        );
        return Ok(());
    };

    let counts = store.category_counts()?;
    let last_optimized = store.last_optimized()?;

    if json {
        let categories: serde_json::Map<String, serde_json::Value> = Category::ALL
            .iter()
            .map(|c| {
                let count = counts.get(c).copied().unwrap_or(0);
                (c.to_string(), serde_json::json!(count))
            })
            .collect();
        let status = serde_json::json!({
            "total": store.len(),
            "searchEntries": store.index().len(),
            "categories": categories,
            "lastOptimized": last_optimized,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Index status".cyan());
    for category in Category::ALL {
        let count = counts.get(&category).copied().unwrap_or(0);
        println!(
            "  {:15} : {:>5}  {}",
            category.to_string(),
            count,
            category.description().dimmed()
        );
    }
    println!(
        "{} {} documents, {} search entries",
        "✓".green(),
        store.len().to_string().cyan(),
        store.index().len()
    );
    if let Some(when) = last_optimized {
        println!("  Last optimized {}", when.dimmed());
    }

    Ok(())
}

/// Check the store/index consistency invariant.
pub fn verify(root: &Path, db: Option<PathBuf>) -> Result<()> {
    let Some(store) = open_existing(root, db)? else {
        return Err("no store found; run `docmirror sync` first".into());
    };

    let report = store.verify()?;
    if report.is_consistent() {
        println!(
            "{} {} records and {} search entries agree",
            "✓".green(),
            report.records,
            report.entries
        );
        return Ok(());
    }

    println!("{} Index is inconsistent:", "✗".red());
    for path in report.missing_entries.iter().take(5) {
        println!("  {} has no search entry", path.red());
    }
    for id in report.orphan_entries.iter().take(5) {
        println!("  search entry #{} has no record", id);
    }
    for path in report.mismatched.iter().take(5) {
        println!("  {} differs from its search entry", path.red());
    }
    for path in report.stale_heads.iter().take(5) {
        println!("  {} has a stale change-detection head", path.red());
    }
    if report.dangling_postings > 0 {
        println!("  {} postings point at missing entries", report.dangling_postings);
    }
    if report.missing_postings > 0 {
        println!("  {} terms are missing postings", report.missing_postings);
    }

    Err(format!("{} consistency violations", report.violation_count()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_store_path_defaults_under_root() {
        let root = Path::new("/kb");
        assert_eq!(
            store_path(root, None),
            PathBuf::from("/kb/.docmirror/store")
        );
        assert_eq!(
            store_path(root, Some(PathBuf::from("/tmp/db"))),
            PathBuf::from("/tmp/db")
        );
    }

    #[test]
    fn test_sync_then_status_and_verify() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("qa")).unwrap();
        fs::write(dir.path().join("qa/a.md"), "# A\nbody").unwrap();

        sync(dir.path(), None, false, false).unwrap();
        status(dir.path(), None, true).unwrap();
        verify(dir.path(), None).unwrap();
    }

    #[test]
    fn test_verify_without_store_fails() {
        let dir = tempdir().unwrap();
        assert!(verify(dir.path(), None).is_err());
        assert!(status(dir.path(), None, false).is_ok());
        assert!(!dir.path().join(".docmirror").exists());
    }
}
