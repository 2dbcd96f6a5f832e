//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::storage::{RunRecord, Storage};
use crate::CrawlerError;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Number of stored categories
    pub categories: u64,

    /// Number of stored books
    pub books: u64,

    /// Book count per stored category, in category insertion order
    pub books_per_category: Vec<(String, u64)>,

    /// Most recent run ledger entry, if any run was recorded
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(CrawlerError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, CrawlerError> {
    let books_per_category = storage
        .list_categories()?
        .into_iter()
        .map(|category| -> Result<(String, u64), CrawlerError> {
            let count = storage.count_books_by_category(&category.name)?;
            Ok((category.name, count))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CrawlStatistics {
        categories: storage.count_categories()?,
        books: storage.count_books()?,
        books_per_category,
        latest_run: storage.get_latest_run()?,
    })
}

/// Counts the books of one stored category
///
/// # Returns
///
/// * `Ok(Some(count))` - The category exists
/// * `Ok(None)` - No stored category has that name
/// * `Err(CrawlerError)` - Failed to query storage
pub fn load_category_count(storage: &dyn Storage, name: &str) -> Result<Option<u64>, CrawlerError> {
    match storage.get_category_by_name(name)? {
        Some(category) => Ok(Some(storage.count_books_by_category(&category.name)?)),
        None => Ok(None),
    }
}

/// Formats the book count of one category, or a note that it does not exist
pub fn format_category_count(name: &str, count: Option<u64>) -> String {
    match count {
        Some(count) => format!("{}: {} books\n", name, count),
        None => format!("No category named '{}'\n", name),
    }
}

/// Formats statistics for display
pub fn format_statistics(stats: &CrawlStatistics) -> String {
    let mut out = String::from("=== Crawl Statistics ===\n\n");

    out.push_str("Stored:\n");
    out.push_str(&format!("  Categories: {}\n", stats.categories));
    out.push_str(&format!("  Books: {}\n", stats.books));

    if !stats.books_per_category.is_empty() {
        out.push_str("\nBooks by category:\n");
        for (name, count) in &stats.books_per_category {
            out.push_str(&format!("  {}: {}\n", name, count));
        }
    }

    match &stats.latest_run {
        Some(run) => {
            out.push_str(&format!("\nLatest Run (#{}):\n", run.id));
            out.push_str(&format!("  Status: {}\n", run.status.to_db_string()));
            out.push_str(&format!("  Started: {}\n", run.started_at));
            if let Some(finished) = &run.finished_at {
                out.push_str(&format!("  Finished: {}\n", finished));
            }
            out.push_str(&format!("  Config hash: {}\n", run.config_hash));
            out.push_str(&format!(
                "  Inserted: {}, Duplicates: {}, Skipped: {}, Errored: {}\n",
                run.inserted, run.duplicates, run.skipped, run.errored
            ));
        }
        None => out.push_str("\nNo crawl runs recorded\n"),
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &CrawlStatistics) {
    print!("{}", format_statistics(stats));
}
