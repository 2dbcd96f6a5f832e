//! End-of-run summary printed by the `run` command

use crate::crawler::{CrawlSummary, Exhaustion};

fn exhaustion_label(exhaustion: &Exhaustion) -> &'static str {
    match exhaustion {
        Exhaustion::NoNextPage => "done",
        Exhaustion::EmptyListing => "empty page",
        Exhaustion::ListingFetchFailed(_) => "listing fetch failed",
        Exhaustion::PageLimitReached => "page limit",
        Exhaustion::RevisitedPage(_) => "revisited page",
    }
}

/// Formats a crawl summary as plain text
///
/// One line per category followed by the aggregate counts.
pub fn format_summary(summary: &CrawlSummary) -> String {
    let mut out = String::from("=== Crawl Summary ===\n\n");

    for report in &summary.categories {
        out.push_str(&format!(
            "  {}: {} inserted, {} duplicates, {} skipped, {} errored ({} pages, {})\n",
            report.category,
            report.inserted,
            report.duplicates,
            report.skipped,
            report.errored,
            report.pages_visited,
            exhaustion_label(&report.exhaustion)
        ));
    }
    if !summary.categories.is_empty() {
        out.push('\n');
    }

    let totals = &summary.totals;
    out.push_str(&format!("Categories crawled: {}\n", summary.categories.len()));
    out.push_str(&format!("Inserted: {}\n", totals.inserted));
    out.push_str(&format!("Duplicates: {}\n", totals.duplicates));
    out.push_str(&format!("Skipped: {}\n", totals.skipped));
    out.push_str(&format!("Errored: {}\n", totals.errored));

    let failed = summary.failed_categories();
    if failed > 0 {
        out.push_str(&format!("Categories ended early: {}\n", failed));
    }
    if summary.failed_flushes > 0 {
        out.push_str(&format!("Page batches rolled back: {}\n", summary.failed_flushes));
    }

    out
}

/// Prints a crawl summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    print!("{}", format_summary(summary));
}
