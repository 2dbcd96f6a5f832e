//! Output module for crawl summaries, statistics and table dumps
//!
//! This module handles:
//! - Printing the aggregate counts of a finished run
//! - Dumping stored categories and books as JSON
//! - Reporting table counts and the latest run ledger entry

mod dump;
pub mod stats;
mod summary;

pub use dump::{print_dump, render_dump, DumpTarget, DUMP_USAGE};
pub use stats::{
    format_category_count, format_statistics, load_category_count, load_statistics,
    print_statistics, CrawlStatistics,
};
pub use summary::{format_summary, print_summary};
