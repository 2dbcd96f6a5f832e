//! Crawler module - the traversal and flush engine
//!
//! This module contains the core crawling logic, including:
//! - Page fetching behind the [`PageFetcher`] contract
//! - Category index, listing and detail page parsing
//! - Bounded per-item retry with listing reload
//! - Per-category pagination and per-page batch flushing
//! - Overall crawl coordination

mod coordinator;
mod delay;
mod extract;
mod fetcher;
mod flusher;
mod parser;
mod retry;
mod walker;

pub use coordinator::{run_crawl, Coordinator, CrawlSummary};
pub use delay::DelayPolicy;
pub use extract::{extract_book, parse_price, ExtractError, ExtractedBook};
pub use fetcher::{
    build_http_client, FetchError, FetchErrorKind, FetchedPage, HttpFetcher, PageFetcher,
};
pub use flusher::{flush_batch, FlushOutcome};
pub use parser::{parse_category_index, parse_listing_page, DiscoveredCategory, ListingPage};
pub use retry::{ItemError, ItemOutcome, RetryController};
pub use walker::{CategoryReport, Exhaustion, ListingWalker};
