//! Listing walker - per-category pagination state machine
//!
//! One walk drives a single category from its first listing page to
//! exhaustion:
//! 1. Fetch the listing page at the cursor
//! 2. Extract item URLs (none means the category is done)
//! 3. Run every item through the retry controller, pacing between items
//! 4. Flush the page's records as one batch
//! 5. Follow the next-page link after the inter-page delay, or stop
//!
//! The walk returns an immutable [`CategoryReport`]; nothing below the
//! orchestrator shares mutable counters.

use crate::config::CrawlerConfig;
use crate::crawler::delay::DelayPolicy;
use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::flusher::flush_batch;
use crate::crawler::parser::parse_listing_page;
use crate::crawler::retry::{ItemOutcome, RetryController};
use crate::storage::Storage;
use crate::url::visit_key;
use std::collections::HashSet;
use url::Url;

/// Why a category's traversal stopped
#[derive(Debug, Clone, PartialEq)]
pub enum Exhaustion {
    /// The last listing page had no next link
    NoNextPage,

    /// A listing page contained no items
    EmptyListing,

    /// A listing page could not be fetched
    ListingFetchFailed(FetchError),

    /// The configured per-category page bound was reached
    PageLimitReached,

    /// The next link pointed at a page already visited in this category
    RevisitedPage(String),
}

impl Exhaustion {
    /// True when the category ended because of a fault rather than running out
    /// of pages
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ListingFetchFailed(_))
    }
}

/// Outcome of walking one category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryReport {
    pub category: String,
    pub pages_visited: u32,
    pub inserted: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub errored: u64,
    pub failed_flushes: u64,
    pub exhaustion: Exhaustion,
}

#[derive(Debug, Default)]
struct Tally {
    pages_visited: u32,
    inserted: u64,
    duplicates: u64,
    skipped: u64,
    errored: u64,
    failed_flushes: u64,
}

impl Tally {
    fn finish(self, category: &str, exhaustion: Exhaustion) -> CategoryReport {
        CategoryReport {
            category: category.to_string(),
            pages_visited: self.pages_visited,
            inserted: self.inserted,
            duplicates: self.duplicates,
            skipped: self.skipped,
            errored: self.errored,
            failed_flushes: self.failed_flushes,
            exhaustion,
        }
    }
}

/// Walks paginated category listings
pub struct ListingWalker<'a, F: ?Sized> {
    fetcher: &'a F,
    retry: RetryController,
    item_delay: DelayPolicy,
    page_delay: DelayPolicy,
    max_pages: u32,
}

impl<'a, F> ListingWalker<'a, F>
where
    F: PageFetcher + ?Sized,
{
    pub fn new(fetcher: &'a F, config: &CrawlerConfig) -> Self {
        Self {
            fetcher,
            retry: RetryController::from_config(config),
            item_delay: DelayPolicy::between_items(config),
            page_delay: DelayPolicy::between_pages(config),
            max_pages: config.max_pages_per_category,
        }
    }

    /// Walks one category to exhaustion
    ///
    /// # Arguments
    ///
    /// * `storage` - Batch flush target; borrowed exclusively for the walk
    /// * `category` - Category display name, used for logging and the report
    /// * `start` - Absolute URL of the category's first listing page
    pub async fn walk<S>(&self, storage: &mut S, category: &str, start: Url) -> CategoryReport
    where
        S: Storage + ?Sized,
    {
        let mut tally = Tally::default();
        let mut visited = HashSet::new();
        visited.insert(visit_key(&start));
        let mut cursor = start;

        tracing::info!(category, url = %cursor, "Walking category");

        let exhaustion = loop {
            let page = match self.fetcher.fetch(&cursor).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(category, url = %cursor, "Listing fetch failed, ending category: {}", e);
                    break Exhaustion::ListingFetchFailed(e);
                }
            };
            tally.pages_visited += 1;
            visited.insert(visit_key(&page.url));

            let listing = parse_listing_page(&page.body, &page.url);
            if listing.item_urls.is_empty() {
                tracing::info!(category, url = %page.url, "Listing page has no items");
                break Exhaustion::EmptyListing;
            }

            tracing::debug!(
                category,
                url = %page.url,
                items = listing.item_urls.len(),
                "Collecting items"
            );

            let mut batch = Vec::with_capacity(listing.item_urls.len());
            for item_url in &listing.item_urls {
                self.item_delay.wait().await;
                match self.retry.process_item(self.fetcher, item_url, &page.url).await {
                    ItemOutcome::Record(record) => batch.push(record),
                    ItemOutcome::Skipped { .. } => tally.skipped += 1,
                    ItemOutcome::Errored { .. } => tally.errored += 1,
                }
            }

            let flushed = flush_batch(storage, page.url.as_str(), &batch);
            if flushed.committed {
                tally.inserted += flushed.inserted;
                tally.duplicates += flushed.duplicates;
            } else {
                tally.failed_flushes += 1;
            }

            let Some(next) = listing.next_url else {
                break Exhaustion::NoNextPage;
            };

            if !visited.insert(visit_key(&next)) {
                tracing::warn!(category, url = %next, "Next link revisits a page, ending category");
                break Exhaustion::RevisitedPage(next.to_string());
            }

            if self.max_pages > 0 && tally.pages_visited >= self.max_pages {
                tracing::warn!(
                    category,
                    max_pages = self.max_pages,
                    "Page limit reached, ending category"
                );
                break Exhaustion::PageLimitReached;
            }

            self.page_delay.wait().await;
            cursor = next;
        };

        let report = tally.finish(category, exhaustion);
        tracing::info!(
            category,
            pages = report.pages_visited,
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            errored = report.errored,
            "Category finished: {:?}",
            report.exhaustion
        );
        report
    }
}
