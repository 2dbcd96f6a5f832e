//! Bounded retry around a single item detail fetch
//!
//! Every call resolves to exactly one [`ItemOutcome`]; nothing escapes as an
//! error. Transient fetch faults are retried after reloading the owning
//! listing page, up to the attempt bound. Content defects are never retried.

use crate::config::CrawlerConfig;
use crate::crawler::extract::{extract_book, ExtractError};
use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::storage::BookRecord;
use thiserror::Error;
use url::Url;

/// Why an item was abandoned
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
}

/// Tri-state result of processing one item URL
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// A storable record was produced
    Record(BookRecord),

    /// The page was extracted but has no category; never persisted
    Skipped { url: Url, upc: String },

    /// The item was abandoned
    Errored {
        url: Url,
        attempts: u32,
        error: ItemError,
    },
}

/// Drives fetch-then-extract for one item with a fixed attempt bound
#[derive(Debug, Clone, Copy)]
pub struct RetryController {
    max_attempts: u32,
}

impl RetryController {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.max_attempts)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fetches and extracts one item detail page
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The page fetch collaborator
    /// * `item_url` - Absolute URL of the detail page
    /// * `listing_url` - The listing page the item was found on; reloaded
    ///   before each retry to restore navigation state
    pub async fn process_item<F>(&self, fetcher: &F, item_url: &Url, listing_url: &Url) -> ItemOutcome
    where
        F: PageFetcher + ?Sized,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let page = match fetcher.fetch(item_url).await {
                Ok(page) => page,
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(
                        url = %item_url,
                        attempt,
                        max_attempts = self.max_attempts,
                        kind = %e.kind,
                        "Transient fetch fault, reloading listing page before retry"
                    );
                    self.recover(fetcher, listing_url).await;
                    continue;
                }
                Err(e) => {
                    tracing::error!(url = %item_url, attempt, "Abandoning item: {}", e);
                    return ItemOutcome::Errored {
                        url: item_url.clone(),
                        attempts: attempt,
                        error: e.into(),
                    };
                }
            };

            return match extract_book(&page.body, item_url) {
                Ok(book) => {
                    let upc = book.upc.clone();
                    match book.into_record() {
                        Some(record) => ItemOutcome::Record(record),
                        None => {
                            tracing::warn!(url = %item_url, upc = %upc, "No category in breadcrumb, skipping item");
                            ItemOutcome::Skipped {
                                url: item_url.clone(),
                                upc,
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(url = %item_url, attempt, "Abandoning item: {}", e);
                    ItemOutcome::Errored {
                        url: item_url.clone(),
                        attempts: attempt,
                        error: e.into(),
                    }
                }
            };
        }
    }

    /// Reloads the listing page; its own failure only gets logged
    async fn recover<F>(&self, fetcher: &F, listing_url: &Url)
    where
        F: PageFetcher + ?Sized,
    {
        if let Err(e) = fetcher.fetch(listing_url).await {
            tracing::debug!(url = %listing_url, "Listing reload failed during recovery: {}", e);
        }
    }
}
