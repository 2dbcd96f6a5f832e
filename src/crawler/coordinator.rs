//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a whole run across the category hierarchy:
//! - Discovering categories from the start page and upserting them
//! - Reading the durable category list back from storage
//! - Walking each category with the listing walker
//! - Folding per-category reports into run totals
//! - Recording the run in the ledger

use crate::config::Config;
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::parser::parse_category_index;
use crate::crawler::walker::{CategoryReport, ListingWalker};
use crate::storage::{
    open_storage, CategoryRecord, CategoryUpsert, RunStatus, RunTotals, SqliteStorage, Storage,
};
use crate::CrawlerError;
use std::path::Path;
use url::Url;

/// Aggregate result of a crawl run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlSummary {
    /// One report per walked category, in traversal order
    pub categories: Vec<CategoryReport>,
    pub totals: RunTotals,
    pub failed_flushes: u64,
}

impl CrawlSummary {
    /// Folds category reports into run totals
    pub fn from_reports(reports: Vec<CategoryReport>) -> Self {
        let (totals, failed_flushes) = reports.iter().fold(
            (RunTotals::default(), 0u64),
            |(totals, flushes), r| {
                (
                    RunTotals {
                        inserted: totals.inserted + r.inserted,
                        duplicates: totals.duplicates + r.duplicates,
                        skipped: totals.skipped + r.skipped,
                        errored: totals.errored + r.errored,
                    },
                    flushes + r.failed_flushes,
                )
            },
        );

        Self {
            categories: reports,
            totals,
            failed_flushes,
        }
    }

    /// Number of categories whose traversal ended on a listing fetch failure
    pub fn failed_categories(&self) -> usize {
        self.categories
            .iter()
            .filter(|r| r.exhaustion.is_failure())
            .count()
    }
}

/// Main crawler coordinator structure
///
/// Owns the fetch collaborator and the storage handle for the run; the
/// configuration is borrowed.
pub struct Coordinator<'a, F, S> {
    config: &'a Config,
    base_url: Url,
    fetcher: F,
    storage: S,
}

impl<'a, F, S> Coordinator<'a, F, S>
where
    F: PageFetcher,
    S: Storage,
{
    /// Creates a new coordinator instance
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlerError)` - The configured base URL does not parse
    pub fn new(config: &'a Config, fetcher: F, storage: S) -> Result<Self, CrawlerError> {
        let base_url = Url::parse(&config.site.base_url)?;
        Ok(Self::from_parts(config, base_url, fetcher, storage))
    }

    fn from_parts(config: &'a Config, base_url: Url, fetcher: F, storage: S) -> Self {
        Self {
            config,
            base_url,
            fetcher,
            storage,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Releases the storage handle so the caller can close it
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Fetches the start page and upserts every category found on it
    ///
    /// A fetch failure is logged and yields zero; the run continues with
    /// whatever categories storage already holds.
    pub async fn discover_categories(&mut self) -> usize {
        let start = match self.base_url.join(&self.config.site.start_path) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Invalid start path '{}': {}", self.config.site.start_path, e);
                return 0;
            }
        };

        let page = match self.fetcher.fetch(&start).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(url = %start, "Category discovery failed: {}", e);
                return 0;
            }
        };

        let discovered = parse_category_index(&page.body, &page.url);
        let mut created = 0;
        let mut upserted = 0;

        for category in &discovered {
            match self
                .storage
                .upsert_category(&category.name, &category.listing_path)
            {
                Ok(CategoryUpsert::Created) => {
                    created += 1;
                    upserted += 1;
                }
                Ok(CategoryUpsert::Updated) => upserted += 1,
                Err(e) => {
                    tracing::error!(category = %category.name, "Failed to store category: {}", e)
                }
            }
        }

        tracing::info!(
            found = discovered.len(),
            created,
            "Discovered {} categories",
            upserted
        );

        upserted
    }

    /// Runs the main crawl loop
    ///
    /// Discovers categories, reads them back in storage order, applies the
    /// optional category cap and walks each one in turn. A category that
    /// ends on a fetch failure does not stop the others.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Aggregate counts, even when some categories failed
    /// * `Err(CrawlerError)` - The run ledger or the category read-back failed
    pub async fn run(&mut self, config_hash: &str) -> Result<CrawlSummary, CrawlerError> {
        let run_id = self.storage.create_run(config_hash)?;
        tracing::info!("Starting crawl run {}", run_id);
        let start_time = std::time::Instant::now();

        self.discover_categories().await;

        let mut categories = match self.storage.list_categories() {
            Ok(categories) => categories,
            Err(e) => {
                self.finish_run(run_id, RunStatus::Failed, &RunTotals::default());
                return Err(e.into());
            }
        };

        if let Some(cap) = self.config.crawler.max_categories {
            if categories.len() > cap {
                tracing::info!("Limiting crawl to the first {} of {} categories", cap, categories.len());
                categories.truncate(cap);
            }
        }

        let reports = self.walk_categories(&categories).await;
        let summary = CrawlSummary::from_reports(reports);
        self.finish_run(run_id, RunStatus::Completed, &summary.totals);

        tracing::info!(
            categories = summary.categories.len(),
            inserted = summary.totals.inserted,
            duplicates = summary.totals.duplicates,
            skipped = summary.totals.skipped,
            errored = summary.totals.errored,
            "Crawl completed in {:?}",
            start_time.elapsed()
        );

        Ok(summary)
    }

    /// Crawls a single stored category
    ///
    /// Discovery still runs first so that a fresh database knows the
    /// category; the name must then match a stored category exactly.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Counts for the one category
    /// * `Err(CrawlerError::UnknownCategory)` - No stored category has that name
    /// * `Err(CrawlerError)` - The run ledger or the category lookup failed
    pub async fn run_category(
        &mut self,
        name: &str,
        config_hash: &str,
    ) -> Result<CrawlSummary, CrawlerError> {
        let run_id = self.storage.create_run(config_hash)?;
        tracing::info!(category = name, "Starting crawl run {}", run_id);

        self.discover_categories().await;

        let category = match self.storage.get_category_by_name(name) {
            Ok(Some(category)) => category,
            Ok(None) => {
                tracing::error!(category = name, "Category is not stored");
                self.finish_run(run_id, RunStatus::Failed, &RunTotals::default());
                return Err(CrawlerError::UnknownCategory(name.to_string()));
            }
            Err(e) => {
                self.finish_run(run_id, RunStatus::Failed, &RunTotals::default());
                return Err(e.into());
            }
        };

        let reports = self.walk_categories(std::slice::from_ref(&category)).await;
        let summary = CrawlSummary::from_reports(reports);
        self.finish_run(run_id, RunStatus::Completed, &summary.totals);

        Ok(summary)
    }

    /// Walks the given categories in order, one report per usable category
    async fn walk_categories(&mut self, categories: &[CategoryRecord]) -> Vec<CategoryReport> {
        let walker = ListingWalker::new(&self.fetcher, &self.config.crawler);
        let mut reports = Vec::with_capacity(categories.len());

        for category in categories {
            let start = match self.base_url.join(&category.listing_path) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(
                        category = %category.name,
                        "Unusable listing path '{}': {}",
                        category.listing_path,
                        e
                    );
                    continue;
                }
            };

            reports.push(walker.walk(&mut self.storage, &category.name, start).await);
        }

        reports
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus, totals: &RunTotals) {
        if let Err(e) = self.storage.finish_run(run_id, status, totals) {
            tracing::warn!("Failed to record end of run {}: {}", run_id, e);
        }
    }
}

/// Runs the main crawl operation
///
/// Opens storage, builds the HTTP fetcher, runs the coordinator and closes
/// storage again whatever the outcome.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, stored in the run ledger
/// * `category` - Crawl only this stored category instead of all of them
///
/// # Example
///
/// ```no_run
/// use catalog_crawler::config::load_config_with_hash;
/// use catalog_crawler::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let summary = run_crawl(&config, &hash, None).await?;
/// println!("{} inserted", summary.totals.inserted);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    category: Option<&str>,
) -> Result<CrawlSummary, CrawlerError> {
    let storage = open_storage(Path::new(&config.output.database_path))?;

    let fetcher = match HttpFetcher::new(config) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            close_quietly(storage);
            return Err(e.into());
        }
    };

    let base_url = match Url::parse(&config.site.base_url) {
        Ok(url) => url,
        Err(e) => {
            close_quietly(storage);
            return Err(e.into());
        }
    };

    let mut coordinator = Coordinator::from_parts(config, base_url, fetcher, storage);

    let result = match category {
        Some(name) => coordinator.run_category(name, config_hash).await,
        None => coordinator.run(config_hash).await,
    };
    close_quietly(coordinator.into_storage());
    result
}

fn close_quietly(storage: SqliteStorage) {
    if let Err(e) = storage.close() {
        tracing::warn!("Failed to close storage: {}", e);
    }
}
