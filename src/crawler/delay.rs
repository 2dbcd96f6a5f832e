//! Randomized pacing between requests

use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;

/// A uniformly random wait inside `[min_ms, max_ms]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayPolicy {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        if min_ms <= max_ms {
            Self { min_ms, max_ms }
        } else {
            Self {
                min_ms: max_ms,
                max_ms: min_ms,
            }
        }
    }

    /// Wait applied before each item detail fetch
    pub fn between_items(config: &CrawlerConfig) -> Self {
        Self::new(config.item_delay_min_ms, config.item_delay_max_ms)
    }

    /// Wait applied between listing pages
    pub fn between_pages(config: &CrawlerConfig) -> Self {
        Self::new(config.page_delay_min_ms, config.page_delay_max_ms)
    }

    /// Draws one duration from the range
    pub fn sample(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    /// Suspends the current task for a sampled duration
    pub async fn wait(&self) {
        let duration = self.sample();
        if !duration.is_zero() {
            tracing::trace!(ms = duration.as_millis() as u64, "Pacing delay");
            tokio::time::sleep(duration).await;
        }
    }
}
