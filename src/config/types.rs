use serde::Deserialize;

/// Main configuration structure
///
/// Built once at startup and handed to the coordinator by reference.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Absolute base URL of the catalog (http or https)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the page that carries the category index, relative to `base_url`
    #[serde(rename = "start-path", default = "default_start_path")]
    pub start_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://books.toscrape.com/".to_string(),
            start_path: default_start_path(),
        }
    }
}

fn default_start_path() -> String {
    "/".to_string()
}

/// Crawl pacing and bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Lower bound of the wait before each item detail fetch (milliseconds)
    #[serde(rename = "item-delay-min-ms")]
    pub item_delay_min_ms: u64,

    /// Upper bound of the wait before each item detail fetch (milliseconds)
    #[serde(rename = "item-delay-max-ms")]
    pub item_delay_max_ms: u64,

    /// Lower bound of the wait between listing pages (milliseconds)
    #[serde(rename = "page-delay-min-ms")]
    pub page_delay_min_ms: u64,

    /// Upper bound of the wait between listing pages (milliseconds)
    #[serde(rename = "page-delay-max-ms")]
    pub page_delay_max_ms: u64,

    /// Attempts per item detail page, first try included
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Timeout for a single page fetch (seconds)
    #[serde(rename = "fetch-timeout-secs")]
    pub fetch_timeout_secs: u64,

    /// Listing pages visited per category before giving up (0 = unbounded)
    #[serde(rename = "max-pages-per-category")]
    pub max_pages_per_category: u32,

    /// Only traverse the first N stored categories
    #[serde(rename = "max-categories")]
    pub max_categories: Option<usize>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            item_delay_min_ms: 1500,
            item_delay_max_ms: 4000,
            page_delay_min_ms: 500,
            page_delay_max_ms: 1000,
            max_attempts: 3,
            fetch_timeout_secs: 30,
            max_pages_per_category: 0,
            max_categories: None,
        }
    }
}

/// User agent sent with every request
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    pub value: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./catalog.db".to_string(),
        }
    }
}
