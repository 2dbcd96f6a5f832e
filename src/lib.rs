//! Catalog Crawler: a paced crawler for paginated catalog sites
//!
//! This crate discovers a category taxonomy, walks each category's paginated
//! listing, extracts structured records from item detail pages, and commits
//! them to SQLite in one transaction per listing page with natural-key
//! deduplication.

pub mod config;
pub mod crawler;
pub mod output;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
///
/// Only setup faults (configuration, opening storage, building the HTTP
/// client) surface through this type. Per-item, per-page and per-category
/// faults are absorbed by the crawl engine and reported as counts.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CategoryReport, Coordinator, CrawlSummary};
pub use storage::{BookRecord, CategoryRecord, SqliteStorage, Storage};
