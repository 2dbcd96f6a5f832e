//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Category upserts keyed on display name
//! - Atomic, conflict-tolerant item batch inserts keyed on UPC
//! - The run ledger

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::CrawlerError;
use serde::Serialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// Failing here is a fatal setup fault: the crawl cannot start without its
/// tables.
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CrawlerError> {
    SqliteStorage::new(path)
}

/// A stored category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub listing_path: String,
    pub discovered_at: String,
    pub updated_at: String,
}

/// Whether a category upsert created a row or refreshed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryUpsert {
    Created,
    Updated,
}

/// An extracted item ready to be persisted
///
/// `category_name` is not optional: a record without a category cannot be
/// built, so it can never reach the flusher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookRecord {
    pub title: String,
    pub price: f64,
    pub upc: String,
    pub product_type: Option<String>,
    pub availability: String,
    pub number_of_reviews: Option<u32>,
    pub description: String,
    pub category_name: String,
    pub url: String,
}

/// A stored item row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookRow {
    pub id: i64,
    #[serde(flatten)]
    pub book: BookRecord,
    pub created_at: String,
}

/// Result of inserting a single item inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created
    Inserted,
    /// The UPC already existed; the stored row was left untouched
    Duplicate,
}

/// Aggregate counts written to the run ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub inserted: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub errored: u64,
}

/// Represents a crawl run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    #[serde(serialize_with = "serialize_status")]
    pub status: RunStatus,
    pub inserted: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub errored: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

fn serialize_status<S: serde::Serializer>(status: &RunStatus, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(status.to_db_string())
}
