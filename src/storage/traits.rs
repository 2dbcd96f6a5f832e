//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    BookRecord, BookRow, CategoryRecord, CategoryUpsert, InsertOutcome, RunRecord, RunStatus,
    RunTotals,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawl engine is single-threaded: whoever holds `&mut` to the storage
/// is the only writer, and a batch insert owns the connection for the whole
/// of its transaction.
pub trait Storage {
    // ===== Categories =====

    /// Inserts a category, or updates the listing path of an existing
    /// category with the same name
    fn upsert_category(&mut self, name: &str, listing_path: &str)
        -> StorageResult<CategoryUpsert>;

    /// Gets all categories in insertion order
    fn list_categories(&self) -> StorageResult<Vec<CategoryRecord>>;

    /// Gets a category by its exact display name
    fn get_category_by_name(&self, name: &str) -> StorageResult<Option<CategoryRecord>>;

    /// Counts stored categories
    fn count_categories(&self) -> StorageResult<u64>;

    // ===== Books =====

    /// Inserts a batch of books in a single transaction
    ///
    /// Each insert ignores a UPC conflict and reports it as
    /// [`InsertOutcome::Duplicate`]. Any other statement error rolls the
    /// whole transaction back and is returned; nothing from the batch is
    /// committed in that case.
    ///
    /// # Returns
    ///
    /// One outcome per input record, in input order
    fn insert_books(&mut self, books: &[BookRecord]) -> StorageResult<Vec<InsertOutcome>>;

    /// Gets all stored books in insertion order
    fn list_books(&self) -> StorageResult<Vec<BookRow>>;

    /// Gets a stored book by its UPC
    fn get_book_by_upc(&self, upc: &str) -> StorageResult<Option<BookRow>>;

    /// Gets the books stored under a category name, in insertion order
    fn list_books_by_category(&self, category_name: &str) -> StorageResult<Vec<BookRow>>;

    /// Counts stored books
    fn count_books(&self) -> StorageResult<u64>;

    /// Counts the books stored under a category name
    fn count_books_by_category(&self, category_name: &str) -> StorageResult<u64>;

    // ===== Run Ledger =====

    /// Records the start of a crawl run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run finished with its final status and totals
    fn finish_run(&mut self, run_id: i64, status: RunStatus, totals: &RunTotals)
        -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;
}
