//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    BookRecord, BookRow, CategoryRecord, CategoryUpsert, InsertOutcome, RunRecord, RunStatus,
    RunTotals,
};
use crate::CrawlerError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const CATEGORY_COLUMNS: &str = "id, name, listing_path, discovered_at, updated_at";

const BOOK_COLUMNS: &str = "id, title, price, upc, product_type, availability, number_of_reviews,
     description, category_name, url, created_at";

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, inserted, duplicates, skipped, errored";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CrawlerError)` - Failed to open database or create tables
    pub fn new(path: &Path) -> Result<Self, CrawlerError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, CrawlerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Closes the underlying connection, reporting any error from SQLite
    pub fn close(self) -> Result<(), CrawlerError> {
        self.conn.close().map_err(|(_, e)| CrawlerError::Database(e))
    }
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<CategoryRecord> {
    Ok(CategoryRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        listing_path: row.get(2)?,
        discovered_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<BookRow> {
    Ok(BookRow {
        id: row.get(0)?,
        book: BookRecord {
            title: row.get(1)?,
            price: row.get(2)?,
            upc: row.get(3)?,
            product_type: row.get(4)?,
            availability: row.get(5)?,
            number_of_reviews: row.get(6)?,
            description: row.get(7)?,
            category_name: row.get(8)?,
            url: row.get(9)?,
        },
        created_at: row.get(10)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
        inserted: row.get::<_, i64>(5)? as u64,
        duplicates: row.get::<_, i64>(6)? as u64,
        skipped: row.get::<_, i64>(7)? as u64,
        errored: row.get::<_, i64>(8)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Categories =====

    fn upsert_category(
        &mut self,
        name: &str,
        listing_path: &str,
    ) -> StorageResult<CategoryUpsert> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM categories WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO categories (name, listing_path, discovered_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(name) DO UPDATE SET
                listing_path = excluded.listing_path,
                updated_at = excluded.updated_at",
            params![name, listing_path, now],
        )?;

        Ok(match existing {
            Some(_) => CategoryUpsert::Updated,
            None => CategoryUpsert::Created,
        })
    }

    fn list_categories(&self) -> StorageResult<Vec<CategoryRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM categories ORDER BY id",
            CATEGORY_COLUMNS
        ))?;

        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    fn get_category_by_name(&self, name: &str) -> StorageResult<Option<CategoryRecord>> {
        let category = self
            .conn
            .query_row(
                &format!("SELECT {} FROM categories WHERE name = ?1", CATEGORY_COLUMNS),
                params![name],
                category_from_row,
            )
            .optional()?;

        Ok(category)
    }

    fn count_categories(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Books =====

    fn insert_books(&mut self, books: &[BookRecord]) -> StorageResult<Vec<InsertOutcome>> {
        // Dropping the transaction without commit rolls it back, so an early
        // return through `?` discards every insert made so far.
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut outcomes = Vec::with_capacity(books.len());

        {
            let mut stmt = tx.prepare(
                "INSERT INTO books (title, price, upc, product_type, availability,
                    number_of_reviews, description, category_name, url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(upc) DO NOTHING",
            )?;

            for book in books {
                let changed = stmt.execute(params![
                    book.title,
                    book.price,
                    book.upc,
                    book.product_type,
                    book.availability,
                    book.number_of_reviews,
                    book.description,
                    book.category_name,
                    book.url,
                    now,
                ])?;

                outcomes.push(if changed == 0 {
                    InsertOutcome::Duplicate
                } else {
                    InsertOutcome::Inserted
                });
            }
        }

        tx.commit()?;
        Ok(outcomes)
    }

    fn list_books(&self) -> StorageResult<Vec<BookRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM books ORDER BY id", BOOK_COLUMNS))?;

        let books = stmt
            .query_map([], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(books)
    }

    fn get_book_by_upc(&self, upc: &str) -> StorageResult<Option<BookRow>> {
        let book = self
            .conn
            .query_row(
                &format!("SELECT {} FROM books WHERE upc = ?1", BOOK_COLUMNS),
                params![upc],
                book_from_row,
            )
            .optional()?;

        Ok(book)
    }

    fn list_books_by_category(&self, category_name: &str) -> StorageResult<Vec<BookRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM books WHERE category_name = ?1 ORDER BY id",
            BOOK_COLUMNS
        ))?;

        let books = stmt
            .query_map(params![category_name], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(books)
    }

    fn count_books(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_books_by_category(&self, category_name: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM books WHERE category_name = ?1",
            params![category_name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Run Ledger =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2,
                inserted = ?3, duplicates = ?4, skipped = ?5, errored = ?6
             WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                totals.inserted as i64,
                totals.duplicates as i64,
                totals.skipped as i64,
                totals.errored as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }
}
