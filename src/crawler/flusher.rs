//! Per-page batch persistence

use crate::storage::{BookRecord, InsertOutcome, Storage};

/// Result of flushing one listing page's records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub inserted: u64,
    pub duplicates: u64,

    /// False when the transaction was rolled back; counts are then zero
    pub committed: bool,
}

/// Persists a page's records as one atomic batch
///
/// An empty batch is a committed no-op and never touches storage. A storage
/// failure is logged and reported through `committed`; the crawl goes on.
pub fn flush_batch<S>(storage: &mut S, page_url: &str, records: &[BookRecord]) -> FlushOutcome
where
    S: Storage + ?Sized,
{
    if records.is_empty() {
        return FlushOutcome {
            committed: true,
            ..Default::default()
        };
    }

    match storage.insert_books(records) {
        Ok(outcomes) => {
            let inserted = outcomes
                .iter()
                .filter(|o| **o == InsertOutcome::Inserted)
                .count() as u64;
            let duplicates = outcomes.len() as u64 - inserted;

            tracing::debug!(
                page = page_url,
                inserted,
                duplicates,
                "Committed page batch"
            );

            FlushOutcome {
                inserted,
                duplicates,
                committed: true,
            }
        }
        Err(e) => {
            tracing::error!(
                page = page_url,
                records = records.len(),
                "Batch rolled back: {}",
                e
            );
            FlushOutcome::default()
        }
    }
}
