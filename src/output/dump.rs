//! Table dumps for the `dump` command
//!
//! Rows are printed as pretty JSON after a one-line row count header.

use crate::storage::Storage;
use crate::CrawlerError;

/// Usage text printed for a missing or unknown dump target
pub const DUMP_USAGE: &str = "\
Usage: catalog-crawler dump <TARGET>

Targets:
  dump:categories   Print every stored category
  dump:books        Print every stored book";

/// Which table to dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpTarget {
    Categories,
    Books,
}

impl DumpTarget {
    /// Parses a `dump:<table>` argument
    pub fn parse(arg: &str) -> Option<Self> {
        match arg {
            "dump:categories" => Some(Self::Categories),
            "dump:books" => Some(Self::Books),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Books => "books",
        }
    }
}

/// Renders every row of the target table
///
/// # Returns
///
/// * `Ok(String)` - Header line followed by a pretty-printed JSON array
/// * `Err(CrawlerError)` - The table could not be read
pub fn render_dump(storage: &dyn Storage, target: DumpTarget) -> Result<String, CrawlerError> {
    let (count, body) = match target {
        DumpTarget::Categories => {
            let rows = storage.list_categories()?;
            (rows.len(), serde_json::to_string_pretty(&rows)?)
        }
        DumpTarget::Books => {
            let rows = storage.list_books()?;
            (rows.len(), serde_json::to_string_pretty(&rows)?)
        }
    };

    Ok(format!("{} {}:\n{}", count, target.label(), body))
}

/// Prints a table dump to stdout
pub fn print_dump(storage: &dyn Storage, target: DumpTarget) -> Result<(), CrawlerError> {
    println!("{}", render_dump(storage, target)?);
    Ok(())
}
