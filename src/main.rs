//! Catalog Crawler main entry point
//!
//! This is the command-line interface for crawling a paginated catalog site
//! into SQLite and inspecting the stored results.

use anyhow::Context;
use catalog_crawler::config::{load_config_or_default, load_config_with_hash, Config};
use catalog_crawler::crawler::run_crawl;
use catalog_crawler::output::{
    format_category_count, load_category_count, load_statistics, print_dump, print_statistics,
    print_summary, DumpTarget, DUMP_USAGE,
};
use catalog_crawler::storage::{open_storage, SqliteStorage};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "crawler.toml";

/// Catalog Crawler: a paced crawler for paginated catalog sites
///
/// Discovers the category taxonomy of a catalog, walks every category's
/// listing pages and stores one row per item, deduplicated by UPC.
#[derive(Parser, Debug)]
#[command(name = "catalog-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A paced crawler for paginated catalog sites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults to ./crawler.toml if present)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every category and store the extracted books
    Run {
        /// Crawl only the stored category with this exact name
        #[arg(long, value_name = "NAME")]
        category: Option<String>,
    },

    /// Print a stored table as JSON (dump:categories or dump:books)
    Dump {
        #[arg(value_name = "TARGET")]
        target: Option<String>,
    },

    /// Show table counts and the latest run
    Stats {
        /// Show the book count of one category only
        #[arg(long, value_name = "NAME")]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        if let Err(e) = Cli::command().print_help() {
            eprintln!("Failed to print help: {}", e);
        }
        return Ok(());
    };

    setup_logging(cli.verbose, cli.quiet);

    // An unusable dump target never reaches configuration or storage
    if let Command::Dump { target } = &command {
        if target.as_deref().and_then(DumpTarget::parse).is_none() {
            println!("{}", DUMP_USAGE);
            return Ok(());
        }
    }

    let (config, config_hash) = match load_configuration(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("{:#}", e);
            return Ok(());
        }
    };

    let result = match command {
        Command::Run { category } => handle_crawl(&config, &config_hash, category.as_deref()).await,
        Command::Dump { target } => match target.as_deref().and_then(DumpTarget::parse) {
            Some(target) => handle_dump(&config, target),
            None => Ok(()),
        },
        Command::Stats { category } => handle_stats(&config, category.as_deref()),
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_crawler=info,warn"),
            1 => EnvFilter::new("catalog_crawler=debug,info"),
            2 => EnvFilter::new("catalog_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the explicit config file, or the default one when it exists
fn load_configuration(path: Option<&Path>) -> anyhow::Result<(Config, String)> {
    let (config, hash) = match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => load_config_or_default(Path::new(DEFAULT_CONFIG_PATH))
            .context("Failed to load default configuration")?,
    };

    tracing::debug!("Configuration loaded (hash: {})", hash);
    Ok((config, hash))
}

/// Handles the `run` command
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    category: Option<&str>,
) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} into {}",
        config.site.base_url,
        config.output.database_path
    );

    let summary = run_crawl(config, config_hash, category)
        .await
        .context("Crawl aborted")?;

    print_summary(&summary);
    Ok(())
}

/// Handles the `dump` command
fn handle_dump(config: &Config, target: DumpTarget) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let result = print_dump(&storage, target).context("Failed to dump table");
    close_database(storage);
    result
}

/// Handles the `stats` command
fn handle_stats(config: &Config, category: Option<&str>) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_database(config)?;
    let result = match category {
        Some(name) => load_category_count(&storage, name)
            .map(|count| print!("{}", format_category_count(name, count))),
        None => load_statistics(&storage).map(|stats| print_statistics(&stats)),
    }
    .context("Failed to load statistics");
    close_database(storage);
    result
}

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))
}

fn close_database(storage: SqliteStorage) {
    if let Err(e) = storage.close() {
        tracing::warn!("Failed to close database: {}", e);
    }
}
