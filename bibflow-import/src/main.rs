//! bibflow-import - bibliographic record acquisition CLI
//!
//! Opens and imports bibliography files, looks records up by identifier,
//! searches web providers and resolves full-text locations. Results are
//! printed as JSON on stdout; logs go to stderr.

use anyhow::{anyhow, bail, Context, Result};
use bibflow_common::config::TomlConfig;
use bibflow_common::{Field, IdentifierKind, Record};
use bibflow_import::fetcher::transport::HttpTransport;
use bibflow_import::{FetcherRegistry, ParseResult, Pipeline, PipelineConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bibflow-import")]
#[command(about = "Acquire and normalize bibliographic records")]
#[command(version)]
struct Args {
    /// Configuration file (overrides BIBFLOW_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a BibTeX database and migrate it
    Open { path: PathBuf },
    /// Import a file, detecting its format unless one is given
    Import {
        path: PathBuf,
        /// Import format id (see `formats`)
        #[arg(short, long)]
        format: Option<String>,
    },
    /// List available import formats
    Formats,
    /// Look up a record by the identifier stored in a field (doi, isbn, eprint)
    Fetch { field: String, identifier: String },
    /// Search every provider
    Search {
        query: String,
        #[arg(short, long)]
        max: Option<usize>,
    },
    /// Find the full text of an entry in a BibTeX database
    Fulltext { path: PathBuf, key: String },
    /// Find the identifier an entry lacks, by the field it belongs in (doi, eprint)
    FindId {
        path: PathBuf,
        key: String,
        #[arg(short, long, default_value = "doi")]
        field: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("bibflow-import {}", env!("CARGO_PKG_VERSION"));

    let transport = HttpTransport::new(&config.fetch).context("Failed to create HTTP transport")?;
    let registry = FetcherRegistry::with_defaults(&config.fetch, Arc::new(transport))
        .context("Failed to build fetcher registry")?;
    let pipeline = Pipeline::new(PipelineConfig::from(&config), Arc::new(registry));

    match args.command {
        Command::Open { path } => report(pipeline.open_database(&path).await?),
        Command::Import { path, format } => {
            let result = match format {
                Some(format) => pipeline.import_file_as(&format, &path).await?,
                None => pipeline.import_file(&path).await?,
            };
            report(result)
        }
        Command::Formats => {
            for format in pipeline.reader().formats() {
                let patterns: Vec<String> =
                    format.extensions.iter().map(|e| format!("*.{}", e)).collect();
                println!("{}\t{}\t{}", format.id, format.name, patterns.join(" "));
            }
            Ok(())
        }
        Command::Fetch { field, identifier } => {
            let field = Field::from_name(&field);
            let result = pipeline
                .fetch_by_field(&field, &identifier)
                .await
                .ok_or_else(|| anyhow!("No fetcher available for field '{}'", field))?;
            match result? {
                Some(record) => print_json(&record),
                None => bail!("Nothing found for {} {}", field, identifier),
            }
        }
        Command::Search { query, max } => {
            let results = pipeline.search(&query, max).await?;
            if results.partial_failure {
                warn!("Some providers failed; results are incomplete");
            }
            print_json(&results.records)
        }
        Command::Fulltext { path, key } => {
            let entry = load_entry(&pipeline, &path, &key).await?;
            match pipeline.resolve_full_text(&entry).await {
                Some(location) => {
                    println!("{}\t{}", location.fetcher, location.url);
                    Ok(())
                }
                None => bail!("No full text found for '{}'", key),
            }
        }
        Command::FindId { path, key, field } => {
            let field = Field::from_name(&field);
            let kind = IdentifierKind::from_field(&field)
                .ok_or_else(|| anyhow!("'{}' does not hold an identifier", field))?;
            let entry = load_entry(&pipeline, &path, &key).await?;
            let result = pipeline
                .find_identifier(kind, &entry)
                .await
                .ok_or_else(|| anyhow!("No fetcher finds {} identifiers", kind))?;
            match result? {
                Some(identifier) => {
                    println!("{}", identifier.value());
                    Ok(())
                }
                None => bail!("No {} found for '{}'", kind, key),
            }
        }
    }
}

/// Entry `key` of the database at `path`
async fn load_entry(pipeline: &Pipeline, path: &Path, key: &str) -> Result<Record> {
    let database = pipeline.open_database(path).await?;
    if let Some(error) = database.fatal_error {
        bail!(error);
    }
    database
        .collection
        .record_by_key(key)
        .cloned()
        .ok_or_else(|| anyhow!("No entry '{}' in {}", key, path.display()))
}

/// Print the records, then fail if the import did not complete
fn report(result: ParseResult) -> Result<()> {
    for warning in &result.warnings {
        warn!("{}", warning);
    }
    print_json(&result.collection.records)?;
    match result.fatal_error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
