//! Pipeline orchestrator
//!
//! Every record handed back by the pipeline has been through the migration
//! chain, and is stamped with a creation date when configured.
//!
//! # Error Handling
//! - Provider failures are logged and only surfaced when nothing else succeeded
//! - "No fetcher available" for a field is `None`, not an error
//! - File failures are reported inside the returned `ParseResult`
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(PipelineConfig::from(&toml_config), registry);
//! let record = pipeline.fetch_by_field(&Field::Isbn, "978-1-0981-5140-9").await;
//! ```

use super::{FullTextLocation, PipelineEvent};
use crate::error::{FetcherError, ImportError};
use crate::fetcher::{CancelPolicy, FetchResult, FetcherRegistry, SearchResults};
use crate::importer::open::{self, apply_migrations, ImportConfig};
use crate::importer::{ImportFormatReader, ParseResult};
use crate::migrations::MigrationChain;
use bibflow_common::config::TomlConfig;
use bibflow_common::time::{Clock, SystemClock};
use bibflow_common::{Field, Identifier, IdentifierKind, Record, RecordCollection};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const ENTRY_COMPLETION: &str = "entry completion";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub import: ImportConfig,
    /// Stamp acquired records with `creationdate`
    pub add_creation_date: bool,
    /// Result cap for searches without an explicit maximum
    pub search_max_results: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            import: ImportConfig::default(),
            add_creation_date: false,
            search_max_results: 30,
        }
    }
}

impl From<&TomlConfig> for PipelineConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            import: ImportConfig::from(config),
            add_creation_date: config.add_creation_date,
            search_max_results: config.fetch.search_max_results,
        }
    }
}

/// Record acquisition facade
pub struct Pipeline {
    config: PipelineConfig,
    registry: Arc<FetcherRegistry>,
    reader: ImportFormatReader,
    clock: Arc<dyn Clock>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, registry: Arc<FetcherRegistry>) -> Self {
        Self {
            config,
            registry,
            reader: ImportFormatReader::new(),
            clock: Arc::new(SystemClock),
            event_tx: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Report progress on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn registry(&self) -> &FetcherRegistry {
        &self.registry
    }

    pub fn reader(&self) -> &ImportFormatReader {
        &self.reader
    }

    /// Open an existing BibTeX database
    ///
    /// Records are migrated but not stamped; they were not acquired just now.
    pub async fn open_database(&self, path: &Path) -> Result<ParseResult, ImportError> {
        let result = open::load_database(path, &self.config.import)?;
        self.emit_file_event(path, &result);
        Ok(result)
    }

    /// Import a file of any recognized format
    pub async fn import_file(&self, path: &Path) -> Result<ParseResult, ImportError> {
        let mut result = self.reader.import_unknown_format(path)?;
        self.finish_import(&mut result);
        self.emit_file_event(path, &result);
        Ok(result)
    }

    /// Import a file with the format named `format_id`
    pub async fn import_file_as(
        &self,
        format_id: &str,
        path: &Path,
    ) -> Result<ParseResult, ImportError> {
        let mut result = self.reader.import_from_file(format_id, path)?;
        self.finish_import(&mut result);
        self.emit_file_event(path, &result);
        Ok(result)
    }

    /// Parse in-memory input of any recognized format
    pub fn import_bytes(&self, input: &[u8]) -> ParseResult {
        let mut result = self.reader.detect_and_parse(input);
        self.finish_import(&mut result);
        result
    }

    fn finish_import(&self, result: &mut ParseResult) {
        apply_migrations(result, &self.config.import);
        if result.fatal_error.is_none() {
            for record in &mut result.collection.records {
                self.stamp(record);
            }
        }
    }

    /// Look up the identifier stored in `field`
    ///
    /// `None` when no fetcher is available for the field (e.g. `title`).
    pub async fn fetch_by_field(&self, field: &Field, raw: &str) -> Option<FetchResult> {
        let kind = IdentifierKind::from_field(field)?;
        self.fetch_by_identifier(&Identifier::new(kind, raw)).await
    }

    /// Look up an identifier with the canonical fetcher for its kind
    pub async fn fetch_by_identifier(&self, identifier: &Identifier) -> Option<FetchResult> {
        let fetcher = self.registry.id_fetcher_for(identifier.kind())?;
        debug!(
            kind = %identifier.kind(),
            identifier = identifier.value(),
            fetcher = fetcher.name(),
            "Fetching by identifier"
        );
        let result = self.registry.fetch_by_identifier(identifier).await?;
        Some(self.finish_fetch(fetcher.name(), result))
    }

    /// Complete `entry` with the entry-based fetchers, in registry order
    ///
    /// The first fetcher that finds a record wins. Failures are logged and only
    /// returned when every fetcher failed.
    pub async fn complete_entry(&self, entry: &Record) -> FetchResult {
        let fetchers = self.registry.entry_based_fetchers();
        let mut failures = 0usize;
        let mut last_failure = None;

        for fetcher in fetchers {
            match fetcher.complete_entry(entry).await {
                Ok(Some(record)) => {
                    return self.finish_fetch(fetcher.name(), Ok(Some(record)));
                }
                Ok(None) => debug!(fetcher = fetcher.name(), "Entry not found"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.report_failure(fetcher.name(), &e);
                    failures += 1;
                    last_failure = Some(e);
                }
            }
        }

        match last_failure {
            Some(last) if failures == fetchers.len() => Err(FetcherError::ChainExhausted {
                chain: ENTRY_COMPLETION.to_string(),
                attempts: failures,
                last: Box::new(last),
            }),
            _ => Ok(None),
        }
    }

    /// Find an identifier of `kind` for `entry`
    ///
    /// `None` when no registered fetcher finds identifiers of that kind.
    pub async fn find_identifier(
        &self,
        kind: IdentifierKind,
        entry: &Record,
    ) -> Option<Result<Option<Identifier>, FetcherError>> {
        let finder = self.registry.id_finder_for(kind)?;
        let result = finder.find_identifier(entry).await;
        match &result {
            Ok(Some(identifier)) => {
                info!(fetcher = finder.name(), identifier = %identifier, "Identifier found")
            }
            Ok(None) => debug!(fetcher = finder.name(), kind = %kind, "No identifier found"),
            Err(e) => self.report_failure(finder.name(), e),
        }
        Some(result)
    }

    /// Search every provider; `None` uses the configured result cap
    pub async fn search(
        &self,
        query: &str,
        max_results: Option<usize>,
    ) -> Result<SearchResults, FetcherError> {
        let never = CancellationToken::new();
        self.search_with_cancellation(query, max_results, &never, CancelPolicy::Batch)
            .await
    }

    pub async fn search_with_cancellation(
        &self,
        query: &str,
        max_results: Option<usize>,
        cancel: &CancellationToken,
        policy: CancelPolicy,
    ) -> Result<SearchResults, FetcherError> {
        let max_results = max_results.unwrap_or(self.config.search_max_results);
        let composite = self.registry.composite_search();
        let results = composite
            .search_with_cancellation(query, max_results, cancel, policy)
            .await?;

        let results = SearchResults {
            records: self.finish_records(results.records),
            partial_failure: results.partial_failure,
        };
        info!(
            query,
            results = results.records.len(),
            partial = results.partial_failure,
            "Search complete"
        );
        self.emit_event(PipelineEvent::SearchCompleted {
            query: query.to_string(),
            results: results.records.len(),
            partial_failure: results.partial_failure,
        });
        Ok(results)
    }

    /// First full-text location, trying the most trusted fetchers first
    pub async fn resolve_full_text(&self, entry: &Record) -> Option<FullTextLocation> {
        for fetcher in self.registry.fulltext_fetchers_by_trust() {
            match fetcher.find_full_text(entry).await {
                Ok(Some(url)) => {
                    info!(fetcher = fetcher.name(), url = %url, "Full text found");
                    self.emit_event(PipelineEvent::FullTextFound {
                        fetcher: fetcher.name().to_string(),
                        url: url.to_string(),
                    });
                    return Some(FullTextLocation {
                        fetcher: fetcher.name().to_string(),
                        url,
                    });
                }
                Ok(None) => debug!(fetcher = fetcher.name(), "No full text"),
                Err(e) => self.report_failure(fetcher.name(), &e),
            }
        }
        None
    }

    fn finish_fetch(&self, fetcher: &str, result: FetchResult) -> FetchResult {
        match result {
            Ok(found) => {
                self.emit_event(PipelineEvent::RecordFetched {
                    fetcher: fetcher.to_string(),
                    found: found.is_some(),
                });
                Ok(found.and_then(|record| self.finish_records(vec![record]).pop()))
            }
            Err(e) => {
                self.report_failure(fetcher, &e);
                Err(e)
            }
        }
    }

    /// Migrate and stamp records acquired from a provider
    fn finish_records(&self, records: Vec<Record>) -> Vec<Record> {
        if records.is_empty() {
            return records;
        }
        let mut collection = RecordCollection::from_records(records);
        MigrationChain::new(self.config.import.keyword_delimiter).migrate(&mut collection);
        for record in &mut collection.records {
            self.stamp(record);
        }
        collection.records
    }

    fn stamp(&self, record: &mut Record) {
        if self.config.add_creation_date && !record.has_field(&Field::CreationDate) {
            record.set_field(Field::CreationDate, self.clock.today());
        }
    }

    fn report_failure(&self, fetcher: &str, error: &FetcherError) {
        warn!(fetcher, error = %error, "Provider failed");
        self.emit_event(PipelineEvent::ProviderFailed {
            fetcher: fetcher.to_string(),
            error: error.to_string(),
        });
    }

    fn emit_file_event(&self, path: &Path, result: &ParseResult) {
        self.emit_event(PipelineEvent::FileImported {
            path: path.to_path_buf(),
            records: result.collection.len(),
            failed: result.has_fatal_error(),
        });
    }

    /// Never waits: a full or closed channel drops the event
    fn emit_event(&self, event: PipelineEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => debug!(?event, "Event channel full, event dropped"),
            Err(TrySendError::Closed(_)) => debug!("Event channel closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{EntryBasedFetcher, IdBasedFetcher, WebFetcher};
    use async_trait::async_trait;
    use bibflow_common::time::FixedClock;

    struct Stub {
        name: &'static str,
        record: Option<Record>,
    }

    impl WebFetcher for Stub {
        fn name(&self) -> &str {
            self.name
        }
    }

    #[async_trait]
    impl IdBasedFetcher for Stub {
        async fn fetch_by_id(&self, _identifier: &str) -> FetchResult {
            Ok(self.record.clone())
        }
    }

    #[async_trait]
    impl EntryBasedFetcher for Stub {
        async fn complete_entry(&self, _entry: &Record) -> FetchResult {
            Ok(self.record.clone())
        }
    }

    fn pipeline_with(record: Option<Record>, config: PipelineConfig) -> Pipeline {
        let stub = Arc::new(Stub { name: "Stub", record });
        let registry = FetcherRegistry::builder()
            .register_for_identifier(IdentifierKind::Doi, stub.clone())
            .register_entry_based(stub)
            .build()
            .unwrap();
        Pipeline::new(config, Arc::new(registry))
            .with_clock(Arc::new(FixedClock::on_date(2024, 2, 29).unwrap()))
    }

    #[tokio::test]
    async fn test_fetched_records_are_migrated_and_stamped() {
        let record = Record::new("article").with_field(Field::Keywords, "ml, read");
        let config = PipelineConfig {
            add_creation_date: true,
            ..Default::default()
        };
        let pipeline = pipeline_with(Some(record), config);

        let fetched = pipeline
            .fetch_by_field(&Field::Doi, "10.1/x")
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(fetched.field(&Field::Keywords), Some("ml"));
        assert_eq!(fetched.field(&Field::ReadStatus), Some("read"));
        assert_eq!(fetched.field(&Field::CreationDate), Some("2024-02-29"));
    }

    #[tokio::test]
    async fn test_no_fetcher_for_field() {
        let pipeline = pipeline_with(None, PipelineConfig::default());
        assert!(pipeline.fetch_by_field(&Field::Title, "anything").await.is_none());
        // registered kind set does not include ISBN
        assert!(pipeline.fetch_by_field(&Field::Isbn, "9781098151409").await.is_none());
    }

    #[tokio::test]
    async fn test_events_reported() {
        let (tx, mut rx) = mpsc::channel(8);
        let pipeline = pipeline_with(Some(Record::new("misc")), PipelineConfig::default())
            .with_events(tx);

        pipeline.complete_entry(&Record::new("misc")).await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(PipelineEvent::RecordFetched {
                fetcher: "Stub".into(),
                found: true
            })
        );
    }

    #[test]
    fn test_import_bytes_stamps_only_when_enabled() {
        let pipeline = pipeline_with(None, PipelineConfig::default());
        let result = pipeline.import_bytes(b"@misc{k, title = {T}}");
        assert!(!result.records()[0].has_field(&Field::CreationDate));

        let config = PipelineConfig {
            add_creation_date: true,
            ..Default::default()
        };
        let pipeline = pipeline_with(None, config);
        let result = pipeline.import_bytes(b"@misc{k, title = {T}}");
        assert_eq!(result.records()[0].field(&Field::CreationDate), Some("2024-02-29"));
    }
}
