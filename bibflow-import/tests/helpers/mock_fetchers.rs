//! Scripted fetchers and transport
//!
//! Every mock counts its calls so tests can prove which providers ran.

use async_trait::async_trait;
use bibflow_common::{Field, Record};
use bibflow_import::error::TransportError;
use bibflow_import::fetcher::transport::{Transport, TransportRequest, TransportResponse};
use bibflow_import::fetcher::{
    EntryBasedFetcher, FetchResult, FulltextFetcher, IdBasedFetcher, SearchBasedFetcher,
    SearchResults, TrustLevel, WebFetcher,
};
use bibflow_import::FetcherError;
use reqwest::Url;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Article with a title and year
pub fn article(title: &str, year: &str) -> Record {
    Record::new("article")
        .with_field(Field::Title, title)
        .with_field(Field::Year, year)
}

fn provider_failure(name: &str) -> FetcherError {
    FetcherError::malformed(name, format!("{} is down", name))
}

#[derive(Clone)]
pub enum Outcome {
    Found(Record),
    NotFound,
    Fails,
    InvalidIdentifier,
}

/// Identifier and entry fetcher with a fixed outcome
pub struct MockFetcher {
    name: String,
    outcome: Outcome,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new(name: &str, outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            outcome,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn found(name: &str, record: Record) -> Arc<Self> {
        Self::new(name, Outcome::Found(record))
    }

    pub fn not_found(name: &str) -> Arc<Self> {
        Self::new(name, Outcome::NotFound)
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Self::new(name, Outcome::Fails)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Identifiers received, in call order
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn respond(&self) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Outcome::Found(record) => Ok(Some(record.clone())),
            Outcome::NotFound => Ok(None),
            Outcome::Fails => Err(provider_failure(&self.name)),
            Outcome::InvalidIdentifier => Err(FetcherError::InvalidIdentifier(self.name.clone())),
        }
    }
}

impl WebFetcher for MockFetcher {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl IdBasedFetcher for MockFetcher {
    async fn fetch_by_id(&self, identifier: &str) -> FetchResult {
        self.seen.lock().unwrap().push(identifier.to_string());
        self.respond()
    }
}

#[async_trait]
impl EntryBasedFetcher for MockFetcher {
    async fn complete_entry(&self, _entry: &Record) -> FetchResult {
        self.respond()
    }
}

/// Search provider with optional latency and failure
pub struct MockSearch {
    name: String,
    records: Vec<Record>,
    delay: Option<Duration>,
    fails: bool,
    calls: AtomicUsize,
}

impl MockSearch {
    pub fn returning(name: &str, records: Vec<Record>) -> Self {
        Self {
            name: name.to_string(),
            records,
            delay: None,
            fails: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fails: true,
            ..Self::returning(name, Vec::new())
        }
    }

    /// Never answers within any test timeout
    pub fn hanging(name: &str) -> Self {
        Self::returning(name, vec![article("never delivered", "1999")])
            .with_delay(Duration::from_secs(3600))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WebFetcher for MockSearch {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl SearchBasedFetcher for MockSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<SearchResults, FetcherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fails {
            return Err(provider_failure(&self.name));
        }
        Ok(SearchResults::complete(
            self.records.iter().take(max_results).cloned().collect(),
        ))
    }
}

/// Full-text provider with a fixed answer
pub struct MockFulltext {
    name: String,
    trust: TrustLevel,
    url: Option<&'static str>,
    fails: bool,
    calls: AtomicUsize,
}

impl MockFulltext {
    pub fn new(name: &str, trust: TrustLevel, url: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            trust,
            url,
            fails: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str, trust: TrustLevel) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            trust,
            url: None,
            fails: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WebFetcher for MockFulltext {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl FulltextFetcher for MockFulltext {
    async fn find_full_text(&self, _entry: &Record) -> Result<Option<Url>, FetcherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(provider_failure(&self.name));
        }
        Ok(self.url.map(|u| Url::parse(u).unwrap()))
    }

    fn trust_level(&self) -> TrustLevel {
        self.trust
    }
}

/// Transport that answers every request with `Empty` and records it
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.url);
        Ok(TransportResponse::Empty)
    }
}
