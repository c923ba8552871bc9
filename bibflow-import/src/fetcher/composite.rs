//! Composite search over every registered search provider
//!
//! Providers run concurrently (bounded), but their results are buffered per
//! provider and concatenated in declared order, so output order never depends
//! on which provider answered first.
//!
//! # Failure isolation
//! A failing or timed-out provider is logged and excluded from the merge. The
//! search only fails when every provider failed.

use super::providers::normalized_title;
use super::{SearchBasedFetcher, SearchResults, WebFetcher};
use crate::error::FetcherError;
use async_trait::async_trait;
use bibflow_common::{Field, IdentifierKind, Record};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const COMPOSITE_NAME: &str = "SearchAll";

/// What a cancelled search hands back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelPolicy {
    /// Human-facing callers: discard everything, report `Cancelled`
    Interactive,
    /// Non-interactive callers: keep what already completed, flagged partial
    Batch,
}

/// Fans one query out to several search providers
pub struct CompositeSearchFetcher {
    fetchers: Vec<Arc<dyn SearchBasedFetcher>>,
    max_concurrent: usize,
    call_timeout: Option<Duration>,
}

impl CompositeSearchFetcher {
    /// `fetchers` in declared order; the composite itself is filtered out by name
    pub fn new(fetchers: Vec<Arc<dyn SearchBasedFetcher>>) -> Self {
        Self {
            fetchers: fetchers
                .into_iter()
                .filter(|f| f.name() != COMPOSITE_NAME)
                .collect(),
            max_concurrent: 4,
            call_timeout: None,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.fetchers.iter().map(|f| f.name()).collect()
    }

    /// Search with caller-controlled cancellation
    pub async fn search_with_cancellation(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
        policy: CancelPolicy,
    ) -> Result<SearchResults, FetcherError> {
        if query.trim().is_empty() || self.fetchers.is_empty() {
            return Ok(SearchResults::default());
        }

        let mut slots: Vec<Option<Vec<Record>>> = vec![None; self.fetchers.len()];
        let mut partial_failure = false;
        let mut failures = 0usize;
        let mut last_failure: Option<FetcherError> = None;

        // boxed up front so the stream holds no closure over borrowed fetchers
        let calls: Vec<_> = self
            .fetchers
            .iter()
            .enumerate()
            .map(|(index, fetcher)| {
                let fetcher = Arc::clone(fetcher);
                async move {
                    let outcome = self.call_provider(fetcher.as_ref(), query, max_results).await;
                    (index, fetcher, outcome)
                }
                .boxed()
            })
            .collect();
        let mut pending = stream::iter(calls).buffer_unordered(self.max_concurrent);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    match policy {
                        CancelPolicy::Interactive => {
                            info!(query, "Search cancelled, discarding partial results");
                            return Err(FetcherError::Cancelled);
                        }
                        CancelPolicy::Batch => {
                            info!(query, "Search cancelled, keeping completed providers");
                            partial_failure = true;
                            break;
                        }
                    }
                }
                next = pending.next() => match next {
                    Some((index, fetcher, Ok(results))) => {
                        debug!(
                            fetcher = fetcher.name(),
                            count = results.records.len(),
                            "Provider search complete"
                        );
                        partial_failure |= results.partial_failure;
                        slots[index] = Some(results.records);
                    }
                    Some((_, fetcher, Err(e))) => {
                        warn!(
                            fetcher = fetcher.name(),
                            error = %e,
                            "Provider search failed (excluded from results)"
                        );
                        partial_failure = true;
                        failures += 1;
                        last_failure = Some(e);
                    }
                    None => break,
                }
            }
        }
        drop(pending);

        if failures == self.fetchers.len() {
            if let Some(last) = last_failure {
                return Err(FetcherError::AllProvidersFailed {
                    count: failures,
                    last: Box::new(last),
                });
            }
        }

        Ok(SearchResults {
            records: merge(slots, max_results),
            partial_failure,
        })
    }

    async fn call_provider(
        &self,
        fetcher: &dyn SearchBasedFetcher,
        query: &str,
        max_results: usize,
    ) -> Result<SearchResults, FetcherError> {
        match self.call_timeout {
            Some(after) => tokio::time::timeout(after, fetcher.search(query, max_results))
                .await
                .unwrap_or_else(|_| {
                    Err(FetcherError::Timeout {
                        fetcher: fetcher.name().to_string(),
                        after,
                    })
                }),
            None => fetcher.search(query, max_results).await,
        }
    }
}

impl WebFetcher for CompositeSearchFetcher {
    fn name(&self) -> &str {
        COMPOSITE_NAME
    }
}

#[async_trait]
impl SearchBasedFetcher for CompositeSearchFetcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResults, FetcherError> {
        let never = CancellationToken::new();
        self.search_with_cancellation(query, max_results, &never, CancelPolicy::Batch)
            .await
    }
}

/// Concatenate in provider order, drop duplicates, truncate
fn merge(slots: Vec<Option<Vec<Record>>>, max_results: usize) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for record in slots.into_iter().flatten().flatten() {
        if merged.len() >= max_results {
            break;
        }
        if let Some(key) = dedup_key(&record) {
            if !seen.insert(key) {
                continue;
            }
        }
        merged.push(record);
    }
    merged
}

/// Normalized identifier, else normalized title plus year
///
/// Records with neither are never treated as duplicates.
pub fn dedup_key(record: &Record) -> Option<String> {
    for kind in [IdentifierKind::Doi, IdentifierKind::Isbn, IdentifierKind::ArXiv] {
        if let Some(value) = record.field(&kind.field()) {
            let normalized = kind.normalize(value).to_lowercase();
            if !normalized.is_empty() {
                return Some(format!("{}:{}", kind, normalized));
            }
        }
    }

    let title = normalized_title(record.field(&Field::Title)?);
    if title.is_empty() {
        return None;
    }
    Some(format!("title:{}|{}", title, record.year().unwrap_or("")))
}
