//! Fallback chain over identifier fetchers
//!
//! Delegates run strictly in declared order; the first one that finds a record
//! wins and later delegates never run. Declared order is a priority, not a load
//! balancing hint.

use super::{FetchResult, HelpFile, IdBasedFetcher, WebFetcher};
use crate::error::FetcherError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Several identifier fetchers combined under one name
pub struct FallbackChainFetcher {
    name: String,
    help_page: Option<HelpFile>,
    delegates: Vec<Arc<dyn IdBasedFetcher>>,
}

impl FallbackChainFetcher {
    pub fn new(name: impl Into<String>, delegates: Vec<Arc<dyn IdBasedFetcher>>) -> Self {
        Self {
            name: name.into(),
            help_page: None,
            delegates,
        }
    }

    pub fn with_help_page(mut self, help_page: HelpFile) -> Self {
        self.help_page = Some(help_page);
        self
    }

    /// Delegate names in the order they are tried
    pub fn delegate_names(&self) -> Vec<&str> {
        self.delegates.iter().map(|d| d.name()).collect()
    }
}

impl WebFetcher for FallbackChainFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn help_page(&self) -> Option<HelpFile> {
        self.help_page
    }
}

#[async_trait]
impl IdBasedFetcher for FallbackChainFetcher {
    async fn fetch_by_id(&self, identifier: &str) -> FetchResult {
        if identifier.trim().is_empty() {
            return Ok(None);
        }

        let mut last_failure: Option<FetcherError> = None;
        let mut failures = 0usize;

        for delegate in &self.delegates {
            match delegate.fetch_by_id(identifier).await {
                Ok(Some(record)) => {
                    debug!(chain = %self.name, fetcher = delegate.name(), "Record found");
                    return Ok(Some(record));
                }
                Ok(None) => {
                    debug!(
                        chain = %self.name,
                        fetcher = delegate.name(),
                        "Nothing found, trying next delegate"
                    );
                }
                Err(e) if e.is_fatal() => {
                    warn!(chain = %self.name, fetcher = delegate.name(), error = %e, "Fatal failure, aborting chain");
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        chain = %self.name,
                        fetcher = delegate.name(),
                        error = %e,
                        "Delegate failed, trying next delegate"
                    );
                    failures += 1;
                    last_failure = Some(e);
                }
            }
        }

        match last_failure {
            Some(last) if failures == self.delegates.len() => Err(FetcherError::ChainExhausted {
                chain: self.name.clone(),
                attempts: failures,
                last: Box::new(last),
            }),
            _ => Ok(None),
        }
    }
}
