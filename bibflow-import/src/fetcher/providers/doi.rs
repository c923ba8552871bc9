//! DOI lookup via doi.org content negotiation

use super::{fetch_body, first_bibtex_record};
use crate::error::FetcherError;
use crate::fetcher::transport::{Transport, TransportRequest};
use crate::fetcher::{EntryBasedFetcher, FetchResult, HelpFile, IdBasedFetcher, WebFetcher};
use async_trait::async_trait;
use bibflow_common::{Field, IdentifierKind, Record};
use std::sync::Arc;
use tracing::debug;

const RESOLVER_URL: &str = "https://doi.org/";
const BIBTEX_MEDIA_TYPE: &str = "application/x-bibtex";

/// Directory indicator plus a suffix: `10.<registrant>/<suffix>`
pub(crate) fn is_valid_doi(doi: &str) -> bool {
    doi.strip_prefix("10.")
        .and_then(|rest| rest.split_once('/'))
        .is_some_and(|(registrant, suffix)| !registrant.is_empty() && !suffix.is_empty())
}

pub struct DoiFetcher {
    transport: Arc<dyn Transport>,
}

impl DoiFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl WebFetcher for DoiFetcher {
    fn name(&self) -> &str {
        "DOI"
    }

    fn help_page(&self) -> Option<HelpFile> {
        Some(HelpFile::FetcherDoi)
    }
}

#[async_trait]
impl IdBasedFetcher for DoiFetcher {
    async fn fetch_by_id(&self, identifier: &str) -> FetchResult {
        let doi = IdentifierKind::Doi.normalize(identifier);
        if doi.is_empty() {
            return Ok(None);
        }
        if !is_valid_doi(&doi) {
            return Err(FetcherError::InvalidIdentifier(format!("DOI {}", identifier)));
        }

        let request =
            TransportRequest::get(format!("{}{}", RESOLVER_URL, doi)).accept(BIBTEX_MEDIA_TYPE);
        let Some(body) = fetch_body(self.transport.as_ref(), self.name(), request).await? else {
            return Ok(None);
        };
        let mut record = first_bibtex_record(self.name(), &body)?;
        if let Some(record) = record.as_mut() {
            if !record.has_field(&Field::Doi) {
                record.set_field(Field::Doi, doi);
            }
        }
        Ok(record)
    }
}

#[async_trait]
impl EntryBasedFetcher for DoiFetcher {
    /// A malformed stored DOI counts as not found
    async fn complete_entry(&self, entry: &Record) -> FetchResult {
        let Some(raw) = entry.field(&Field::Doi) else {
            return Ok(None);
        };
        let doi = IdentifierKind::Doi.normalize(raw);
        if !is_valid_doi(&doi) {
            debug!(doi = %raw, "Skipping entry with unusable DOI");
            return Ok(None);
        }
        self.fetch_by_id(&doi).await
    }
}
