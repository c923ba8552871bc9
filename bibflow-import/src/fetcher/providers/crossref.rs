//! Crossref works API
//!
//! Works use CSL vocabulary, so records are mapped with the CSL-JSON importer's
//! item mapping.

use super::doi::is_valid_doi;
use super::{fetch_body, normalized_title, parse_json, url_with_params};
use crate::error::FetcherError;
use crate::fetcher::transport::{Transport, TransportRequest};
use crate::fetcher::{
    EntryBasedFetcher, FetchResult, HelpFile, IdBasedFetcher, IdFetcher, SearchBasedFetcher,
    SearchResults, WebFetcher,
};
use crate::importer::csl_json::record_from_csl;
use async_trait::async_trait;
use bibflow_common::{Field, Identifier, IdentifierKind, Record};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const WORKS_URL: &str = "https://api.crossref.org/works";

pub struct CrossrefFetcher {
    transport: Arc<dyn Transport>,
}

impl CrossrefFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn query_works(&self, query: &str, rows: usize) -> Result<Vec<Record>, FetcherError> {
        let rows = rows.to_string();
        let url = url_with_params(self.name(), WORKS_URL, &[("query", query), ("rows", &rows)])?;
        let request = TransportRequest::get(url);
        let Some(body) = fetch_body(self.transport.as_ref(), self.name(), request).await? else {
            return Ok(Vec::new());
        };
        let document = parse_json(self.name(), &body)?;
        let items = document
            .pointer("/message/items")
            .and_then(Value::as_array)
            .ok_or_else(|| FetcherError::malformed(self.name(), "missing message.items"))?;
        Ok(items.iter().map(record_from_csl).collect())
    }

    /// First work whose title matches the entry's exactly, ignoring case and punctuation
    async fn match_by_title(&self, entry: &Record) -> FetchResult {
        let Some(title) = entry.field(&Field::Title) else {
            return Ok(None);
        };
        let wanted = normalized_title(title);
        if wanted.is_empty() {
            return Ok(None);
        }

        let query = match entry.field(&Field::Author) {
            Some(author) => format!("{} {}", title, author),
            None => title.to_string(),
        };
        let candidates = self.query_works(&query, 5).await?;
        let found = candidates.into_iter().find(|candidate| {
            candidate
                .field(&Field::Title)
                .is_some_and(|t| normalized_title(t) == wanted)
        });
        if found.is_none() {
            debug!(title, "No Crossref work with a matching title");
        }
        Ok(found)
    }
}

/// Normalized DOI of `entry` when it holds a well-formed one
fn usable_doi(entry: &Record) -> Option<String> {
    let doi = IdentifierKind::Doi.normalize(entry.field(&Field::Doi)?);
    is_valid_doi(&doi).then_some(doi)
}

impl WebFetcher for CrossrefFetcher {
    fn name(&self) -> &str {
        "Crossref"
    }

    fn help_page(&self) -> Option<HelpFile> {
        Some(HelpFile::FetcherCrossref)
    }
}

#[async_trait]
impl IdBasedFetcher for CrossrefFetcher {
    async fn fetch_by_id(&self, identifier: &str) -> FetchResult {
        let doi = IdentifierKind::Doi.normalize(identifier);
        if doi.is_empty() {
            return Ok(None);
        }
        if !is_valid_doi(&doi) {
            return Err(FetcherError::InvalidIdentifier(format!("DOI {}", identifier)));
        }

        let request = TransportRequest::get(format!("{}/{}", WORKS_URL, doi));
        let Some(body) = fetch_body(self.transport.as_ref(), self.name(), request).await? else {
            return Ok(None);
        };
        let document = parse_json(self.name(), &body)?;
        let work = document
            .get("message")
            .filter(|m| m.is_object())
            .ok_or_else(|| FetcherError::malformed(self.name(), "missing message"))?;
        Ok(Some(record_from_csl(work)))
    }
}

#[async_trait]
impl EntryBasedFetcher for CrossrefFetcher {
    /// By a well-formed DOI when present, otherwise by a title search that must match exactly
    async fn complete_entry(&self, entry: &Record) -> FetchResult {
        if let Some(doi) = usable_doi(entry) {
            return self.fetch_by_id(&doi).await;
        }
        if let Some(raw) = entry.field(&Field::Doi) {
            debug!(doi = %raw, "Ignoring unusable DOI, matching by title");
        }
        self.match_by_title(entry).await
    }
}

#[async_trait]
impl IdFetcher for CrossrefFetcher {
    fn identifier_kind(&self) -> IdentifierKind {
        IdentifierKind::Doi
    }

    async fn find_identifier(&self, entry: &Record) -> Result<Option<Identifier>, FetcherError> {
        if let Some(doi) = usable_doi(entry) {
            return Ok(Some(Identifier::new(IdentifierKind::Doi, &doi)));
        }
        let found = self.match_by_title(entry).await?;
        Ok(found
            .as_ref()
            .and_then(usable_doi)
            .map(|doi| Identifier::new(IdentifierKind::Doi, &doi)))
    }
}

#[async_trait]
impl SearchBasedFetcher for CrossrefFetcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResults, FetcherError> {
        if query.trim().is_empty() || max_results == 0 {
            return Ok(SearchResults::default());
        }
        let mut records = self.query_works(query, max_results).await?;
        records.truncate(max_results);
        Ok(SearchResults::complete(records))
    }
}
