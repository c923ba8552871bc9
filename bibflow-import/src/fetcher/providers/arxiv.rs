//! arXiv e-prints
//!
//! Metadata comes from the arXiv BibTeX export. The full-text location is
//! derived from the e-print id without a network call. Records without an
//! e-print id are matched by title against the arXiv query API (Atom feed).

use super::{fetch_body, first_bibtex_record, normalized_title, url_with_params};
use crate::error::FetcherError;
use crate::fetcher::transport::{Transport, TransportRequest};
use crate::fetcher::{
    FetchResult, FulltextFetcher, HelpFile, IdBasedFetcher, IdFetcher, TrustLevel, WebFetcher,
};
use async_trait::async_trait;
use bibflow_common::{Field, Identifier, IdentifierKind, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::sync::Arc;
use tracing::debug;

const BIBTEX_URL: &str = "https://arxiv.org/bibtex/";
const PDF_URL: &str = "https://arxiv.org/pdf/";
const QUERY_URL: &str = "https://export.arxiv.org/api/query";
const ARXIV_DOI_PREFIX: &str = "10.48550/arxiv.";

/// `2101.00001v2` or the older `hep-th/9901001`
static ARXIV_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}\.\d{4,5}|[a-z][a-z\-]*(\.[A-Z]{2})?/\d{7})(v\d+)?$")
        .expect("arXiv id pattern is valid")
});

static ATOM_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("atom entry pattern is valid"));
static ATOM_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<id>\s*https?://arxiv\.org/abs/([^<\s]+?)(?:v\d+)?\s*</id>")
        .expect("atom id pattern is valid")
});
static ATOM_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<title>(.*?)</title>").expect("atom title pattern is valid"));

pub(crate) fn is_valid_arxiv_id(id: &str) -> bool {
    ARXIV_ID.is_match(id)
}

/// `(id, title)` of every feed entry, version suffix dropped from the id
fn atom_entries(feed: &str) -> Vec<(String, String)> {
    ATOM_ENTRY
        .captures_iter(feed)
        .filter_map(|entry| {
            let body = entry.get(1)?.as_str();
            let id = ATOM_ID.captures(body)?.get(1)?.as_str().to_string();
            let title = ATOM_TITLE.captures(body)?.get(1)?.as_str().to_string();
            Some((id, title))
        })
        .collect()
}

/// E-print id of `entry`, from `eprint` or an arXiv-issued DOI
fn eprint_of(entry: &Record) -> Option<String> {
    if let Some(eprint) = entry.field(&Field::Eprint) {
        let id = IdentifierKind::ArXiv.normalize(eprint);
        if is_valid_arxiv_id(&id) {
            return Some(id);
        }
    }
    let doi = IdentifierKind::Doi.normalize(entry.field(&Field::Doi)?);
    let lower = doi.to_ascii_lowercase();
    lower
        .starts_with(ARXIV_DOI_PREFIX)
        .then(|| doi[ARXIV_DOI_PREFIX.len()..].to_string())
        .filter(|id| is_valid_arxiv_id(id))
}

pub struct ArXivFetcher {
    transport: Arc<dyn Transport>,
}

impl ArXivFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl WebFetcher for ArXivFetcher {
    fn name(&self) -> &str {
        "ArXiv"
    }

    fn help_page(&self) -> Option<HelpFile> {
        Some(HelpFile::FetcherArxiv)
    }
}

#[async_trait]
impl IdBasedFetcher for ArXivFetcher {
    async fn fetch_by_id(&self, identifier: &str) -> FetchResult {
        let id = IdentifierKind::ArXiv.normalize(identifier);
        if id.is_empty() {
            return Ok(None);
        }
        if !is_valid_arxiv_id(&id) {
            return Err(FetcherError::InvalidIdentifier(format!("arXiv {}", identifier)));
        }

        let request = TransportRequest::get(format!("{}{}", BIBTEX_URL, id));
        let Some(body) = fetch_body(self.transport.as_ref(), self.name(), request).await? else {
            return Ok(None);
        };
        let mut record = first_bibtex_record(self.name(), &body)?;
        if let Some(record) = record.as_mut() {
            if !record.has_field(&Field::Eprint) {
                record.set_field(Field::Eprint, id);
            }
            if !record.has_field(&Field::ArchivePrefix) {
                record.set_field(Field::ArchivePrefix, "arXiv");
            }
        }
        Ok(record)
    }
}

#[async_trait]
impl IdFetcher for ArXivFetcher {
    fn identifier_kind(&self) -> IdentifierKind {
        IdentifierKind::ArXiv
    }

    async fn find_identifier(&self, entry: &Record) -> Result<Option<Identifier>, FetcherError> {
        if let Some(id) = eprint_of(entry) {
            return Ok(Some(Identifier::new(IdentifierKind::ArXiv, &id)));
        }
        let Some(title) = entry.field(&Field::Title) else {
            return Ok(None);
        };
        let wanted = normalized_title(title);
        if wanted.is_empty() {
            return Ok(None);
        }

        let query = format!("ti:\"{}\"", wanted);
        let url = url_with_params(
            self.name(),
            QUERY_URL,
            &[("search_query", query.as_str()), ("max_results", "5")],
        )?;
        let request = TransportRequest::get(url);
        let Some(body) = fetch_body(self.transport.as_ref(), self.name(), request).await? else {
            return Ok(None);
        };
        let feed = String::from_utf8_lossy(&body);
        let found = atom_entries(&feed)
            .into_iter()
            .find(|(_, candidate)| normalized_title(candidate) == wanted)
            .map(|(id, _)| Identifier::new(IdentifierKind::ArXiv, &id));
        if found.is_none() {
            debug!(title, "No arXiv e-print with a matching title");
        }
        Ok(found)
    }
}

#[async_trait]
impl FulltextFetcher for ArXivFetcher {
    async fn find_full_text(&self, entry: &Record) -> Result<Option<Url>, FetcherError> {
        let Some(id) = eprint_of(entry) else {
            return Ok(None);
        };
        Url::parse(&format!("{}{}", PDF_URL, id))
            .map(Some)
            .map_err(|e| FetcherError::malformed(self.name(), e.to_string()))
    }

    fn trust_level(&self) -> TrustLevel {
        TrustLevel::Preprint
    }
}
