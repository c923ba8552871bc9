//! ISBN lookup
//!
//! `ISBN` is a fallback chain over two book catalogues, tried in order:
//! ebook.de, then OttoBib.

use super::{fetch_body, first_bibtex_record};
use crate::error::FetcherError;
use crate::fetcher::transport::{Transport, TransportRequest};
use crate::fetcher::{
    EntryBasedFetcher, FallbackChainFetcher, FetchResult, HelpFile, IdBasedFetcher, WebFetcher,
};
use async_trait::async_trait;
use bibflow_common::{Field, IdentifierKind, Record};
use std::sync::Arc;
use tracing::debug;

const EBOOK_DE_URL: &str = "https://www.ebook.de/de/tools/isbn2bibtex?isbn=";
const OTTOBIB_URL: &str = "https://www.ottobib.com/isbn/";

/// Ten or thirteen characters, digits except for a trailing check character `X`
fn is_valid_isbn(isbn: &str) -> bool {
    if !isbn.is_ascii() || !matches!(isbn.len(), 10 | 13) {
        return false;
    }
    let (body, check) = isbn.split_at(isbn.len() - 1);
    body.chars().all(|c| c.is_ascii_digit())
        && check.chars().all(|c| c.is_ascii_digit() || c == 'X')
}

/// ebook.de BibTeX export
pub struct IsbnViaEbookDe {
    transport: Arc<dyn Transport>,
}

impl IsbnViaEbookDe {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl WebFetcher for IsbnViaEbookDe {
    fn name(&self) -> &str {
        "ISBN (ebook.de)"
    }
}

#[async_trait]
impl IdBasedFetcher for IsbnViaEbookDe {
    async fn fetch_by_id(&self, identifier: &str) -> FetchResult {
        let request = TransportRequest::get(format!("{}{}", EBOOK_DE_URL, identifier));
        match fetch_body(self.transport.as_ref(), self.name(), request).await? {
            Some(body) => first_bibtex_record(self.name(), &body),
            None => Ok(None),
        }
    }
}

/// OttoBib BibTeX page
///
/// The entry sits inside a `<textarea>` of an HTML page.
pub struct IsbnViaOttoBib {
    transport: Arc<dyn Transport>,
}

impl IsbnViaOttoBib {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

fn textarea_content(html: &str) -> Option<&str> {
    let start = html.find("<textarea")?;
    let open_end = start + html[start..].find('>')? + 1;
    let close = open_end + html[open_end..].find("</textarea>")?;
    Some(&html[open_end..close])
}

impl WebFetcher for IsbnViaOttoBib {
    fn name(&self) -> &str {
        "ISBN (OttoBib)"
    }
}

#[async_trait]
impl IdBasedFetcher for IsbnViaOttoBib {
    async fn fetch_by_id(&self, identifier: &str) -> FetchResult {
        let request = TransportRequest::get(format!("{}{}/bibtex", OTTOBIB_URL, identifier));
        let Some(body) = fetch_body(self.transport.as_ref(), self.name(), request).await? else {
            return Ok(None);
        };
        let page = String::from_utf8_lossy(&body);
        match textarea_content(&page) {
            Some(bibtex) => first_bibtex_record(self.name(), bibtex.as_bytes()),
            None => Ok(None),
        }
    }
}

/// Canonical ISBN resolver
pub struct IsbnFetcher {
    chain: FallbackChainFetcher,
}

impl IsbnFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let delegates: Vec<Arc<dyn IdBasedFetcher>> = vec![
            Arc::new(IsbnViaEbookDe::new(Arc::clone(&transport))),
            Arc::new(IsbnViaOttoBib::new(transport)),
        ];
        Self {
            chain: FallbackChainFetcher::new("ISBN", delegates).with_help_page(HelpFile::FetcherIsbn),
        }
    }

    pub fn delegate_names(&self) -> Vec<&str> {
        self.chain.delegate_names()
    }
}

impl WebFetcher for IsbnFetcher {
    fn name(&self) -> &str {
        self.chain.name()
    }

    fn help_page(&self) -> Option<HelpFile> {
        self.chain.help_page()
    }
}

#[async_trait]
impl IdBasedFetcher for IsbnFetcher {
    async fn fetch_by_id(&self, identifier: &str) -> FetchResult {
        let isbn = IdentifierKind::Isbn.normalize(identifier);
        if isbn.is_empty() {
            return Ok(None);
        }
        if !is_valid_isbn(&isbn) {
            return Err(FetcherError::InvalidIdentifier(format!("ISBN {}", identifier)));
        }
        self.chain.fetch_by_id(&isbn).await
    }
}

#[async_trait]
impl EntryBasedFetcher for IsbnFetcher {
    async fn complete_entry(&self, entry: &Record) -> FetchResult {
        let Some(raw) = entry.field(&Field::Isbn) else {
            return Ok(None);
        };
        let isbn = IdentifierKind::Isbn.normalize(raw);
        if !is_valid_isbn(&isbn) {
            debug!(isbn = %raw, "Skipping entry with unusable ISBN");
            return Ok(None);
        }
        self.chain.fetch_by_id(&isbn).await
    }
}
