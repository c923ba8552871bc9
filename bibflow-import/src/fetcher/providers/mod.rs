//! Built-in providers
//!
//! | provider        | id | entry | search | full text | finds id |
//! |-----------------|----|-------|--------|-----------|----------|
//! | `ISBN`          | ✓  | ✓     |        |           |          |
//! | `DOI`           | ✓  | ✓     |        |           |          |
//! | `ArXiv`         | ✓  |       |        | ✓         | e-print  |
//! | `Crossref`      | ✓  | ✓     | ✓      |           | DOI      |
//! | `DBLP`          |    |       | ✓      |           |          |
//! | `OpenAccessDoi` |    |       |        | ✓         |          |
//!
//! Providers talk to the network only through [`Transport`].

pub mod arxiv;
pub mod crossref;
pub mod dblp;
pub mod doi;
pub mod isbn;
pub mod unpaywall;

pub use arxiv::ArXivFetcher;
pub use crossref::CrossrefFetcher;
pub use dblp::DblpFetcher;
pub use doi::DoiFetcher;
pub use isbn::{IsbnFetcher, IsbnViaEbookDe, IsbnViaOttoBib};
pub use unpaywall::OpenAccessDoiFetcher;

use super::transport::{Transport, TransportRequest, TransportResponse};
use super::FetchResult;
use crate::error::FetcherError;
use crate::importer::bibtex::parse_bibtex;
use bibflow_common::Field;
use reqwest::Url;
use serde_json::Value;

/// GET through the transport; `None` when the remote side has nothing
pub(crate) async fn fetch_body(
    transport: &dyn Transport,
    fetcher: &str,
    request: TransportRequest,
) -> Result<Option<Vec<u8>>, FetcherError> {
    match transport.get(request).await {
        Ok(TransportResponse::Body(body)) => Ok(Some(body)),
        Ok(TransportResponse::Empty) => Ok(None),
        Err(e) => Err(FetcherError::transport(fetcher, e)),
    }
}

/// First entry of a BibTeX response, with string macros expanded
pub(crate) fn first_bibtex_record(fetcher: &str, body: &[u8]) -> FetchResult {
    let text = String::from_utf8_lossy(body);
    let parse = parse_bibtex(&text);
    let collection = parse.collection;

    let Some(mut record) = collection.records.first().cloned() else {
        return match parse.error {
            Some((line, message)) => Err(FetcherError::malformed(
                fetcher,
                format!("line {}: {}", line, message),
            )),
            None => Ok(None),
        };
    };

    let resolved: Vec<(Field, String)> = record
        .fields()
        .map(|(field, value)| (field.clone(), collection.resolve_strings(value)))
        .collect();
    for (field, value) in resolved {
        record.set_field(field, value);
    }
    Ok(Some(record))
}

pub(crate) fn parse_json(fetcher: &str, body: &[u8]) -> Result<Value, FetcherError> {
    serde_json::from_slice(body).map_err(|e| FetcherError::malformed(fetcher, e.to_string()))
}

/// `base` with URL-encoded query parameters
pub(crate) fn url_with_params(
    fetcher: &str,
    base: &str,
    params: &[(&str, &str)],
) -> Result<String, FetcherError> {
    Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|e| FetcherError::malformed(fetcher, format!("cannot build URL: {}", e)))
}

/// Lowercase alphanumeric words, for comparing titles
pub(crate) fn normalized_title(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
