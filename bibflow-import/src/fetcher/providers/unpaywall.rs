//! Open-access full text through Unpaywall

use super::doi::is_valid_doi;
use super::{fetch_body, parse_json, url_with_params};
use crate::error::FetcherError;
use crate::fetcher::transport::{Transport, TransportRequest};
use crate::fetcher::{FulltextFetcher, HelpFile, TrustLevel, WebFetcher};
use async_trait::async_trait;
use bibflow_common::{Field, IdentifierKind, Record};
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const API_URL: &str = "https://api.unpaywall.org/v2/";

/// Looks up the best open-access copy of a record with a DOI
///
/// Unpaywall requires a contact address; without one every lookup fails with
/// [`FetcherError::NotConfigured`].
pub struct OpenAccessDoiFetcher {
    transport: Arc<dyn Transport>,
    email: Option<String>,
}

impl OpenAccessDoiFetcher {
    pub fn new(transport: Arc<dyn Transport>, email: Option<String>) -> Self {
        Self { transport, email }
    }
}

impl WebFetcher for OpenAccessDoiFetcher {
    fn name(&self) -> &str {
        "OpenAccessDoi"
    }

    fn help_page(&self) -> Option<HelpFile> {
        Some(HelpFile::FetcherOpenAccess)
    }
}

#[async_trait]
impl FulltextFetcher for OpenAccessDoiFetcher {
    async fn find_full_text(&self, entry: &Record) -> Result<Option<Url>, FetcherError> {
        let Some(doi) = entry.field(&Field::Doi).map(|d| IdentifierKind::Doi.normalize(d)) else {
            return Ok(None);
        };
        if !is_valid_doi(&doi) {
            debug!(doi = %doi, "Skipping malformed DOI");
            return Ok(None);
        }
        let email = self.email.as_deref().ok_or_else(|| FetcherError::NotConfigured {
            fetcher: self.name().to_string(),
            message: "no contact email for the Unpaywall API".to_string(),
        })?;

        let url = url_with_params(self.name(), &format!("{}{}", API_URL, doi), &[("email", email)])?;
        let request = TransportRequest::get(url);
        let Some(body) = fetch_body(self.transport.as_ref(), self.name(), request).await? else {
            return Ok(None);
        };

        let document = parse_json(self.name(), &body)?;
        let location = document.get("best_oa_location").filter(|l| !l.is_null());
        let Some(link) = location.and_then(|l| {
            l.get("url_for_pdf")
                .and_then(Value::as_str)
                .or_else(|| l.get("url").and_then(Value::as_str))
        }) else {
            return Ok(None);
        };

        Url::parse(link)
            .map(Some)
            .map_err(|e| FetcherError::malformed(self.name(), format!("{}: {}", link, e)))
    }

    fn trust_level(&self) -> TrustLevel {
        TrustLevel::MetaSearch
    }
}
