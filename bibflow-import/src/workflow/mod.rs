//! Record acquisition workflow
//!
//! [`Pipeline`] is the single entry point for acquiring records, whether from a
//! file or from a web provider:
//! - **open / import**: parser front → migration chain
//! - **fetch by field**: identifier-kind dispatch → canonical fetcher → migration chain
//! - **complete entry**: entry-based fetchers in registry order
//! - **search**: composite search over every search provider
//! - **full text**: full-text fetchers, most trusted first
//!
//! Progress can be observed through an optional [`PipelineEvent`] channel.

pub mod pipeline;

use reqwest::Url;
use serde::Serialize;
use std::path::PathBuf;

pub use pipeline::{Pipeline, PipelineConfig};

/// Progress notifications emitted by [`Pipeline`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    FileImported {
        path: PathBuf,
        records: usize,
        failed: bool,
    },
    RecordFetched {
        fetcher: String,
        found: bool,
    },
    ProviderFailed {
        fetcher: String,
        error: String,
    },
    SearchCompleted {
        query: String,
        results: usize,
        partial_failure: bool,
    },
    FullTextFound {
        fetcher: String,
        url: String,
    },
}

/// Where the full text of a record was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullTextLocation {
    pub fetcher: String,
    pub url: Url,
}
