//! Error types for bibflow-import
//!
//! Not-found is never an error: lookups return `Ok(None)`. The enums below cover
//! provider failures, import failures and registry misconfiguration.

use crate::fetcher::Capability;
use bibflow_common::IdentifierKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the transport collaborator
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Failure of a single provider call or of a composed lookup
#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("{fetcher}: transport failed: {source}")]
    Transport {
        fetcher: String,
        source: TransportError,
    },

    #[error("{fetcher}: malformed response: {message}")]
    MalformedResponse { fetcher: String, message: String },

    #[error("{fetcher}: no response within {after:?}")]
    Timeout { fetcher: String, after: Duration },

    /// Caller passed something that can never resolve; aborts fallback chains
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("{fetcher}: not configured: {message}")]
    NotConfigured { fetcher: String, message: String },

    /// Caller cancelled the operation; aborts fallback chains
    #[error("Cancelled")]
    Cancelled,

    /// Every delegate of a fallback chain failed
    #[error("{chain}: all {attempts} delegates failed, last: {last}")]
    ChainExhausted {
        chain: String,
        attempts: usize,
        #[source]
        last: Box<FetcherError>,
    },

    /// Every provider of a composite search failed
    #[error("all {count} search providers failed, last: {last}")]
    AllProvidersFailed {
        count: usize,
        #[source]
        last: Box<FetcherError>,
    },
}

impl FetcherError {
    /// Fatal failures stop a fallback chain instead of moving to the next delegate
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetcherError::InvalidIdentifier(_) | FetcherError::Cancelled)
    }

    pub fn transport(fetcher: impl Into<String>, source: TransportError) -> Self {
        FetcherError::Transport {
            fetcher: fetcher.into(),
            source,
        }
    }

    pub fn malformed(fetcher: impl Into<String>, message: impl Into<String>) -> Self {
        FetcherError::MalformedResponse {
            fetcher: fetcher.into(),
            message: message.into(),
        }
    }
}

/// Import failure
///
/// Everything except `InvalidArgument` is reported inside a `ParseResult` and
/// carries the source path or name it concerns.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Contract violation by the caller (e.g. an empty path)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No registered importer claimed the input
    #[error("Unrecognized format: {source_name}")]
    UnrecognizedFormat { source_name: String },

    #[error("Unknown import format '{0}'")]
    UnknownFormat(String),

    /// Recognized input that could not be parsed completely
    #[error("{source_name}{}: {message}", at_line(.line))]
    Parse {
        source_name: String,
        line: Option<usize>,
        message: String,
    },
}

fn at_line(line: &Option<usize>) -> String {
    line.map(|l| format!(" (line {})", l)).unwrap_or_default()
}

/// Registry built with conflicting registrations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind} is already resolved by '{existing}', cannot register '{rejected}'")]
    DuplicateIdentifierKind {
        kind: IdentifierKind,
        existing: String,
        rejected: String,
    },

    #[error("{kind} identifiers are already found by '{existing}', cannot register '{rejected}'")]
    DuplicateIdentifierFinder {
        kind: IdentifierKind,
        existing: String,
        rejected: String,
    },

    #[error("{capability} fetcher '{name}' registered twice")]
    DuplicateName { capability: Capability, name: String },
}
