//! Web fetchers
//!
//! A provider implements any subset of five narrow capabilities:
//! 1. **IdBasedFetcher** - identifier → record
//! 2. **EntryBasedFetcher** - partial record → completed record
//! 3. **SearchBasedFetcher** - free text → records
//! 4. **FulltextFetcher** - record → full-text location
//! 5. **IdFetcher** - record → identifier of one kind
//!
//! The [`registry`] keeps one ordered list per capability. Composed fetchers
//! ([`fallback::FallbackChainFetcher`], [`composite::CompositeSearchFetcher`])
//! implement the same traits as the providers they wrap.
//!
//! # Failure isolation
//! A provider failure is logged and only surfaced when no alternative succeeded.
//! Not-found is `Ok(None)`, never an error.

pub mod composite;
pub mod fallback;
pub mod providers;
pub mod registry;
pub mod transport;

use crate::error::FetcherError;
use async_trait::async_trait;
use bibflow_common::{Identifier, IdentifierKind, Record};
use reqwest::Url;
use std::fmt;

pub use composite::{CancelPolicy, CompositeSearchFetcher};
pub use fallback::FallbackChainFetcher;
pub use registry::{FetcherRegistry, RegistryBuilder};

/// Found (`Ok(Some)`), not found (`Ok(None)`) or failed (`Err`)
pub type FetchResult = Result<Option<Record>, FetcherError>;

/// Capability a provider is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    IdBased,
    EntryBased,
    SearchBased,
    Fulltext,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::IdBased => write!(f, "id-based"),
            Capability::EntryBased => write!(f, "entry-based"),
            Capability::SearchBased => write!(f, "search-based"),
            Capability::Fulltext => write!(f, "full-text"),
        }
    }
}

/// Help page a front end can link for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpFile {
    FetcherIsbn,
    FetcherDoi,
    FetcherArxiv,
    FetcherCrossref,
    FetcherDblp,
    FetcherOpenAccess,
}

impl HelpFile {
    pub fn page_name(&self) -> &'static str {
        match self {
            HelpFile::FetcherIsbn => "collect/isbntoentry",
            HelpFile::FetcherDoi => "collect/doitoentry",
            HelpFile::FetcherArxiv => "collect/import-using-online-bibliographic-database#arxiv",
            HelpFile::FetcherCrossref => "collect/import-using-online-bibliographic-database#crossref",
            HelpFile::FetcherDblp => "collect/import-using-online-bibliographic-database#dblp",
            HelpFile::FetcherOpenAccess => "collect/findfulltext",
        }
    }
}

/// How far a full-text location can be trusted; higher is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    Unknown,
    MetaSearch,
    Preprint,
    Publisher,
    Source,
}

/// Common surface of every provider
pub trait WebFetcher: Send + Sync {
    /// Stable display name; registry ordering key
    fn name(&self) -> &str;

    fn help_page(&self) -> Option<HelpFile> {
        None
    }
}

/// Looks up a record by a normalized identifier
#[async_trait]
pub trait IdBasedFetcher: WebFetcher {
    async fn fetch_by_id(&self, identifier: &str) -> FetchResult;
}

/// Completes a partially filled record
#[async_trait]
pub trait EntryBasedFetcher: WebFetcher {
    async fn complete_entry(&self, entry: &Record) -> FetchResult;
}

/// Finds the identifier of a record that does not carry one yet
///
/// Not found is `Ok(None)`. A record that already holds a usable identifier of
/// this kind gets it back without a network call.
#[async_trait]
pub trait IdFetcher: WebFetcher {
    fn identifier_kind(&self) -> IdentifierKind;

    async fn find_identifier(&self, entry: &Record) -> Result<Option<Identifier>, FetcherError>;
}

/// Results of one free-text search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub records: Vec<Record>,
    /// Some source failed or the search was cut short
    pub partial_failure: bool,
}

impl SearchResults {
    pub fn complete(records: Vec<Record>) -> Self {
        Self {
            records,
            partial_failure: false,
        }
    }
}

/// Free-text search
#[async_trait]
pub trait SearchBasedFetcher: WebFetcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResults, FetcherError>;
}

/// Resolves where the full text of a record can be downloaded
#[async_trait]
pub trait FulltextFetcher: WebFetcher {
    async fn find_full_text(&self, entry: &Record) -> Result<Option<Url>, FetcherError>;

    fn trust_level(&self) -> TrustLevel {
        TrustLevel::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_level_ordering() {
        assert!(TrustLevel::Source > TrustLevel::Publisher);
        assert!(TrustLevel::Publisher > TrustLevel::Preprint);
        assert!(TrustLevel::Preprint > TrustLevel::MetaSearch);
        assert!(TrustLevel::MetaSearch > TrustLevel::Unknown);
    }

    #[test]
    fn test_default_help_page_and_trust_level() {
        struct Dummy;

        impl WebFetcher for Dummy {
            fn name(&self) -> &str {
                "Dummy"
            }
        }

        #[async_trait]
        impl FulltextFetcher for Dummy {
            async fn find_full_text(&self, _entry: &Record) -> Result<Option<Url>, FetcherError> {
                Ok(None)
            }
        }

        let dummy = Dummy;
        assert_eq!(dummy.help_page(), None);
        assert_eq!(dummy.trust_level(), TrustLevel::Unknown);
    }
}
