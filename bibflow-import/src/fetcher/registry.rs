//! Fetcher registry
//!
//! One list per capability, sorted by display name when the registry is built,
//! plus two maps keyed by identifier kind: the single fetcher that resolves an
//! identifier, and the single fetcher that finds one for a record.
//! Conflicting registrations are collected while building and reported by
//! [`RegistryBuilder::build`].

use super::composite::CompositeSearchFetcher;
use super::providers::{
    ArXivFetcher, CrossrefFetcher, DblpFetcher, DoiFetcher, IsbnFetcher, OpenAccessDoiFetcher,
};
use super::transport::Transport;
use super::{
    Capability, EntryBasedFetcher, FetchResult, FulltextFetcher, IdBasedFetcher, IdFetcher,
    SearchBasedFetcher, WebFetcher,
};
use crate::error::RegistryError;
use bibflow_common::config::FetchConfig;
use bibflow_common::{Field, Identifier, IdentifierKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Collects registrations; validated by [`RegistryBuilder::build`]
#[derive(Default)]
pub struct RegistryBuilder {
    by_kind: BTreeMap<IdentifierKind, Arc<dyn IdBasedFetcher>>,
    finders: BTreeMap<IdentifierKind, Arc<dyn IdFetcher>>,
    id_based: Vec<Arc<dyn IdBasedFetcher>>,
    entry_based: Vec<Arc<dyn EntryBasedFetcher>>,
    search_based: Vec<Arc<dyn SearchBasedFetcher>>,
    fulltext: Vec<Arc<dyn FulltextFetcher>>,
    search_concurrency: Option<usize>,
    call_timeout: Option<Duration>,
    errors: Vec<RegistryError>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `fetcher` the canonical resolver for `kind`
    ///
    /// A kind accepts exactly one fetcher. To combine several providers for one
    /// kind, register a [`super::FallbackChainFetcher`] wrapping them.
    pub fn register_for_identifier(
        mut self,
        kind: IdentifierKind,
        fetcher: Arc<dyn IdBasedFetcher>,
    ) -> Self {
        if let Some(existing) = self.by_kind.get(&kind) {
            self.errors.push(RegistryError::DuplicateIdentifierKind {
                kind,
                existing: existing.name().to_string(),
                rejected: fetcher.name().to_string(),
            });
            return self;
        }
        if !self.id_based.iter().any(|f| f.name() == fetcher.name()) {
            self.id_based.push(Arc::clone(&fetcher));
        }
        self.by_kind.insert(kind, fetcher);
        self
    }

    /// Make `fetcher` the one that finds identifiers of its kind for records
    pub fn register_id_fetcher(mut self, fetcher: Arc<dyn IdFetcher>) -> Self {
        let kind = fetcher.identifier_kind();
        if let Some(existing) = self.finders.get(&kind) {
            self.errors.push(RegistryError::DuplicateIdentifierFinder {
                kind,
                existing: existing.name().to_string(),
                rejected: fetcher.name().to_string(),
            });
            return self;
        }
        self.finders.insert(kind, fetcher);
        self
    }

    pub fn register_id_based(mut self, fetcher: Arc<dyn IdBasedFetcher>) -> Self {
        self.id_based.push(fetcher);
        self
    }

    pub fn register_entry_based(mut self, fetcher: Arc<dyn EntryBasedFetcher>) -> Self {
        self.entry_based.push(fetcher);
        self
    }

    pub fn register_search_based(mut self, fetcher: Arc<dyn SearchBasedFetcher>) -> Self {
        self.search_based.push(fetcher);
        self
    }

    pub fn register_fulltext(mut self, fetcher: Arc<dyn FulltextFetcher>) -> Self {
        self.fulltext.push(fetcher);
        self
    }

    /// Concurrency and per-call timeout for the composite search
    pub fn with_search_limits(mut self, max_concurrent: usize, call_timeout: Duration) -> Self {
        self.search_concurrency = Some(max_concurrent);
        self.call_timeout = Some(call_timeout);
        self
    }

    pub fn build(mut self) -> Result<FetcherRegistry, RegistryError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }

        sort_by_name(&mut self.id_based, Capability::IdBased)?;
        sort_by_name(&mut self.entry_based, Capability::EntryBased)?;
        sort_by_name(&mut self.search_based, Capability::SearchBased)?;
        sort_by_name(&mut self.fulltext, Capability::Fulltext)?;

        debug!(
            id_based = self.id_based.len(),
            entry_based = self.entry_based.len(),
            search_based = self.search_based.len(),
            fulltext = self.fulltext.len(),
            id_finders = self.finders.len(),
            "Fetcher registry built"
        );

        Ok(FetcherRegistry {
            by_kind: self.by_kind,
            finders: self.finders,
            id_based: self.id_based,
            entry_based: self.entry_based,
            search_based: self.search_based,
            fulltext: self.fulltext,
            search_concurrency: self.search_concurrency.unwrap_or(4),
            call_timeout: self.call_timeout,
        })
    }
}

fn sort_by_name<T: WebFetcher + ?Sized>(
    fetchers: &mut [Arc<T>],
    capability: Capability,
) -> Result<(), RegistryError> {
    fetchers.sort_by(|a, b| a.name().cmp(b.name()));
    if let Some(pair) = fetchers.windows(2).find(|w| w[0].name() == w[1].name()) {
        return Err(RegistryError::DuplicateName {
            capability,
            name: pair[0].name().to_string(),
        });
    }
    Ok(())
}

/// Immutable, name-ordered fetcher collections
pub struct FetcherRegistry {
    by_kind: BTreeMap<IdentifierKind, Arc<dyn IdBasedFetcher>>,
    finders: BTreeMap<IdentifierKind, Arc<dyn IdFetcher>>,
    id_based: Vec<Arc<dyn IdBasedFetcher>>,
    entry_based: Vec<Arc<dyn EntryBasedFetcher>>,
    search_based: Vec<Arc<dyn SearchBasedFetcher>>,
    fulltext: Vec<Arc<dyn FulltextFetcher>>,
    search_concurrency: usize,
    call_timeout: Option<Duration>,
}

impl FetcherRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with the built-in providers
    ///
    /// | kind  | resolver                                   |
    /// |-------|--------------------------------------------|
    /// | DOI   | `DOI` (doi.org content negotiation)        |
    /// | ISBN  | `ISBN` (ebook.de, then OttoBib)            |
    /// | arXiv | `ArXiv` (arxiv.org BibTeX export)          |
    ///
    /// Identifiers are found for records by `Crossref` (DOI) and `ArXiv`
    /// (e-print id).
    pub fn with_defaults(
        config: &FetchConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<FetcherRegistry, RegistryError> {
        let isbn = Arc::new(IsbnFetcher::new(Arc::clone(&transport)));
        let doi = Arc::new(DoiFetcher::new(Arc::clone(&transport)));
        let arxiv = Arc::new(ArXivFetcher::new(Arc::clone(&transport)));
        let crossref = Arc::new(CrossrefFetcher::new(Arc::clone(&transport)));
        let dblp = Arc::new(DblpFetcher::new(Arc::clone(&transport)));
        let open_access = Arc::new(OpenAccessDoiFetcher::new(
            Arc::clone(&transport),
            config.unpaywall_email.clone(),
        ));

        RegistryBuilder::new()
            .register_for_identifier(IdentifierKind::Doi, doi.clone())
            .register_for_identifier(IdentifierKind::Isbn, isbn.clone())
            .register_for_identifier(IdentifierKind::ArXiv, arxiv.clone())
            .register_id_based(crossref.clone())
            .register_id_fetcher(crossref.clone())
            .register_id_fetcher(arxiv.clone())
            .register_entry_based(doi)
            .register_entry_based(isbn)
            .register_entry_based(crossref.clone())
            .register_search_based(crossref)
            .register_search_based(dblp)
            .register_fulltext(arxiv)
            .register_fulltext(open_access)
            .with_search_limits(
                config.max_concurrent_requests,
                Duration::from_secs(config.timeout_secs),
            )
            .build()
    }

    /// The canonical fetcher for `kind`
    pub fn id_fetcher_for(&self, kind: IdentifierKind) -> Option<Arc<dyn IdBasedFetcher>> {
        self.by_kind.get(&kind).cloned()
    }

    /// The canonical fetcher for identifiers stored in `field`
    ///
    /// `None` ("no fetcher available") is the common case for most fields.
    pub fn id_fetcher_for_field(&self, field: &Field) -> Option<Arc<dyn IdBasedFetcher>> {
        IdentifierKind::from_field(field).and_then(|kind| self.id_fetcher_for(kind))
    }

    /// Resolve a normalized identifier with the fetcher registered for its kind
    ///
    /// `None` when no fetcher is registered for the kind.
    pub async fn fetch_by_identifier(&self, identifier: &Identifier) -> Option<FetchResult> {
        let fetcher = self.id_fetcher_for(identifier.kind())?;
        if identifier.is_blank() {
            return Some(Ok(None));
        }
        Some(fetcher.fetch_by_id(identifier.value()).await)
    }

    /// The fetcher that finds identifiers of `kind` for records
    pub fn id_finder_for(&self, kind: IdentifierKind) -> Option<Arc<dyn IdFetcher>> {
        self.finders.get(&kind).cloned()
    }

    /// The identifier finder for the kind stored in `field`
    pub fn id_finder_for_field(&self, field: &Field) -> Option<Arc<dyn IdFetcher>> {
        IdentifierKind::from_field(field).and_then(|kind| self.id_finder_for(kind))
    }

    /// Every identifier finder, by name
    pub fn id_finders(&self) -> Vec<Arc<dyn IdFetcher>> {
        let mut finders: Vec<_> = self.finders.values().cloned().collect();
        finders.sort_by(|a, b| a.name().cmp(b.name()));
        finders
    }

    pub fn id_based_fetchers(&self) -> &[Arc<dyn IdBasedFetcher>] {
        &self.id_based
    }

    pub fn entry_based_fetchers(&self) -> &[Arc<dyn EntryBasedFetcher>] {
        &self.entry_based
    }

    pub fn search_based_fetchers(&self) -> &[Arc<dyn SearchBasedFetcher>] {
        &self.search_based
    }

    pub fn fulltext_fetchers(&self) -> &[Arc<dyn FulltextFetcher>] {
        &self.fulltext
    }

    /// Full-text fetchers, most trusted first, then by name
    pub fn fulltext_fetchers_by_trust(&self) -> Vec<Arc<dyn FulltextFetcher>> {
        let mut fetchers = self.fulltext.clone();
        // stable: equal trust keeps name order
        fetchers.sort_by(|a, b| b.trust_level().cmp(&a.trust_level()));
        fetchers
    }

    /// Composite search over every registered search provider
    pub fn composite_search(&self) -> CompositeSearchFetcher {
        let composite = CompositeSearchFetcher::new(self.search_based.clone())
            .with_max_concurrent(self.search_concurrency);
        match self.call_timeout {
            Some(timeout) => composite.with_call_timeout(timeout),
            None => composite,
        }
    }
}
