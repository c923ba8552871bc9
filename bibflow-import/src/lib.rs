//! bibflow-import: record acquisition and normalization
//!
//! Acquires bibliographic records from files and web providers and normalizes
//! them into the canonical model of `bibflow-common`.
//!
//! # Layout
//! - [`fetcher`]: capability traits, registry, fallback chain, composite search, providers
//! - [`importer`]: format detection, BibTeX and CSL-JSON importers, database opening
//! - [`migrations`]: post-import migration chain
//! - [`workflow`]: the [`Pipeline`] facade tying everything together

pub mod error;
pub mod fetcher;
pub mod importer;
pub mod migrations;
pub mod workflow;

pub use crate::error::{FetcherError, ImportError, RegistryError, TransportError};
pub use crate::fetcher::{FetchResult, FetcherRegistry};
pub use crate::importer::{ImportFormatReader, ParseResult};
pub use crate::workflow::{Pipeline, PipelineConfig};
