//! Record parser front
//!
//! Importers turn raw bytes into a [`ParseResult`]. They never fail the caller on
//! malformed input: failures are reported inside the result, together with
//! whatever records were parsed before the failure.
//!
//! # Importers (priority order)
//! 1. **csl_json** - CSL-JSON arrays/objects (structured, tried first)
//! 2. **bibtex** - BibTeX text (generic, tried last)

pub mod bibtex;
pub mod csl_json;
pub mod open;
pub mod reader;

use crate::error::ImportError;
use bibflow_common::{Record, RecordCollection};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

pub use bibtex::BibtexImporter;
pub use csl_json::CslJsonImporter;
pub use reader::{FormatDescription, ImportFormatReader};

/// One import format
pub trait Importer: Send + Sync {
    /// Stable identifier used to select the format by name
    fn id(&self) -> &'static str;

    /// Display name
    fn name(&self) -> &'static str;

    /// File extensions without the leading dot, for listing formats
    fn extensions(&self) -> &'static [&'static str];

    /// True when this importer claims `input`; must not claim empty input
    fn is_recognized(&self, input: &[u8]) -> bool;

    /// Parse `input`; `source_name` is attached to every reported failure
    fn import(&self, input: &[u8], source_name: &str) -> ParseResult;
}

/// Outcome of one import call
#[derive(Debug, Default)]
pub struct ParseResult {
    pub collection: RecordCollection,
    pub warnings: Vec<String>,
    /// Set when the input could not be imported completely
    pub fatal_error: Option<ImportError>,
    /// Attempted source path, if the input came from a file
    pub source: Option<PathBuf>,
    /// Id of the importer that produced this result
    pub format: Option<&'static str>,
}

impl ParseResult {
    pub fn new(collection: RecordCollection) -> Self {
        Self {
            collection,
            ..Default::default()
        }
    }

    pub fn from_error(error: ImportError) -> Self {
        Self {
            fatal_error: Some(error),
            ..Default::default()
        }
    }

    /// Attach the path the input was read from
    pub fn with_source(mut self, path: &Path) -> Self {
        self.source = Some(path.to_path_buf());
        self.collection.metadata.source_path = Some(path.to_path_buf());
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.collection.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.collection.records
    }

    pub fn has_fatal_error(&self) -> bool {
        self.fatal_error.is_some()
    }

    /// Parsed without a fatal error and produced at least one record
    pub fn is_successful(&self) -> bool {
        self.fatal_error.is_none() && !self.collection.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Decode input as UTF-8, dropping a byte-order mark
///
/// Invalid sequences are replaced; the returned flag reports whether that happened.
pub(crate) fn decode(input: &[u8]) -> (Cow<'_, str>, bool) {
    let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
    let text = String::from_utf8_lossy(input);
    let lossy = matches!(text, Cow::Owned(_));
    (text, lossy)
}

/// Display name for a source path
pub(crate) fn source_name(path: &Path) -> String {
    path.display().to_string()
}
