//! Opening BibTeX databases
//!
//! [`load_database`] is the canonical entry point: parse, then run the
//! migration chain. The name-based loader is kept for old callers and
//! delegates to it.

use super::reader::read_input;
use super::{source_name, BibtexImporter, Importer, ParseResult};
use crate::error::ImportError;
use crate::migrations::MigrationChain;
use bibflow_common::config::TomlConfig;
use std::path::Path;
use tracing::{debug, info};

/// Settings that shape an import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    /// Separator inside `keywords`
    pub keyword_delimiter: char,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            keyword_delimiter: ',',
        }
    }
}

impl From<&TomlConfig> for ImportConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            keyword_delimiter: config.keyword_delimiter,
        }
    }
}

/// Run the migration chain once over a successful, non-empty result
pub fn apply_migrations(result: &mut ParseResult, config: &ImportConfig) {
    if result.fatal_error.is_some() || result.collection.is_empty() {
        return;
    }
    MigrationChain::new(config.keyword_delimiter).migrate(&mut result.collection);
}

/// Open a BibTeX database and migrate it to current conventions
///
/// An empty path is returned as `Err`; read and parse failures are reported
/// in the result.
pub fn load_database(path: &Path, config: &ImportConfig) -> Result<ParseResult, ImportError> {
    let input = match read_input(path)? {
        Ok(input) => input,
        Err(result) => return Ok(result),
    };

    let mut result = BibtexImporter
        .import(&input, &source_name(path))
        .with_source(path);
    apply_migrations(&mut result, config);
    info!(
        path = %path.display(),
        records = result.collection.len(),
        warnings = result.warnings.len(),
        "Database loaded"
    );
    Ok(result)
}

/// Open a database by file name
#[deprecated(note = "use load_database with a Path")]
pub fn load_database_by_name(name: &str, config: &ImportConfig) -> ParseResult {
    let path = Path::new(name);
    if !path.exists() {
        debug!(name, "Database file does not exist");
        return ParseResult::from_error(ImportError::FileNotFound {
            path: path.to_path_buf(),
        })
        .with_source(path);
    }
    load_database(path, config).unwrap_or_else(ParseResult::from_error)
}

/// Import the records of a `.bib` file referenced from elsewhere
pub fn import_from_bib_file(path: &Path, config: &ImportConfig) -> Result<ParseResult, ImportError> {
    load_database(path, config)
}
