//! Format auto-detection
//!
//! Importers are consulted in a fixed priority order. Structured formats come
//! first so that a generic text recognizer never claims their input.

use super::{source_name, BibtexImporter, CslJsonImporter, Importer, ParseResult};
use crate::error::ImportError;
use std::path::Path;
use tracing::{debug, info};

/// One available import format, as listed to users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescription {
    pub id: &'static str,
    pub name: &'static str,
    /// File extensions without the leading dot
    pub extensions: &'static [&'static str],
}

/// Tries every registered importer in priority order
pub struct ImportFormatReader {
    importers: Vec<Box<dyn Importer>>,
}

impl Default for ImportFormatReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormatReader {
    /// CSL-JSON, then BibTeX
    pub fn new() -> Self {
        Self {
            importers: vec![Box::new(CslJsonImporter), Box::new(BibtexImporter)],
        }
    }

    /// Reader over a custom importer list, highest priority first
    pub fn with_importers(importers: Vec<Box<dyn Importer>>) -> Self {
        Self { importers }
    }

    /// Every available format, in priority order
    pub fn formats(&self) -> Vec<FormatDescription> {
        self.importers
            .iter()
            .map(|i| FormatDescription {
                id: i.id(),
                name: i.name(),
                extensions: i.extensions(),
            })
            .collect()
    }

    /// Parse with the first importer that recognizes `input`
    ///
    /// Unclaimed input (including zero bytes) yields a fatal
    /// [`ImportError::UnrecognizedFormat`] and no records.
    pub fn detect_and_parse(&self, input: &[u8]) -> ParseResult {
        self.detect_named(input, "<input>")
    }

    fn detect_named(&self, input: &[u8], source_name: &str) -> ParseResult {
        match self.importers.iter().find(|i| i.is_recognized(input)) {
            Some(importer) => {
                debug!(format = importer.id(), source = source_name, "Format recognized");
                importer.import(input, source_name)
            }
            None => {
                info!(source = source_name, bytes = input.len(), "No importer recognized input");
                ParseResult::from_error(ImportError::UnrecognizedFormat {
                    source_name: source_name.to_string(),
                })
            }
        }
    }

    /// Read `path` and auto-detect its format
    ///
    /// An empty path is a programmer error and returned as `Err`; every other
    /// failure is reported inside the result with the path attached.
    pub fn import_unknown_format(&self, path: &Path) -> Result<ParseResult, ImportError> {
        let input = match read_input(path)? {
            Ok(input) => input,
            Err(result) => return Ok(result),
        };
        Ok(self.detect_named(&input, &source_name(path)).with_source(path))
    }

    /// Read `path` with the format named `format_id`
    pub fn import_from_file(
        &self,
        format_id: &str,
        path: &Path,
    ) -> Result<ParseResult, ImportError> {
        let importer = self
            .importers
            .iter()
            .find(|i| i.id().eq_ignore_ascii_case(format_id))
            .ok_or_else(|| ImportError::UnknownFormat(format_id.to_string()))?;

        let input = match read_input(path)? {
            Ok(input) => input,
            Err(result) => return Ok(result),
        };
        Ok(importer.import(&input, &source_name(path)).with_source(path))
    }
}

/// File bytes, or a result carrying the read failure
pub(crate) fn read_input(path: &Path) -> Result<Result<Vec<u8>, ParseResult>, ImportError> {
    if path.as_os_str().is_empty() {
        return Err(ImportError::InvalidArgument("import path is empty".to_string()));
    }
    match std::fs::read(path) {
        Ok(input) => Ok(Ok(input)),
        Err(e) => {
            let error = if e.kind() == std::io::ErrorKind::NotFound {
                ImportError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ImportError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            };
            Ok(Err(ParseResult::from_error(error).with_source(path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_zero_bytes_unrecognized() {
        let result = ImportFormatReader::new().detect_and_parse(b"");
        assert!(result.records().is_empty());
        assert!(matches!(
            result.fatal_error,
            Some(ImportError::UnrecognizedFormat { .. })
        ));
    }

    #[test]
    fn test_priority_order() {
        let reader = ImportFormatReader::new();
        let formats = reader.formats();
        let ids: Vec<_> = formats.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["csljson", "bibtex"]);
        assert_eq!(formats[1].name, "BibTeX");
        assert_eq!(formats[1].extensions, &["bib"]);
        let result = reader.detect_and_parse(br#"[{"type": "book", "title": "T"}]"#);
        assert_eq!(result.format, Some("csljson"));
        let result = reader.detect_and_parse(b"@book{k, title = {T}}");
        assert_eq!(result.format, Some("bibtex"));
    }

    #[test]
    fn test_empty_path_is_invalid_argument() {
        let result = ImportFormatReader::new().import_unknown_format(Path::new(""));
        assert!(matches!(result, Err(ImportError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_file_reported_in_result() {
        let path = Path::new("/nonexistent/refs.bib");
        let result = ImportFormatReader::new().import_unknown_format(path).unwrap();
        assert_eq!(result.source.as_deref(), Some(path));
        assert!(matches!(result.fatal_error, Some(ImportError::FileNotFound { .. })));
    }

    #[test]
    fn test_import_from_file_by_format() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"@misc{k, title = {T}}").unwrap();

        let reader = ImportFormatReader::new();
        let result = reader.import_from_file("BibTeX", file.path()).unwrap();
        assert_eq!(result.records().len(), 1);
        assert_eq!(result.source.as_deref(), Some(file.path()));

        let unknown = reader.import_from_file("ris", file.path());
        assert!(matches!(unknown, Err(ImportError::UnknownFormat(name)) if name == "ris"));
    }
}
