//! CSL-JSON importer
//!
//! Accepts an array of CSL items or a single item. The item mapping is shared
//! with the Crossref provider, whose `works` payloads use the same vocabulary.

use super::{decode, Importer, ParseResult};
use crate::error::ImportError;
use bibflow_common::{Field, Record, RecordCollection};
use serde_json::Value;

/// Map a CSL item (or Crossref work) to a record
pub fn record_from_csl(item: &Value) -> Record {
    let csl_type = item.get("type").and_then(Value::as_str).unwrap_or("");
    let entry_type = entry_type_for(csl_type);
    let mut record = Record::new(entry_type);

    if let Some(id) = item.get("id").and_then(text) {
        record.citation_key = Some(id);
    }

    for (key, field) in [
        ("title", Field::Title),
        ("volume", Field::Volume),
        ("issue", Field::Number),
        ("page", Field::Pages),
        ("publisher", Field::Publisher),
        ("publisher-place", Field::Address),
        ("edition", Field::Edition),
        ("collection-title", Field::Series),
        ("DOI", Field::Doi),
        ("ISBN", Field::Isbn),
        ("ISSN", Field::Issn),
        ("URL", Field::Url),
        ("abstract", Field::Abstract),
        ("note", Field::Note),
        ("keyword", Field::Keywords),
    ] {
        if let Some(value) = item.get(key).and_then(text) {
            record.set_field(field, value);
        }
    }

    if let Some(container) = item.get("container-title").and_then(text) {
        let field = match entry_type {
            "inproceedings" | "incollection" => Field::BookTitle,
            _ => Field::Journal,
        };
        record.set_field(field, container);
    }

    for (key, field) in [("author", Field::Author), ("editor", Field::Editor)] {
        if let Some(names) = item.get(key).and_then(names) {
            record.set_field(field, names);
        }
    }

    let issued = ["issued", "published-print", "published-online", "created"]
        .iter()
        .find_map(|key| item.get(*key).and_then(date_parts));
    if let Some((year, month)) = issued {
        record.set_field(Field::Year, year.to_string());
        if let Some(month) = month {
            record.set_field(Field::Month, month.to_string());
        }
    }

    record
}

fn entry_type_for(csl_type: &str) -> &'static str {
    match csl_type {
        "article-journal" | "journal-article" | "article" => "article",
        "paper-conference" | "proceedings-article" => "inproceedings",
        "book" | "monograph" => "book",
        "chapter" | "book-chapter" => "incollection",
        "report" => "techreport",
        "thesis" | "dissertation" => "phdthesis",
        "manuscript" | "posted-content" => "unpublished",
        _ => "misc",
    }
}

/// Scalar text; arrays contribute their first element
fn text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => return items.iter().find_map(text),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// `[{family, given} | {literal}]` as "Family, Given and ..."
fn names(value: &Value) -> Option<String> {
    let names: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(|person| {
            if let Some(literal) = person.get("literal").and_then(Value::as_str) {
                return Some(literal.to_string());
            }
            let family = person.get("family").and_then(Value::as_str)?;
            Some(match person.get("given").and_then(Value::as_str) {
                Some(given) => format!("{}, {}", family, given),
                None => family.to_string(),
            })
        })
        .collect();
    (!names.is_empty()).then(|| names.join(" and "))
}

/// `{"date-parts": [[year, month?, day?]]}`
fn date_parts(value: &Value) -> Option<(i64, Option<i64>)> {
    let parts = value.get("date-parts")?.as_array()?.first()?.as_array()?;
    let number = |v: &Value| v.as_i64().or_else(|| v.as_str()?.parse().ok());
    let year = parts.first().and_then(number)?;
    let month = parts.get(1).and_then(number);
    Some((year, month))
}

/// CSL-JSON import format
#[derive(Debug, Default, Clone, Copy)]
pub struct CslJsonImporter;

impl CslJsonImporter {
    fn items(document: &Value) -> Option<Vec<&Value>> {
        match document {
            Value::Array(items) => Some(items.iter().collect()),
            Value::Object(_) => Some(vec![document]),
            _ => None,
        }
    }

    fn looks_like_item(item: &Value) -> bool {
        item.get("type").is_some_and(Value::is_string)
            && (item.get("title").is_some() || item.get("id").is_some())
    }
}

impl Importer for CslJsonImporter {
    fn id(&self) -> &'static str {
        "csljson"
    }

    fn name(&self) -> &'static str {
        "CSL-JSON"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn is_recognized(&self, input: &[u8]) -> bool {
        let (text, _) = decode(input);
        let trimmed = text.trim_start();
        if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
            return false;
        }
        serde_json::from_str::<Value>(trimmed)
            .ok()
            .as_ref()
            .and_then(Self::items)
            .is_some_and(|items| items.iter().any(|item| Self::looks_like_item(item)))
    }

    fn import(&self, input: &[u8], source_name: &str) -> ParseResult {
        let (text, _) = decode(input);
        let document: Value = match serde_json::from_str(&text) {
            Ok(document) => document,
            Err(e) => {
                let mut result = ParseResult::from_error(ImportError::Parse {
                    source_name: source_name.to_string(),
                    line: Some(e.line()),
                    message: e.to_string(),
                });
                result.format = Some(self.id());
                return result;
            }
        };

        let mut result = ParseResult::new(RecordCollection::new());
        result.format = Some(self.id());
        let Some(items) = Self::items(&document) else {
            result.fatal_error = Some(ImportError::Parse {
                source_name: source_name.to_string(),
                line: None,
                message: "expected a JSON array or object".to_string(),
            });
            return result;
        };

        for (index, item) in items.into_iter().enumerate() {
            if item.is_object() {
                result.collection.push(record_from_csl(item));
            } else {
                result.add_warning(format!("{}: item {} is not an object", source_name, index));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_maps_csl_item() {
        let item = json!({
            "id": "doe2020",
            "type": "article-journal",
            "title": "Graph Rewriting",
            "container-title": "Journal of Things",
            "author": [{"family": "Doe", "given": "Jane"}, {"literal": "The Team"}],
            "issued": {"date-parts": [[2020, 5]]},
            "volume": 12,
            "issue": "3",
            "page": "1-10",
            "DOI": "10.1000/xyz"
        });
        let record = record_from_csl(&item);
        assert_eq!(record.entry_type, "article");
        assert_eq!(record.citation_key.as_deref(), Some("doe2020"));
        assert_eq!(record.field(&Field::Author), Some("Doe, Jane and The Team"));
        assert_eq!(record.field(&Field::Journal), Some("Journal of Things"));
        assert_eq!(record.field(&Field::Year), Some("2020"));
        assert_eq!(record.field(&Field::Month), Some("5"));
        assert_eq!(record.field(&Field::Volume), Some("12"));
        assert_eq!(record.field(&Field::Number), Some("3"));
        assert_eq!(record.field(&Field::Doi), Some("10.1000/xyz"));
    }

    #[test]
    fn test_maps_crossref_work() {
        let work = json!({
            "type": "proceedings-article",
            "title": ["Fast Joins"],
            "container-title": ["Proc. VLDB"],
            "published-print": {"date-parts": [[2019]]},
            "ISBN": ["978-3-16-148410-0"]
        });
        let record = record_from_csl(&work);
        assert_eq!(record.entry_type, "inproceedings");
        assert_eq!(record.field(&Field::Title), Some("Fast Joins"));
        assert_eq!(record.field(&Field::BookTitle), Some("Proc. VLDB"));
        assert_eq!(record.field(&Field::Year), Some("2019"));
        assert!(!record.has_field(&Field::Month));
        assert_eq!(record.field(&Field::Isbn), Some("978-3-16-148410-0"));
    }

    #[test]
    fn test_recognition() {
        let importer = CslJsonImporter;
        assert!(importer.is_recognized(br#"[{"type": "book", "title": "T"}]"#));
        assert!(importer.is_recognized(br#"{"type": "book", "id": "x"}"#));
        assert!(!importer.is_recognized(b""));
        assert!(!importer.is_recognized(br#"{"name": "not csl"}"#));
        assert!(!importer.is_recognized(b"@misc{a,}"));
    }

    #[test]
    fn test_import_reports_json_error_line() {
        let result = CslJsonImporter.import(b"[\n{\"type\": \"book\",\n", "items.json");
        match result.fatal_error {
            Some(ImportError::Parse { line, source_name, .. }) => {
                assert_eq!(source_name, "items.json");
                assert!(line.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_object_items_warn() {
        let result = CslJsonImporter.import(br#"[{"type": "book", "title": "A"}, 3]"#, "x.json");
        assert_eq!(result.records().len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }
}
