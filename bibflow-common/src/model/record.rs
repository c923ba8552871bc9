//! Bibliographic record

use super::field::Field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File or link attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedFile {
    pub description: String,
    pub link: String,
    pub file_type: String,
}

impl LinkedFile {
    pub fn new(
        description: impl Into<String>,
        link: impl Into<String>,
        file_type: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            link: link.into(),
            file_type: file_type.into(),
        }
    }

    /// Parse the `description:link:type;...` encoding of the `file` field
    ///
    /// Segments with fewer than three parts are treated as a bare link.
    pub fn parse_list(value: &str) -> Vec<LinkedFile> {
        value
            .split(';')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                let parts: Vec<&str> = segment.splitn(3, ':').collect();
                match parts.as_slice() {
                    [description, link, file_type]
                        if !link.is_empty() && !file_type.starts_with("//") =>
                    {
                        LinkedFile::new(*description, *link, *file_type)
                    }
                    _ => LinkedFile::new("", segment, ""),
                }
            })
            .collect()
    }
}

/// A single bibliographic record
///
/// Fields are kept in [`Field`] order. Equality compares citation keys when both
/// records carry one, and the full structure otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub entry_type: String,
    pub citation_key: Option<String>,
    fields: BTreeMap<Field, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<LinkedFile>,
}

impl Record {
    pub fn new(entry_type: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into().to_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_citation_key(mut self, key: impl Into<String>) -> Self {
        self.citation_key = Some(key.into());
        self
    }

    pub fn with_field(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set_field(field, value);
        self
    }

    pub fn field(&self, field: &Field) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn has_field(&self, field: &Field) -> bool {
        self.fields.contains_key(field)
    }

    /// Set a field, returning the previous value
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) -> Option<String> {
        self.fields.insert(field, value.into())
    }

    /// Remove a field, returning its value
    pub fn clear_field(&mut self, field: &Field) -> Option<String> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&Field, &str)> {
        self.fields.iter().map(|(f, v)| (f, v.as_str()))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Four-digit year from `year`, falling back to the start of `date`
    pub fn year(&self) -> Option<&str> {
        if let Some(year) = self.field(&Field::Year) {
            return Some(year.trim());
        }
        self.field(&Field::Date)
            .and_then(|date| date.get(..4))
            .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        match (&self.citation_key, &other.citation_key) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.citation_key == other.citation_key
                    && self.entry_type == other.entry_type
                    && self.fields == other.fields
                    && self.files == other.files
            }
        }
    }
}
