//! Field taxonomy
//!
//! Field names are case-insensitive on input and always stored lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field of a bibliographic record
///
/// Ordering follows declaration order, with `Other` fields last in name order.
/// Records iterate their fields in this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Field {
    Author,
    Editor,
    Title,
    BookTitle,
    Journal,
    Year,
    Month,
    Date,
    Volume,
    Number,
    Pages,
    Publisher,
    Address,
    Edition,
    Series,
    School,
    Institution,
    Organization,
    Note,
    Abstract,
    Keywords,
    Doi,
    Isbn,
    Issn,
    Eprint,
    EprintType,
    ArchivePrefix,
    PrimaryClass,
    Url,
    File,
    Groups,
    CreationDate,

    // Special fields split out of `keywords`
    Priority,
    Ranking,
    Relevance,
    QualityAssured,
    Printed,
    ReadStatus,

    /// Legacy marking flag, `[owner:level]`
    MarkedEntry,

    /// Any field without a dedicated variant (lowercase name)
    Other(String),
}

const NAMED: &[(Field, &str)] = &[
    (Field::Author, "author"),
    (Field::Editor, "editor"),
    (Field::Title, "title"),
    (Field::BookTitle, "booktitle"),
    (Field::Journal, "journal"),
    (Field::Year, "year"),
    (Field::Month, "month"),
    (Field::Date, "date"),
    (Field::Volume, "volume"),
    (Field::Number, "number"),
    (Field::Pages, "pages"),
    (Field::Publisher, "publisher"),
    (Field::Address, "address"),
    (Field::Edition, "edition"),
    (Field::Series, "series"),
    (Field::School, "school"),
    (Field::Institution, "institution"),
    (Field::Organization, "organization"),
    (Field::Note, "note"),
    (Field::Abstract, "abstract"),
    (Field::Keywords, "keywords"),
    (Field::Doi, "doi"),
    (Field::Isbn, "isbn"),
    (Field::Issn, "issn"),
    (Field::Eprint, "eprint"),
    (Field::EprintType, "eprinttype"),
    (Field::ArchivePrefix, "archiveprefix"),
    (Field::PrimaryClass, "primaryclass"),
    (Field::Url, "url"),
    (Field::File, "file"),
    (Field::Groups, "groups"),
    (Field::CreationDate, "creationdate"),
    (Field::Priority, "priority"),
    (Field::Ranking, "ranking"),
    (Field::Relevance, "relevance"),
    (Field::QualityAssured, "qualityassured"),
    (Field::Printed, "printed"),
    (Field::ReadStatus, "readstatus"),
    (Field::MarkedEntry, "__markedentry"),
];

impl Field {
    /// Parse a field name, case-insensitively
    pub fn from_name(name: &str) -> Field {
        let lower = name.trim().to_lowercase();
        NAMED
            .iter()
            .find(|(_, n)| *n == lower)
            .map(|(f, _)| f.clone())
            .unwrap_or(Field::Other(lower))
    }

    /// Lowercase field name as written in BibTeX
    pub fn name(&self) -> &str {
        if let Field::Other(name) = self {
            return name;
        }
        NAMED
            .iter()
            .find(|(f, _)| f == self)
            .map(|(_, n)| *n)
            .unwrap_or_default()
    }

    /// Fields produced by splitting special keywords out of `keywords`
    pub fn special_fields() -> [Field; 6] {
        [
            Field::Priority,
            Field::Ranking,
            Field::Relevance,
            Field::QualityAssured,
            Field::Printed,
            Field::ReadStatus,
        ]
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::from_name(&name)
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::from_name(name)
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.name().to_string()
    }
}
