//! Identifier taxonomy
//!
//! An [`Identifier`] is normalized once, when it is constructed. Fetchers only ever
//! receive the normalized value.

use super::field::Field;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of identifiers that map onto a canonical resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdentifierKind {
    /// Persistent document identifier
    Doi,
    /// Book number
    Isbn,
    /// E-print reference
    ArXiv,
}

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

impl IdentifierKind {
    pub const ALL: [IdentifierKind; 3] =
        [IdentifierKind::Doi, IdentifierKind::Isbn, IdentifierKind::ArXiv];

    /// Identifier kind stored in `field`, `None` for every other field
    pub fn from_field(field: &Field) -> Option<IdentifierKind> {
        match field {
            Field::Doi => Some(IdentifierKind::Doi),
            Field::Isbn => Some(IdentifierKind::Isbn),
            Field::Eprint => Some(IdentifierKind::ArXiv),
            _ => None,
        }
    }

    /// Field a record stores this kind of identifier in
    pub fn field(&self) -> Field {
        match self {
            IdentifierKind::Doi => Field::Doi,
            IdentifierKind::Isbn => Field::Isbn,
            IdentifierKind::ArXiv => Field::Eprint,
        }
    }

    /// Strip formatting that does not belong to the identifier itself
    pub fn normalize(&self, raw: &str) -> String {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        match self {
            IdentifierKind::Isbn => compact
                .chars()
                .filter(|c| *c != '-')
                .map(|c| c.to_ascii_uppercase())
                .collect(),
            IdentifierKind::Doi => strip_prefix_ignore_case(&compact, DOI_PREFIXES).to_string(),
            IdentifierKind::ArXiv => strip_prefix_ignore_case(&compact, &["arxiv:"]).to_string(),
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Doi => write!(f, "DOI"),
            IdentifierKind::Isbn => write!(f, "ISBN"),
            IdentifierKind::ArXiv => write!(f, "arXiv"),
        }
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefixes: &[&str]) -> &'a str {
    for prefix in prefixes {
        if value.len() >= prefix.len()
            && value.is_char_boundary(prefix.len())
            && value[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return &value[prefix.len()..];
        }
    }
    value
}

/// Normalized identifier tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    kind: IdentifierKind,
    value: String,
}

impl Identifier {
    pub fn new(kind: IdentifierKind, raw: &str) -> Self {
        Self {
            kind,
            value: kind.normalize(raw),
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// True when nothing remains after normalization
    pub fn is_blank(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}
