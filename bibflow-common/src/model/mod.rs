//! Canonical record model
//!
//! Pure data shared by the importers, fetchers and migrations.

mod collection;
mod field;
mod identifier;
mod record;

pub use collection::{CollectionMetadata, GroupNode, RecordCollection};
pub use field::Field;
pub use identifier::{Identifier, IdentifierKind};
pub use record::{LinkedFile, Record};
