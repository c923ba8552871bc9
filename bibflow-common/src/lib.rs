//! # bibflow Common Library
//!
//! Shared code for the bibflow crates:
//! - Canonical record model and identifier/field taxonomy
//! - String macro resolution
//! - Configuration loading
//! - Timestamp collaborator

pub mod config;
pub mod error;
pub mod model;
pub mod strings;
pub mod time;

pub use error::{Error, Result};
pub use model::{Field, Identifier, IdentifierKind, Record, RecordCollection};
