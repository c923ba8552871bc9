//! Post-import migrations
//!
//! Rewrites a freshly parsed collection into current conventions. Migrations
//! run in a fixed order, never fail, and leave data they cannot interpret
//! untouched. Running the chain twice is the same as running it once.
//!
//! # Order
//! 1. [`ConvertLegacyExplicitGroups`] - legacy group-tree lines → group nodes
//! 2. [`ConvertMarkingToGroups`] - `__markedentry` → `Markings` group
//! 3. [`SpecialFieldsToSeparateFields`] - special keywords → own fields
//!
//! Group-tree writes land in disjoint subtrees: legacy groups keep their own
//! names, markings live under the `Markings` root.

pub mod legacy_groups;
pub mod marking;
pub mod special_fields;

use bibflow_common::{Field, RecordCollection};
use tracing::debug;

pub use legacy_groups::ConvertLegacyExplicitGroups;
pub use marking::ConvertMarkingToGroups;
pub use special_fields::SpecialFieldsToSeparateFields;

/// One structural rewrite of a collection
pub trait PostOpenMigration {
    fn name(&self) -> &'static str;

    /// Record fields this migration may set or clear
    fn written_fields(&self) -> Vec<Field>;

    /// Apply in place; returns the number of records or lines changed
    fn migrate(&self, collection: &mut RecordCollection) -> usize;
}

/// The ordered migration chain
pub struct MigrationChain {
    migrations: Vec<Box<dyn PostOpenMigration>>,
}

impl MigrationChain {
    pub fn new(keyword_delimiter: char) -> Self {
        Self {
            migrations: vec![
                Box::new(ConvertLegacyExplicitGroups),
                Box::new(ConvertMarkingToGroups),
                Box::new(SpecialFieldsToSeparateFields::new(keyword_delimiter)),
            ],
        }
    }

    pub fn migrations(&self) -> &[Box<dyn PostOpenMigration>] {
        &self.migrations
    }

    /// Run every migration in order
    pub fn migrate(&self, collection: &mut RecordCollection) {
        for migration in &self.migrations {
            let changed = migration.migrate(collection);
            if changed > 0 {
                debug!(migration = migration.name(), changed, "Migration applied");
            }
        }
    }
}
