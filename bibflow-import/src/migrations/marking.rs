//! Legacy entry markings → groups
//!
//! Older files mark entries with `__markedentry = {[owner:level]}` (level
//! optional, default 1; several markings may be concatenated). Each marking
//! becomes membership of `Markings > owner:level`.

use super::PostOpenMigration;
use bibflow_common::{Field, RecordCollection};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

pub const MARKINGS_GROUP: &str = "Markings";
const DEFAULT_LEVEL: u32 = 1;

static MARKING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^:\]]+)(?::(\d+))?\]").expect("marking pattern is valid"));

/// `(owner, level)` pairs, or `None` when the value is not made of markings only
fn parse_markings(value: &str) -> Option<Vec<(String, u32)>> {
    let value = value.trim();
    let mut markings = Vec::new();
    let mut end = 0;
    for caps in MARKING.captures_iter(value) {
        let whole = caps.get(0)?;
        if !value[end..whole.start()].trim().is_empty() {
            return None;
        }
        end = whole.end();
        let owner = caps[1].trim().to_string();
        let level = match caps.get(2) {
            Some(level) => level.as_str().parse().ok()?,
            None => DEFAULT_LEVEL,
        };
        markings.push((owner, level));
    }
    if markings.is_empty() || !value[end..].trim().is_empty() {
        return None;
    }
    Some(markings)
}

/// Moves `__markedentry` markings into the `Markings` group subtree
#[derive(Debug, Default, Clone, Copy)]
pub struct ConvertMarkingToGroups;

impl PostOpenMigration for ConvertMarkingToGroups {
    fn name(&self) -> &'static str {
        "ConvertMarkingToGroups"
    }

    fn written_fields(&self) -> Vec<Field> {
        vec![Field::MarkedEntry]
    }

    fn migrate(&self, collection: &mut RecordCollection) -> usize {
        let mut converted = Vec::new();
        for record in &mut collection.records {
            let Some(value) = record.field(&Field::MarkedEntry) else {
                continue;
            };
            // membership is by citation key
            let Some(key) = record.citation_key.clone() else {
                continue;
            };
            let Some(markings) = parse_markings(value) else {
                debug!(key = %key, value, "Marking left unconverted");
                continue;
            };
            record.clear_field(&Field::MarkedEntry);
            converted.push((key, markings));
        }

        let count = converted.len();
        for (key, markings) in converted {
            let root = collection.metadata.group_root_mut(MARKINGS_GROUP);
            for (owner, level) in markings {
                root.child_mut(&format!("{}:{}", owner, level))
                    .members
                    .insert(key.clone());
            }
        }
        count
    }
}
