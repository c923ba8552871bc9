//! Legacy explicit groups → group tree
//!
//! Legacy files store groups as lines `<level> <Type>:<payload>;`, where an
//! explicit group's payload is `name\;context\;key1\;key2\;...`. Level 0 is the
//! implicit "all entries" root; level n nests under the last group of level n-1.
//!
//! The tree is converted only when every line can be interpreted. Otherwise
//! nesting would be ambiguous, so all lines are left in place.

use super::PostOpenMigration;
use bibflow_common::{Field, RecordCollection};
use tracing::warn;

const ALL_ENTRIES: &str = "AllEntriesGroup:";
const EXPLICIT: &str = "ExplicitGroup:";
const SEPARATOR: &str = "\\;";

#[derive(Debug, PartialEq)]
struct LegacyGroup {
    level: usize,
    name: String,
    keys: Vec<String>,
}

/// `None` for the all-entries root, `Some` for an explicit group
fn parse_line(line: &str) -> Result<Option<LegacyGroup>, String> {
    let (level, definition) = line
        .trim()
        .split_once(' ')
        .ok_or_else(|| format!("missing level in '{}'", line))?;
    let level: usize = level
        .parse()
        .map_err(|_| format!("invalid level '{}'", level))?;

    if definition.starts_with(ALL_ENTRIES) {
        return Ok(None);
    }
    let payload = definition
        .strip_prefix(EXPLICIT)
        .ok_or_else(|| format!("unsupported group type in '{}'", line))?;
    if level == 0 {
        return Err(format!("explicit group at level 0: '{}'", line));
    }

    let payload = payload.strip_suffix(';').unwrap_or(payload);
    let mut parts = payload.split(SEPARATOR);
    let name = parts
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| format!("group without name: '{}'", line))?;
    // hierarchical context flag; explicit groups in the tree ignore it
    let _context = parts.next();
    let keys = parts
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Some(LegacyGroup {
        level,
        name: name.to_string(),
        keys,
    }))
}

/// Converts `legacy_group_lines` into group-tree nodes
#[derive(Debug, Default, Clone, Copy)]
pub struct ConvertLegacyExplicitGroups;

impl PostOpenMigration for ConvertLegacyExplicitGroups {
    fn name(&self) -> &'static str {
        "ConvertLegacyExplicitGroups"
    }

    fn written_fields(&self) -> Vec<Field> {
        Vec::new()
    }

    fn migrate(&self, collection: &mut RecordCollection) -> usize {
        let lines = &collection.metadata.legacy_group_lines;
        if lines.is_empty() {
            return 0;
        }

        let mut groups = Vec::new();
        for line in lines {
            match parse_line(line) {
                Ok(Some(group)) => groups.push(group),
                Ok(None) => {}
                Err(reason) => {
                    warn!(%reason, "Legacy groups left unconverted");
                    return 0;
                }
            }
        }

        // validate nesting before touching the tree
        let mut depth = 0usize;
        for group in &groups {
            if group.level > depth + 1 {
                warn!(
                    group = %group.name,
                    level = group.level,
                    "Legacy groups skip a level, left unconverted"
                );
                return 0;
            }
            depth = group.level;
        }

        let mut path: Vec<String> = Vec::new();
        for group in &groups {
            path.truncate(group.level - 1);
            path.push(group.name.clone());
            if let Some((root, rest)) = path.split_first() {
                let root = collection.metadata.group_root_mut(root);
                rest.iter()
                    .fold(root, |node, name| node.child_mut(name))
                    .members
                    .extend(group.keys.iter().cloned());
            }
        }

        let consumed = collection.metadata.legacy_group_lines.len();
        collection.metadata.legacy_group_lines.clear();
        consumed
    }
}
