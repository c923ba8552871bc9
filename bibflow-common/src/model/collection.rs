//! Record collections and the group tree

use super::record::Record;
use crate::strings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Explicit group with member citation keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupNode {
    pub name: String,
    pub members: BTreeSet<String>,
    pub children: Vec<GroupNode>,
}

impl GroupNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Child named `name`, created at the end when missing
    pub fn child_mut(&mut self, name: &str) -> &mut GroupNode {
        let index = match self.children.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.children.push(GroupNode::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    pub fn child(&self, name: &str) -> Option<&GroupNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, citation_key: &str) -> bool {
        self.members.contains(citation_key)
    }
}

/// Collection-level metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub encoding: Option<String>,
    pub source_path: Option<PathBuf>,
    /// Top-level groups
    pub groups: Vec<GroupNode>,
    /// Group definitions in the pre-tree line encoding, consumed by migration
    pub legacy_group_lines: Vec<String>,
}

impl CollectionMetadata {
    /// Top-level group named `name`, created when missing
    pub fn group_root_mut(&mut self, name: &str) -> &mut GroupNode {
        let index = match self.groups.iter().position(|g| g.name == name) {
            Some(index) => index,
            None => {
                self.groups.push(GroupNode::new(name));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }

    pub fn group_root(&self, name: &str) -> Option<&GroupNode> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Ordered records plus their string symbol table and metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordCollection {
    pub records: Vec<Record>,
    strings: BTreeMap<String, String>,
    pub metadata: CollectionMetadata,
}

impl RecordCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Define a string macro, replacing an earlier definition
    pub fn add_string(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.strings.insert(name.into(), value.into());
    }

    pub fn strings(&self) -> &BTreeMap<String, String> {
        &self.strings
    }

    /// Expand `#name#` references against this collection's strings
    pub fn resolve_strings(&self, value: &str) -> String {
        strings::resolve(value, &self.strings)
    }

    pub fn record_by_key(&self, citation_key: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.citation_key.as_deref() == Some(citation_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_strings_uses_symbol_table() {
        let mut collection = RecordCollection::new();
        collection.add_string("acm", "Association for Computing Machinery");
        assert_eq!(
            collection.resolve_strings("#acm# Press"),
            "Association for Computing Machinery Press"
        );
    }

    #[test]
    fn test_group_root_created_once() {
        let mut metadata = CollectionMetadata::default();
        metadata.group_root_mut("Markings").child_mut("alice:1");
        metadata.group_root_mut("Markings").child_mut("alice:1");
        assert_eq!(metadata.groups.len(), 1);
        assert_eq!(metadata.groups[0].children.len(), 1);
    }
}
