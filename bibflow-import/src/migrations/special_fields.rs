//! Special keywords → separate fields
//!
//! Older files encoded ratings and reading state as magic keywords. Each such
//! keyword moves into its own field. A keyword whose field already holds a
//! different value stays in `keywords`.

use super::PostOpenMigration;
use bibflow_common::{Field, Record, RecordCollection};

/// Target field for a special keyword
fn special_field(keyword: &str) -> Option<Field> {
    match keyword {
        "prio1" | "prio2" | "prio3" => Some(Field::Priority),
        "rank1" | "rank2" | "rank3" | "rank4" | "rank5" => Some(Field::Ranking),
        "relevant" => Some(Field::Relevance),
        "qualityAssured" => Some(Field::QualityAssured),
        "printed" => Some(Field::Printed),
        "read" | "skimmed" => Some(Field::ReadStatus),
        _ => None,
    }
}

/// Splits special keywords out of `keywords`
#[derive(Debug, Clone, Copy)]
pub struct SpecialFieldsToSeparateFields {
    keyword_delimiter: char,
}

impl SpecialFieldsToSeparateFields {
    pub fn new(keyword_delimiter: char) -> Self {
        Self { keyword_delimiter }
    }

    /// True when the record changed
    fn migrate_record(&self, record: &mut Record) -> bool {
        let Some(keywords) = record.field(&Field::Keywords) else {
            return false;
        };
        let keywords: Vec<String> = keywords
            .split(self.keyword_delimiter)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();

        let mut kept = Vec::with_capacity(keywords.len());
        let mut moved = false;
        for keyword in keywords {
            let Some(field) = special_field(&keyword) else {
                kept.push(keyword);
                continue;
            };
            match record.field(&field) {
                Some(existing) if existing != keyword => kept.push(keyword),
                Some(_) => moved = true,
                None => {
                    record.set_field(field, keyword);
                    moved = true;
                }
            }
        }

        if !moved {
            return false;
        }
        if kept.is_empty() {
            record.clear_field(&Field::Keywords);
        } else {
            let separator = format!("{} ", self.keyword_delimiter);
            record.set_field(Field::Keywords, kept.join(&separator));
        }
        true
    }
}

impl PostOpenMigration for SpecialFieldsToSeparateFields {
    fn name(&self) -> &'static str {
        "SpecialFieldsToSeparateFields"
    }

    fn written_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::Keywords];
        fields.extend(Field::special_fields());
        fields
    }

    fn migrate(&self, collection: &mut RecordCollection) -> usize {
        collection
            .records
            .iter_mut()
            .map(|record| self.migrate_record(record))
            .filter(|changed| *changed)
            .count()
    }
}
