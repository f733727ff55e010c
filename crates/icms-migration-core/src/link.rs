//! Two-pass resolution of loosely linked legacy ids.
//!
//! The first pass indexes staged rows by a composite legacy key, the second
//! resolves references against the index. A key that matches nothing, or
//! holds a null component, resolves to `None`.

use std::collections::HashMap;

use crate::value::{FieldValue, Record, RecordExt};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Int(i64),
    Text(String),
}

impl KeyPart {
    fn from_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Int(number) => Some(Self::Int(*number)),
            FieldValue::Text(text) => {
                let trimmed = text.trim();
                match trimmed.parse::<i64>() {
                    Ok(number) => Some(Self::Int(number)),
                    Err(_) if !trimmed.is_empty() => Some(Self::Text(trimmed.to_string())),
                    Err(_) => None,
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    entries: HashMap<Vec<KeyPart>, i64>,
    duplicates: usize,
}

impl LinkIndex {
    /// Indexes `records` by `key_fields`. The first record (in id order) wins
    /// when several share a key.
    #[must_use]
    pub fn build(records: &[Record], key_fields: &[&str]) -> Self {
        let mut index = Self::default();
        for record in records {
            let Some(id) = record.int("id") else {
                continue;
            };
            let Some(key) = key_of(key_fields.iter().map(|field| record.value(field))) else {
                continue;
            };
            if index.entries.contains_key(&key) {
                index.duplicates += 1;
            } else {
                index.entries.insert(key, id);
            }
        }
        index
    }

    #[must_use]
    pub fn resolve(&self, key: &[&FieldValue]) -> Option<i64> {
        let key = key_of(key.iter().copied())?;
        self.entries.get(&key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records shadowed by an earlier record with the same key.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

fn key_of<'a>(values: impl Iterator<Item = &'a FieldValue>) -> Option<Vec<KeyPart>> {
    values.map(KeyPart::from_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: i64, application: i64, legacy: &str) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), FieldValue::Int(id));
        record.insert("import_application_id".to_string(), FieldValue::Int(application));
        record.insert("legacy_id".to_string(), FieldValue::text(legacy));
        record
    }

    #[test]
    fn resolves_scoped_legacy_ids() {
        let index = LinkIndex::build(
            &[contact(1, 10, "1"), contact(2, 10, "2"), contact(3, 11, "1")],
            &["import_application_id", "legacy_id"],
        );
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.resolve(&[&FieldValue::Int(11), &FieldValue::Int(1)]),
            Some(3)
        );
        assert_eq!(
            index.resolve(&[&FieldValue::Int(10), &FieldValue::text(" 2 ")]),
            Some(2)
        );
    }

    #[test]
    fn unmatched_and_null_keys_resolve_to_none() {
        let index = LinkIndex::build(&[contact(1, 10, "1")], &["import_application_id", "legacy_id"]);
        assert_eq!(index.resolve(&[&FieldValue::Int(12), &FieldValue::Int(1)]), None);
        assert_eq!(index.resolve(&[&FieldValue::Int(10), &FieldValue::Null]), None);
    }

    #[test]
    fn first_record_wins_on_duplicate_keys() {
        let index = LinkIndex::build(
            &[contact(1, 10, "1"), contact(2, 10, "1")],
            &["import_application_id", "legacy_id"],
        );
        assert_eq!(index.duplicates(), 1);
        assert_eq!(
            index.resolve(&[&FieldValue::Int(10), &FieldValue::Int(1)]),
            Some(1)
        );
    }
}
