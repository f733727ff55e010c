//! Shared export behaviour every staging model starts from.

use crate::models::{ExportContext, M2mBridge, StagingModel};
use crate::value::{FieldValue, Record, RecordExt};
use crate::MigrationError;

/// XML payload columns are staging-only.
#[must_use]
pub fn excludes(fields: &[&'static str]) -> Vec<&'static str> {
    fields
        .iter()
        .copied()
        .filter(|field| field.ends_with("_xml"))
        .collect()
}

/// `id`, then every staged field not excluded, then the derived includes.
#[must_use]
pub fn values(
    fields: &[&'static str],
    excludes: &[&'static str],
    includes: &[&'static str],
) -> Vec<&'static str> {
    let mut values = vec!["id"];
    values.extend(
        fields
            .iter()
            .copied()
            .filter(|field| !excludes.contains(field) && *field != "id"),
    );
    for include in includes {
        if !values.contains(include) {
            values.push(*include);
        }
    }
    values
}

/// Keeps only `values`, filling absent keys with null.
#[must_use]
pub fn project(mut record: Record, values: &[&str]) -> Record {
    values
        .iter()
        .map(|field| ((*field).to_string(), record.take(field)))
        .collect()
}

/// Staged rows of `model`, projected onto its exported values.
///
/// # Errors
/// Returns an error when the staging area cannot be read.
pub fn source_data<M: StagingModel + ?Sized>(
    model: &M,
    ctx: &ExportContext<'_>,
) -> Result<Vec<Record>, MigrationError> {
    let values = model.values();
    Ok(ctx
        .staging
        .staged(model.kind())?
        .into_iter()
        .map(|record| project(record, &values))
        .collect())
}

/// One bridge row per staged record with a non-null link, numbered from 1.
#[must_use]
pub fn m2m_data(bridge: &M2mBridge, records: Vec<Record>) -> Vec<Record> {
    let source_column = bridge.source.bridge_column();
    let target_column = bridge.target.bridge_column();

    records
        .into_iter()
        .filter(|record| !record.value(bridge.link_field).is_null())
        .enumerate()
        .map(|(index, mut record)| {
            let mut row = Record::new();
            row.insert(
                "row_number".to_string(),
                FieldValue::Int(i64::try_from(index).unwrap_or(i64::MAX) + 1),
            );
            row.insert(target_column.clone(), record.take(bridge.link_field));
            row.insert(source_column.clone(), record.take("id"));
            row
        })
        .collect()
}

/// The synthetic row number becomes the bridge row id.
#[must_use]
pub fn m2m_export(mut data: Record) -> Record {
    let row_number = data.take("row_number");
    data.insert("id".to_string(), row_number);
    data
}

/// Renames `from` to `to`, keeping the value.
pub fn rename(data: &mut Record, from: &str, to: &str) {
    let value = data.take(from);
    data.insert(to.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;

    #[test]
    fn values_put_id_first_and_skip_excludes() {
        let fields = ["name", "notes_xml", "legacy_id"];
        let values = values(&fields, &["notes_xml", "legacy_id"], &["bought_from_id"]);
        assert_eq!(values, vec!["id", "name", "bought_from_id"]);
    }

    #[test]
    fn base_excludes_are_xml_payloads() {
        assert_eq!(excludes(&["a", "b_xml", "c"]), vec!["b_xml"]);
    }

    #[test]
    fn project_fills_missing_with_null() {
        let mut record = Record::new();
        record.insert("id".to_string(), FieldValue::Int(1));
        record.insert("dropped".to_string(), FieldValue::Int(2));
        let projected = project(record, &["id", "missing"]);
        assert_eq!(projected.len(), 2);
        assert!(projected.value("missing").is_null());
    }

    #[test]
    fn m2m_rows_skip_null_links_and_number_from_one() {
        let bridge = M2mBridge {
            source: ModelKind::Office,
            target: ModelKind::Importer,
            table: "web_importer_offices",
            link_field: "importer_id",
        };
        let mut linked = Record::new();
        linked.insert("id".to_string(), FieldValue::Int(10));
        linked.insert("importer_id".to_string(), FieldValue::Int(4));
        let mut unlinked = Record::new();
        unlinked.insert("id".to_string(), FieldValue::Int(11));

        let rows = m2m_data(&bridge, vec![unlinked, linked]);
        assert_eq!(rows.len(), 1);
        let exported = m2m_export(rows[0].clone());
        assert_eq!(exported.int("id"), Some(1));
        assert_eq!(exported.int("importer_id"), Some(4));
        assert_eq!(exported.int("office_id"), Some(10));
        assert!(!exported.contains_key("row_number"));
    }
}
