use tracing::warn;

use crate::format::{int_or_none, str_to_bool};
use crate::models::ModelKind;
use crate::value::FieldValue;
use crate::xml::{fragment_text, node_text, XPath};
use crate::MigrationError;

/// How an `XMLTABLE` column is projected out of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlKind {
    /// `VARCHAR2 PATH '...'`
    Text,
    /// `INTEGER PATH '...'`
    Int,
    /// A `Y`/`N`/`true`/`false` flag, projected as a boolean.
    Flag,
    /// `XMLTYPE PATH '...'`, kept as the serialized fragment.
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlColumn {
    pub name: &'static str,
    pub path: &'static str,
    pub kind: XmlKind,
}

impl XmlColumn {
    #[must_use]
    pub const fn text(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path,
            kind: XmlKind::Text,
        }
    }

    #[must_use]
    pub const fn int(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path,
            kind: XmlKind::Int,
        }
    }

    #[must_use]
    pub const fn flag(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path,
            kind: XmlKind::Flag,
        }
    }

    #[must_use]
    pub const fn fragment(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path,
            kind: XmlKind::Fragment,
        }
    }
}

/// A parameterized legacy query. Row order is significant: it is the order
/// primary keys are allocated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyQuery {
    pub name: &'static str,
    pub sql: &'static str,
    pub binds: &'static [(&'static str, &'static str)],
    /// Column holding the XML payload the projections read from. It is
    /// removed from the projected row.
    pub xml_source: Option<&'static str>,
    pub xml_columns: &'static [XmlColumn],
}

impl LegacyQuery {
    /// Replaces the XML payload column with the declared projections.
    ///
    /// A missing or malformed payload projects every column as null.
    ///
    /// # Errors
    /// Returns [`MigrationError::Configuration`] for an invalid XPath or a
    /// payload column missing from the result set, and
    /// [`MigrationError::InvalidValue`] when an integer projection holds
    /// non-integer text.
    pub fn project(
        &self,
        columns: &[String],
        rows: Vec<Vec<FieldValue>>,
    ) -> Result<(Vec<String>, Vec<Vec<FieldValue>>), MigrationError> {
        let Some(source) = self.xml_source else {
            return Ok((columns.to_vec(), rows));
        };

        let source_index = columns
            .iter()
            .position(|column| column == source)
            .ok_or_else(|| {
                MigrationError::Configuration(format!(
                    "query {} does not return xml column {source}",
                    self.name
                ))
            })?;

        let paths = self
            .xml_columns
            .iter()
            .map(|column| XPath::parse(column.path).map(|path| (column, path)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut projected_columns: Vec<String> = columns
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != source_index)
            .map(|(_, column)| column.clone())
            .collect();
        projected_columns.extend(self.xml_columns.iter().map(|column| column.name.to_string()));

        let mut projected_rows = Vec::with_capacity(rows.len());
        for mut row in rows {
            let payload = if source_index < row.len() {
                row.remove(source_index)
            } else {
                FieldValue::Null
            };
            let values = self.project_payload(&payload, &paths)?;
            row.extend(values);
            projected_rows.push(row);
        }

        Ok((projected_columns, projected_rows))
    }

    fn project_payload(
        &self,
        payload: &FieldValue,
        paths: &[(&XmlColumn, XPath)],
    ) -> Result<Vec<FieldValue>, MigrationError> {
        let nulls = || vec![FieldValue::Null; paths.len()];
        let Some(xml) = payload.as_str().filter(|xml| !xml.trim().is_empty()) else {
            return Ok(nulls());
        };

        let document = match roxmltree::Document::parse(xml) {
            Ok(document) => document,
            Err(err) => {
                warn!(query = self.name, error = %err, "skipping malformed xml payload");
                return Ok(nulls());
            }
        };

        let mut values = Vec::with_capacity(paths.len());
        for (column, path) in paths {
            let node = path.select(document.root_element()).into_iter().next();
            let value = match (column.kind, node) {
                (_, None) => FieldValue::Null,
                (XmlKind::Fragment, Some(node)) => fragment_text(node, xml).into(),
                (XmlKind::Text, Some(node)) => node_text(node).into(),
                (XmlKind::Int, Some(node)) => {
                    int_or_none(&node_text(node).into())
                        .map_err(|err| MigrationError::InvalidValue {
                            field: column.name.to_string(),
                            message: err.to_string(),
                        })?
                        .into()
                }
                (XmlKind::Flag, Some(node)) => str_to_bool(node_text(node).as_deref())
                    .map_err(|err| match err {
                        MigrationError::UnmappedCode { code, .. } => MigrationError::UnmappedCode {
                            field: column.name.to_string(),
                            code,
                        },
                        other => other,
                    })?
                    .into(),
            };
            values.push(value);
        }
        Ok(values)
    }
}

/// How staged primary keys are chosen for a query model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkStrategy {
    /// The query returns an `id` column holding the legacy id.
    Legacy,
    /// Allocate from `next_pk` of the root model, one per row in query order.
    Allocate,
}

/// A legacy query and the staging models each of its rows populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryModel {
    pub query: &'static LegacyQuery,
    pub model: ModelKind,
    pub pk: PkStrategy,
}

/// Receives each drained chunk of `(columns, rows)`.
pub type RowSink<'a> =
    dyn FnMut(&[String], Vec<Vec<FieldValue>>) -> Result<(), MigrationError> + 'a;

/// A read-only connection to the legacy replica.
pub trait LegacySource {
    /// Runs `query` and feeds its rows to `sink` in chunks of at most
    /// `chunk_size`, preserving query order. Returns the number of rows read.
    ///
    /// # Errors
    /// Returns [`MigrationError::Query`] when the query cannot be executed, or
    /// whatever the sink returns.
    fn fetch(
        &self,
        query: &LegacyQuery,
        chunk_size: usize,
        sink: &mut RowSink<'_>,
    ) -> Result<usize, MigrationError>;

    /// Runs a scalar count query with named binds.
    ///
    /// # Errors
    /// Returns [`MigrationError::Query`] when the query fails.
    fn count(
        &self,
        name: &str,
        sql: &str,
        binds: &[(&str, &str)],
    ) -> Result<i64, MigrationError>;
}
