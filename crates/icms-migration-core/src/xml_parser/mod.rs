//! Explodes XML payload columns of staged parents into child records.
//!
//! A parser reads one `*_xml` field of a parent model, walks its root node
//! set and turns every matching element into a child record. Ids are not
//! assigned here: the caller allocates them in document order.

use roxmltree::{Document, Node};
use time::Date;
use tracing::warn;

use crate::format::{date_or_none, int_or_none};
use crate::models::ModelKind;
use crate::value::{FieldValue, Record};
use crate::xml::{get_xml_val, select_nodes};
use crate::MigrationError;

pub mod import_application;
pub mod supplementary;
pub mod user;

pub use import_application::{ImportContactParser, UserImportCertificateParser, VariationRequestParser};
pub use supplementary::{ReportFirearmParser, SupplementaryReportParser};
pub use user::{EmailParser, PhoneNumberParser};

pub trait FragmentParser: Sync {
    /// Staged model holding the payload.
    fn parent(&self) -> ModelKind;

    /// Payload field on the parent.
    fn field(&self) -> &'static str;

    /// Child model produced.
    fn model(&self) -> ModelKind;

    /// Absolute XPath of the repeated child element.
    fn root_node(&self) -> &'static str;

    /// Builds one child from one element. `Ok(None)` skips an element that
    /// lacks a mandatory value.
    ///
    /// # Errors
    /// Returns [`MigrationError::UnmappedCode`] or
    /// [`MigrationError::InvalidValue`] when a value cannot be converted.
    fn parse_xml_fields(
        &self,
        parent_pk: i64,
        node: Node<'_, '_>,
    ) -> Result<Option<Record>, MigrationError>;

    /// Parses a batch of `(parent_pk, payload)` pairs. Blank payloads yield
    /// nothing; malformed ones are logged and skipped.
    ///
    /// # Errors
    /// Propagates conversion errors from [`FragmentParser::parse_xml_fields`].
    fn parse_xml(&self, batch: &[(i64, String)]) -> Result<Vec<Record>, MigrationError> {
        let mut children = Vec::new();
        for (parent_pk, payload) in batch {
            if payload.trim().is_empty() {
                continue;
            }
            let document = match Document::parse(payload) {
                Ok(document) => document,
                Err(err) => {
                    warn!(
                        parent = self.parent().as_str(),
                        field = self.field(),
                        parent_pk,
                        error = %err,
                        "skipping malformed xml payload"
                    );
                    continue;
                }
            };
            for node in select_nodes(document.root(), self.root_node())? {
                if let Some(child) = self.parse_xml_fields(*parent_pk, node)? {
                    children.push(child);
                }
            }
        }
        Ok(children)
    }
}

/// Every parser, grouped in extraction order: parents are exploded before
/// the fragments they produce.
#[must_use]
pub fn all() -> Vec<&'static dyn FragmentParser> {
    vec![
        &user::EmailParser,
        &user::PhoneNumberParser,
        &import_application::OIL_IMPORT_CONTACTS,
        &import_application::DFL_IMPORT_CONTACTS,
        &import_application::UserImportCertificateParser,
        &import_application::VariationRequestParser,
        &supplementary::OIL_REPORTS,
        &supplementary::DFL_REPORTS,
        &supplementary::ReportFirearmParser,
    ]
}

pub(crate) fn text(node: Node<'_, '_>, path: &str) -> Result<Option<String>, MigrationError> {
    get_xml_val(node, path)
}

pub(crate) fn int(node: Node<'_, '_>, path: &str) -> Result<Option<i64>, MigrationError> {
    int_or_none(&FieldValue::from(text(node, path)?))
}

pub(crate) fn date(node: Node<'_, '_>, path: &str) -> Result<Option<Date>, MigrationError> {
    date_or_none(&FieldValue::from(text(node, path)?))
}

/// Maps a legacy code through `table`. A blank code is absent; an unknown
/// one aborts the run.
pub(crate) fn mapped(
    field: &str,
    code: Option<String>,
    table: &[(&str, &'static str)],
) -> Result<Option<&'static str>, MigrationError> {
    let Some(code) = code else {
        return Ok(None);
    };
    table
        .iter()
        .find(|(legacy, _)| *legacy == code)
        .map(|(_, mapped)| Some(*mapped))
        .ok_or(MigrationError::UnmappedCode {
            field: field.to_string(),
            code,
        })
}

pub(crate) fn insert(record: &mut Record, field: &str, value: impl Into<FieldValue>) {
    record.insert(field.to_string(), value.into());
}
