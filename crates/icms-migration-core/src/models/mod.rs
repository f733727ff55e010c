//! Staging models and their export hooks.
//!
//! Every concrete model is a unit struct implementing [`StagingModel`]. The
//! provided methods delegate to [`base`]; overrides that extend shared
//! behaviour call the base (or an intermediate layer such as
//! [`supplementary`]) explicitly and add to its result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Record;
use crate::MigrationError;

pub mod base;
pub mod import_application;
pub mod reference;
pub mod supplementary;
pub mod user;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ModelKind {
    Country,
    Constabulary,
    Template,
    User,
    Email,
    PhoneNumber,
    Importer,
    Exporter,
    Office,
    Process,
    ImportApplication,
    OilApplication,
    DflApplication,
    SanctionsApplication,
    ImportContact,
    UserImportCertificate,
    VariationRequest,
    OilSupplementaryInfo,
    DflSupplementaryInfo,
    OilSupplementaryReport,
    DflSupplementaryReport,
    OilSupplementaryReportFirearm,
}

impl ModelKind {
    pub const ALL: [Self; 22] = [
        Self::Country,
        Self::Constabulary,
        Self::Template,
        Self::User,
        Self::Email,
        Self::PhoneNumber,
        Self::Importer,
        Self::Exporter,
        Self::Office,
        Self::Process,
        Self::ImportApplication,
        Self::OilApplication,
        Self::DflApplication,
        Self::SanctionsApplication,
        Self::ImportContact,
        Self::UserImportCertificate,
        Self::VariationRequest,
        Self::OilSupplementaryInfo,
        Self::DflSupplementaryInfo,
        Self::OilSupplementaryReport,
        Self::DflSupplementaryReport,
        Self::OilSupplementaryReportFirearm,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Country => "Country",
            Self::Constabulary => "Constabulary",
            Self::Template => "Template",
            Self::User => "User",
            Self::Email => "Email",
            Self::PhoneNumber => "PhoneNumber",
            Self::Importer => "Importer",
            Self::Exporter => "Exporter",
            Self::Office => "Office",
            Self::Process => "Process",
            Self::ImportApplication => "ImportApplication",
            Self::OilApplication => "OpenIndividualLicenceApplication",
            Self::DflApplication => "DFLApplication",
            Self::SanctionsApplication => "SanctionsAndAdhocApplication",
            Self::ImportContact => "ImportContact",
            Self::UserImportCertificate => "UserImportCertificate",
            Self::VariationRequest => "VariationRequest",
            Self::OilSupplementaryInfo => "OILSupplementaryInfo",
            Self::DflSupplementaryInfo => "DFLSupplementaryInfo",
            Self::OilSupplementaryReport => "OILSupplementaryReport",
            Self::DflSupplementaryReport => "DFLSupplementaryReport",
            Self::OilSupplementaryReportFirearm => "OILSupplementaryReportFirearm",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Lower-cased model name, used for M2M bridge column names.
    #[must_use]
    pub fn model_name(self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Bridge column referencing this model, e.g. `importer_id`.
    #[must_use]
    pub fn bridge_column(self) -> String {
        format!("{}_id", self.model_name())
    }
}

/// Read access to staged records, ordered by id.
pub trait StagingRead {
    /// # Errors
    /// Returns [`MigrationError::Staging`] when staged rows cannot be read.
    fn staged(&self, kind: ModelKind) -> Result<Vec<Record>, MigrationError>;
}

/// A staging area held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStaging {
    records: BTreeMap<ModelKind, Vec<Record>>,
}

impl InMemoryStaging {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ModelKind, record: Record) {
        self.records.entry(kind).or_default().push(record);
    }

    pub fn extend(&mut self, kind: ModelKind, records: impl IntoIterator<Item = Record>) {
        self.records.entry(kind).or_default().extend(records);
    }
}

impl StagingRead for InMemoryStaging {
    fn staged(&self, kind: ModelKind) -> Result<Vec<Record>, MigrationError> {
        let mut records = self.records.get(&kind).cloned().unwrap_or_default();
        records.sort_by_key(|record| {
            record
                .get("id")
                .and_then(crate::value::FieldValue::as_i64)
                .unwrap_or_default()
        });
        Ok(records)
    }
}

/// Explicit inputs to [`StagingModel::source_data`].
#[derive(Clone, Copy)]
pub struct ExportContext<'a> {
    pub staging: &'a dyn StagingRead,
    pub email_domain_exclude: Option<&'a str>,
}

/// A many-to-many relation rebuilt from a 1:N staged link field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct M2mBridge {
    pub source: ModelKind,
    pub target: ModelKind,
    pub table: &'static str,
    /// Staged field on `source` holding the `target` id.
    pub link_field: &'static str,
}

/// Per-model export hooks.
pub trait StagingModel: Sync {
    fn kind(&self) -> ModelKind;

    fn target_table(&self) -> &'static str;

    /// Staged fields, excluding `id`.
    fn fields(&self) -> &'static [&'static str];

    /// Staged fields that never reach the target.
    fn excludes(&self) -> Vec<&'static str> {
        base::excludes(self.fields())
    }

    /// Derived fields computed in [`StagingModel::source_data`].
    fn includes(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn values(&self) -> Vec<&'static str> {
        base::values(self.fields(), &self.excludes(), &self.includes())
    }

    /// Models populated from one row of this model's legacy query, parents
    /// first.
    fn models_to_populate(&self) -> Vec<ModelKind> {
        vec![self.kind()]
    }

    /// # Errors
    /// Returns an error when staged rows cannot be read or linked.
    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        base::source_data(self, ctx)
    }

    /// # Errors
    /// Returns an error when a derived field cannot be computed.
    fn data_export(&self, data: Record) -> Result<Record, MigrationError> {
        Ok(data)
    }

    /// # Errors
    /// Returns an error when staged rows cannot be read.
    fn m2m_data(
        &self,
        bridge: &M2mBridge,
        ctx: &ExportContext<'_>,
    ) -> Result<Vec<Record>, MigrationError> {
        Ok(base::m2m_data(bridge, ctx.staging.staged(self.kind())?))
    }

    /// # Errors
    /// Returns an error when the bridge row is malformed.
    fn m2m_export(&self, data: Record) -> Result<Record, MigrationError> {
        Ok(base::m2m_export(data))
    }
}

/// Export hooks for `kind`.
#[must_use]
pub fn model(kind: ModelKind) -> &'static dyn StagingModel {
    match kind {
        ModelKind::Country => &reference::Country,
        ModelKind::Constabulary => &reference::Constabulary,
        ModelKind::Template => &reference::Template,
        ModelKind::User => &user::User,
        ModelKind::Email => &user::Email,
        ModelKind::PhoneNumber => &user::PhoneNumber,
        ModelKind::Importer => &user::Importer,
        ModelKind::Exporter => &user::Exporter,
        ModelKind::Office => &user::Office,
        ModelKind::Process => &import_application::Process,
        ModelKind::ImportApplication => &import_application::ImportApplication,
        ModelKind::OilApplication => &import_application::OilApplication,
        ModelKind::DflApplication => &import_application::DflApplication,
        ModelKind::SanctionsApplication => &import_application::SanctionsApplication,
        ModelKind::ImportContact => &import_application::ImportContact,
        ModelKind::UserImportCertificate => &import_application::UserImportCertificate,
        ModelKind::VariationRequest => &import_application::VariationRequest,
        ModelKind::OilSupplementaryInfo => &supplementary::OilSupplementaryInfo,
        ModelKind::DflSupplementaryInfo => &supplementary::DflSupplementaryInfo,
        ModelKind::OilSupplementaryReport => &supplementary::OilSupplementaryReport,
        ModelKind::DflSupplementaryReport => &supplementary::DflSupplementaryReport,
        ModelKind::OilSupplementaryReportFirearm => {
            &supplementary::OilSupplementaryReportFirearm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_and_dispatch_to_themselves() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::parse(kind.as_str()), Some(kind));
            assert_eq!(model(kind).kind(), kind);
        }
    }

    #[test]
    fn target_tables_are_unique() {
        let mut tables: Vec<&str> = ModelKind::ALL
            .iter()
            .map(|kind| model(*kind).target_table())
            .collect();
        tables.sort_unstable();
        tables.dedup();
        assert_eq!(tables.len(), ModelKind::ALL.len());
    }

    #[test]
    fn every_model_exports_its_id_and_no_xml_payloads() {
        for kind in ModelKind::ALL {
            let values = model(kind).values();
            assert!(values.contains(&"id"), "{kind:?} must export id");
            assert!(
                values.iter().all(|value| !value.ends_with("_xml")),
                "{kind:?} leaks an xml payload"
            );
        }
    }

    #[test]
    fn bridge_columns_follow_model_names() {
        assert_eq!(ModelKind::Importer.bridge_column(), "importer_id");
        assert_eq!(
            ModelKind::OilApplication.bridge_column(),
            "openindividuallicenceapplication_id"
        );
    }
}
