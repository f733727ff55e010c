//! Firearms supplementary information and its reports.
//!
//! OIL and DFL share the same shape. The shared layers live in
//! [`supplementary_info`] and [`supplementary_report`]; the concrete models
//! only pick their kind and table.

use std::collections::BTreeMap;

use tracing::debug;

use crate::link::LinkIndex;
use crate::models::{base, ExportContext, ModelKind, StagingModel};
use crate::value::{FieldValue, Record, RecordExt};
use crate::MigrationError;

pub mod supplementary_info {
    use super::{base, ExportContext, FieldValue, LinkIndex, ModelKind, Record, RecordExt, StagingModel};
    use crate::MigrationError;

    pub const FIELDS: &[&str] = &[
        "imad_id",
        "is_complete",
        "completed_datetime",
        "completed_by_id",
        "no_report_reason",
        "supplementary_report_xml",
    ];

    #[must_use]
    pub fn excludes(fields: &[&'static str]) -> Vec<&'static str> {
        let mut excludes = base::excludes(fields);
        excludes.push("imad_id");
        excludes
    }

    /// Links each info row to the application sharing its legacy `imad_id`.
    ///
    /// # Errors
    /// Returns an error when staged rows cannot be read.
    pub fn source_data<M: StagingModel + ?Sized>(
        model: &M,
        ctx: &ExportContext<'_>,
    ) -> Result<Vec<Record>, MigrationError> {
        let applications = LinkIndex::build(
            &ctx.staging.staged(ModelKind::ImportApplication)?,
            &["imad_id"],
        );
        let values = model.values();
        Ok(ctx
            .staging
            .staged(model.kind())?
            .into_iter()
            .map(|mut record| {
                let application = applications.resolve(&[record.value("imad_id")]);
                record.insert("import_application_id".to_string(), FieldValue::from(application));
                base::project(record, &values)
            })
            .collect())
    }
}

pub mod supplementary_report {
    use super::{
        base, debug, BTreeMap, ExportContext, FieldValue, LinkIndex, ModelKind, Record, RecordExt,
        StagingModel,
    };
    use crate::MigrationError;

    pub const FIELDS: &[&str] = &[
        "supplementary_info_id",
        "transport",
        "date_received",
        "date_received_str",
        "bought_from_legacy_id",
        "created_datetime",
        "report_firearms_xml",
    ];

    #[must_use]
    pub fn excludes(fields: &[&'static str]) -> Vec<&'static str> {
        let mut excludes = base::excludes(fields);
        excludes.extend(["bought_from_legacy_id", "date_received_str"]);
        excludes
    }

    /// Resolves the seller a report names against the contacts of the
    /// report's own application. Unknown sellers load as null.
    ///
    /// # Errors
    /// Returns an error when staged rows cannot be read.
    pub fn source_data<M: StagingModel + ?Sized>(
        model: &M,
        info: ModelKind,
        ctx: &ExportContext<'_>,
    ) -> Result<Vec<Record>, MigrationError> {
        let applications = LinkIndex::build(
            &ctx.staging.staged(ModelKind::ImportApplication)?,
            &["imad_id"],
        );
        let info_application: BTreeMap<i64, Option<i64>> = ctx
            .staging
            .staged(info)?
            .iter()
            .filter_map(|record| {
                let id = record.int("id")?;
                Some((id, applications.resolve(&[record.value("imad_id")])))
            })
            .collect();
        let contacts = LinkIndex::build(
            &ctx.staging.staged(ModelKind::ImportContact)?,
            &["import_application_id", "legacy_id"],
        );

        let values = model.values();
        Ok(ctx
            .staging
            .staged(model.kind())?
            .into_iter()
            .map(|mut record| {
                let legacy = record.value("bought_from_legacy_id").clone();
                let application = record
                    .int("supplementary_info_id")
                    .and_then(|id| info_application.get(&id).copied().flatten());
                let bought_from = match application {
                    Some(application) if !legacy.is_null() => {
                        contacts.resolve(&[&FieldValue::Int(application), &legacy])
                    }
                    _ => None,
                };
                if bought_from.is_none() && !legacy.is_null() {
                    debug!(
                        model = model.kind().as_str(),
                        report_id = record.int("id"),
                        ?legacy,
                        "bought-from contact not found; loading as null"
                    );
                }
                record.insert("bought_from_id".to_string(), FieldValue::from(bought_from));
                base::project(record, &values)
            })
            .collect())
    }
}

pub struct OilSupplementaryInfo;

impl StagingModel for OilSupplementaryInfo {
    fn kind(&self) -> ModelKind {
        ModelKind::OilSupplementaryInfo
    }

    fn target_table(&self) -> &'static str {
        "web_oilsupplementaryinfo"
    }

    fn fields(&self) -> &'static [&'static str] {
        supplementary_info::FIELDS
    }

    fn excludes(&self) -> Vec<&'static str> {
        supplementary_info::excludes(self.fields())
    }

    fn includes(&self) -> Vec<&'static str> {
        vec!["import_application_id"]
    }

    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        supplementary_info::source_data(self, ctx)
    }
}

pub struct DflSupplementaryInfo;

impl StagingModel for DflSupplementaryInfo {
    fn kind(&self) -> ModelKind {
        ModelKind::DflSupplementaryInfo
    }

    fn target_table(&self) -> &'static str {
        "web_dflsupplementaryinfo"
    }

    fn fields(&self) -> &'static [&'static str] {
        supplementary_info::FIELDS
    }

    fn excludes(&self) -> Vec<&'static str> {
        supplementary_info::excludes(self.fields())
    }

    fn includes(&self) -> Vec<&'static str> {
        vec!["import_application_id"]
    }

    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        supplementary_info::source_data(self, ctx)
    }
}

pub struct OilSupplementaryReport;

impl StagingModel for OilSupplementaryReport {
    fn kind(&self) -> ModelKind {
        ModelKind::OilSupplementaryReport
    }

    fn target_table(&self) -> &'static str {
        "web_oilsupplementaryreport"
    }

    fn fields(&self) -> &'static [&'static str] {
        supplementary_report::FIELDS
    }

    fn excludes(&self) -> Vec<&'static str> {
        supplementary_report::excludes(self.fields())
    }

    fn includes(&self) -> Vec<&'static str> {
        vec!["bought_from_id"]
    }

    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        supplementary_report::source_data(self, ModelKind::OilSupplementaryInfo, ctx)
    }
}

pub struct DflSupplementaryReport;

impl StagingModel for DflSupplementaryReport {
    fn kind(&self) -> ModelKind {
        ModelKind::DflSupplementaryReport
    }

    fn target_table(&self) -> &'static str {
        "web_dflsupplementaryreport"
    }

    fn fields(&self) -> &'static [&'static str] {
        supplementary_report::FIELDS
    }

    fn excludes(&self) -> Vec<&'static str> {
        supplementary_report::excludes(self.fields())
    }

    fn includes(&self) -> Vec<&'static str> {
        vec!["bought_from_id"]
    }

    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        supplementary_report::source_data(self, ModelKind::DflSupplementaryInfo, ctx)
    }
}

pub struct OilSupplementaryReportFirearm;

impl StagingModel for OilSupplementaryReportFirearm {
    fn kind(&self) -> ModelKind {
        ModelKind::OilSupplementaryReportFirearm
    }

    fn target_table(&self) -> &'static str {
        "web_oilsupplementaryreportfirearm"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "report_id",
            "serial_number",
            "calibre",
            "model",
            "proofing",
            "is_manual",
            "is_upload",
            "is_no_firearm",
        ]
    }
}
