use std::collections::BTreeMap;

use crate::link::LinkIndex;
use crate::models::{base, ExportContext, M2mBridge, ModelKind, StagingModel};
use crate::value::{FieldValue, Record, RecordExt};
use crate::MigrationError;

pub struct Process;

impl StagingModel for Process {
    fn kind(&self) -> ModelKind {
        ModelKind::Process
    }

    fn target_table(&self) -> &'static str {
        "web_process"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["process_type", "is_active", "created_datetime"]
    }

    fn data_export(&self, mut data: Record) -> Result<Record, MigrationError> {
        base::rename(&mut data, "created_datetime", "created");
        Ok(data)
    }
}

pub struct ImportApplication;

impl StagingModel for ImportApplication {
    fn kind(&self) -> ModelKind {
        ModelKind::ImportApplication
    }

    fn target_table(&self) -> &'static str {
        "web_importapplication"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "imad_id",
            "application_type",
            "status",
            "reference",
            "submit_datetime",
            "decision",
            "refuse_reason",
            "applicant_reference",
            "create_datetime",
            "last_update_datetime",
            "variation_no",
            "legacy_case_flag",
            "licence_reference",
            "importer_id",
            "importer_office_legacy_id",
            "agent_id",
            "agent_office_legacy_id",
            "contact_id",
            "origin_country_id",
            "consignment_country_id",
            "cover_letter_text",
            "variations_xml",
        ]
    }

    fn excludes(&self) -> Vec<&'static str> {
        let mut excludes = base::excludes(self.fields());
        excludes.extend(["imad_id", "importer_office_legacy_id", "agent_office_legacy_id"]);
        excludes
    }

    fn includes(&self) -> Vec<&'static str> {
        vec!["importer_office_id", "agent_office_id"]
    }

    /// Offices are keyed by their synthesized legacy id, so the office links
    /// resolve against the staged offices.
    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        let offices = LinkIndex::build(&ctx.staging.staged(ModelKind::Office)?, &["legacy_id"]);
        let values = self.values();
        Ok(ctx
            .staging
            .staged(self.kind())?
            .into_iter()
            .map(|mut record| {
                for (legacy, resolved) in [
                    ("importer_office_legacy_id", "importer_office_id"),
                    ("agent_office_legacy_id", "agent_office_id"),
                ] {
                    let office = offices.resolve(&[record.value(legacy)]);
                    record.insert(resolved.to_string(), office.into());
                }
                base::project(record, &values)
            })
            .collect())
    }
}

pub struct OilApplication;

impl StagingModel for OilApplication {
    fn kind(&self) -> ModelKind {
        ModelKind::OilApplication
    }

    fn target_table(&self) -> &'static str {
        "web_openindividuallicenceapplication"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "section1",
            "section2",
            "know_bought_from",
            "commodity_code",
            "bought_from_details_xml",
            "user_import_certs_xml",
        ]
    }

    fn models_to_populate(&self) -> Vec<ModelKind> {
        vec![
            ModelKind::Process,
            ModelKind::ImportApplication,
            ModelKind::OilApplication,
            ModelKind::OilSupplementaryInfo,
        ]
    }
}

pub struct DflApplication;

impl StagingModel for DflApplication {
    fn kind(&self) -> ModelKind {
        ModelKind::DflApplication
    }

    fn target_table(&self) -> &'static str {
        "web_dflapplication"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "proof_checked",
            "deactivated_firearm",
            "commodity_code",
            "know_bought_from",
            "constabulary_id",
            "bought_from_details_xml",
        ]
    }

    fn models_to_populate(&self) -> Vec<ModelKind> {
        vec![
            ModelKind::Process,
            ModelKind::ImportApplication,
            ModelKind::DflApplication,
            ModelKind::DflSupplementaryInfo,
        ]
    }
}

pub struct SanctionsApplication;

impl StagingModel for SanctionsApplication {
    fn kind(&self) -> ModelKind {
        ModelKind::SanctionsApplication
    }

    fn target_table(&self) -> &'static str {
        "web_sanctionsandadhocapplication"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["exporter_name", "exporter_address"]
    }

    fn models_to_populate(&self) -> Vec<ModelKind> {
        vec![
            ModelKind::Process,
            ModelKind::ImportApplication,
            ModelKind::SanctionsApplication,
        ]
    }
}

pub struct ImportContact;

impl StagingModel for ImportContact {
    fn kind(&self) -> ModelKind {
        ModelKind::ImportContact
    }

    fn target_table(&self) -> &'static str {
        "web_importcontact"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "import_application_id",
            "legacy_id",
            "entity",
            "first_name",
            "last_name",
            "registration_number",
            "street",
            "city",
            "postcode",
            "region",
            "country_id",
            "dealer",
        ]
    }

    fn excludes(&self) -> Vec<&'static str> {
        let mut excludes = base::excludes(self.fields());
        excludes.push("legacy_id");
        excludes
    }
}

pub struct UserImportCertificate;

impl UserImportCertificate {
    /// Certificates without a constabulary, or attached to a draft that was
    /// never submitted or referenced, stay behind.
    fn migrated(ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        let applications: BTreeMap<i64, Record> = ctx
            .staging
            .staged(ModelKind::ImportApplication)?
            .into_iter()
            .filter_map(|record| record.int("id").map(|id| (id, record)))
            .collect();

        Ok(ctx
            .staging
            .staged(ModelKind::UserImportCertificate)?
            .into_iter()
            .filter(|record| !record.value("constabulary_id").is_null())
            .filter(|record| {
                record
                    .int("import_application_id")
                    .and_then(|id| applications.get(&id))
                    .is_some_and(|application| {
                        !(application.value("submit_datetime").is_null()
                            && application.value("reference").is_null())
                    })
            })
            .collect())
    }
}

impl StagingModel for UserImportCertificate {
    fn kind(&self) -> ModelKind {
        ModelKind::UserImportCertificate
    }

    fn target_table(&self) -> &'static str {
        "web_userimportcertificate"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "import_application_id",
            "target_id",
            "reference",
            "certificate_type",
            "constabulary_id",
            "date_issued",
            "expiry_date",
        ]
    }

    fn excludes(&self) -> Vec<&'static str> {
        let mut excludes = base::excludes(self.fields());
        excludes.extend(["import_application_id", "target_id"]);
        excludes
    }

    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        let values = self.values();
        Ok(Self::migrated(ctx)?
            .into_iter()
            .map(|record| base::project(record, &values))
            .collect())
    }

    fn m2m_data(
        &self,
        bridge: &M2mBridge,
        ctx: &ExportContext<'_>,
    ) -> Result<Vec<Record>, MigrationError> {
        Ok(base::m2m_data(bridge, Self::migrated(ctx)?))
    }
}

pub struct VariationRequest;

impl StagingModel for VariationRequest {
    fn kind(&self) -> ModelKind {
        ModelKind::VariationRequest
    }

    fn target_table(&self) -> &'static str {
        "web_variationrequest"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "import_application_id",
            "status",
            "is_active",
            "requested_datetime",
            "requested_by_id",
            "what_varied",
            "why_varied",
            "when_varied",
            "extension_flag",
            "reject_cancellation_reason",
            "closed_datetime",
            "closed_by_id",
        ]
    }

    fn excludes(&self) -> Vec<&'static str> {
        let mut excludes = base::excludes(self.fields());
        excludes.push("import_application_id");
        excludes
    }
}

/// Staged applications with their statuses, in id order.
///
/// # Errors
/// Returns an error when staged applications cannot be read.
pub fn application_statuses(
    ctx: &ExportContext<'_>,
) -> Result<Vec<(i64, FieldValue)>, MigrationError> {
    Ok(ctx
        .staging
        .staged(ModelKind::ImportApplication)?
        .into_iter()
        .filter_map(|mut record| {
            let id = record.int("id")?;
            Some((id, record.take("status")))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InMemoryStaging;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn record(pairs: &[(&str, FieldValue)]) -> Record {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    fn ctx(staging: &InMemoryStaging) -> ExportContext<'_> {
        ExportContext {
            staging,
            email_domain_exclude: None,
        }
    }

    #[test]
    fn process_created_is_renamed() {
        let exported = must_ok(Process.data_export(record(&[
            ("id", FieldValue::Int(1)),
            ("created_datetime", FieldValue::text("x")),
        ])));
        assert_eq!(exported.text("created"), Some("x"));
        assert!(!exported.contains_key("created_datetime"));
    }

    #[test]
    fn application_office_links_resolve_through_staged_offices() {
        let mut staging = InMemoryStaging::new();
        staging.insert(
            ModelKind::Office,
            record(&[("id", FieldValue::Int(7)), ("legacy_id", FieldValue::text("i-1-1"))]),
        );
        staging.insert(
            ModelKind::ImportApplication,
            record(&[
                ("id", FieldValue::Int(1)),
                ("imad_id", FieldValue::Int(100)),
                ("importer_office_legacy_id", FieldValue::text("i-1-1")),
                ("agent_office_legacy_id", FieldValue::text("i-9-9")),
            ]),
        );

        let rows = must_ok(ImportApplication.source_data(&ctx(&staging)));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].int("importer_office_id"), Some(7));
        assert!(rows[0].value("agent_office_id").is_null());
        assert!(!rows[0].contains_key("imad_id"));
        assert!(!rows[0].contains_key("importer_office_legacy_id"));
    }

    #[test]
    fn application_subtypes_populate_parents_first() {
        for kind in [ModelKind::OilApplication, ModelKind::DflApplication] {
            let models = crate::models::model(kind).models_to_populate();
            assert_eq!(&models[..2], &[ModelKind::Process, ModelKind::ImportApplication]);
            assert_eq!(models[2], kind);
            assert_eq!(models.len(), 4);
        }
        assert_eq!(SanctionsApplication.models_to_populate().len(), 3);
    }

    fn certificate_staging() -> InMemoryStaging {
        let mut staging = InMemoryStaging::new();
        staging.extend(
            ModelKind::ImportApplication,
            [
                record(&[
                    ("id", FieldValue::Int(1)),
                    ("reference", FieldValue::text("IMA/2022/00001")),
                ]),
                record(&[("id", FieldValue::Int(2))]),
            ],
        );
        staging.extend(
            ModelKind::UserImportCertificate,
            [
                record(&[
                    ("id", FieldValue::Int(10)),
                    ("import_application_id", FieldValue::Int(1)),
                    ("constabulary_id", FieldValue::Int(3)),
                    ("target_id", FieldValue::Int(55)),
                ]),
                record(&[
                    ("id", FieldValue::Int(11)),
                    ("import_application_id", FieldValue::Int(1)),
                    ("constabulary_id", FieldValue::Null),
                ]),
                record(&[
                    ("id", FieldValue::Int(12)),
                    ("import_application_id", FieldValue::Int(2)),
                    ("constabulary_id", FieldValue::Int(3)),
                ]),
            ],
        );
        staging
    }

    #[test]
    fn certificates_without_constabulary_or_submission_are_skipped() {
        let staging = certificate_staging();
        let rows = must_ok(UserImportCertificate.source_data(&ctx(&staging)));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].int("id"), Some(10));
        assert!(!rows[0].contains_key("target_id"));
    }

    #[test]
    fn certificate_bridge_rows_follow_the_same_filter() {
        let staging = certificate_staging();
        let bridge = M2mBridge {
            source: ModelKind::UserImportCertificate,
            target: ModelKind::OilApplication,
            table: "web_openindividuallicenceapplication_user_imported_certificates",
            link_field: "import_application_id",
        };
        let rows = must_ok(UserImportCertificate.m2m_data(&bridge, &ctx(&staging)));
        assert_eq!(rows.len(), 1);
        let exported = must_ok(UserImportCertificate.m2m_export(rows[0].clone()));
        assert_eq!(exported.int("id"), Some(1));
        assert_eq!(exported.int("openindividuallicenceapplication_id"), Some(1));
        assert_eq!(exported.int("userimportcertificate_id"), Some(10));
    }

    #[test]
    fn statuses_are_listed_in_id_order() {
        let mut staging = InMemoryStaging::new();
        staging.extend(
            ModelKind::ImportApplication,
            [
                record(&[("id", FieldValue::Int(2)), ("status", FieldValue::text("SUBMITTED"))]),
                record(&[("id", FieldValue::Int(1)), ("status", FieldValue::text("IN_PROGRESS"))]),
            ],
        );
        let statuses = must_ok(application_statuses(&ctx(&staging)));
        assert_eq!(statuses[0], (1, FieldValue::text("IN_PROGRESS")));
        assert_eq!(statuses[1], (2, FieldValue::text("SUBMITTED")));
    }
}
