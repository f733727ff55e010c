//! Import application queries.
//!
//! All subtypes share one base query, parameterized by `:ima_type`,
//! `:ima_sub_type` and the V2 `:process_type`. Rows are:
//!
//! - current versions only (`status_control = 'C'`), never `DELETED`;
//! - submitted, unless the application type is still current, in which case
//!   drafts touched within the last 14 days are kept as well.

use crate::query::{LegacyQuery, XmlColumn};

const IMPORT_APPLICATION_BASE: &str = "
SELECT
  :process_type process_type
  , 1 is_active
  , ia.created_datetime created_datetime
  , xiad.imad_id
  , iat.ima_type || '-' || iat.ima_sub_type application_type
  , xiad.status
  , ia.case_ref reference
  , xiad.submitted_datetime submit_datetime
  , xiad.response_decision decision
  , xiad.refuse_reason
  , xiad.applicant_reference
  , ia.created_datetime create_datetime
  , xiad.last_updated_datetime last_update_datetime
  , xiad.variation_no
  , xiad.legacy_case_flag
  , ir.licence_ref licence_reference
  , xiad.importer_id
  , CASE WHEN xiad.importer_id IS NULL THEN NULL
      ELSE 'i-' || xiad.importer_id || '-' || xiad.importer_office_id END importer_office_legacy_id
  , xiad.agent_id
  , CASE WHEN xiad.agent_id IS NULL THEN NULL
      ELSE 'i-' || xiad.agent_id || '-' || xiad.agent_office_id END agent_office_legacy_id
  , NULL contact_id
  , xiad.coo_country_id origin_country_id
  , xiad.coc_country_id consignment_country_id
  , ad.xml_data
FROM xview_ima_details xiad
INNER JOIN import_applications ia ON ia.id = xiad.ima_id
INNER JOIN import_application_types iat
  ON iat.ima_type = xiad.ima_type AND iat.ima_sub_type = xiad.ima_sub_type
INNER JOIN import_application_details ad ON ad.id = xiad.imad_id AND ad.status_control = 'C'
LEFT JOIN ima_responses ir ON ir.ima_id = xiad.ima_id AND ir.licence_ref IS NOT NULL
WHERE xiad.ima_type = :ima_type
  AND xiad.ima_sub_type = :ima_sub_type
  AND xiad.status_control = 'C'
  AND xiad.status <> 'DELETED'
  AND (
    xiad.submitted_datetime IS NOT NULL
    OR (iat.status = 'CURRENT' AND xiad.last_updated_datetime > datetime('now', '-14 days'))
  )
ORDER BY xiad.imad_id
";

/// Same filter as the base query, counted.
pub const IMPORT_APPLICATION_COUNT: &str = "
SELECT COUNT(*)
FROM xview_ima_details xiad
INNER JOIN import_application_types iat
  ON iat.ima_type = xiad.ima_type AND iat.ima_sub_type = xiad.ima_sub_type
INNER JOIN import_application_details ad ON ad.id = xiad.imad_id AND ad.status_control = 'C'
WHERE xiad.ima_type = :ima_type
  AND xiad.ima_sub_type = :ima_sub_type
  AND xiad.status_control = 'C'
  AND xiad.status <> 'DELETED'
  AND (
    xiad.submitted_datetime IS NOT NULL
    OR (iat.status = 'CURRENT' AND xiad.last_updated_datetime > datetime('now', '-14 days'))
  )
";

pub const OIL_BINDS: &[(&str, &str)] = &[(":ima_type", "FA"), (":ima_sub_type", "OIL")];

pub const DFL_BINDS: &[(&str, &str)] = &[(":ima_type", "FA"), (":ima_sub_type", "DEACTIVATED")];

pub const SANCTIONS_BINDS: &[(&str, &str)] = &[(":ima_type", "ADHOC"), (":ima_sub_type", "ADHOC1")];

pub const OIL: LegacyQuery = LegacyQuery {
    name: "fa_oil",
    sql: IMPORT_APPLICATION_BASE,
    binds: &[
        (":ima_type", "FA"),
        (":ima_sub_type", "OIL"),
        (":process_type", "OpenIndividualLicenceApplication"),
    ],
    xml_source: Some("xml_data"),
    xml_columns: &[
        XmlColumn::fragment("variations_xml", "/IMA/APP_PROCESSING/VARIATIONS/VARIATION_REQUEST_LIST"),
        XmlColumn::text("cover_letter_text", "/IMA/APP_PROCESSING/RESPONSE/APPROVE/COVER_LETTER"),
        XmlColumn::flag("section1", "/IMA/APP_DETAILS/FA_GOODS_SECTIONS/SECTION1[not(fox-error)]"),
        XmlColumn::flag("section2", "/IMA/APP_DETAILS/FA_GOODS_SECTIONS/SECTION2[not(fox-error)]"),
        XmlColumn::flag("know_bought_from", "/IMA/APP_DETAILS/SELLER_HOLDER/KNOW_BOUGHT_FROM"),
        XmlColumn::text("commodity_code", "/IMA/APP_DETAILS/COMMODITY_GROUP"),
        XmlColumn::fragment("bought_from_details_xml", "/IMA/APP_DETAILS/SELLER_HOLDER/SELLER_HOLDER_LIST"),
        XmlColumn::fragment("user_import_certs_xml", "/IMA/APP_DETAILS/FIREARMS_CERTIFICATE_LIST"),
        XmlColumn::flag("is_complete", "/IMA/FA_REPORTS/REPORTING_COMPLETE"),
        XmlColumn::text("completed_datetime", "/IMA/FA_REPORTS/COMPLETED_DATETIME"),
        XmlColumn::int("completed_by_id", "/IMA/FA_REPORTS/COMPLETED_BY_WUA_ID"),
        XmlColumn::text("no_report_reason", "/IMA/FA_REPORTS/NO_REPORT_REASON"),
        XmlColumn::fragment("supplementary_report_xml", "/IMA/FA_REPORTS/FA_SUPPLEMENTARY_REPORT_LIST"),
    ],
};

pub const DFL: LegacyQuery = LegacyQuery {
    name: "fa_dfl",
    sql: IMPORT_APPLICATION_BASE,
    binds: &[
        (":ima_type", "FA"),
        (":ima_sub_type", "DEACTIVATED"),
        (":process_type", "DFLApplication"),
    ],
    xml_source: Some("xml_data"),
    xml_columns: &[
        XmlColumn::fragment("variations_xml", "/IMA/APP_PROCESSING/VARIATIONS/VARIATION_REQUEST_LIST"),
        XmlColumn::text("cover_letter_text", "/IMA/APP_PROCESSING/RESPONSE/APPROVE/COVER_LETTER"),
        XmlColumn::flag("proof_checked", "/IMA/APP_PROCESSING/CHECKLIST/PROOF_CHECKED"),
        XmlColumn::flag("deactivated_firearm", "/IMA/APP_DETAILS/DEACTIVATED_FIREARM"),
        XmlColumn::text("commodity_code", "/IMA/APP_DETAILS/COMMODITY_GROUP"),
        XmlColumn::flag("know_bought_from", "/IMA/APP_DETAILS/SELLER_HOLDER/KNOW_BOUGHT_FROM"),
        XmlColumn::int("constabulary_id", "/IMA/APP_DETAILS/CONSTABULARY"),
        XmlColumn::fragment("bought_from_details_xml", "/IMA/APP_DETAILS/SELLER_HOLDER/SELLER_HOLDER_LIST"),
        XmlColumn::flag("is_complete", "/IMA/FA_REPORTS/REPORTING_COMPLETE"),
        XmlColumn::text("completed_datetime", "/IMA/FA_REPORTS/COMPLETED_DATETIME"),
        XmlColumn::int("completed_by_id", "/IMA/FA_REPORTS/COMPLETED_BY_WUA_ID"),
        XmlColumn::text("no_report_reason", "/IMA/FA_REPORTS/NO_REPORT_REASON"),
        XmlColumn::fragment("supplementary_report_xml", "/IMA/FA_REPORTS/FA_SUPPLEMENTARY_REPORT_LIST"),
    ],
};

pub const SANCTIONS: LegacyQuery = LegacyQuery {
    name: "sanctions",
    sql: IMPORT_APPLICATION_BASE,
    binds: &[
        (":ima_type", "ADHOC"),
        (":ima_sub_type", "ADHOC1"),
        (":process_type", "SanctionsAndAdhocApplication"),
    ],
    xml_source: Some("xml_data"),
    xml_columns: &[
        XmlColumn::fragment("variations_xml", "/IMA/APP_PROCESSING/VARIATIONS/VARIATION_REQUEST_LIST"),
        XmlColumn::text("cover_letter_text", "/IMA/APP_PROCESSING/RESPONSE/APPROVE/COVER_LETTER"),
        XmlColumn::text("exporter_name", "/IMA/APP_DETAILS/EXPORTER_NAME"),
        XmlColumn::text("exporter_address", "/IMA/APP_DETAILS/EXPORTER_ADDRESS"),
    ],
};
