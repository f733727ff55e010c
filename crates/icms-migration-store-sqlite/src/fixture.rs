//! A small legacy replica used by tests and local dry runs.
//!
//! The tables mirror the V1 views the export queries read, reduced to the
//! columns they select. The seeded rows cover every migration group:
//! the system user and a login without an email (both left behind), an
//! importer whose user is not migrated, an exporter office with a free-text
//! postcode, a submitted OIL application with sellers, certificates, a
//! variation and a supplementary report, a recent OIL draft, a completed DFL
//! application and a sanctions application.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

pub const LEGACY_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS country (
  country_id INTEGER PRIMARY KEY,
  country_name TEXT NOT NULL,
  status TEXT NOT NULL,
  country_type TEXT NOT NULL,
  commission_code TEXT,
  hmrc_code TEXT
);

CREATE TABLE IF NOT EXISTS constabularies (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  region TEXT NOT NULL,
  email TEXT,
  status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS templates (
  t_id INTEGER NOT NULL,
  status_control TEXT NOT NULL,
  start_datetime TEXT,
  end_datetime TEXT,
  status TEXT NOT NULL,
  template_name TEXT NOT NULL,
  template_code TEXT,
  template_type TEXT NOT NULL,
  application_domain TEXT NOT NULL,
  template_title TEXT,
  template_content TEXT
);

CREATE TABLE IF NOT EXISTS wua_details (
  wua_id INTEGER NOT NULL,
  status_control TEXT NOT NULL,
  login_id TEXT NOT NULL,
  first_name TEXT,
  last_name TEXT,
  account_status TEXT NOT NULL,
  salt TEXT,
  encrypted_password TEXT,
  last_login_datetime TEXT,
  date_created_datetime TEXT,
  title TEXT,
  organisation TEXT,
  department TEXT,
  job_title TEXT,
  date_of_birth TEXT,
  xml_data TEXT
);

CREATE TABLE IF NOT EXISTS xview_importers (
  imp_id INTEGER NOT NULL,
  status_control TEXT NOT NULL,
  status TEXT NOT NULL,
  importer_type TEXT NOT NULL,
  organisation_name TEXT,
  registered_number TEXT,
  eori_number TEXT,
  region_origin TEXT,
  person_wua_id INTEGER,
  comments TEXT,
  main_imp_id INTEGER
);

CREATE TABLE IF NOT EXISTS xview_exporters (
  e_id INTEGER NOT NULL,
  status_control TEXT NOT NULL,
  status TEXT NOT NULL,
  organisation_name TEXT NOT NULL,
  registered_number TEXT,
  comments TEXT,
  main_e_id INTEGER,
  exclusive_correspondence INTEGER
);

CREATE TABLE IF NOT EXISTS xview_importer_offices (
  imp_id INTEGER NOT NULL,
  office_id INTEGER NOT NULL,
  status_control TEXT NOT NULL,
  status TEXT NOT NULL,
  postcode TEXT,
  address TEXT,
  eori_number TEXT,
  address_entry_type TEXT
);

CREATE TABLE IF NOT EXISTS xview_exporter_offices (
  e_id INTEGER NOT NULL,
  office_id INTEGER NOT NULL,
  status_control TEXT NOT NULL,
  status TEXT NOT NULL,
  postcode TEXT,
  address TEXT,
  address_entry_type TEXT
);

CREATE TABLE IF NOT EXISTS import_application_types (
  ima_type TEXT NOT NULL,
  ima_sub_type TEXT NOT NULL,
  status TEXT NOT NULL,
  PRIMARY KEY (ima_type, ima_sub_type)
);

CREATE TABLE IF NOT EXISTS import_applications (
  id INTEGER PRIMARY KEY,
  case_ref TEXT,
  created_datetime TEXT
);

CREATE TABLE IF NOT EXISTS import_application_details (
  id INTEGER PRIMARY KEY,
  status_control TEXT NOT NULL,
  xml_data TEXT
);

CREATE TABLE IF NOT EXISTS xview_ima_details (
  imad_id INTEGER PRIMARY KEY,
  ima_id INTEGER NOT NULL,
  ima_type TEXT NOT NULL,
  ima_sub_type TEXT NOT NULL,
  status_control TEXT NOT NULL,
  status TEXT NOT NULL,
  submitted_datetime TEXT,
  response_decision TEXT,
  refuse_reason TEXT,
  applicant_reference TEXT,
  last_updated_datetime TEXT,
  variation_no INTEGER NOT NULL DEFAULT 0,
  legacy_case_flag INTEGER,
  importer_id INTEGER,
  importer_office_id INTEGER,
  agent_id INTEGER,
  agent_office_id INTEGER,
  coo_country_id INTEGER,
  coc_country_id INTEGER
);

CREATE TABLE IF NOT EXISTS ima_responses (
  ima_id INTEGER NOT NULL,
  licence_ref TEXT
);
";

const REFERENCE_ROWS: &str = r#"
INSERT INTO country VALUES
  (1, 'United Kingdom', 'ACTIVE', 'SOVEREIGN_TERRITORY', NULL, 'GB'),
  (2, 'France', 'ACTIVE', 'SOVEREIGN_TERRITORY', 'FR', 'FR'),
  (3, 'Atlantis', 'INACTIVE', 'SYSTEM', NULL, NULL);

INSERT INTO constabularies VALUES
  (1, 'Avon and Somerset', 'SW', 'firearms@example.police.uk', 'ACTIVE'),
  (2, 'Bedfordshire', 'E', NULL, 'ACTIVE');

INSERT INTO templates VALUES
  (1, 'C', '2020-01-01 00:00:00', NULL, 'ACTIVE', 'Cover letter', 'COVER_FIREARMS',
   'LETTER_TEMPLATE', 'IMA', 'Cover', '<p foxid="ABCDEF_123456789">Dear <MM>IMPORTER_NAME</MM></p>'),
  (1, 'H', '2019-01-01 00:00:00', NULL, 'ACTIVE', 'Cover letter', 'COVER_FIREARMS',
   'LETTER_TEMPLATE', 'IMA', 'Cover', '<p>superseded</p>'),
  (2, 'C', '2020-01-01 00:00:00', NULL, 'INACTIVE', 'Refusal', NULL,
   'EMAIL_TEMPLATE', 'IMA', 'Refused', 'Your application was refused');
"#;

const USER_ROWS: &str = r"
INSERT INTO wua_details VALUES
  (0, 'C', 'SYSTEM', 'System', 'User', 'ACTIVE', NULL, NULL, NULL, NULL,
   NULL, NULL, NULL, NULL, NULL, NULL),
  (1, 'C', 'legacy-login', 'No', 'Email', 'ACTIVE', 'pepper', 'secret', NULL, '2015-03-01 09:00:00',
   NULL, NULL, NULL, NULL, NULL,
   '<WUA><PERSONAL_EMAIL_LIST/></WUA>'),
  (2, 'C', 'ann@example.com', 'Ann', 'Example', 'ACTIVE', 'salty', 'hash', '2023-05-01 08:30:00',
   '2016-04-01 12:00:00', 'Ms', 'Firearms Ltd', 'Imports', 'Manager', '1980-01-31',
   '<WUA><PERSONAL_EMAIL_LIST>'
   || '<PERSONAL_EMAIL><EMAIL_ADDRESS>ann@example.com</EMAIL_ADDRESS><TYPE>WORK</TYPE>'
   || '<PORTAL_NOTIFICATIONS>Primary</PORTAL_NOTIFICATIONS></PERSONAL_EMAIL>'
   || '<PERSONAL_EMAIL><EMAIL_ADDRESS>ann@home.example</EMAIL_ADDRESS><TYPE>HOME</TYPE>'
   || '<PORTAL_NOTIFICATIONS>No</PORTAL_NOTIFICATIONS><COMMENT>weekends</COMMENT></PERSONAL_EMAIL>'
   || '</PERSONAL_EMAIL_LIST><TELEPHONE_NO_LIST>'
   || '<TELEPHONE_NO><PHONE>01234 567890</PHONE><TYPE>WORK</TYPE></TELEPHONE_NO>'
   || '</TELEPHONE_NO_LIST></WUA>'),
  (3, 'C', 'bob@example.com', 'Bob', 'Example', 'SUSPENDED', NULL, NULL, NULL,
   '2018-09-12 15:45:00', NULL, NULL, NULL, NULL, NULL,
   '<WUA><PERSONAL_EMAIL_LIST>'
   || '<PERSONAL_EMAIL><EMAIL_ADDRESS>bob@example.com</EMAIL_ADDRESS>'
   || '<PORTAL_NOTIFICATIONS>Yes</PORTAL_NOTIFICATIONS></PERSONAL_EMAIL>'
   || '</PERSONAL_EMAIL_LIST></WUA>'),
  (3, 'H', 'bob@old.example', 'Bob', 'Example', 'ACTIVE', NULL, NULL, NULL,
   NULL, NULL, NULL, NULL, NULL, NULL, NULL);

INSERT INTO xview_importers VALUES
  (1, 'C', 'CURRENT', 'ORGANISATION', 'Firearms Ltd', '0123456', 'GB123456789000', NULL, 2, NULL, NULL),
  (2, 'C', 'CURRENT', 'INDIVIDUAL', NULL, NULL, NULL, NULL, 1, 'Sole trader', NULL);

INSERT INTO xview_exporters VALUES
  (1, 'C', 'CURRENT', 'Export Co', '987654', NULL, NULL, 0);

INSERT INTO xview_importer_offices VALUES
  (1, 1, 'C', 'CURRENT', 'GB SW1A 1AA', '1 Import Road' || char(10) || 'London', 'GB123456789000', 'MANUAL'),
  (2, 1, 'C', 'CURRENT', 'LS1 4AP', '2 Dealer Lane' || char(10) || 'Leeds', NULL, 'SEARCH'),
  (2, 2, 'H', 'ARCHIVED', 'LS1 4AP', 'Old address', NULL, 'MANUAL');

INSERT INTO xview_exporter_offices VALUES
  (1, 1, 'C', 'CURRENT', 'EXPORTERS HOUSE LONG POSTCODE', '1 Export Street', 'MANUAL');
";

const OIL_SUBMITTED_XML: &str = "<IMA>\
<APP_PROCESSING>\
<VARIATIONS><VARIATION_REQUEST_LIST><VARIATION_REQUEST>\
<REQUEST_DATE>2023-01-05</REQUEST_DATE><STATUS>CLOSED</STATUS>\
<REQUEST_BY_WUA_ID>2</REQUEST_BY_WUA_ID><WHAT_VARIED>Quantity</WHAT_VARIED>\
<WHY_VARIED>Order grew</WHY_VARIED><DATE_VARIED>2023-01-20</DATE_VARIED>\
<EXTENSION_FLAG>N</EXTENSION_FLAG><CLOSED_DATE>2023-01-09</CLOSED_DATE>\
<CLOSED_BY_WUA_ID>3</CLOSED_BY_WUA_ID>\
</VARIATION_REQUEST></VARIATION_REQUEST_LIST></VARIATIONS>\
<RESPONSE><APPROVE><COVER_LETTER>Approved</COVER_LETTER></APPROVE></RESPONSE>\
</APP_PROCESSING>\
<APP_DETAILS>\
<FA_GOODS_SECTIONS><SECTION1>Y</SECTION1><SECTION2>N</SECTION2></FA_GOODS_SECTIONS>\
<COMMODITY_GROUP>ex Chapter 93</COMMODITY_GROUP>\
<SELLER_HOLDER><KNOW_BOUGHT_FROM>Y</KNOW_BOUGHT_FROM><SELLER_HOLDER_LIST><SELLER_HOLDER>\
<SELLER_HOLDER_ID>5</SELLER_HOLDER_ID>\
<PERSON_DETAILS><PERSON_TYPE>ORGANISATION</PERSON_TYPE><LEGAL_PERSON_NAME>Guns R Us</LEGAL_PERSON_NAME>\
<REGISTRATION_NUMBER>RFD-1</REGISTRATION_NUMBER></PERSON_DETAILS>\
<ADDRESS><STREET_AND_NUMBER>1 Main St</STREET_AND_NUMBER><TOWN_CITY>Leeds</TOWN_CITY>\
<POSTCODE>LS1 1AA</POSTCODE><COUNTRY>1</COUNTRY></ADDRESS>\
<IS_DEALER>Y</IS_DEALER>\
</SELLER_HOLDER></SELLER_HOLDER_LIST></SELLER_HOLDER>\
<FIREARMS_CERTIFICATE_LIST><FIREARMS_CERTIFICATE>\
<TARGET_ID>900</TARGET_ID><CERTIFICATE_REF>FA-123</CERTIFICATE_REF>\
<CERTIFICATE_TYPE>FIREARMS</CERTIFICATE_TYPE><CONSTABULARY>1</CONSTABULARY>\
<DATE_ISSUED>2020-01-02</DATE_ISSUED><EXPIRY_DATE>02/01/2025</EXPIRY_DATE>\
</FIREARMS_CERTIFICATE></FIREARMS_CERTIFICATE_LIST>\
</APP_DETAILS>\
<FA_REPORTS>\
<REPORTING_COMPLETE>Y</REPORTING_COMPLETE><COMPLETED_DATETIME>2023-03-01T12:00:00</COMPLETED_DATETIME>\
<COMPLETED_BY_WUA_ID>2</COMPLETED_BY_WUA_ID>\
<FA_SUPPLEMENTARY_REPORT_LIST><FA_SUPPLEMENTARY_REPORT><FA_SUPPLEMENTARY_REPORT_DETAILS>\
<MODE_OF_TRANSPORT>AIR</MODE_OF_TRANSPORT>\
<DATE_FIREARMS_RECEIVED>01/02/2023</DATE_FIREARMS_RECEIVED>\
<REPORT_SELLER_HOLDER>5</REPORT_SELLER_HOLDER>\
<REPORT_SUBMITTED_DATETIME>2023-02-02T10:00:00</REPORT_SUBMITTED_DATETIME>\
<GOODS_LINE_LIST>\
<GOODS_LINE><FIREARM_REPORTING_TYPE>MANUAL</FIREARM_REPORTING_TYPE><SERIAL_NUMBER>SN1</SERIAL_NUMBER>\
<CALIBRE>9mm</CALIBRE><MODEL>M1</MODEL><PROOFED>Y</PROOFED></GOODS_LINE>\
<GOODS_LINE><FIREARM_REPORTING_TYPE>UPLOAD</FIREARM_REPORTING_TYPE></GOODS_LINE>\
</GOODS_LINE_LIST>\
</FA_SUPPLEMENTARY_REPORT_DETAILS></FA_SUPPLEMENTARY_REPORT>\
<FA_SUPPLEMENTARY_REPORT/>\
</FA_SUPPLEMENTARY_REPORT_LIST>\
</FA_REPORTS>\
</IMA>";

const OIL_DRAFT_XML: &str = "<IMA>\
<APP_DETAILS>\
<FA_GOODS_SECTIONS><SECTION1><fox-error/>Y</SECTION1></FA_GOODS_SECTIONS>\
<FIREARMS_CERTIFICATE_LIST><FIREARMS_CERTIFICATE>\
<TARGET_ID>901</TARGET_ID><CERTIFICATE_REF>FA-456</CERTIFICATE_REF>\
<CERTIFICATE_TYPE>SHOTGUN</CERTIFICATE_TYPE><CONSTABULARY>2</CONSTABULARY>\
</FIREARMS_CERTIFICATE></FIREARMS_CERTIFICATE_LIST>\
</APP_DETAILS>\
</IMA>";

const DFL_XML: &str = "<IMA>\
<APP_PROCESSING><CHECKLIST><PROOF_CHECKED>Y</PROOF_CHECKED></CHECKLIST></APP_PROCESSING>\
<APP_DETAILS>\
<DEACTIVATED_FIREARM>Y</DEACTIVATED_FIREARM><COMMODITY_GROUP>ex Chapter 97</COMMODITY_GROUP>\
<CONSTABULARY>2</CONSTABULARY>\
<SELLER_HOLDER><KNOW_BOUGHT_FROM>Y</KNOW_BOUGHT_FROM><SELLER_HOLDER_LIST><SELLER_HOLDER>\
<SELLER_HOLDER_ID>7</SELLER_HOLDER_ID>\
<PERSON_DETAILS><PERSON_TYPE>INDIVIDUAL</PERSON_TYPE><FIRST_NAME>Sam</FIRST_NAME><LAST_NAME>Seller</LAST_NAME></PERSON_DETAILS>\
<ADDRESS><COUNTRY>2</COUNTRY></ADDRESS><IS_DEALER>N/A</IS_DEALER>\
</SELLER_HOLDER></SELLER_HOLDER_LIST></SELLER_HOLDER>\
</APP_DETAILS>\
<FA_REPORTS><REPORTING_COMPLETE>N</REPORTING_COMPLETE></FA_REPORTS>\
</IMA>";

const SANCTIONS_XML: &str = "<IMA>\
<APP_DETAILS><EXPORTER_NAME>Overseas Supplier</EXPORTER_NAME>\
<EXPORTER_ADDRESS>1 Harbour Road</EXPORTER_ADDRESS></APP_DETAILS>\
</IMA>";

struct SeedApplication {
    imad_id: i64,
    ima_id: i64,
    ima_type: &'static str,
    sub_type: &'static str,
    status_control: &'static str,
    status: &'static str,
    submitted: Option<&'static str>,
    xml: &'static str,
}

// 11 is a recent draft, 12 a superseded version, 40 deleted.
const APPLICATIONS: [SeedApplication; 6] = [
    SeedApplication {
        imad_id: 10,
        ima_id: 100,
        ima_type: "FA",
        sub_type: "OIL",
        status_control: "C",
        status: "PROCESSING",
        submitted: Some("2022-11-02 10:00:00"),
        xml: OIL_SUBMITTED_XML,
    },
    SeedApplication {
        imad_id: 11,
        ima_id: 101,
        ima_type: "FA",
        sub_type: "OIL",
        status_control: "C",
        status: "IN_PROGRESS",
        submitted: None,
        xml: OIL_DRAFT_XML,
    },
    SeedApplication {
        imad_id: 12,
        ima_id: 100,
        ima_type: "FA",
        sub_type: "OIL",
        status_control: "H",
        status: "PROCESSING",
        submitted: Some("2022-11-02 10:00:00"),
        xml: OIL_SUBMITTED_XML,
    },
    SeedApplication {
        imad_id: 20,
        ima_id: 102,
        ima_type: "FA",
        sub_type: "DEACTIVATED",
        status_control: "C",
        status: "COMPLETED",
        submitted: Some("2022-12-02 10:00:00"),
        xml: DFL_XML,
    },
    SeedApplication {
        imad_id: 30,
        ima_id: 103,
        ima_type: "ADHOC",
        sub_type: "ADHOC1",
        status_control: "C",
        status: "COMPLETED",
        submitted: Some("2023-01-11 10:00:00"),
        xml: SANCTIONS_XML,
    },
    SeedApplication {
        imad_id: 40,
        ima_id: 104,
        ima_type: "FA",
        sub_type: "OIL",
        status_control: "C",
        status: "DELETED",
        submitted: Some("2021-01-02 10:00:00"),
        xml: OIL_DRAFT_XML,
    },
];

/// Creates the legacy tables on `conn` and seeds the reference rows.
pub fn seed_legacy_replica(conn: &Connection) -> Result<()> {
    conn.execute_batch(LEGACY_SCHEMA)
        .context("failed to create legacy replica tables")?;
    conn.execute_batch(REFERENCE_ROWS)
        .context("failed to seed legacy reference data")?;
    conn.execute_batch(USER_ROWS)
        .context("failed to seed legacy users and organisations")?;
    seed_import_applications(conn)
}

/// Writes a seeded replica to `path`, for tests that drive the CLI.
pub fn write_legacy_replica(path: &Path) -> Result<()> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to create legacy replica at {}", path.display()))?;
    seed_legacy_replica(&conn)
}

fn seed_import_applications(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "INSERT INTO import_application_types VALUES
           ('FA', 'OIL', 'CURRENT'),
           ('FA', 'DEACTIVATED', 'CURRENT'),
           ('FA', 'SIL', 'ARCHIVED'),
           ('ADHOC', 'ADHOC1', 'CURRENT');

         INSERT INTO import_applications VALUES
           (100, 'IMA/2022/00001', '2022-11-01 09:00:00'),
           (101, NULL, datetime('now', '-3 days')),
           (102, 'IMA/2022/00002', '2022-12-01 09:00:00'),
           (103, 'IMA/2023/00003', '2023-01-10 09:00:00'),
           (104, NULL, '2021-01-01 09:00:00');

         INSERT INTO ima_responses VALUES (100, 'GBOIL2222222C');",
    )
    .context("failed to seed legacy application headers")?;

    for app in APPLICATIONS {
        let (importer_id, office_id) = if app.sub_type == "DEACTIVATED" { (2, 1) } else { (1, 1) };
        conn.execute(
            "INSERT INTO import_application_details(id, status_control, xml_data) VALUES (?1, ?2, ?3)",
            rusqlite::params![app.imad_id, app.status_control, app.xml],
        )
        .with_context(|| format!("failed to seed application details {}", app.imad_id))?;
        conn.execute(
            "INSERT INTO xview_ima_details(
               imad_id, ima_id, ima_type, ima_sub_type, status_control, status, submitted_datetime,
               applicant_reference, last_updated_datetime, variation_no, importer_id,
               importer_office_id, coo_country_id, coc_country_id
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'my ref', datetime('now', '-1 day'), 0, ?8, ?9, 2, 1)",
            rusqlite::params![
                app.imad_id,
                app.ima_id,
                app.ima_type,
                app.sub_type,
                app.status_control,
                app.status,
                app.submitted,
                importer_id,
                office_id
            ],
        )
        .with_context(|| format!("failed to seed application {}", app.imad_id))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_replica_holds_every_group() {
        let conn = match Connection::open_in_memory() {
            Ok(conn) => conn,
            Err(err) => panic!("test failure: {err}"),
        };
        if let Err(err) = seed_legacy_replica(&conn) {
            panic!("test failure: {err:#}");
        }

        for (table, expected) in [
            ("country", 3),
            ("wua_details", 5),
            ("xview_importer_offices", 3),
            ("xview_ima_details", 6),
        ] {
            let count: i64 = match conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            }) {
                Ok(count) => count,
                Err(err) => panic!("test failure: {err}"),
            };
            assert_eq!(count, expected, "{table}");
        }
    }
}
