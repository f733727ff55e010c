use crate::query::{LegacyQuery, XmlColumn};

/// Every current web user account. The system user and accounts without an
/// email login are dropped at export, not here, so their ids stay reserved.
pub const USERS: LegacyQuery = LegacyQuery {
    name: "users",
    sql: "
SELECT
  wua.wua_id id
  , wua.login_id username
  , wua.first_name
  , wua.last_name
  , CASE wua.account_status WHEN 'ACTIVE' THEN 1 ELSE 0 END is_active
  , wua.salt
  , wua.encrypted_password
  , wua.last_login_datetime
  , wua.date_created_datetime date_joined_datetime
  , wua.title
  , wua.organisation
  , wua.department
  , wua.job_title
  , wua.date_of_birth
  , wua.xml_data
FROM wua_details wua
WHERE wua.status_control = 'C'
ORDER BY wua.wua_id
",
    binds: &[],
    xml_source: Some("xml_data"),
    xml_columns: &[
        XmlColumn::fragment("personal_email_xml", "/WUA/PERSONAL_EMAIL_LIST"),
        XmlColumn::fragment("telephone_xml", "/WUA/TELEPHONE_NO_LIST"),
    ],
};

pub const IMPORTERS: LegacyQuery = LegacyQuery {
    name: "importers",
    sql: "
SELECT
  imp.imp_id id
  , CASE imp.status WHEN 'CURRENT' THEN 1 ELSE 0 END is_active
  , imp.importer_type type
  , imp.organisation_name name
  , imp.registered_number
  , imp.eori_number
  , imp.region_origin
  , imp.person_wua_id user_id
  , imp.comments
  , imp.main_imp_id main_importer_id
FROM xview_importers imp
WHERE imp.status_control = 'C'
ORDER BY imp.imp_id
",
    binds: &[],
    xml_source: None,
    xml_columns: &[],
};

pub const EXPORTERS: LegacyQuery = LegacyQuery {
    name: "exporters",
    sql: "
SELECT
  e.e_id id
  , CASE e.status WHEN 'CURRENT' THEN 1 ELSE 0 END is_active
  , e.organisation_name name
  , e.registered_number
  , e.comments
  , e.main_e_id main_exporter_id
  , e.exclusive_correspondence
FROM xview_exporters e
WHERE e.status_control = 'C'
ORDER BY e.e_id
",
    binds: &[],
    xml_source: None,
    xml_columns: &[],
};

/// Importer and exporter offices share one table in V2. Their legacy ids
/// are synthesized so applications can find them again.
pub const OFFICES: LegacyQuery = LegacyQuery {
    name: "offices",
    sql: "
SELECT * FROM (
  SELECT
    io.imp_id importer_id
    , NULL exporter_id
    , 'i-' || io.imp_id || '-' || io.office_id legacy_id
    , CASE io.status WHEN 'CURRENT' THEN 1 ELSE 0 END is_active
    , io.postcode
    , io.address
    , io.eori_number
    , io.address_entry_type
    , 1 office_group
    , io.office_id
  FROM xview_importer_offices io
  WHERE io.status_control = 'C'
  UNION ALL
  SELECT
    NULL importer_id
    , eo.e_id exporter_id
    , 'e-' || eo.e_id || '-' || eo.office_id legacy_id
    , CASE eo.status WHEN 'CURRENT' THEN 1 ELSE 0 END is_active
    , eo.postcode
    , eo.address
    , NULL eori_number
    , eo.address_entry_type
    , 2 office_group
    , eo.office_id
  FROM xview_exporter_offices eo
  WHERE eo.status_control = 'C'
)
ORDER BY office_group, COALESCE(importer_id, exporter_id), office_id
",
    binds: &[],
    xml_source: None,
    xml_columns: &[],
};

pub const IMPORTER_COUNT: &str = "SELECT COUNT(*) FROM xview_importers WHERE status_control = 'C'";

pub const EXPORTER_COUNT: &str = "SELECT COUNT(*) FROM xview_exporters WHERE status_control = 'C'";

pub const OFFICE_COUNT: &str = "
SELECT
  (SELECT COUNT(*) FROM xview_importer_offices WHERE status_control = 'C')
  + (SELECT COUNT(*) FROM xview_exporter_offices WHERE status_control = 'C')
";
