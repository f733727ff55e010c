pub const SCHEMA_VERSION: i64 = 1;

/// Staging area, run ledger and the V2 target tables.
pub const SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS data_migration_staging (
  model TEXT NOT NULL,
  id INTEGER NOT NULL,
  data_json TEXT NOT NULL,
  PRIMARY KEY (model, id)
);

CREATE TABLE IF NOT EXISTS data_migration_run (
  run_id TEXT PRIMARY KEY,
  stage TEXT NOT NULL CHECK (
    stage IN ('export_from_v1', 'extract_v1_xml', 'import_v1_data', 'create_tasks', 'check', 'reset')
  ),
  data_types TEXT NOT NULL,
  started_at TEXT NOT NULL,
  finished_at TEXT NOT NULL,
  row_count INTEGER NOT NULL CHECK (row_count >= 0)
);

CREATE TABLE IF NOT EXISTS web_country (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  is_active INTEGER NOT NULL,
  type TEXT NOT NULL,
  commission_code TEXT,
  hmrc_code TEXT
);

CREATE TABLE IF NOT EXISTS web_constabulary (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  region TEXT NOT NULL,
  email TEXT,
  is_active INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS web_template (
  id INTEGER PRIMARY KEY,
  start_datetime TEXT,
  end_datetime TEXT,
  is_active INTEGER NOT NULL,
  template_name TEXT NOT NULL,
  template_code TEXT,
  template_type TEXT NOT NULL,
  application_domain TEXT NOT NULL,
  template_title TEXT,
  template_content TEXT
);

CREATE TABLE IF NOT EXISTS web_user (
  id INTEGER PRIMARY KEY,
  username TEXT NOT NULL UNIQUE,
  email TEXT NOT NULL,
  password TEXT,
  first_name TEXT,
  last_name TEXT,
  is_active INTEGER NOT NULL,
  title TEXT,
  organisation TEXT,
  department TEXT,
  job_title TEXT,
  date_of_birth TEXT,
  date_joined TEXT,
  last_login TEXT,
  icms_v1_user INTEGER NOT NULL DEFAULT 0,
  show_welcome_message INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS web_email (
  id INTEGER PRIMARY KEY,
  user_id INTEGER NOT NULL REFERENCES web_user(id),
  email TEXT NOT NULL,
  type TEXT,
  is_primary INTEGER NOT NULL,
  portal_notifications INTEGER NOT NULL,
  comment TEXT
);

CREATE TABLE IF NOT EXISTS web_phonenumber (
  id INTEGER PRIMARY KEY,
  user_id INTEGER NOT NULL REFERENCES web_user(id),
  phone TEXT NOT NULL,
  type TEXT,
  comment TEXT
);

CREATE TABLE IF NOT EXISTS web_importer (
  id INTEGER PRIMARY KEY,
  is_active INTEGER NOT NULL,
  type TEXT NOT NULL,
  name TEXT NOT NULL,
  registered_number TEXT,
  eori_number TEXT,
  region_origin TEXT,
  user_id INTEGER REFERENCES web_user(id),
  comments TEXT,
  main_importer_id INTEGER REFERENCES web_importer(id)
);

CREATE TABLE IF NOT EXISTS web_exporter (
  id INTEGER PRIMARY KEY,
  is_active INTEGER NOT NULL,
  name TEXT NOT NULL,
  registered_number TEXT,
  comments TEXT,
  main_exporter_id INTEGER REFERENCES web_exporter(id),
  exclusive_correspondence INTEGER
);

CREATE TABLE IF NOT EXISTS web_office (
  id INTEGER PRIMARY KEY,
  legacy_id TEXT UNIQUE,
  is_active INTEGER NOT NULL,
  postcode TEXT,
  eori_number TEXT,
  address_entry_type TEXT,
  address_1 TEXT,
  address_2 TEXT,
  address_3 TEXT,
  address_4 TEXT,
  address_5 TEXT,
  address_6 TEXT,
  address_7 TEXT,
  address_8 TEXT
);

CREATE TABLE IF NOT EXISTS web_importer_offices (
  id INTEGER PRIMARY KEY,
  importer_id INTEGER NOT NULL REFERENCES web_importer(id),
  office_id INTEGER NOT NULL REFERENCES web_office(id),
  UNIQUE (importer_id, office_id)
);

CREATE TABLE IF NOT EXISTS web_exporter_offices (
  id INTEGER PRIMARY KEY,
  exporter_id INTEGER NOT NULL REFERENCES web_exporter(id),
  office_id INTEGER NOT NULL REFERENCES web_office(id),
  UNIQUE (exporter_id, office_id)
);

CREATE TABLE IF NOT EXISTS web_process (
  id INTEGER PRIMARY KEY,
  process_type TEXT NOT NULL,
  is_active INTEGER NOT NULL,
  created TEXT
);

CREATE TABLE IF NOT EXISTS web_importapplication (
  id INTEGER PRIMARY KEY REFERENCES web_process(id),
  application_type TEXT NOT NULL,
  status TEXT NOT NULL,
  reference TEXT,
  submit_datetime TEXT,
  decision TEXT,
  refuse_reason TEXT,
  applicant_reference TEXT,
  create_datetime TEXT,
  last_update_datetime TEXT,
  variation_no INTEGER NOT NULL DEFAULT 0,
  legacy_case_flag INTEGER,
  licence_reference TEXT,
  importer_id INTEGER REFERENCES web_importer(id),
  importer_office_id INTEGER REFERENCES web_office(id),
  agent_id INTEGER REFERENCES web_importer(id),
  agent_office_id INTEGER REFERENCES web_office(id),
  contact_id INTEGER,
  origin_country_id INTEGER REFERENCES web_country(id),
  consignment_country_id INTEGER REFERENCES web_country(id),
  cover_letter_text TEXT
);

CREATE TABLE IF NOT EXISTS web_openindividuallicenceapplication (
  id INTEGER PRIMARY KEY REFERENCES web_importapplication(id),
  section1 INTEGER,
  section2 INTEGER,
  know_bought_from INTEGER,
  commodity_code TEXT
);

CREATE TABLE IF NOT EXISTS web_dflapplication (
  id INTEGER PRIMARY KEY REFERENCES web_importapplication(id),
  proof_checked INTEGER,
  deactivated_firearm INTEGER,
  commodity_code TEXT,
  know_bought_from INTEGER,
  constabulary_id INTEGER REFERENCES web_constabulary(id)
);

CREATE TABLE IF NOT EXISTS web_sanctionsandadhocapplication (
  id INTEGER PRIMARY KEY REFERENCES web_importapplication(id),
  exporter_name TEXT,
  exporter_address TEXT
);

CREATE TABLE IF NOT EXISTS web_importcontact (
  id INTEGER PRIMARY KEY,
  import_application_id INTEGER NOT NULL REFERENCES web_importapplication(id),
  entity TEXT,
  first_name TEXT,
  last_name TEXT,
  registration_number TEXT,
  street TEXT,
  city TEXT,
  postcode TEXT,
  region TEXT,
  country_id INTEGER REFERENCES web_country(id),
  dealer TEXT
);

CREATE TABLE IF NOT EXISTS web_userimportcertificate (
  id INTEGER PRIMARY KEY,
  reference TEXT,
  certificate_type TEXT NOT NULL,
  constabulary_id INTEGER NOT NULL REFERENCES web_constabulary(id),
  date_issued TEXT,
  expiry_date TEXT
);

CREATE TABLE IF NOT EXISTS web_openindividuallicenceapplication_user_imported_certificates (
  id INTEGER PRIMARY KEY,
  openindividuallicenceapplication_id INTEGER NOT NULL
    REFERENCES web_openindividuallicenceapplication(id),
  userimportcertificate_id INTEGER NOT NULL REFERENCES web_userimportcertificate(id)
);

CREATE TABLE IF NOT EXISTS web_variationrequest (
  id INTEGER PRIMARY KEY,
  status TEXT,
  is_active INTEGER NOT NULL,
  requested_datetime TEXT,
  requested_by_id INTEGER,
  what_varied TEXT,
  why_varied TEXT,
  when_varied TEXT,
  extension_flag INTEGER,
  reject_cancellation_reason TEXT,
  closed_datetime TEXT,
  closed_by_id INTEGER
);

CREATE TABLE IF NOT EXISTS web_importapplication_variation_requests (
  id INTEGER PRIMARY KEY,
  importapplication_id INTEGER NOT NULL REFERENCES web_importapplication(id),
  variationrequest_id INTEGER NOT NULL REFERENCES web_variationrequest(id)
);

CREATE TABLE IF NOT EXISTS web_oilsupplementaryinfo (
  id INTEGER PRIMARY KEY,
  import_application_id INTEGER UNIQUE REFERENCES web_openindividuallicenceapplication(id),
  is_complete INTEGER,
  completed_datetime TEXT,
  completed_by_id INTEGER,
  no_report_reason TEXT
);

CREATE TABLE IF NOT EXISTS web_dflsupplementaryinfo (
  id INTEGER PRIMARY KEY,
  import_application_id INTEGER UNIQUE REFERENCES web_dflapplication(id),
  is_complete INTEGER,
  completed_datetime TEXT,
  completed_by_id INTEGER,
  no_report_reason TEXT
);

CREATE TABLE IF NOT EXISTS web_oilsupplementaryreport (
  id INTEGER PRIMARY KEY,
  supplementary_info_id INTEGER NOT NULL REFERENCES web_oilsupplementaryinfo(id),
  transport TEXT,
  date_received TEXT,
  bought_from_id INTEGER REFERENCES web_importcontact(id),
  created_datetime TEXT
);

CREATE TABLE IF NOT EXISTS web_dflsupplementaryreport (
  id INTEGER PRIMARY KEY,
  supplementary_info_id INTEGER NOT NULL REFERENCES web_dflsupplementaryinfo(id),
  transport TEXT,
  date_received TEXT,
  bought_from_id INTEGER REFERENCES web_importcontact(id),
  created_datetime TEXT
);

CREATE TABLE IF NOT EXISTS web_oilsupplementaryreportfirearm (
  id INTEGER PRIMARY KEY,
  report_id INTEGER NOT NULL REFERENCES web_oilsupplementaryreport(id),
  serial_number TEXT,
  calibre TEXT,
  model TEXT,
  proofing TEXT,
  is_manual INTEGER NOT NULL DEFAULT 0,
  is_upload INTEGER NOT NULL DEFAULT 0,
  is_no_firearm INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS web_task (
  id INTEGER PRIMARY KEY,
  process_id INTEGER NOT NULL REFERENCES web_process(id),
  task_type TEXT NOT NULL CHECK (
    task_type IN (
      'prepare',
      'process',
      'vr_request_change',
      'authorise',
      'document_error',
      'document_signing',
      'chief_wait'
    )
  ),
  is_active INTEGER NOT NULL,
  created TEXT NOT NULL,
  previous_id INTEGER REFERENCES web_task(id)
);

CREATE INDEX IF NOT EXISTS idx_web_task_process_active
  ON web_task(process_id, is_active);
";
