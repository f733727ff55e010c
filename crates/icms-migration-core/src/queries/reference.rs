use crate::query::LegacyQuery;

pub const COUNTRY: LegacyQuery = LegacyQuery {
    name: "country",
    sql: "
SELECT
  c.country_id id
  , c.country_name name
  , CASE c.status WHEN 'ACTIVE' THEN 1 ELSE 0 END is_active
  , c.country_type type
  , c.commission_code
  , c.hmrc_code
FROM country c
ORDER BY c.country_id
",
    binds: &[],
    xml_source: None,
    xml_columns: &[],
};

pub const CONSTABULARY: LegacyQuery = LegacyQuery {
    name: "constabulary",
    sql: "
SELECT
  c.id
  , c.name
  , c.region
  , c.email
  , CASE c.status WHEN 'ACTIVE' THEN 1 ELSE 0 END is_active
FROM constabularies c
ORDER BY c.id
",
    binds: &[],
    xml_source: None,
    xml_columns: &[],
};

pub const TEMPLATE: LegacyQuery = LegacyQuery {
    name: "template",
    sql: "
SELECT
  t.t_id id
  , t.start_datetime
  , t.end_datetime
  , CASE t.status WHEN 'ACTIVE' THEN 1 ELSE 0 END is_active
  , t.template_name
  , t.template_code
  , t.template_type
  , t.application_domain
  , t.template_title
  , t.template_content
FROM templates t
WHERE t.status_control = 'C'
ORDER BY t.t_id
",
    binds: &[],
    xml_source: None,
    xml_columns: &[],
};

pub const COUNTRY_COUNT: &str = "SELECT COUNT(*) FROM country";

pub const CONSTABULARY_COUNT: &str = "SELECT COUNT(*) FROM constabularies";

pub const TEMPLATE_COUNT: &str = "SELECT COUNT(*) FROM templates WHERE status_control = 'C'";
