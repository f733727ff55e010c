use roxmltree::Node;
use time::Date;

use crate::format::{str_to_bool, str_to_yes_no};
use crate::models::ModelKind;
use crate::value::{FieldValue, Record};
use crate::xml_parser::{date, insert, int, mapped, text, FragmentParser};
use crate::MigrationError;

const PERSON_TYPES: &[(&str, &str)] = &[("ORGANISATION", "legal"), ("INDIVIDUAL", "individual")];

const CERTIFICATE_TYPES: &[(&str, &str)] = &[
    ("FIREARMS", "firearms"),
    ("SHOTGUN", "shotgun"),
    ("RFD", "registered"),
    ("DEACTIVATED", "deactivated"),
];

const VARIATION_STATUSES: &[(&str, &str)] = &[
    ("DRAFT", "DRAFT"),
    ("OPEN", "OPEN"),
    ("CANCELLED", "CANCELLED"),
    ("REJECTED", "REJECTED"),
    ("ACCEPTED", "ACCEPTED"),
    ("CLOSED", "CLOSED"),
];

/// Sellers and holders named on a firearms application.
pub struct ImportContactParser {
    parent: ModelKind,
}

pub static OIL_IMPORT_CONTACTS: ImportContactParser = ImportContactParser {
    parent: ModelKind::OilApplication,
};

pub static DFL_IMPORT_CONTACTS: ImportContactParser = ImportContactParser {
    parent: ModelKind::DflApplication,
};

impl FragmentParser for ImportContactParser {
    fn parent(&self) -> ModelKind {
        self.parent
    }

    fn field(&self) -> &'static str {
        "bought_from_details_xml"
    }

    fn model(&self) -> ModelKind {
        ModelKind::ImportContact
    }

    fn root_node(&self) -> &'static str {
        "/SELLER_HOLDER_LIST/SELLER_HOLDER"
    }

    fn parse_xml_fields(
        &self,
        parent_pk: i64,
        node: Node<'_, '_>,
    ) -> Result<Option<Record>, MigrationError> {
        let Some(legacy_id) = int(node, "./SELLER_HOLDER_ID")? else {
            return Ok(None);
        };
        let entity = mapped(
            "entity",
            text(node, "./PERSON_DETAILS/PERSON_TYPE")?,
            PERSON_TYPES,
        )?;
        let (first_name, last_name) = if entity == Some("legal") {
            (text(node, "./PERSON_DETAILS/LEGAL_PERSON_NAME")?, None)
        } else {
            (
                text(node, "./PERSON_DETAILS/FIRST_NAME")?,
                text(node, "./PERSON_DETAILS/LAST_NAME")?,
            )
        };

        let mut record = Record::new();
        insert(&mut record, "import_application_id", parent_pk);
        insert(&mut record, "legacy_id", legacy_id);
        insert(&mut record, "entity", entity);
        insert(&mut record, "first_name", first_name);
        insert(&mut record, "last_name", last_name);
        insert(
            &mut record,
            "registration_number",
            text(node, "./PERSON_DETAILS/REGISTRATION_NUMBER")?,
        );
        insert(&mut record, "street", text(node, "./ADDRESS/STREET_AND_NUMBER")?);
        insert(&mut record, "city", text(node, "./ADDRESS/TOWN_CITY")?);
        insert(&mut record, "postcode", text(node, "./ADDRESS/POSTCODE")?);
        insert(&mut record, "region", text(node, "./ADDRESS/REGION")?);
        insert(&mut record, "country_id", int(node, "./ADDRESS/COUNTRY")?);
        insert(
            &mut record,
            "dealer",
            str_to_yes_no(text(node, "./IS_DEALER")?.as_deref())?,
        );
        Ok(Some(record))
    }
}

/// Firearms certificates an OIL applicant uploaded against their account.
pub struct UserImportCertificateParser;

impl FragmentParser for UserImportCertificateParser {
    fn parent(&self) -> ModelKind {
        ModelKind::OilApplication
    }

    fn field(&self) -> &'static str {
        "user_import_certs_xml"
    }

    fn model(&self) -> ModelKind {
        ModelKind::UserImportCertificate
    }

    fn root_node(&self) -> &'static str {
        "/FIREARMS_CERTIFICATE_LIST/FIREARMS_CERTIFICATE"
    }

    fn parse_xml_fields(
        &self,
        parent_pk: i64,
        node: Node<'_, '_>,
    ) -> Result<Option<Record>, MigrationError> {
        let Some(target_id) = int(node, "./TARGET_ID")? else {
            return Ok(None);
        };
        let Some(certificate_type) = mapped(
            "certificate_type",
            text(node, "./CERTIFICATE_TYPE")?,
            CERTIFICATE_TYPES,
        )?
        else {
            return Ok(None);
        };

        let mut record = Record::new();
        insert(&mut record, "import_application_id", parent_pk);
        insert(&mut record, "target_id", target_id);
        insert(&mut record, "reference", text(node, "./CERTIFICATE_REF")?);
        insert(&mut record, "certificate_type", certificate_type);
        insert(&mut record, "constabulary_id", int(node, "./CONSTABULARY")?);
        insert(&mut record, "date_issued", date(node, "./DATE_ISSUED")?);
        insert(&mut record, "expiry_date", date(node, "./EXPIRY_DATE")?);
        Ok(Some(record))
    }
}

pub struct VariationRequestParser;

impl FragmentParser for VariationRequestParser {
    fn parent(&self) -> ModelKind {
        ModelKind::ImportApplication
    }

    fn field(&self) -> &'static str {
        "variations_xml"
    }

    fn model(&self) -> ModelKind {
        ModelKind::VariationRequest
    }

    fn root_node(&self) -> &'static str {
        "/VARIATION_REQUEST_LIST/VARIATION_REQUEST"
    }

    fn parse_xml_fields(
        &self,
        parent_pk: i64,
        node: Node<'_, '_>,
    ) -> Result<Option<Record>, MigrationError> {
        let Some(requested) = date(node, "./REQUEST_DATE")? else {
            return Ok(None);
        };
        let status = mapped("status", text(node, "./STATUS")?, VARIATION_STATUSES)?;

        let mut record = Record::new();
        insert(&mut record, "import_application_id", parent_pk);
        insert(&mut record, "status", status);
        insert(&mut record, "is_active", status == Some("OPEN"));
        insert(&mut record, "requested_datetime", midnight(Some(requested)));
        insert(&mut record, "requested_by_id", int(node, "./REQUEST_BY_WUA_ID")?);
        insert(&mut record, "what_varied", text(node, "./WHAT_VARIED")?);
        insert(&mut record, "why_varied", text(node, "./WHY_VARIED")?);
        insert(&mut record, "when_varied", date(node, "./DATE_VARIED")?);
        insert(
            &mut record,
            "extension_flag",
            str_to_bool(text(node, "./EXTENSION_FLAG")?.as_deref())?,
        );
        insert(
            &mut record,
            "reject_cancellation_reason",
            text(node, "./REJECT_REASON")?,
        );
        insert(&mut record, "closed_datetime", midnight(date(node, "./CLOSED_DATE")?));
        insert(&mut record, "closed_by_id", int(node, "./CLOSED_BY_WUA_ID")?);
        Ok(Some(record))
    }
}

fn midnight(day: Option<Date>) -> FieldValue {
    day.map_or(FieldValue::Null, |day| {
        FieldValue::DateTime(day.midnight().assume_utc())
    })
}
