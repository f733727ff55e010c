use roxmltree::Node;

use crate::models::ModelKind;
use crate::value::Record;
use crate::xml_parser::{insert, mapped, text, FragmentParser};
use crate::MigrationError;

const PORTAL_NOTIFICATIONS: &[(&str, &str)] =
    &[("Primary", "Primary"), ("Yes", "Yes"), ("No", "No")];

const PHONE_TYPES: &[(&str, &str)] = &[
    ("HOME", "HOME"),
    ("WORK", "WORK"),
    ("MOBILE", "MOBILE"),
    ("MINICOM", "MINICOM"),
    ("FAX", "FAX"),
];

pub struct EmailParser;

impl FragmentParser for EmailParser {
    fn parent(&self) -> ModelKind {
        ModelKind::User
    }

    fn field(&self) -> &'static str {
        "personal_email_xml"
    }

    fn model(&self) -> ModelKind {
        ModelKind::Email
    }

    fn root_node(&self) -> &'static str {
        "/PERSONAL_EMAIL_LIST/PERSONAL_EMAIL"
    }

    fn parse_xml_fields(
        &self,
        parent_pk: i64,
        node: Node<'_, '_>,
    ) -> Result<Option<Record>, MigrationError> {
        let Some(email) = text(node, "./EMAIL_ADDRESS")? else {
            return Ok(None);
        };
        let notifications = mapped(
            "portal_notifications",
            text(node, "./PORTAL_NOTIFICATIONS")?,
            PORTAL_NOTIFICATIONS,
        )?;

        let mut record = Record::new();
        insert(&mut record, "user_id", parent_pk);
        insert(&mut record, "email", email);
        insert(&mut record, "type", text(node, "./TYPE")?);
        insert(&mut record, "is_primary", notifications == Some("Primary"));
        insert(
            &mut record,
            "portal_notifications",
            matches!(notifications, Some("Primary" | "Yes")),
        );
        insert(&mut record, "comment", text(node, "./COMMENT")?);
        Ok(Some(record))
    }
}

pub struct PhoneNumberParser;

impl FragmentParser for PhoneNumberParser {
    fn parent(&self) -> ModelKind {
        ModelKind::User
    }

    fn field(&self) -> &'static str {
        "telephone_xml"
    }

    fn model(&self) -> ModelKind {
        ModelKind::PhoneNumber
    }

    fn root_node(&self) -> &'static str {
        "/TELEPHONE_NO_LIST/TELEPHONE_NO"
    }

    fn parse_xml_fields(
        &self,
        parent_pk: i64,
        node: Node<'_, '_>,
    ) -> Result<Option<Record>, MigrationError> {
        let Some(phone) = text(node, "./PHONE")? else {
            return Ok(None);
        };

        let mut record = Record::new();
        insert(&mut record, "user_id", parent_pk);
        insert(&mut record, "phone", phone);
        insert(
            &mut record,
            "type",
            mapped("type", text(node, "./TYPE")?, PHONE_TYPES)?,
        );
        insert(&mut record, "comment", text(node, "./COMMENT")?);
        Ok(Some(record))
    }
}
