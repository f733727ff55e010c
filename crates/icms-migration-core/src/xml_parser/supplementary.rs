use roxmltree::Node;
use tracing::debug;

use crate::format::{date_or_none, datetime_or_none, str_to_yes_no};
use crate::models::ModelKind;
use crate::value::{FieldValue, Record};
use crate::xml::{fragment_text, has_child, select_nodes};
use crate::xml_parser::{insert, int, mapped, text, FragmentParser};
use crate::MigrationError;

const TRANSPORT_MODES: &[(&str, &str)] = &[
    ("AIR", "air"),
    ("RAIL", "rail"),
    ("ROAD", "road"),
    ("SEA", "sea"),
    ("OTHER", "other"),
];

const REPORTING_TYPES: &[(&str, &str)] = &[
    ("MANUAL", "manual"),
    ("UPLOAD", "upload"),
    ("NO_FIREARM", "no_firearm"),
];

const DETAILS: &str = "FA_SUPPLEMENTARY_REPORT_DETAILS";

pub struct SupplementaryReportParser {
    parent: ModelKind,
    model: ModelKind,
}

pub static OIL_REPORTS: SupplementaryReportParser = SupplementaryReportParser {
    parent: ModelKind::OilSupplementaryInfo,
    model: ModelKind::OilSupplementaryReport,
};

pub static DFL_REPORTS: SupplementaryReportParser = SupplementaryReportParser {
    parent: ModelKind::DflSupplementaryInfo,
    model: ModelKind::DflSupplementaryReport,
};

impl FragmentParser for SupplementaryReportParser {
    fn parent(&self) -> ModelKind {
        self.parent
    }

    fn field(&self) -> &'static str {
        "supplementary_report_xml"
    }

    fn model(&self) -> ModelKind {
        self.model
    }

    fn root_node(&self) -> &'static str {
        "/FA_SUPPLEMENTARY_REPORT_LIST/FA_SUPPLEMENTARY_REPORT"
    }

    fn parse_xml_fields(
        &self,
        parent_pk: i64,
        node: Node<'_, '_>,
    ) -> Result<Option<Record>, MigrationError> {
        if !has_child(node, DETAILS) {
            return Ok(None);
        }

        let transport = mapped(
            "transport",
            text(node, "./FA_SUPPLEMENTARY_REPORT_DETAILS/MODE_OF_TRANSPORT")?,
            TRANSPORT_MODES,
        )?;

        // Free-text dates are kept verbatim when they do not parse.
        let received_raw = text(node, "./FA_SUPPLEMENTARY_REPORT_DETAILS/DATE_FIREARMS_RECEIVED")?;
        let (date_received, date_received_str) =
            match date_or_none(&FieldValue::from(received_raw.clone())) {
                Ok(date) => (FieldValue::from(date), FieldValue::Null),
                Err(_) => (FieldValue::Null, FieldValue::from(received_raw)),
            };

        let submitted = text(node, "./FA_SUPPLEMENTARY_REPORT_DETAILS/REPORT_SUBMITTED_DATETIME")?;
        let created = datetime_or_none(&FieldValue::from(submitted)).unwrap_or_else(|err| {
            debug!(parent_pk, error = %err, "report submission time not parsable");
            None
        });

        let goods = select_nodes(node, "./FA_SUPPLEMENTARY_REPORT_DETAILS/GOODS_LINE_LIST")?
            .first()
            .and_then(|list| fragment_text(*list, node.document().input_text()));

        let mut record = Record::new();
        insert(&mut record, "supplementary_info_id", parent_pk);
        insert(&mut record, "transport", transport);
        insert(&mut record, "date_received", date_received);
        insert(&mut record, "date_received_str", date_received_str);
        insert(
            &mut record,
            "bought_from_legacy_id",
            int(node, "./FA_SUPPLEMENTARY_REPORT_DETAILS/REPORT_SELLER_HOLDER")?,
        );
        insert(&mut record, "created_datetime", created);
        insert(&mut record, "report_firearms_xml", goods);
        Ok(Some(record))
    }
}

/// Goods lines of an OIL report. DFL report lines are not migrated.
pub struct ReportFirearmParser;

impl FragmentParser for ReportFirearmParser {
    fn parent(&self) -> ModelKind {
        ModelKind::OilSupplementaryReport
    }

    fn field(&self) -> &'static str {
        "report_firearms_xml"
    }

    fn model(&self) -> ModelKind {
        ModelKind::OilSupplementaryReportFirearm
    }

    fn root_node(&self) -> &'static str {
        "/GOODS_LINE_LIST/GOODS_LINE"
    }

    fn parse_xml_fields(
        &self,
        parent_pk: i64,
        node: Node<'_, '_>,
    ) -> Result<Option<Record>, MigrationError> {
        let Some(reporting) = mapped(
            "firearm_reporting_type",
            text(node, "./FIREARM_REPORTING_TYPE")?,
            REPORTING_TYPES,
        )?
        else {
            return Ok(None);
        };

        let mut record = Record::new();
        insert(&mut record, "report_id", parent_pk);
        insert(&mut record, "serial_number", text(node, "./SERIAL_NUMBER")?);
        insert(&mut record, "calibre", text(node, "./CALIBRE")?);
        insert(&mut record, "model", text(node, "./MODEL")?);
        insert(
            &mut record,
            "proofing",
            str_to_yes_no(text(node, "./PROOFED")?.as_deref())?,
        );
        insert(&mut record, "is_manual", reporting == "manual");
        insert(&mut record, "is_upload", reporting == "upload");
        insert(&mut record, "is_no_firearm", reporting == "no_firearm");
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RecordExt;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    const REPORTS: &str = "<FA_SUPPLEMENTARY_REPORT_LIST>\
        <FA_SUPPLEMENTARY_REPORT><FA_SUPPLEMENTARY_REPORT_DETAILS>\
          <MODE_OF_TRANSPORT>ROAD</MODE_OF_TRANSPORT>\
          <DATE_FIREARMS_RECEIVED>2022-03-01</DATE_FIREARMS_RECEIVED>\
          <REPORT_SELLER_HOLDER>1</REPORT_SELLER_HOLDER>\
          <REPORT_SUBMITTED_DATETIME>2022-03-02T10:00:00</REPORT_SUBMITTED_DATETIME>\
          <GOODS_LINE_LIST><GOODS_LINE><FIREARM_REPORTING_TYPE>MANUAL</FIREARM_REPORTING_TYPE>\
            <SERIAL_NUMBER>S1</SERIAL_NUMBER><PROOFED>Y</PROOFED></GOODS_LINE></GOODS_LINE_LIST>\
        </FA_SUPPLEMENTARY_REPORT_DETAILS></FA_SUPPLEMENTARY_REPORT>\
        <FA_SUPPLEMENTARY_REPORT><FA_SUPPLEMENTARY_REPORT_DETAILS>\
          <MODE_OF_TRANSPORT>AIR</MODE_OF_TRANSPORT>\
          <DATE_FIREARMS_RECEIVED>sometime in March</DATE_FIREARMS_RECEIVED>\
        </FA_SUPPLEMENTARY_REPORT_DETAILS></FA_SUPPLEMENTARY_REPORT>\
        <FA_SUPPLEMENTARY_REPORT />\
        </FA_SUPPLEMENTARY_REPORT_LIST>";

    #[test]
    fn reports_without_details_are_skipped() {
        let children = must_ok(OIL_REPORTS.parse_xml(&[(8, REPORTS.to_string())]));
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|child| child.int("supplementary_info_id") == Some(8)));
    }

    #[test]
    fn report_details_are_extracted() {
        let children = must_ok(OIL_REPORTS.parse_xml(&[(8, REPORTS.to_string())]));
        let first = &children[0];
        assert_eq!(first.text("transport"), Some("road"));
        assert_eq!(
            first.value("date_received"),
            &FieldValue::Date(time::macros::date!(2022 - 03 - 01))
        );
        assert_eq!(first.int("bought_from_legacy_id"), Some(1));
        assert_eq!(
            first.value("created_datetime"),
            &FieldValue::DateTime(time::macros::datetime!(2022-03-02 10:00 UTC))
        );
        let goods = first.text("report_firearms_xml").unwrap_or_default();
        assert!(goods.starts_with("<GOODS_LINE_LIST>"));

        let second = &children[1];
        assert!(second.value("date_received").is_null());
        assert_eq!(second.text("date_received_str"), Some("sometime in March"));
        assert!(second.value("report_firearms_xml").is_null());
    }

    #[test]
    fn goods_lines_become_firearms() {
        let children = must_ok(OIL_REPORTS.parse_xml(&[(8, REPORTS.to_string())]));
        let goods = children[0].text("report_firearms_xml").unwrap_or_default().to_string();
        let firearms = must_ok(ReportFirearmParser.parse_xml(&[(40, goods)]));
        assert_eq!(firearms.len(), 1);
        assert_eq!(firearms[0].int("report_id"), Some(40));
        assert_eq!(firearms[0].text("serial_number"), Some("S1"));
        assert_eq!(firearms[0].text("proofing"), Some("yes"));
        assert_eq!(firearms[0].value("is_manual"), &FieldValue::Bool(true));
        assert_eq!(firearms[0].value("is_upload"), &FieldValue::Bool(false));
    }
}
