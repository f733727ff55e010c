use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ModelKind, StagingModel};
use crate::value::{FieldValue, Record, RecordExt};
use crate::MigrationError;

pub struct Country;

impl StagingModel for Country {
    fn kind(&self) -> ModelKind {
        ModelKind::Country
    }

    fn target_table(&self) -> &'static str {
        "web_country"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["name", "is_active", "type", "commission_code", "hmrc_code"]
    }
}

pub struct Constabulary;

impl StagingModel for Constabulary {
    fn kind(&self) -> ModelKind {
        ModelKind::Constabulary
    }

    fn target_table(&self) -> &'static str {
        "web_constabulary"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["name", "region", "email", "is_active"]
    }
}

pub struct Template;

const LETTER_TEMPLATE: &str = "LETTER_TEMPLATE";

impl StagingModel for Template {
    fn kind(&self) -> ModelKind {
        ModelKind::Template
    }

    fn target_table(&self) -> &'static str {
        "web_template"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "start_datetime",
            "end_datetime",
            "is_active",
            "template_name",
            "template_code",
            "template_type",
            "application_domain",
            "template_title",
            "template_content",
        ]
    }

    /// Strips V1 editor ids from the content; letter templates also swap the
    /// `<MM>` merge-field markers for `[[`/`]]`.
    fn data_export(&self, mut data: Record) -> Result<Record, MigrationError> {
        let Some(content) = data.text("template_content") else {
            return Ok(data);
        };

        let mut content = foxid_pattern()?.replace_all(content, "").into_owned();
        if data.text("template_type") == Some(LETTER_TEMPLATE) {
            content = content.replace("<MM>", "[[").replace("</MM>", "]]");
        }

        data.insert("template_content".to_string(), FieldValue::Text(content));
        Ok(data)
    }
}

fn foxid_pattern() -> Result<&'static Regex, MigrationError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let compiled = Regex::new(r#"\sfoxid="[a-zA-Z0-9]{6}_[a-zA-Z0-9]{9}""#)
        .map_err(|err| MigrationError::Configuration(format!("invalid foxid pattern: {err}")))?;
    Ok(PATTERN.get_or_init(|| compiled))
}
