//! Domain core of the ICMS V1 → V2 data migration.
//!
//! Everything in this crate is pure: legacy rows come in as [`FieldValue`]
//! tuples, staged [`Record`]s come out. Persistence and the legacy replica
//! connection live in `icms-migration-store-sqlite`.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

pub mod check;
pub mod config;
pub mod format;
pub mod link;
pub mod models;
pub mod queries;
pub mod query;
pub mod registry;
pub mod task;
pub mod value;
pub mod xml;
pub mod xml_parser;

pub use check::{CheckCount, CheckOutcome, CheckQuery, CountCheck};
pub use config::{LegacyDsn, MigrationConfig};
pub use format::{
    date_or_none, datetime_or_none, format_name, format_row, int_or_none, split_address,
    str_to_bool, str_to_yes_no,
};
pub use link::LinkIndex;
pub use models::{
    model, ExportContext, InMemoryStaging, M2mBridge, ModelKind, StagingModel, StagingRead,
};
pub use query::{LegacyQuery, LegacySource, PkStrategy, QueryModel, RowSink, XmlColumn, XmlKind};
pub use task::{task_batch, task_type_for_status, TaskSeed, TaskType};
pub use value::{FieldValue, Record, RecordExt};
pub use xml::{get_xml_val, select_nodes, XPath};
pub use xml_parser::FragmentParser;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("legacy query {name} failed: {message}")]
    Query { name: String, message: String },
    #[error("duplicate primary key {id} in {table}")]
    DuplicatePrimaryKey { table: String, id: i64 },
    #[error("unmapped legacy code {code:?} for {field}")]
    UnmappedCode { field: String, code: String },
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
    #[error("row count checks failed: {}", .0.join("; "))]
    CountMismatch(Vec<String>),
    #[error("staging error: {0}")]
    Staging(String),
}

impl MigrationError {
    /// Integrity violations must abort the run; everything else is either
    /// configuration or a staging fault.
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicatePrimaryKey { .. } | Self::UnmappedCode { .. } | Self::CountMismatch(_)
        )
    }
}

/// Migration groups, loaded in declaration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Reference,
    User,
    ImportApplication,
}

impl DataType {
    pub const ALL: [Self; 3] = [Self::Reference, Self::User, Self::ImportApplication];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::User => "user",
            Self::ImportApplication => "import_application",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reference" => Some(Self::Reference),
            "user" => Some(Self::User),
            "import_application" => Some(Self::ImportApplication),
            _ => None,
        }
    }
}

/// Formats a timestamp as RFC3339 after normalizing to UTC.
///
/// # Errors
/// Returns [`MigrationError::InvalidValue`] if formatting fails.
pub fn format_rfc3339(value: OffsetDateTime) -> Result<String, MigrationError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|err| MigrationError::InvalidValue {
            field: "datetime".to_string(),
            message: format!("failed to format RFC3339 timestamp: {err}"),
        })
}

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(UtcOffset::UTC)
}
