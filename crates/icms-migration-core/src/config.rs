use std::path::PathBuf;

use serde::Serialize;

use crate::MigrationError;

pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Settings shared by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationConfig {
    /// Interlock: nothing runs unless this is set.
    pub allow_data_migration: bool,
    pub legacy_dsn: Option<String>,
    pub batch_size: usize,
    /// Users whose login ends with this domain are not migrated.
    pub email_domain_exclude: Option<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            allow_data_migration: false,
            legacy_dsn: None,
            batch_size: DEFAULT_BATCH_SIZE,
            email_domain_exclude: None,
        }
    }
}

impl MigrationConfig {
    /// # Errors
    /// Returns [`MigrationError::Configuration`] when the interlock is off or
    /// the batch size is zero.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if !self.allow_data_migration {
            return Err(MigrationError::Configuration(
                "ALLOW_DATA_MIGRATION must be true to run the data migration".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(MigrationError::Configuration(
                "DATA_MIGRATION_BATCH_SIZE must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// # Errors
    /// Returns [`MigrationError::Configuration`] when no DSN is configured or
    /// it cannot be parsed.
    pub fn require_legacy_dsn(&self) -> Result<LegacyDsn, MigrationError> {
        let raw = self
            .legacy_dsn
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| {
                MigrationError::Configuration(
                    "ICMS_V1_REPLICA_DSN is required to read the legacy replica".to_string(),
                )
            })?;
        LegacyDsn::parse(raw)
    }

    #[must_use]
    pub fn email_domain_exclude(&self) -> Option<&str> {
        self.email_domain_exclude
            .as_deref()
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
    }
}

/// Location of the legacy replica snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyDsn {
    Sqlite(PathBuf),
}

impl LegacyDsn {
    /// Accepts `sqlite://<path>` or a bare path.
    ///
    /// # Errors
    /// Returns [`MigrationError::Configuration`] for an empty DSN or an
    /// unsupported scheme.
    pub fn parse(raw: &str) -> Result<Self, MigrationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MigrationError::Configuration("legacy DSN is empty".to_string()));
        }

        match raw.split_once("://") {
            Some(("sqlite", path)) if !path.is_empty() => Ok(Self::Sqlite(PathBuf::from(path))),
            Some(("sqlite", _)) => Err(MigrationError::Configuration(
                "legacy DSN sqlite:// is missing a path".to_string(),
            )),
            Some((scheme, _)) => Err(MigrationError::Configuration(format!(
                "unsupported legacy DSN scheme {scheme}"
            ))),
            None => Ok(Self::Sqlite(PathBuf::from(raw))),
        }
    }
}
