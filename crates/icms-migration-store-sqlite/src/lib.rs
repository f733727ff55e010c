#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use icms_migration_core::{
    format_rfc3339, model, now_utc, registry, DataType, FieldValue, MigrationError, ModelKind,
    Record, RecordExt, StagingRead,
};
use icms_migration_core::task::TASK_TABLE;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

pub mod fixture;
pub mod legacy;
pub mod migrator;
mod schema;

pub use legacy::SqliteLegacySource;
pub use migrator::{Migrator, Stage, StageReport};

use schema::{SCHEMA_V1, SCHEMA_VERSION};

/// Staging area and V2 target tables in one SQLite database.
pub struct SqliteMigrationStore {
    conn: Connection,
}

impl SqliteMigrationStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                );",
            )
            .context("failed to ensure schema_migrations exists")?;

        self.conn
            .execute_batch(SCHEMA_V1)
            .context("failed to apply migration schema")?;

        let now = format_rfc3339(now_utc()).map_err(|err| anyhow!(err.to_string()))?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
                params![SCHEMA_VERSION, now],
            )
            .context("failed to register migration schema version")?;

        Ok(())
    }

    /// Stages `records` under `kind`. Every record must carry an `id`.
    pub fn insert_staged(
        &mut self,
        kind: ModelKind,
        records: &[Record],
    ) -> std::result::Result<usize, MigrationError> {
        let staging = |err: rusqlite::Error| {
            MigrationError::Staging(format!("failed to stage {}: {err}", kind.as_str()))
        };

        let tx = self.conn.transaction().map_err(staging)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO data_migration_staging(model, id, data_json) VALUES (?1, ?2, ?3)",
                )
                .map_err(staging)?;

            for record in records {
                let id = record.int("id").ok_or_else(|| {
                    MigrationError::Staging(format!("staged {} row has no id", kind.as_str()))
                })?;
                let data_json = serde_json::to_string(record)
                    .map_err(|err| MigrationError::Staging(err.to_string()))?;

                stmt.execute(params![kind.as_str(), id, data_json])
                    .map_err(|err| {
                        if is_primary_key_violation(&err) {
                            MigrationError::DuplicatePrimaryKey {
                                table: kind.as_str().to_string(),
                                id,
                            }
                        } else {
                            staging(err)
                        }
                    })?;
            }
        }
        tx.commit().map_err(staging)?;

        Ok(records.len())
    }

    /// Drops every staged row of `kinds`.
    pub fn clear_staged(&self, kinds: &[ModelKind]) -> Result<usize> {
        let mut removed = 0;
        for kind in kinds {
            removed += self
                .conn
                .execute(
                    "DELETE FROM data_migration_staging WHERE model = ?1",
                    params![kind.as_str()],
                )
                .with_context(|| format!("failed to clear staged {}", kind.as_str()))?;
        }
        Ok(removed)
    }

    pub fn staged_count(&self, kind: ModelKind) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM data_migration_staging WHERE model = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to count staged {}", kind.as_str()))
    }

    /// Highest id in `table`, 0 when empty.
    pub fn max_id(&self, table: &str) -> Result<i64> {
        self.conn
            .query_row(
                &format!("SELECT COALESCE(MAX(id), 0) FROM {}", quote_ident(table)),
                [],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to read max id of {table}"))
    }

    /// Next free primary key for `kind` across staging and its target table.
    pub fn next_pk(&self, kind: ModelKind) -> Result<i64> {
        let staged: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(id), 0) FROM data_migration_staging WHERE model = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to read max staged id of {}", kind.as_str()))?;
        let loaded = self.max_id(model(kind).target_table())?;
        Ok(staged.max(loaded) + 1)
    }

    /// Inserts `rows` into `table` in one transaction, `batch_size` rows per
    /// chunk. Foreign keys are checked at commit so rows may reference later
    /// rows of the same batch.
    pub fn bulk_create(&mut self, table: &str, rows: &[Record], batch_size: usize) -> Result<usize> {
        let mut seen = BTreeSet::new();
        for row in rows {
            if let Some(id) = row.int("id") {
                if !seen.insert(id) {
                    return Err(MigrationError::DuplicatePrimaryKey {
                        table: table.to_string(),
                        id,
                    }
                    .into());
                }
            }
        }

        let tx = self
            .conn
            .transaction()
            .with_context(|| format!("failed to start transaction for {table}"))?;
        tx.execute_batch("PRAGMA defer_foreign_keys = ON;")
            .context("failed to defer foreign keys")?;

        for chunk in rows.chunks(batch_size.max(1)) {
            for row in chunk {
                let columns: Vec<&str> = row.keys().map(String::as_str).collect();
                let mut stmt = tx
                    .prepare_cached(&insert_sql(table, &columns))
                    .with_context(|| format!("failed to prepare insert into {table}"))?;
                let values = row
                    .values()
                    .map(to_sql_value)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                stmt.execute(params_from_iter(values.iter()))
                    .map_err(|err| insert_error(table, row, err))?;
            }
            debug!(table, rows = chunk.len(), "inserted batch");
        }

        tx.commit()
            .with_context(|| format!("failed to commit {table}"))?;
        Ok(rows.len())
    }

    /// Rows across `tables`, each restricted by `filter` when given.
    pub fn count(&self, tables: &[&str], filter: Option<&str>) -> Result<i64> {
        let mut total = 0;
        for table in tables {
            let sql = match filter {
                Some(filter) => format!("SELECT COUNT(*) FROM {} WHERE {filter}", quote_ident(table)),
                None => format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            };
            let count: i64 = self
                .conn
                .query_row(&sql, [], |row| row.get(0))
                .with_context(|| format!("failed to count {table}"))?;
            total += count;
        }
        Ok(total)
    }

    /// Empties staging and every migrated target table, dependents first.
    pub fn reset(&mut self) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start reset transaction")?;
        tx.execute_batch("PRAGMA defer_foreign_keys = ON;")
            .context("failed to defer foreign keys")?;

        let mut removed = 0;
        for table in target_tables().into_iter().rev() {
            removed += tx
                .execute(&format!("DELETE FROM {}", quote_ident(table)), [])
                .with_context(|| format!("failed to clear {table}"))?;
        }
        removed += tx
            .execute("DELETE FROM data_migration_staging", [])
            .context("failed to clear staging")?;

        tx.commit().context("failed to commit reset")?;
        Ok(removed)
    }

    pub fn record_run(&self, report: &StageReport) -> Result<()> {
        let data_types: Vec<&str> = report.data_types.iter().map(|data_type| data_type.as_str()).collect();
        let row_count = i64::try_from(report.row_count()).context("row count overflow")?;
        self.conn
            .execute(
                "INSERT INTO data_migration_run(run_id, stage, data_types, started_at, finished_at, row_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    report.run_id,
                    report.stage.as_str(),
                    data_types.join(","),
                    report.started_at,
                    report.finished_at,
                    row_count,
                ],
            )
            .context("failed to record migration run")?;
        Ok(())
    }

    /// Stage runs, most recent first.
    pub fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT run_id, stage, data_types, started_at, finished_at, row_count
                 FROM data_migration_run
                 ORDER BY run_id DESC",
            )
            .context("failed to prepare run listing")?;
        let rows = stmt.query_map([], |row| {
            Ok(RunRecord {
                run_id: row.get(0)?,
                stage: row.get(1)?,
                data_types: row.get(2)?,
                started_at: row.get(3)?,
                finished_at: row.get(4)?,
                row_count: row.get(5)?,
            })
        })?;
        collect_rows(rows)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        table_exists(&self.conn, table)
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl StagingRead for SqliteMigrationStore {
    fn staged(&self, kind: ModelKind) -> std::result::Result<Vec<Record>, MigrationError> {
        let staging = |err: rusqlite::Error| {
            MigrationError::Staging(format!("failed to read staged {}: {err}", kind.as_str()))
        };

        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT data_json FROM data_migration_staging WHERE model = ?1 ORDER BY id",
            )
            .map_err(staging)?;
        let mut rows = stmt.query(params![kind.as_str()]).map_err(staging)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(staging)? {
            let data_json: String = row.get(0).map_err(staging)?;
            let record: Record = serde_json::from_str(&data_json).map_err(|err| {
                MigrationError::Staging(format!("invalid staged {} row: {err}", kind.as_str()))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: String,
    pub stage: String,
    pub data_types: String,
    pub started_at: String,
    pub finished_at: String,
    pub row_count: i64,
}

/// Every migrated target table in load order: entities, then bridges, per
/// data type, and the task table last.
#[must_use]
pub fn target_tables() -> Vec<&'static str> {
    let mut tables = Vec::new();
    for data_type in DataType::ALL {
        tables.extend(
            registry::load_order(data_type)
                .iter()
                .map(|kind| model(*kind).target_table()),
        );
        tables.extend(registry::m2m(data_type).iter().map(|bridge| bridge.table));
    }
    tables.push(TASK_TABLE);
    tables
}

fn bool_to_sql(value: bool) -> i64 {
    i64::from(value)
}

/// Datetimes as RFC3339 UTC, dates as `YYYY-MM-DD`.
fn to_sql_value(value: &FieldValue) -> Result<Value> {
    Ok(match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(flag) => Value::Integer(bool_to_sql(*flag)),
        FieldValue::Int(number) => Value::Integer(*number),
        FieldValue::Float(number) => Value::Real(*number),
        FieldValue::Text(text) => Value::Text(text.clone()),
        FieldValue::Date(date) => Value::Text(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        )),
        FieldValue::DateTime(datetime) => Value::Text(format_rfc3339(*datetime)?),
    })
}

fn from_sql_value(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(number) => FieldValue::Int(number),
        ValueRef::Real(number) => FieldValue::Float(number),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            FieldValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_sql(table: &str, columns: &[&str]) -> String {
    let names: Vec<String> = columns.iter().map(|column| quote_ident(column)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|index| format!("?{index}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names.join(", "),
        placeholders.join(", ")
    )
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn insert_error(table: &str, row: &Record, err: rusqlite::Error) -> anyhow::Error {
    match row.int("id") {
        Some(id) if is_primary_key_violation(&err) => MigrationError::DuplicatePrimaryKey {
            table: table.to_string(),
            id,
        }
        .into(),
        _ => anyhow::Error::new(err).context(format!("failed to insert into {table}")),
    }
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1
             FROM sqlite_master
             WHERE type = 'table' AND name = ?1
             LIMIT 1",
            params![table_name],
            |_| Ok(()),
        )
        .optional()
        .context("failed to query sqlite_master")?
        .is_some();

    Ok(exists)
}

fn collect_rows<T>(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}
