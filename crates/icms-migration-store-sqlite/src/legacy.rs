//! Read-only access to a SQLite snapshot of the V1 replica.

use std::path::Path;

use anyhow::{Context, Result};
use icms_migration_core::{FieldValue, LegacyDsn, LegacyQuery, LegacySource, MigrationError, RowSink};
use rusqlite::{Connection, OpenFlags, Statement};

use crate::from_sql_value;

pub struct SqliteLegacySource {
    conn: Connection,
}

impl SqliteLegacySource {
    pub fn open(dsn: &LegacyDsn) -> Result<Self> {
        match dsn {
            LegacyDsn::Sqlite(path) => Self::open_path(path),
        }
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open legacy replica at {}", path.display()))?;

        conn.execute_batch("PRAGMA busy_timeout = 5000;")
            .context("failed to configure legacy replica pragmas")?;

        Ok(Self { conn })
    }

    /// Wraps an already open connection, e.g. an in-memory fixture.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl LegacySource for SqliteLegacySource {
    fn fetch(
        &self,
        query: &LegacyQuery,
        chunk_size: usize,
        sink: &mut RowSink<'_>,
    ) -> Result<usize, MigrationError> {
        let failure = |err: rusqlite::Error| MigrationError::Query {
            name: query.name.to_string(),
            message: err.to_string(),
        };
        let chunk_size = chunk_size.max(1);

        let mut stmt = self.conn.prepare(query.sql).map_err(failure)?;
        bind(&mut stmt, query.binds).map_err(failure)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect();

        let mut rows = stmt.raw_query();
        let mut chunk: Vec<Vec<FieldValue>> = Vec::with_capacity(chunk_size);
        let mut total = 0;

        while let Some(row) = rows.next().map_err(failure)? {
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                values.push(from_sql_value(row.get_ref(index).map_err(failure)?));
            }
            chunk.push(values);

            if chunk.len() == chunk_size {
                total += chunk.len();
                drain(query, &columns, std::mem::take(&mut chunk), sink)?;
            }
        }

        if !chunk.is_empty() {
            total += chunk.len();
            drain(query, &columns, chunk, sink)?;
        }

        Ok(total)
    }

    fn count(&self, name: &str, sql: &str, binds: &[(&str, &str)]) -> Result<i64, MigrationError> {
        let failure = |err: rusqlite::Error| MigrationError::Query {
            name: name.to_string(),
            message: err.to_string(),
        };

        let mut stmt = self.conn.prepare(sql).map_err(failure)?;
        bind(&mut stmt, binds).map_err(failure)?;
        let mut rows = stmt.raw_query();
        match rows.next().map_err(failure)? {
            Some(row) => row.get::<_, i64>(0).map_err(failure),
            None => Err(MigrationError::Query {
                name: name.to_string(),
                message: "count query returned no rows".to_string(),
            }),
        }
    }
}

/// Binds the named parameters the statement declares; the rest are ignored
/// so one bind list can serve both a query and its count.
fn bind(stmt: &mut Statement<'_>, binds: &[(&str, &str)]) -> rusqlite::Result<()> {
    for (name, value) in binds {
        if let Some(index) = stmt.parameter_index(name)? {
            stmt.raw_bind_parameter(index, *value)?;
        }
    }
    Ok(())
}

fn drain(
    query: &LegacyQuery,
    columns: &[String],
    rows: Vec<Vec<FieldValue>>,
    sink: &mut RowSink<'_>,
) -> Result<(), MigrationError> {
    let (columns, rows) = query.project(columns, rows)?;
    sink(&columns, rows)
}
