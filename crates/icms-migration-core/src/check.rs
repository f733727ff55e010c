//! Post-load row count checks.
//!
//! A [`CheckCount`] compares target rows against a fixed expectation, a
//! [`CheckQuery`] against a scalar count from the legacy replica. Both count
//! across one or more target tables, optionally restricted by a SQL filter.

use serde::Serialize;

use crate::MigrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckCount {
    pub name: &'static str,
    pub expected_count: i64,
    pub tables: &'static [&'static str],
    /// SQL predicate applied to every table, e.g. `is_active = 1`.
    pub filter: Option<&'static str>,
    /// When false the target may hold more rows than expected.
    pub is_exact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckQuery {
    pub name: &'static str,
    /// Legacy SQL returning a single count.
    pub query: &'static str,
    pub binds: &'static [(&'static str, &'static str)],
    pub tables: &'static [&'static str],
    pub filter: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountCheck {
    Count(CheckCount),
    Query(CheckQuery),
}

impl CountCheck {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Count(check) => check.name,
            Self::Query(check) => check.name,
        }
    }

    #[must_use]
    pub fn tables(&self) -> &'static [&'static str] {
        match self {
            Self::Count(check) => check.tables,
            Self::Query(check) => check.tables,
        }
    }

    #[must_use]
    pub fn filter(&self) -> Option<&'static str> {
        match self {
            Self::Count(check) => check.filter,
            Self::Query(check) => check.filter,
        }
    }

    /// Compares the target count against `expected`, which for a
    /// [`CheckQuery`] is the legacy count.
    #[must_use]
    pub fn evaluate(&self, expected: i64, actual: i64) -> CheckOutcome {
        let exact = match self {
            Self::Count(check) => check.is_exact,
            Self::Query(_) => true,
        };
        let passed = if exact { actual == expected } else { actual >= expected };
        CheckOutcome {
            name: self.name().to_string(),
            expected,
            actual,
            exact,
            passed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub expected: i64,
    pub actual: i64,
    pub exact: bool,
    pub passed: bool,
}

impl CheckOutcome {
    #[must_use]
    pub fn describe(&self) -> String {
        let relation = if self.exact { "" } else { "at least " };
        format!(
            "{} found {} expected {relation}{}",
            self.name, self.actual, self.expected
        )
    }
}

/// Collects every failed check into a single error.
///
/// # Errors
/// Returns [`MigrationError::CountMismatch`] listing each failure.
pub fn ensure_passed(outcomes: &[CheckOutcome]) -> Result<(), MigrationError> {
    let failures: Vec<String> = outcomes
        .iter()
        .filter(|outcome| !outcome.passed)
        .map(CheckOutcome::describe)
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(MigrationError::CountMismatch(failures))
    }
}
