//! Row formatting and legacy value coercion.

use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::value::{FieldValue, Record};
use crate::MigrationError;

const ADDRESS_LINES: usize = 8;

/// Builds a staging record from one legacy row.
///
/// Columns outside `includes` are dropped (an empty or absent list keeps
/// every column). `_datetime` columns are coerced to UTC datetimes and
/// `_date` columns to dates; anything unparsable becomes null. A non-zero
/// `pk` overrides the `id` column.
#[must_use]
pub fn format_row(
    columns: &[String],
    row: Vec<FieldValue>,
    includes: Option<&[&str]>,
    pk: Option<i64>,
) -> Record {
    let includes = includes.filter(|fields| !fields.is_empty());
    let mut data = Record::new();

    for (column, value) in columns.iter().zip(row) {
        if let Some(fields) = includes {
            if !fields.contains(&column.as_str()) {
                continue;
            }
        }

        let value = if column.ends_with("_datetime") {
            coerce_datetime(value)
        } else if column.ends_with("_date") {
            coerce_date(value)
        } else {
            value
        };

        data.insert(column.clone(), value);
    }

    if let Some(pk) = pk.filter(|pk| *pk != 0) {
        data.insert("id".to_string(), FieldValue::Int(pk));
    }

    data
}

fn coerce_datetime(value: FieldValue) -> FieldValue {
    if !value.is_truthy() {
        return FieldValue::Null;
    }
    datetime_or_none(&value)
        .ok()
        .flatten()
        .map_or(FieldValue::Null, FieldValue::DateTime)
}

fn coerce_date(value: FieldValue) -> FieldValue {
    if !value.is_truthy() {
        return FieldValue::Null;
    }
    date_or_none(&value)
        .ok()
        .flatten()
        .map_or(FieldValue::Null, FieldValue::Date)
}

/// `"foo_bar"` -> `"Foo Bar"`.
#[must_use]
pub fn format_name(name: &str) -> String {
    name.split('_')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Parses a legacy date in any of the formats V1 stored.
///
/// # Errors
/// Returns [`MigrationError::InvalidValue`] when the text matches none of the
/// accepted formats.
pub fn date_or_none(value: &FieldValue) -> Result<Option<Date>, MigrationError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Date(date) => Ok(Some(*date)),
        FieldValue::DateTime(datetime) => Ok(Some(datetime.date())),
        FieldValue::Text(raw) if raw.trim().is_empty() => Ok(None),
        FieldValue::Text(raw) => {
            parse_legacy_date(raw.trim())
                .map(Some)
                .ok_or_else(|| MigrationError::InvalidValue {
                    field: "date".to_string(),
                    message: format!("Date {raw} not in parsable format"),
                })
        }
        other => Err(MigrationError::InvalidValue {
            field: "date".to_string(),
            message: format!("Date {other:?} not in parsable format"),
        }),
    }
}

/// Parses a legacy timestamp, assuming UTC when no offset is present.
///
/// # Errors
/// Returns [`MigrationError::InvalidValue`] for text that is neither an ISO
/// timestamp nor a legacy date.
pub fn datetime_or_none(value: &FieldValue) -> Result<Option<OffsetDateTime>, MigrationError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::DateTime(datetime) => Ok(Some(datetime.to_offset(UtcOffset::UTC))),
        FieldValue::Date(date) => Ok(Some(PrimitiveDateTime::new(*date, Time::MIDNIGHT).assume_utc())),
        FieldValue::Text(raw) if raw.trim().is_empty() => Ok(None),
        FieldValue::Text(raw) => parse_legacy_datetime(raw.trim())
            .map(Some)
            .ok_or_else(|| MigrationError::InvalidValue {
                field: "datetime".to_string(),
                message: format!("Datetime {raw} not in parsable format"),
            }),
        other => Err(MigrationError::InvalidValue {
            field: "datetime".to_string(),
            message: format!("Datetime {other:?} not in parsable format"),
        }),
    }
}

/// # Errors
/// Returns [`MigrationError::InvalidValue`] for text that is not an integer.
pub fn int_or_none(value: &FieldValue) -> Result<Option<i64>, MigrationError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Int(number) => Ok(Some(*number)),
        FieldValue::Text(raw) if raw.trim().is_empty() => Ok(None),
        FieldValue::Text(raw) => {
            raw.trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|err| MigrationError::InvalidValue {
                    field: "int".to_string(),
                    message: format!("{raw}: {err}"),
                })
        }
        other => Err(MigrationError::InvalidValue {
            field: "int".to_string(),
            message: format!("{other:?} is not an integer"),
        }),
    }
}

/// `Y`/`TRUE` and `N`/`FALSE` in any case; blank is absent.
///
/// # Errors
/// Returns [`MigrationError::UnmappedCode`] for anything else.
pub fn str_to_bool(value: Option<&str>) -> Result<Option<bool>, MigrationError> {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    match raw.to_ascii_uppercase().as_str() {
        "Y" | "TRUE" => Ok(Some(true)),
        "N" | "FALSE" => Ok(Some(false)),
        _ => Err(MigrationError::UnmappedCode {
            field: "bool".to_string(),
            code: raw.to_string(),
        }),
    }
}

/// Maps legacy flags onto the V2 `yes`/`no`/`n/a` choice.
///
/// # Errors
/// Returns [`MigrationError::UnmappedCode`] for unrecognized flags.
pub fn str_to_yes_no(value: Option<&str>) -> Result<Option<&'static str>, MigrationError> {
    if let Some(raw) = value {
        if matches!(raw.trim().to_ascii_uppercase().as_str(), "N/A" | "NA") {
            return Ok(Some("n/a"));
        }
    }

    Ok(str_to_bool(value)?.map(|flag| if flag { "yes" } else { "no" }))
}

/// Splits a newline separated address into the eight V2 address lines.
/// Lines beyond the eighth are folded into the last one.
#[must_use]
pub fn split_address(address: Option<&str>) -> Vec<Option<String>> {
    let lines: Vec<&str> = address
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut split: Vec<Option<String>> = lines
        .iter()
        .take(ADDRESS_LINES - 1)
        .map(|line| Some((*line).to_string()))
        .collect();

    if lines.len() >= ADDRESS_LINES {
        split.push(Some(lines[ADDRESS_LINES - 1..].join(", ")));
    }

    split.resize(ADDRESS_LINES, None);
    split
}

fn parse_legacy_datetime(raw: &str) -> Option<OffsetDateTime> {
    let iso = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let iso_fraction =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    let spaced = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let spaced_fraction =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");

    for description in [iso, iso_fraction, spaced, spaced_fraction] {
        if let Ok(parsed) = PrimitiveDateTime::parse(raw, description) {
            return Some(parsed.assume_utc());
        }
    }

    if let Ok(parsed) =
        OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
    {
        return Some(parsed.to_offset(UtcOffset::UTC));
    }

    parse_legacy_date(raw).map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
}

fn parse_legacy_date(raw: &str) -> Option<Date> {
    let parts: Vec<&str> = raw.split(' ').filter(|part| !part.is_empty()).collect();
    if let [day, month, year] = parts.as_slice() {
        return build_date(parse_year(year, false)?, month_from_name(month)?, parse_number(day)?);
    }

    for separator in ['-', '/', '.'] {
        let parts: Vec<&str> = raw.split(separator).collect();
        let [first, second, third] = parts.as_slice() else {
            continue;
        };

        if separator == '-' && first.len() == 4 {
            let month = Month::try_from(parse_number(second)?).ok()?;
            return build_date(parse_year(first, false)?, month, parse_number(third)?);
        }

        let month = Month::try_from(parse_number(second)?).ok()?;
        return build_date(parse_year(third, true)?, month, parse_number(first)?);
    }

    None
}

fn build_date(year: i32, month: Month, day: u8) -> Option<Date> {
    Date::from_calendar_date(year, month, day).ok()
}

fn parse_number(raw: &str) -> Option<u8> {
    if raw.is_empty() || raw.len() > 2 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

// Two digit years pivot at 69 (69-99 -> 19xx, 00-68 -> 20xx).
fn parse_year(raw: &str, allow_short: bool) -> Option<i32> {
    if !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let number: i32 = raw.parse().ok()?;
    match raw.len() {
        4 => Some(number),
        2 if allow_short => Some(if number >= 69 { 1900 + number } else { 2000 + number }),
        _ => None,
    }
}

fn month_from_name(raw: &str) -> Option<Month> {
    let month = match raw.to_ascii_lowercase().as_str() {
        "january" => Month::January,
        "february" => Month::February,
        "march" => Month::March,
        "april" => Month::April,
        "may" => Month::May,
        "june" => Month::June,
        "july" => Month::July,
        "august" => Month::August,
        "september" => Month::September,
        "october" => Month::October,
        "november" => Month::November,
        "december" => Month::December,
        _ => return None,
    };
    Some(month)
}
