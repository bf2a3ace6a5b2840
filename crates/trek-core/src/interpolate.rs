//! Strict-mode interpolation of typed literals in command documents.
//!
//! Migrations files can only express JSON/YAML scalars. Values the target
//! store needs as native types are written as single-key operator markers,
//! e.g. `{ "$date": "2021-05-01T00:00:00Z" }`, and replaced here before the
//! command is run.
//!
//! The walk:
//!   - at every map entry, a value matching a registered [`Operator`] is
//!     replaced by the operator's output and not descended into;
//!   - otherwise maps are walked recursively and every array element gets the
//!     same treatment as a map value (operator check first, then recursion);
//!   - scalars are left alone.

use chrono::{
  DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use thiserror::Error;

use crate::document::{Document, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpolationError {
  #[error(
    "strict $date value of [ {0} ] does not match supported date or date-time formats"
  )]
  InvalidDate(String),

  #[error("strict {operator} value must be {expected}, found {found}")]
  UnexpectedType {
    operator: &'static str,
    expected: &'static str,
    found:    String,
  },
}

// ─── Operators ───────────────────────────────────────────────────────────────

/// A typed-literal marker the interpolator knows how to resolve.
pub trait Operator: Send + Sync {
  /// The reserved key, e.g. `"$date"`.
  fn name(&self) -> &'static str;

  /// Whether `value` is this operator's marker. The default accepts a
  /// document with exactly one key equal to [`Operator::name`].
  fn matches(&self, value: &Value) -> bool {
    value
      .as_document()
      .is_some_and(|d| d.len() == 1 && d.contains_key(self.name()))
  }

  /// Produce the replacement for a value that [`Operator::matches`].
  fn interpolate(&self, value: &Value) -> Result<Value, InterpolationError>;
}

/// Resolves `{ "$date": ... }` into [`Value::DateTime`].
///
/// Strings are tried against [`DATE_FORMATS`] in order; the first format that
/// parses wins. Integers are read as milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateOperator;

impl Operator for DateOperator {
  fn name(&self) -> &'static str { "$date" }

  fn interpolate(&self, value: &Value) -> Result<Value, InterpolationError> {
    match value.get(self.name()) {
      Some(Value::String(s)) => parse_date(s)
        .map(Value::DateTime)
        .ok_or_else(|| InterpolationError::InvalidDate(s.clone())),
      Some(Value::Int(millis)) => Utc
        .timestamp_millis_opt(*millis)
        .single()
        .map(Value::DateTime)
        .ok_or_else(|| InterpolationError::InvalidDate(millis.to_string())),
      other => Err(InterpolationError::UnexpectedType {
        operator: "$date",
        expected: "a string or epoch milliseconds",
        found:    format!("{other:?}"),
      }),
    }
  }
}

type DateParser = fn(&str) -> Option<DateTime<Utc>>;

/// Accepted `$date` formats, in the order they are attempted.
pub const DATE_FORMATS: &[(&str, DateParser)] = &[
  ("instant", parse_instant),
  ("basic-iso-date", parse_basic_iso_date),
  ("iso-date", parse_iso_date),
  ("iso-local-date-time", parse_local_date_time),
  ("iso-zoned-date-time", parse_zoned_date_time),
  ("iso-ordinal-date", parse_ordinal_date),
  ("iso-week-date", parse_week_date),
  ("rfc-1123", parse_rfc_1123),
];

/// Parse a `$date` literal using the first matching entry of
/// [`DATE_FORMATS`].
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
  DATE_FORMATS.iter().find_map(|(_, parse)| parse(s))
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
  date.and_time(NaiveTime::MIN).and_utc()
}

fn midnight_at(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
  offset
    .from_local_datetime(&date.and_time(NaiveTime::MIN))
    .single()
    .map(|dt| dt.with_timezone(&Utc))
}

/// `2021-05-01T00:00:00Z`, `2021-05-01T10:00:00.250+02:00`
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// `20210501`, `20210501+0200`
fn parse_basic_iso_date(s: &str) -> Option<DateTime<Utc>> {
  if s.len() == 8 {
    return NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(midnight_utc);
  }
  if s.len() == 13 {
    let date = NaiveDate::parse_from_str(s.get(..8)?, "%Y%m%d").ok()?;
    let offset = parse_offset(s.get(8..)?)?;
    return midnight_at(date, offset);
  }
  None
}

/// `2021-05-01`, `2021-05-01Z`, `2021-05-01+02:00`
fn parse_iso_date(s: &str) -> Option<DateTime<Utc>> {
  if s.len() < 10 || !s.is_char_boundary(10) {
    return None;
  }
  let date = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d").ok()?;
  match &s[10..] {
    "" => Some(midnight_utc(date)),
    offset => midnight_at(date, parse_offset(offset)?),
  }
}

/// `2021-05-01T10:15:30`, `2021-05-01T10:15`; read as UTC.
fn parse_local_date_time(s: &str) -> Option<DateTime<Utc>> {
  ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .map(|dt| dt.and_utc())
}

/// `2021-05-01T10:15:30+01:00[Europe/Paris]`; the region is informational,
/// the offset decides the instant.
fn parse_zoned_date_time(s: &str) -> Option<DateTime<Utc>> {
  let (date_time, zone) = s.strip_suffix(']')?.split_once('[')?;
  if zone.is_empty() {
    return None;
  }
  parse_instant(date_time)
}

/// `2021-121` (year and day-of-year)
fn parse_ordinal_date(s: &str) -> Option<DateTime<Utc>> {
  NaiveDate::parse_from_str(s, "%Y-%j").ok().map(midnight_utc)
}

/// `2021-W17-6` (ISO week-numbering year, week, weekday)
fn parse_week_date(s: &str) -> Option<DateTime<Utc>> {
  NaiveDate::parse_from_str(s, "%G-W%V-%u").ok().map(midnight_utc)
}

/// `Sat, 1 May 2021 00:00:00 GMT`
fn parse_rfc_1123(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc2822(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// `Z`, `+02:00`, `+0200`, `-05`
fn parse_offset(s: &str) -> Option<FixedOffset> {
  if s == "Z" {
    return FixedOffset::east_opt(0);
  }
  let sign = match s.as_bytes().first()? {
    b'+' => 1,
    b'-' => -1,
    _ => return None,
  };
  let digits: String = s[1..].chars().filter(|c| *c != ':').collect();
  if !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  let (hours, minutes) = match digits.len() {
    2 => (digits.parse::<i32>().ok()?, 0),
    4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
    _ => return None,
  };
  FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

// ─── Interpolator ────────────────────────────────────────────────────────────

/// Walks a document and resolves every registered operator marker.
pub struct Interpolator {
  operators: Vec<Box<dyn Operator>>,
}

impl Default for Interpolator {
  /// The standard registry: `$date`.
  fn default() -> Self { Self { operators: vec![Box::new(DateOperator)] } }
}

impl Interpolator {
  /// An interpolator with no operators; every document passes through
  /// unchanged.
  pub fn empty() -> Self { Self { operators: Vec::new() } }

  /// Register an additional operator. Earlier registrations win when more
  /// than one operator matches a value.
  pub fn with_operator(mut self, operator: impl Operator + 'static) -> Self {
    self.operators.push(Box::new(operator));
    self
  }

  /// Resolve markers in `document` in place.
  pub fn interpolate(&self, document: &mut Document) -> Result<(), InterpolationError> {
    for value in document.values_mut() {
      self.interpolate_value(value)?;
    }
    Ok(())
  }

  /// Owned counterpart of [`Self::interpolate`].
  pub fn interpolated(&self, mut document: Document) -> Result<Document, InterpolationError> {
    self.interpolate(&mut document)?;
    Ok(document)
  }

  fn operator_for(&self, value: &Value) -> Option<&dyn Operator> {
    self
      .operators
      .iter()
      .find(|op| op.matches(value))
      .map(|op| &**op)
  }

  fn interpolate_value(&self, value: &mut Value) -> Result<(), InterpolationError> {
    if let Some(operator) = self.operator_for(value) {
      *value = operator.interpolate(value)?;
      return Ok(());
    }

    match value {
      Value::Document(doc) => self.interpolate(doc),
      Value::Array(items) => {
        for item in items {
          self.interpolate_value(item)?;
        }
        Ok(())
      }
      _ => Ok(()),
    }
  }
}
