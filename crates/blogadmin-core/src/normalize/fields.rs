//! Typed field access over loosely shaped JSON objects
//!
//! Required fields fail the record; optional fields fall back to empty/zero and
//! leave a [`Diagnostic`] whenever a present value had to be discarded.

use super::datetime::{decode_date, decode_date_time};
use crate::diagnostics::{Diagnostic, NormalizeReport};
use crate::error::NormalizationError;
use crate::models::{ResourceKind, StatusField};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use tracing::warn;

/// Read-only view of one record's JSON object
pub(crate) struct Fields<'a> {
    kind: ResourceKind,
    map: &'a Map<String, Value>,
    record_id: Option<i64>,
}

impl<'a> Fields<'a> {
    pub fn of(kind: ResourceKind, raw: &'a Value) -> Result<Self, NormalizationError> {
        let map = raw
            .as_object()
            .ok_or(NormalizationError::NotAnObject { kind })?;
        Ok(Self {
            kind,
            map,
            record_id: None,
        })
    }

    /// Nested object (e.g. `users` inside the stats payload)
    pub fn section(&self, field: &str) -> Option<Fields<'a>> {
        self.get(field)?.as_object().map(|map| Fields {
            kind: self.kind,
            map,
            record_id: self.record_id,
        })
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Required integer id; remembered for later diagnostics
    pub fn id(&mut self, field: &'static str) -> Result<i64, NormalizationError> {
        let id = self.required_int(field)?;
        self.record_id = Some(id);
        Ok(id)
    }

    pub fn required_int(&self, field: &'static str) -> Result<i64, NormalizationError> {
        let value = self.get(field).ok_or(self.missing(field))?;
        coerce_int(value)
            .ok_or_else(|| self.invalid(field, format!("expected a number, got {}", describe(value))))
    }

    /// Optional foreign key; absent or unusable values read as 0
    pub fn int_or_zero(&self, field: &'static str, report: &mut NormalizeReport) -> i64 {
        match self.get(field) {
            None => 0,
            Some(value) => coerce_int(value).unwrap_or_else(|| {
                self.fallback(report, field, format!("non-numeric {} read as 0", describe(value)));
                0
            }),
        }
    }

    /// Non-negative counter; absent reads as 0
    pub fn count(&self, field: &'static str, report: &mut NormalizeReport) -> u64 {
        match self.get(field) {
            None => 0,
            Some(value) => match coerce_int(value) {
                Some(n) if n >= 0 => n as u64,
                Some(n) => {
                    self.fallback(report, field, format!("negative count {} read as 0", n));
                    0
                }
                None => {
                    self.fallback(report, field, format!("non-numeric {} read as 0", describe(value)));
                    0
                }
            },
        }
    }

    /// Non-negative counter that fails the record when present but unusable
    pub fn strict_count(&self, field: &'static str) -> Result<u64, NormalizationError> {
        match self.get(field) {
            None => Ok(0),
            Some(value) => match coerce_int(value) {
                Some(n) if n >= 0 => Ok(n as u64),
                Some(n) => Err(self.invalid(field, format!("negative count {}", n))),
                None => Err(self.invalid(field, format!("expected a number, got {}", describe(value)))),
            },
        }
    }

    pub fn required_str(&self, field: &'static str) -> Result<String, NormalizationError> {
        match self.get(field) {
            None => Err(self.missing(field)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.invalid(field, format!("expected a string, got {}", describe(other)))),
        }
    }

    /// Optional text; blank strings read as absent
    pub fn optional_str(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn str_or_empty(&self, field: &str) -> String {
        self.optional_str(field).unwrap_or_default()
    }

    pub fn flag(&self, field: &str) -> Option<bool> {
        match self.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Date-time that must exist on every record
    ///
    /// Missing or undecodable values are replaced by the current local time and
    /// recorded as a fallback so the substitution stays auditable.
    pub fn date_time(&self, field: &'static str, report: &mut NormalizeReport) -> NaiveDateTime {
        match self.get(field) {
            Some(value) => match decode_date_time(value) {
                Some(parsed) => parsed,
                None => {
                    self.fallback(
                        report,
                        field,
                        format!("undecodable date-time {} replaced by current time", describe(value)),
                    );
                    Local::now().naive_local()
                }
            },
            None => {
                self.fallback(report, field, "missing date-time replaced by current time");
                Local::now().naive_local()
            }
        }
    }

    /// Optional date-time; undecodable values are dropped, never invented
    pub fn optional_date_time(
        &self,
        field: &'static str,
        report: &mut NormalizeReport,
    ) -> Option<NaiveDateTime> {
        let value = self.get(field)?;
        let decoded = decode_date_time(value);
        if decoded.is_none() {
            self.fallback(report, field, format!("undecodable date-time {} dropped", describe(value)));
        }
        decoded
    }

    pub fn optional_date(&self, field: &'static str, report: &mut NormalizeReport) -> Option<NaiveDate> {
        let value = self.get(field)?;
        let decoded = decode_date(value);
        if decoded.is_none() {
            self.fallback(report, field, format!("undecodable date {} dropped", describe(value)));
        }
        decoded
    }

    /// Closed-vocabulary status; unknown or missing values map to the default
    pub fn status<S: StatusField>(&self, field: &'static str, report: &mut NormalizeReport) -> S {
        match self.get(field) {
            None => S::default(),
            Some(Value::String(raw)) => S::parse(raw).unwrap_or_else(|| {
                self.fallback(report, field, format!("unknown status '{}' mapped to default", raw));
                S::default()
            }),
            Some(other) => {
                self.fallback(report, field, format!("non-string status {} mapped to default", describe(other)));
                S::default()
            }
        }
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|value| !value.is_null())
    }

    fn missing(&self, field: &'static str) -> NormalizationError {
        NormalizationError::MissingField {
            kind: self.kind,
            field,
        }
    }

    fn invalid(&self, field: &'static str, message: String) -> NormalizationError {
        NormalizationError::InvalidField {
            kind: self.kind,
            field,
            message,
        }
    }

    fn fallback(&self, report: &mut NormalizeReport, field: &'static str, message: impl Into<String>) {
        let message = message.into();
        warn!(kind = %self.kind, id = ?self.record_id, field, %message, "Field fallback");
        report.add(Diagnostic::fallback(self.kind, self.record_id, field, message));
    }
}

/// Coerce a generic JSON numeric value (or numeric string) to an integer
///
/// Fractional values are truncated toward zero.
pub(crate) fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
        other => other.to_string(),
    }
}
