//! Field coercions for the in-memory engine.
//!
//! Stored values and filter operands are run through the same coercion before
//! they are compared, so `"2024-01-02"` and `"2024-01-02T00:00:00"` are equal
//! for a [`FieldKind::Date`] field and `"10"` sorts after `"9"` for a
//! [`FieldKind::Integer`] one.

use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type CoerceFn = dyn Fn(&Value) -> Result<Value, String> + Send + Sync;

/// Parse an ISO 8601 date or date-time.
///
/// Accepts `T` or space separators, optional fractional seconds, and an
/// optional `Z`/`±HH:MM` offset (converted to UTC). A bare date means midnight.
pub(crate) fn parse_iso8601(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// How a field's values are normalized before comparison.
#[derive(Clone, Default)]
pub enum FieldKind {
    /// Whole numbers; floats truncate, numeric strings parse.
    Integer,
    /// Floating point; integers widen, numeric strings parse.
    Float,
    /// Same as [`FieldKind::Float`].
    Decimal,
    /// Text; falsy values (empty string, 0, false) become NULL.
    Text,
    /// Truthiness.
    Bool,
    /// ISO 8601 timestamps.
    Time,
    /// ISO 8601 strings or unix seconds; `0` means NULL.
    Date,
    /// No coercion.
    #[default]
    Passthrough,
    /// Caller-supplied coercion.
    Custom(Arc<CoerceFn>),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Integer => f.write_str("Integer"),
            FieldKind::Float => f.write_str("Float"),
            FieldKind::Decimal => f.write_str("Decimal"),
            FieldKind::Text => f.write_str("Text"),
            FieldKind::Bool => f.write_str("Bool"),
            FieldKind::Time => f.write_str("Time"),
            FieldKind::Date => f.write_str("Date"),
            FieldKind::Passthrough => f.write_str("Passthrough"),
            FieldKind::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn unsupported(kind: &str, value: &Value) -> String {
    format!("cannot coerce {} to {kind}", value.type_name())
}

impl FieldKind {
    /// Wrap a closure as a coercion.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        FieldKind::Custom(Arc::new(f))
    }

    /// Coerce a non-null value.
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        // JSON scalars behave like their native counterparts.
        if let Value::Json(json) = value {
            if !value.is_structured() {
                return self.coerce(&Value::from_json(json.clone()));
            }
        }

        match self {
            FieldKind::Passthrough => Ok(value.clone()),
            FieldKind::Custom(f) => f(value),
            FieldKind::Integer => match value {
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Text(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|e| format!("'{s}' is not an integer: {e}")),
                other => Err(unsupported("integer", other)),
            },
            FieldKind::Float | FieldKind::Decimal => match value {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Float(f) => Ok(Value::Float(*f)),
                Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
                Value::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|e| format!("'{s}' is not a number: {e}")),
                other => Err(unsupported("float", other)),
            },
            FieldKind::Text => {
                if value.is_truthy() {
                    Ok(Value::Text(value.to_text()))
                } else {
                    Ok(Value::Null)
                }
            }
            FieldKind::Bool => Ok(Value::Bool(value.is_truthy())),
            FieldKind::Time => match value {
                Value::Timestamp(ts) => Ok(Value::Timestamp(*ts)),
                Value::Text(s) => parse_iso8601(s)
                    .map(Value::Timestamp)
                    .ok_or_else(|| format!("'{s}' is not an ISO 8601 timestamp")),
                other => Err(unsupported("timestamp", other)),
            },
            FieldKind::Date => match value {
                Value::Text(s) => parse_iso8601(s)
                    .map(Value::Timestamp)
                    .ok_or_else(|| format!("'{s}' is not an ISO 8601 date")),
                Value::Int(0) => Ok(Value::Null),
                Value::Int(secs) => DateTime::from_timestamp(*secs, 0)
                    .map(|dt| Value::Timestamp(dt.naive_utc()))
                    .ok_or_else(|| format!("{secs} is out of range for a unix timestamp")),
                other => Ok(other.clone()),
            },
        }
    }
}

/// Field name → coercion lookup.
///
/// ```ignore
/// use qset::memory::{FieldKind, FieldRegistry};
///
/// let fields = FieldRegistry::new()
///     .field("age", FieldKind::Integer)
///     .field("created", FieldKind::Time);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: HashMap<String, FieldKind>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field (builder style).
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.insert(name, kind);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, kind: FieldKind) {
        self.fields.insert(name.into(), kind);
    }

    pub fn get(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Coerce a value for `field`.
    ///
    /// NULL stays NULL, unknown fields pass through, and a failed coercion
    /// leaves the raw value in place.
    pub fn coerce(&self, field: &str, value: Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match self.fields.get(field) {
            None => value,
            Some(kind) => kind.coerce(&value).unwrap_or_else(|message| {
                tracing::trace!(target: "qset.query", field, %message, "coercion failed, keeping raw value");
                value
            }),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, FieldKind)> for FieldRegistry {
    fn from_iter<I: IntoIterator<Item = (K, FieldKind)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
