//! Tagged cell values and the comparators used by the operators.
//!
//! - compare: total ordering used by ORDER BY and MIN/MAX
//! - compare_loose: type-coercing ordering used by range filters
//! - loose_eq: type-coercing equality used by `=` / `IN` filters
//! - to_number / to_boolean / to_temporal: conversions used by scalar functions
//!
//! `PartialEq`/`Hash` are type-strict (integers and floats excepted) so that
//! grouping keys stay consistent with hashing.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// A single cell of a row.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Temporal(NaiveDateTime),
    /// Nested documents and arrays are carried opaquely.
    Other(serde_json::Value),
}

const TEMPORAL_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a textual date/time in one of the accepted formats.
pub fn parse_temporal(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in TEMPORAL_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a textual boolean.
pub fn parse_boolean(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a textual number, preferring integers.
pub fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(Value::Float(f)),
        _ => None,
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value, converting text and booleans when possible.
    pub fn to_number(&self) -> Option<Value> {
        match self {
            Value::Integer(_) | Value::Float(_) => Some(self.clone()),
            Value::Boolean(b) => Some(Value::Integer(i64::from(*b))),
            Value::Text(s) => parse_number(s),
            Value::Temporal(dt) => Some(Value::Integer(dt.and_utc().timestamp_millis())),
            Value::Other(serde_json::Value::Number(n)) => {
                n.as_i64().map(Value::Integer).or_else(|| n.as_f64().map(Value::Float))
            }
            _ => None,
        }
    }

    pub fn to_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Text(s) => parse_boolean(s),
            Value::Other(serde_json::Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn to_temporal(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Temporal(dt) => Some(*dt),
            Value::Text(s) => parse_temporal(s),
            Value::Integer(millis) => DateTime::from_timestamp_millis(*millis).map(|d| d.naive_utc()),
            _ => None,
        }
    }

    /// Total ordering across all value kinds, used for sorting and MIN/MAX.
    ///
    /// Kinds rank as null, boolean, number, temporal, text, nested. Text
    /// that parses as a number ranks with the numbers and compares by
    /// numeric value; ties fall back to the kind and then the raw text.
    pub fn compare(&self, other: &Value) -> Ordering {
        let (left, right) = (SortKey::of(self), SortKey::of(other));
        left.rank()
            .cmp(&right.rank())
            .then_with(|| left.cmp_within_rank(&right))
    }

    /// Comparison used by range filters. Mixed kinds are coerced to a
    /// common kind when both sides convert; otherwise falls back to
    /// [`Value::compare`].
    pub fn compare_loose(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => self.compare(other),
            _ => self.compare_coerced(other).unwrap_or_else(|| self.compare(other)),
        }
    }

    fn compare_coerced(&self, other: &Value) -> Option<Ordering> {
        if self.is_number() || other.is_number() {
            if let (Some(a), Some(b)) = (self.to_number(), other.to_number()) {
                return Some(compare_numbers(&a, &b));
            }
        }
        if matches!(self, Value::Temporal(_)) || matches!(other, Value::Temporal(_)) {
            if let (Some(a), Some(b)) = (self.to_temporal(), other.to_temporal()) {
                return Some(a.cmp(&b));
            }
        }
        if matches!(self, Value::Boolean(_)) || matches!(other, Value::Boolean(_)) {
            if let (Some(a), Some(b)) = (self.to_boolean(), other.to_boolean()) {
                return Some(a.cmp(&b));
            }
        }
        None
    }

    /// Equality as seen by filters: nulls only equal nulls, everything else
    /// goes through [`Value::compare_loose`].
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => self.compare_loose(other) == Ordering::Equal,
        }
    }

    /// Literal form accepted back by the query parser.
    pub fn to_sql(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
            Value::Text(s) => format!("'{}'", s.replace('\'', "\\'")),
            Value::Temporal(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Other(json) => format!("'{}'", json.to_string().replace('\'', "\\'")),
        }
    }

    fn numeric_hash_bits(f: f64) -> u64 {
        if f == 0.0 {
            0.0f64.to_bits()
        } else {
            f.to_bits()
        }
    }
}

/// Sort view of a value. Numeric text is folded into the number rank.
enum SortKey<'a> {
    Null,
    Boolean(bool),
    Number(Value, Option<&'a str>),
    Temporal(NaiveDateTime),
    Text(&'a str),
    Other(String),
}

impl<'a> SortKey<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Null => SortKey::Null,
            Value::Boolean(b) => SortKey::Boolean(*b),
            Value::Integer(_) | Value::Float(_) => SortKey::Number(value.clone(), None),
            Value::Temporal(dt) => SortKey::Temporal(*dt),
            Value::Text(s) => match parse_number(s) {
                Some(n) => SortKey::Number(n, Some(s)),
                None => SortKey::Text(s),
            },
            Value::Other(json) => SortKey::Other(json.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Null => 0,
            SortKey::Boolean(_) => 1,
            SortKey::Number(..) => 2,
            SortKey::Temporal(_) => 3,
            SortKey::Text(_) => 4,
            SortKey::Other(_) => 5,
        }
    }

    fn cmp_within_rank(&self, other: &SortKey<'_>) -> Ordering {
        match (self, other) {
            (SortKey::Boolean(a), SortKey::Boolean(b)) => a.cmp(b),
            // Stored numbers sort before equal numeric text.
            (SortKey::Number(a, a_text), SortKey::Number(b, b_text)) => compare_numbers(a, b)
                .then_with(|| a_text.is_some().cmp(&b_text.is_some()))
                .then_with(|| a_text.cmp(b_text)),
            (SortKey::Temporal(a), SortKey::Temporal(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Other(a), SortKey::Other(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Exact numeric ordering. NaN sorts after every other number.
fn compare_numbers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Integer(i), Value::Float(f)) => compare_int_float(*i, *f),
        (Value::Float(f), Value::Integer(i)) => compare_int_float(*i, *f).reverse(),
        (Value::Float(a), Value::Float(b)) => match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        },
        _ => Ordering::Equal,
    }
}

fn compare_int_float(i: i64, f: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() || f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let whole = f.trunc() as i64;
    i.cmp(&whole).then_with(|| {
        let fraction = f - f.trunc();
        if fraction > 0.0 {
            Ordering::Less
        } else if fraction < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                *a as f64 == *b
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Temporal(a), Value::Temporal(b)) => a == b,
            (Value::Other(a), Value::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Integer(i) => {
                2u8.hash(state);
                Self::numeric_hash_bits(*i as f64).hash(state);
            }
            Value::Float(f) => {
                2u8.hash(state);
                Self::numeric_hash_bits(*f).hash(state);
            }
            Value::Text(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::Temporal(dt) => {
                4u8.hash(state);
                dt.hash(state);
            }
            Value::Other(json) => {
                5u8.hash(state);
                json.to_string().hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Temporal(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Other(json) => write!(f, "{}", json),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Other(other),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Temporal(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Value::Other(json) => json.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::Temporal(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
