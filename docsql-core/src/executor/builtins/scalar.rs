use chrono::{NaiveDate, NaiveDateTime};

use crate::query::FunctionType;
use crate::value::Value;

pub fn call(function: FunctionType, parameters: &[Value], value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match function {
        FunctionType::ToString => Value::Text(value.to_string()),
        FunctionType::ToNumber => value.to_number().unwrap_or(Value::Null),
        FunctionType::ToBoolean => value.to_boolean().map(Value::Boolean).unwrap_or(Value::Null),
        FunctionType::ToDate => to_date(value, parameters.first()),
        FunctionType::MapValue => match parameters.first() {
            Some(path) => map_value(value, &path.to_string()),
            None => Value::Null,
        },
        FunctionType::Substring => substring(value, parameters),
        other => {
            tracing::warn!("{} is not a scalar function", other);
            Value::Null
        }
    }
}

fn to_date(value: &Value, format: Option<&Value>) -> Value {
    let parsed = match (value, format) {
        (Value::Text(text), Some(Value::Text(format))) => {
            NaiveDateTime::parse_from_str(text.trim(), format)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(text.trim(), format)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        _ => value.to_temporal(),
    };
    parsed.map(Value::Temporal).unwrap_or(Value::Null)
}

/// Walk a dotted path (`address.city`, `tags.0`) into a nested document.
fn map_value(value: &Value, path: &str) -> Value {
    let Value::Other(document) = value else {
        return Value::Null;
    };
    let mut current = document;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let next = match current {
            serde_json::Value::Object(map) => map.get(segment),
            serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    Value::from(current.clone())
}

/// 1-based start, optional length, counted in characters.
fn substring(value: &Value, parameters: &[Value]) -> Value {
    let text = value.to_string();
    let start = parameters
        .first()
        .and_then(|p| p.to_number())
        .and_then(|n| n.as_f64())
        .map(|n| n as i64)
        .unwrap_or(1)
        .max(1) as usize;
    let length = parameters
        .get(1)
        .and_then(|p| p.to_number())
        .and_then(|n| n.as_f64())
        .map(|n| n.max(0.0) as usize);

    let chars = text.chars().skip(start - 1);
    let result: String = match length {
        Some(length) => chars.take(length).collect(),
        None => chars.collect(),
    };
    Value::Text(result)
}
