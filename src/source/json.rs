//! JSON and JSON Lines loaders.

use std::fs;
use std::path::Path;

use docsql_core::Value;

use super::Document;
use crate::error::{DocSqlError, DocSqlResult};

/// A JSON array of objects, or one object. Non-object array elements are
/// skipped.
pub(super) fn read_json(path: &Path) -> DocSqlResult<Vec<Document>> {
    let content = fs::read_to_string(path)?;
    match serde_json::from_str::<serde_json::Value>(&content)? {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                serde_json::Value::Object(map) => Some(to_document(map)),
                other => {
                    tracing::warn!(
                        "Skipping element {} of {}: expected an object, found {}",
                        i,
                        path.display(),
                        kind_of(&other)
                    );
                    None
                }
            })
            .collect()),
        serde_json::Value::Object(map) => Ok(vec![to_document(map)]),
        other => Err(DocSqlError::InvalidDocument {
            path: path.display().to_string(),
            message: format!("expected an array or an object, found {}", kind_of(&other)),
        }),
    }
}

/// One object per line; blank lines are ignored and malformed ones skipped.
pub(super) fn read_json_lines(path: &Path) -> DocSqlResult<Vec<Document>> {
    let content = fs::read_to_string(path)?;
    let mut documents = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(serde_json::Value::Object(map)) => documents.push(to_document(map)),
            Ok(other) => tracing::warn!(
                "Skipping line {} of {}: expected an object, found {}",
                number + 1,
                path.display(),
                kind_of(&other)
            ),
            Err(e) => tracing::warn!(
                "Skipping malformed line {} of {}: {}",
                number + 1,
                path.display(),
                e
            ),
        }
    }
    Ok(documents)
}

fn to_document(map: serde_json::Map<String, serde_json::Value>) -> Document {
    map.into_iter().map(|(key, value)| (key, Value::from(value))).collect()
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
