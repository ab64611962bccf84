//! CSV loader with per-column type inference.

use std::path::Path;

use docsql_core::Value;

use super::Document;
use crate::error::DocSqlResult;

/// Narrowest type every non-empty cell of a column parses as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl CellKind {
    fn of(cell: &str) -> Self {
        if cell.parse::<i64>().is_ok() {
            CellKind::Integer
        } else if cell.bytes().any(|b| b.is_ascii_digit()) && cell.parse::<f64>().is_ok() {
            CellKind::Float
        } else if cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false") {
            CellKind::Boolean
        } else {
            CellKind::Text
        }
    }

    fn infer<'a>(cells: impl Iterator<Item = &'a str>) -> Self {
        let mut kind = None;
        for cell in cells.filter(|c| !c.is_empty()) {
            let next = match (kind, Self::of(cell)) {
                (None, found) => found,
                (Some(current), found) if current == found => current,
                (Some(CellKind::Integer), CellKind::Float) | (Some(CellKind::Float), CellKind::Integer) => {
                    CellKind::Float
                }
                _ => CellKind::Text,
            };
            if next == CellKind::Text {
                return CellKind::Text;
            }
            kind = Some(next);
        }
        kind.unwrap_or(CellKind::Text)
    }

    fn convert(self, cell: &str) -> Value {
        if cell.is_empty() {
            return Value::Null;
        }
        let converted = match self {
            CellKind::Integer => cell.parse::<i64>().ok().map(Value::Integer),
            CellKind::Float => cell.parse::<f64>().ok().map(Value::Float),
            CellKind::Boolean => Some(Value::Boolean(cell.eq_ignore_ascii_case("true"))),
            CellKind::Text => None,
        };
        converted.unwrap_or_else(|| Value::Text(cell.to_string()))
    }
}

/// Rows of a CSV file with a header row. Short records read as NULL in
/// their missing cells.
pub(super) fn read_csv(path: &Path) -> DocSqlResult<Vec<Document>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let records = reader
        .records()
        .collect::<Result<Vec<csv::StringRecord>, csv::Error>>()?;

    let kinds: Vec<CellKind> = (0..headers.len())
        .map(|i| CellKind::infer(records.iter().filter_map(|r| r.get(i))))
        .collect();
    tracing::debug!("Inferred column kinds of {}: {:?}", path.display(), kinds);

    Ok(records
        .iter()
        .map(|record| {
            headers
                .iter()
                .zip(&kinds)
                .enumerate()
                .map(|(i, (name, kind))| (name.clone(), kind.convert(record.get(i).unwrap_or(""))))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_infer_kinds() {
        assert_eq!(CellKind::infer(["1", "", "22"].into_iter()), CellKind::Integer);
        assert_eq!(CellKind::infer(["1", "2.5"].into_iter()), CellKind::Float);
        assert_eq!(CellKind::infer(["TRUE", "false"].into_iter()), CellKind::Boolean);
        assert_eq!(CellKind::infer(["1", "abc"].into_iter()), CellKind::Text);
        assert_eq!(CellKind::infer(["nan", "inf"].into_iter()), CellKind::Text);
        assert_eq!(CellKind::infer(["", ""].into_iter()), CellKind::Text);
    }

    #[test]
    fn test_read_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "id,name,score,active\n1,Ann,3.5,true\n2, Bob ,,false\n3,Cy\n").unwrap();

        let documents = read_csv(&path).unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(
            documents[0],
            vec![
                ("id".to_string(), Value::Integer(1)),
                ("name".to_string(), Value::from("Ann")),
                ("score".to_string(), Value::Float(3.5)),
                ("active".to_string(), Value::Boolean(true)),
            ]
        );
        assert_eq!(documents[1][1].1, Value::from("Bob"));
        assert_eq!(documents[1][2].1, Value::Null);
        assert_eq!(documents[2][3].1, Value::Null);
    }
}
