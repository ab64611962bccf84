//! Rendering query results as an aligned table, JSON or CSV.

use std::io::Write;
use std::str::FromStr;

use colored::{Color, ColoredString, Colorize};
use docsql_core::{BoxedDataSet, DataSetExt, Row, SelectItem, Style, Value};
use serde::{Deserialize, Serialize};

use crate::error::{DocSqlError, DocSqlResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned columns for the terminal
    #[default]
    Table,
    /// A JSON array of objects keyed by column label
    Json,
    /// CSV with a header row
    Csv,
}

impl FromStr for OutputFormat {
    type Err = DocSqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(DocSqlError::Config(format!("Unknown output format: {}", other))),
        }
    }
}

/// Drain `data_set` into `out`, returning the number of rows written.
pub fn write_data_set<W: Write>(
    data_set: &mut BoxedDataSet,
    format: OutputFormat,
    out: &mut W,
) -> DocSqlResult<usize> {
    let labels: Vec<String> = data_set.select_items().iter().map(SelectItem::label).collect();
    let rows = data_set.to_rows()?;

    match format {
        OutputFormat::Table => out.write_all(render_table(&labels, &rows).as_bytes())?,
        OutputFormat::Json => {
            let documents: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    let fields = labels
                        .iter()
                        .zip(row.values())
                        .map(|(label, value)| (label.clone(), serde_json::Value::from(&value)))
                        .collect();
                    serde_json::Value::Object(fields)
                })
                .collect();
            serde_json::to_writer_pretty(&mut *out, &documents)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(&labels)?;
            for row in &rows {
                writer.write_record(row.values().iter().map(csv_cell))?;
            }
            writer.flush()?;
        }
    }
    Ok(rows.len())
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn table_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

/// Column-aligned text; cell styles are applied after padding.
pub fn render_table(labels: &[String], rows: &[Row]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.values().iter().map(table_cell).collect())
        .collect();

    let mut widths: Vec<usize> = labels.iter().map(|l| l.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = labels
        .iter()
        .zip(&widths)
        .map(|(label, &width)| pad(label, width).bold().to_string())
        .collect();
    out.push_str(&header.join(" | "));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');

    for (row, values) in rows.iter().zip(&cells) {
        let line: Vec<String> = values
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &width))| {
                let padded = pad(cell, width);
                match row.style(i) {
                    Some(style) if !style.is_plain() => apply_style(padded, style).to_string(),
                    _ => padded,
                }
            })
            .collect();
        out.push_str(&line.join(" | "));
        out.push('\n');
    }
    out
}

fn pad(text: &str, width: usize) -> String {
    format!("{:<width$}", text, width = width)
}

fn apply_style(text: String, style: &Style) -> ColoredString {
    let mut styled = text.normal();
    if style.bold {
        styled = styled.bold();
    }
    if style.italic {
        styled = styled.italic();
    }
    if let Some(color) = style.foreground.as_deref().and_then(parse_color) {
        styled = styled.color(color);
    }
    if let Some(color) = style.background.as_deref().and_then(parse_color) {
        styled = styled.on_color(color);
    }
    styled
}

fn parse_color(name: &str) -> Option<Color> {
    match Color::from_str(name) {
        Ok(color) => Some(color),
        Err(_) => {
            tracing::debug!("Ignoring unknown color {}", name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsql_core::dataset::{InMemoryDataSet, SimpleDataSetHeader};
    use docsql_core::{Column, ColumnType};

    fn data_set() -> BoxedDataSet {
        let header = SimpleDataSetHeader::shared(vec![
            SelectItem::column(Column::new("people", "name").with_type(ColumnType::Text)),
            SelectItem::column(Column::new("people", "age").with_type(ColumnType::Number))
                .with_alias("years"),
        ]);
        let rows = vec![
            Row::new(header.clone(), vec![Value::from("Ann"), Value::from(30)]),
            Row::new(header.clone(), vec![Value::from("Bob"), Value::Null]),
        ];
        Box::new(InMemoryDataSet::new(header, rows))
    }

    fn render(format: OutputFormat) -> String {
        let mut out = Vec::new();
        let count = write_data_set(&mut data_set(), format, &mut out).unwrap();
        assert_eq!(count, 2);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_output_format() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_json_output() {
        let json: serde_json::Value = serde_json::from_str(&render(OutputFormat::Json)).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "Ann", "years": 30},
                {"name": "Bob", "years": null}
            ])
        );
    }

    #[test]
    fn test_csv_output() {
        assert_eq!(render(OutputFormat::Csv), "name,years\nAnn,30\nBob,\n");
    }

    #[test]
    fn test_table_output() {
        colored::control::set_override(false);
        let text = render(OutputFormat::Table);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name | years");
        assert_eq!(lines[1], "-----+------");
        assert_eq!(lines[2], "Ann  | 30   ");
        assert_eq!(lines[3], "Bob  | NULL ");
    }
}
