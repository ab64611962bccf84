//! Configuration handling
//!
//! Manages the `docsql.toml` configuration file:
//!
//! ```toml
//! data_dir = "data"
//! format = "table"
//!
//! [engine]
//! count_pushdown = true
//! primary_key_lookup = true
//!
//! [[tables]]
//! name = "people"
//! path = "people.json"
//! primary_key = "id"
//! ```
//!
//! ## Environment Variables
//!
//! - `DOCSQL_DATA_DIR` - Base directory for relative table paths
//! - `DOCSQL_FORMAT` - Output format (`table`, `json` or `csv`)
//!
//! These can be set in a `.env` file next to the configuration file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use docsql_core::ExecutorOptions;
use serde::{Deserialize, Serialize};

use crate::error::{DocSqlError, DocSqlResult};
use crate::output::OutputFormat;
use crate::source::DocumentFormat;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "docsql.toml";

/// Environment variable names
pub const ENV_DATA_DIR: &str = "DOCSQL_DATA_DIR";
pub const ENV_FORMAT: &str = "DOCSQL_FORMAT";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base directory for relative table paths
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Output format when none is given on the command line
    #[serde(default)]
    pub format: OutputFormat,
    /// Parser leniency and source shortcuts
    #[serde(default)]
    pub engine: ExecutorOptions,
    /// Files exposed as tables
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

/// One file exposed as a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    pub path: PathBuf,
    /// Guessed from the file extension when absent
    #[serde(default)]
    pub format: Option<DocumentFormat>,
    /// Falls back to `_key`, then `id`
    #[serde(default)]
    pub primary_key: Option<String>,
}

impl FromStr for TableConfig {
    type Err = DocSqlError;

    /// `name=path`, as given on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = s
            .split_once('=')
            .map(|(name, path)| (name.trim(), path.trim()))
            .filter(|(name, path)| !name.is_empty() && !path.is_empty())
            .ok_or_else(|| {
                DocSqlError::Config(format!("Expected NAME=PATH for a table, got '{}'", s))
            })?;
        Ok(Self {
            name: name.to_string(),
            path: PathBuf::from(path),
            format: None,
            primary_key: None,
        })
    }
}

impl Config {
    /// Load configuration from a directory
    ///
    /// This also loads any `.env` file in the directory and applies
    /// environment variable overrides. A missing configuration file yields
    /// the defaults.
    pub fn load(dir: &Path) -> DocSqlResult<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::from_file(&config_path);
        }

        load_env_file(dir);
        let mut config = Config {
            data_dir: Some(dir.to_path_buf()),
            ..Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load a specific configuration file, resolving a relative `data_dir`
    /// against the file's directory.
    pub fn from_file(path: &Path) -> DocSqlResult<Self> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        load_env_file(dir);

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.data_dir = Some(match config.data_dir.take() {
            Some(data_dir) if data_dir.is_relative() => dir.join(data_dir),
            Some(data_dir) => data_dir,
            None => dir.to_path_buf(),
        });

        config.apply_env_overrides();
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> DocSqlResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides to the configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = lookup(ENV_DATA_DIR) {
            if !data_dir.is_empty() {
                self.data_dir = Some(PathBuf::from(data_dir));
            }
        }

        if let Some(format) = lookup(ENV_FORMAT) {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => tracing::warn!("Ignoring {}: {}", ENV_FORMAT, e),
            }
        }
    }

    /// A table path as it should be opened.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if path.is_relative() => data_dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Add a table, replacing a configured one of the same name.
    pub fn add_table(&mut self, table: TableConfig) {
        self.tables
            .retain(|t| !t.name.eq_ignore_ascii_case(&table.name));
        self.tables.push(table);
    }
}

fn load_env_file(dir: &Path) {
    let env_path = dir.join(".env");
    if env_path.exists() {
        if let Err(e) = dotenvy::from_path(&env_path) {
            tracing::warn!("Could not read {}: {}", env_path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml_str(
            r#"
            format = "json"

            [engine]
            count_pushdown = false

            [[tables]]
            name = "people"
            path = "people.json"

            [[tables]]
            name = "events"
            path = "/var/data/events.log"
            format = "jsonl"
            primary_key = "event_id"
            "#,
        )
        .unwrap();

        assert_eq!(config.format, OutputFormat::Json);
        assert!(!config.engine.count_pushdown);
        assert!(config.engine.primary_key_lookup);
        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.tables[0].format, None);
        assert_eq!(config.tables[1].format, Some(DocumentFormat::Jsonl));
        assert_eq!(config.tables[1].primary_key.as_deref(), Some("event_id"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.format, OutputFormat::Table);
        assert_eq!(config.engine, ExecutorOptions::default());
        assert!(config.tables.is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            Config::from_toml_str("format = \"xml\""),
            Err(DocSqlError::TomlError(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [(ENV_DATA_DIR, "/srv/docs"), (ENV_FORMAT, "csv")].into();
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/docs")));
        assert_eq!(config.format, OutputFormat::Csv);
    }

    #[test]
    fn test_invalid_format_override_is_ignored() {
        let mut config = Config {
            format: OutputFormat::Json,
            ..Config::default()
        };
        config.apply_overrides(|key| (key == ENV_FORMAT).then(|| "yaml".to_string()));
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_resolve_path() {
        let config = Config {
            data_dir: Some(PathBuf::from("/data")),
            ..Config::default()
        };
        assert_eq!(config.resolve_path(Path::new("a.json")), PathBuf::from("/data/a.json"));
        assert_eq!(config.resolve_path(Path::new("/tmp/b.csv")), PathBuf::from("/tmp/b.csv"));
    }

    #[test]
    fn test_table_argument() {
        let table: TableConfig = "people = data/people.csv".parse().unwrap();
        assert_eq!(table.name, "people");
        assert_eq!(table.path, PathBuf::from("data/people.csv"));
        assert!("people".parse::<TableConfig>().is_err());
        assert!("=x.json".parse::<TableConfig>().is_err());
    }

    #[test]
    fn test_add_table_replaces_same_name() {
        let mut config = Config::default();
        config.add_table("people=a.json".parse().unwrap());
        config.add_table("People=b.json".parse().unwrap());
        assert_eq!(config.tables.len(), 1);
        assert_eq!(config.tables[0].path, PathBuf::from("b.json"));
    }

    #[test]
    fn test_from_file_resolves_data_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "data_dir = \"files\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, Some(dir.path().join("files")));
    }
}
