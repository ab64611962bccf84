//! DocSQL - query JSON, JSON Lines and CSV files with a small SQL dialect.
//!
//! The query engine lives in [`docsql_core`]; this crate adds file-backed
//! tables, configuration and result rendering for the `docsql` binary.

pub mod config;
pub mod error;
pub mod output;
pub mod source;

pub use config::{Config, TableConfig, CONFIG_FILE_NAME};
pub use error::{DocSqlError, DocSqlResult};
pub use output::{render_table, write_data_set, OutputFormat};
pub use source::{load_documents, Document, DocumentDataContext, DocumentFormat};

pub use docsql_core;
