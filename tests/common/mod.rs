//! Common test utilities for query tests
//!
//! Provides shared helper functions for:
//! - Writing fixture documents into a temporary data directory
//! - Building executors over those documents
//! - Running queries and collecting plain values

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use docsql::docsql_core::{DataSetExt, ExecutorOptions, PostprocessExecutor, Value};
use docsql::{Config, DocumentDataContext};
use tempfile::TempDir;

pub type Executor = PostprocessExecutor<DocumentDataContext>;

const PEOPLE: &str = r#"[
    {"id": 1, "name": "Ann", "age": 30, "dept": "eng", "address": {"city": "Oslo"}},
    {"id": 2, "name": "Bob", "age": 25, "dept": "eng", "address": {"city": "Bergen"}},
    {"id": 3, "name": "Ann", "age": 41, "dept": "sales"},
    {"id": 4, "name": "Dan", "age": null, "dept": "ops"}
]"#;

const ORDERS: &str = "\
id,person_id,total,status
10,1,20.5,paid
11,1,7,open
12,2,12,paid
13,9,3,paid
";

const NUMBERS: &str = "\
{\"n\": 1}
{\"n\": 2}
{\"n\": 3}
{\"n\": 4}
{\"n\": 5}
";

const CODES: &str = "\
{\"code\": 20}
{\"code\": \"100\"}
{\"code\": \"3\"}
{\"code\": \"n/a\"}
{\"code\": 7}
";

const CONFIG: &str = r#"
[[tables]]
name = "people"
path = "people.json"

[[tables]]
name = "orders"
path = "orders.csv"

[[tables]]
name = "t"
path = "numbers.jsonl"

[[tables]]
name = "t1"
path = "t1.json"

[[tables]]
name = "t2"
path = "t2.json"

[[tables]]
name = "codes"
path = "codes.jsonl"
"#;

pub fn write_fixtures(dir: &Path) {
    fs::write(dir.join("people.json"), PEOPLE).expect("Failed to write people");
    fs::write(dir.join("orders.csv"), ORDERS).expect("Failed to write orders");
    fs::write(dir.join("numbers.jsonl"), NUMBERS).expect("Failed to write numbers");
    fs::write(dir.join("t1.json"), r#"[{"id": 1, "x": "p"}]"#).expect("Failed to write t1");
    fs::write(dir.join("t2.json"), r#"[{"id": 1}, {"id": 2}]"#).expect("Failed to write t2");
    fs::write(dir.join("codes.jsonl"), CODES).expect("Failed to write codes");
    fs::write(dir.join(docsql::CONFIG_FILE_NAME), CONFIG).expect("Failed to write config");
}

pub fn create_seeded_executor_with(options: ExecutorOptions) -> (Executor, TempDir) {
    let tmp_dir = TempDir::new().expect("Failed to create temp dir");
    write_fixtures(tmp_dir.path());
    let config = Config::load(tmp_dir.path()).expect("Failed to load config");
    let context = DocumentDataContext::from_config(&config).expect("Failed to load tables");
    (PostprocessExecutor::with_options(context, options), tmp_dir)
}

pub fn create_seeded_executor() -> (Executor, TempDir) {
    create_seeded_executor_with(ExecutorOptions::default())
}

pub fn query(executor: &Executor, sql: &str) -> Vec<Vec<Value>> {
    executor
        .execute_sql(sql)
        .unwrap_or_else(|e| panic!("Query failed: {}\n{}", sql, e))
        .to_object_arrays()
        .expect("Failed to read rows")
}

/// Values of one column, for single-column queries.
pub fn column(executor: &Executor, sql: &str) -> Vec<Value> {
    query(executor, sql)
        .into_iter()
        .map(|mut row| row.remove(0))
        .collect()
}
