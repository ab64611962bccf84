//! DocSQL Core - Storage-independent SQL-subset parser and post-processing
//! query engine.
//!
//! This crate turns query text into a structured [`Query`] and executes it
//! over row streams supplied by a [`RowSource`], doing client-side whatever
//! the source cannot: filtering, joins, grouping, aggregation, distinct,
//! ordering and paging. It has no storage dependencies; file and document
//! adapters live in the application crate.
//!
//! # Main Components
//!
//! - **Parser**: Parses query strings into a [`Query`]
//! - **Query**: Select, from, where, group by, having and order by clauses
//! - **DataSet**: Forward-only row cursors and their decorators
//! - **Executor**: Relational operators and the [`PostprocessExecutor`]
//!
//! # Example
//!
//! ```rust
//! use docsql_core::{ColumnType, DataSetExt, InMemoryRowSource, PostprocessExecutor, Table, Value};
//!
//! // Create an in-memory row source for testing
//! let source = InMemoryRowSource::new().with_table(
//!     Table::new("people")
//!         .with_column("name", ColumnType::Text)
//!         .with_column("age", ColumnType::Number),
//!     vec![
//!         vec![Value::from("Alice"), Value::from(30)],
//!         vec![Value::from("Bob"), Value::from(25)],
//!     ],
//! );
//!
//! // Create executor
//! let executor = PostprocessExecutor::new(source);
//!
//! // Execute query
//! let rows = executor
//!     .execute_sql("SELECT name FROM people WHERE age > 26")
//!     .unwrap()
//!     .to_object_arrays()
//!     .unwrap();
//! assert_eq!(rows, vec![vec![Value::from("Alice")]]);
//! ```

pub mod dataset;
pub mod error;
pub mod executor;
pub mod parser;
pub mod query;
pub mod schema;
pub mod value;

// Re-export main types for convenience
pub use dataset::{BoxedDataSet, DataSet, DataSetExt, Row, RowCursor, Style};
pub use error::{QueryError, QueryResult};
pub use executor::{
    CompiledQuery, ExecutorOptions, InMemoryRowSource, PostprocessExecutor, RowSource,
    TableResolver,
};
pub use parser::QueryParser;
pub use query::{
    Direction, FilterItem, FromItem, FunctionType, GroupByItem, JoinType, Operand, OperatorType,
    OrderByItem, Query, SelectItem,
};
pub use schema::{Column, ColumnType, Table};
pub use value::Value;
