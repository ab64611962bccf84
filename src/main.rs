use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use docsql::docsql_core::PostprocessExecutor;
use docsql::{write_data_set, Config, DocumentDataContext, OutputFormat, TableConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod repl;

#[derive(Parser, Debug)]
#[command(name = "docsql")]
#[command(about = "Query JSON, JSON Lines and CSV files with SQL", long_about = None)]
struct Args {
    /// Configuration file (defaults to ./docsql.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Expose a file as a table (e.g., --table people=people.json)
    #[arg(short, long = "table", value_name = "NAME=PATH")]
    tables: Vec<TableConfig>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Query to run; starts an interactive shell when omitted
    query: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docsql=info,docsql_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(&std::env::current_dir()?)?,
    };
    for table in args.tables {
        config.add_table(table);
    }
    let format = args.format.unwrap_or(config.format);

    let context = DocumentDataContext::from_config(&config)?;
    let executor = PostprocessExecutor::with_options(context, config.engine);

    match args.query {
        Some(query) => {
            let mut data_set = executor.execute_sql(&query)?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let count = write_data_set(&mut data_set, format, &mut out)?;
            out.flush()?;
            if format == OutputFormat::Table {
                eprintln!("{}", format!("({} rows)", count).dimmed());
            }
            Ok(())
        }
        None => repl::run(&executor, format),
    }
}
