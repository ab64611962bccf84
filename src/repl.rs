//! Interactive shell.
//!
//! Lines ending in `\` continue on the next line; a trailing `;` is
//! optional. Dot commands inspect and reload the registered tables.

use std::borrow::Cow;
use std::io::Write;
use std::time::Instant;

use colored::Colorize;
use docsql::docsql_core::{PostprocessExecutor, TableResolver};
use docsql::{write_data_set, DocumentDataContext, OutputFormat};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

const KEYWORDS: &[&str] = &[
    "SELECT", "DISTINCT", "FROM", "WHERE", "GROUP BY", "HAVING", "ORDER BY", "LIMIT", "OFFSET",
    "INNER JOIN", "LEFT JOIN", "RIGHT JOIN", "ON", "AND", "OR", "NOT", "IN", "LIKE", "IS NULL",
    "IS NOT NULL", "AS", "ASC", "DESC", "COUNT", "SUM", "AVG", "MIN", "MAX", "FIRST", "LAST",
    "TO_STRING", "TO_NUMBER", "TO_DATE", "TO_BOOLEAN", "MAP_VALUE", "SUBSTRING", "APPROXIMATE",
];

const COMMANDS: &[&str] = &[".help", ".tables", ".schema", ".refresh", ".format", ".quit"];

/// Tab completion over keywords, dot commands, tables and columns
struct DocSqlHelper {
    completions: Vec<String>,
}

impl DocSqlHelper {
    fn new(context: &DocumentDataContext) -> Self {
        let mut helper = Self {
            completions: Vec::new(),
        };
        helper.reload(context);
        helper
    }

    fn reload(&mut self, context: &DocumentDataContext) {
        let mut completions: Vec<String> = KEYWORDS
            .iter()
            .chain(COMMANDS)
            .map(|word| word.to_string())
            .collect();
        for name in context.table_names() {
            if let Some(table) = context.table_by_qualified_label(&name) {
                completions.extend(table.columns.into_iter().map(|c| c.name));
            }
            completions.push(name);
        }
        completions.sort();
        completions.dedup();
        self.completions = completions;
    }

    fn word_start(line: &str) -> usize {
        line.rfind(|c: char| c.is_whitespace() || c == '(' || c == ',')
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn matching<'a>(&'a self, word: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.completions.iter().filter(move |c| {
            c.len() >= word.len()
                && c.get(..word.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(word))
        })
    }
}

impl Completer for DocSqlHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> Result<(usize, Vec<Pair>), ReadlineError> {
        let start = Self::word_start(&line[..pos]);
        let word = &line[start..pos];
        let matches = self
            .matching(word)
            .map(|c| Pair {
                display: c.clone(),
                replacement: c.clone(),
            })
            .collect();
        Ok((start, matches))
    }
}

impl Hinter for DocSqlHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        let word = &line[Self::word_start(line)..];
        if word.is_empty() {
            return None;
        }
        self.matching(word)
            .find(|c| c.len() > word.len())
            .and_then(|c| c.get(word.len()..))
            .map(str::to_string)
    }
}

impl Highlighter for DocSqlHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(hint.truecolor(100, 100, 100).to_string())
    }
}

impl Validator for DocSqlHelper {}

impl Helper for DocSqlHelper {}

fn print_banner() {
    println!(
        "  {} {}",
        "DocSQL".white().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!(
        "  Type {} for help, {} to quit\n",
        ".help".yellow(),
        ".quit".yellow()
    );
}

fn print_help() {
    println!("\n{}", "Commands:".white().bold());
    println!("  {}            Show this help", ".help".yellow());
    println!("  {}          List tables", ".tables".yellow());
    println!("  {} <table>  Show the columns of a table", ".schema".yellow());
    println!("  {}         Reload every table from disk", ".refresh".yellow());
    println!("  {} <fmt>    Switch output (table, json, csv)", ".format".yellow());
    println!("  {}            Exit the shell", ".quit".yellow());

    println!("\n{}", "Examples:".white().bold());
    println!("  {}", "SELECT name, COUNT(*) FROM people GROUP BY name".green());
    println!(
        "  {}",
        "SELECT p.name, o.total FROM people p LEFT JOIN orders o ON p.id = o.person_id".green()
    );
    println!();
}

fn print_schema(context: &DocumentDataContext, name: &str) {
    let Some(table) = context.table_by_qualified_label(name) else {
        println!("  {} {}", "No such table:".red(), name);
        return;
    };
    println!("  {}", table.name.cyan().bold());
    for column in &table.columns {
        let column_type = column
            .column_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let key = if column.primary_key { " PRIMARY KEY" } else { "" };
        println!("    {} {}{}", column.name.white(), column_type.dimmed(), key.yellow());
    }
}

fn run_query(
    executor: &PostprocessExecutor<DocumentDataContext>,
    sql: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let mut data_set = executor.execute_sql(sql)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let count = write_data_set(&mut data_set, format, &mut out)?;
    out.flush()?;
    println!(
        "{}",
        format!(
            "  ({} rows, {:.2}ms)",
            count,
            started.elapsed().as_secs_f64() * 1000.0
        )
        .dimmed()
    );
    Ok(())
}

pub fn run(
    executor: &PostprocessExecutor<DocumentDataContext>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let context = executor.source();
    let mut format = format;

    print_banner();
    println!(
        "  {} {}\n",
        "Tables:".dimmed(),
        context.table_names().join(", ").white()
    );

    let mut rl = Editor::new()?;
    rl.set_helper(Some(DocSqlHelper::new(context)));

    let history_file = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".docsql_history"))
        .unwrap_or_else(|_| std::path::PathBuf::from(".docsql_history"));
    let _ = rl.load_history(&history_file);

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() {
            format!("{}{} ", "docsql".cyan(), ">".white())
        } else {
            format!("{} ", "...".dimmed())
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if let Some(partial) = line.strip_suffix('\\') {
                    buffer.push_str(partial);
                    buffer.push(' ');
                    continue;
                }
                buffer.push_str(line);
                let input = std::mem::take(&mut buffer);
                let input = input.trim().trim_end_matches(';').trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                if input.starts_with('.') {
                    let (command, argument) = input
                        .split_once(' ')
                        .map(|(c, a)| (c, a.trim()))
                        .unwrap_or((input, ""));
                    match command {
                        ".quit" | ".exit" | ".q" => break,
                        ".help" | ".h" => print_help(),
                        ".tables" => {
                            for name in context.table_names() {
                                println!("  {}", name.cyan());
                            }
                        }
                        ".schema" if !argument.is_empty() => print_schema(context, argument),
                        ".schema" => println!("  {}", "Usage: .schema <table>".yellow()),
                        ".refresh" => match context.refresh_schemas() {
                            Ok(()) => {
                                if let Some(helper) = rl.helper_mut() {
                                    helper.reload(context);
                                }
                                println!("  {}", "Tables reloaded".dimmed());
                            }
                            Err(e) => println!("{} {}", "Error:".red().bold(), e),
                        },
                        ".format" => match argument.parse::<OutputFormat>() {
                            Ok(parsed) => format = parsed,
                            Err(e) => println!("{} {}", "Error:".red().bold(), e),
                        },
                        _ => {
                            println!("  {} {}", "Unknown command:".red(), command);
                            println!("  Type {} for help", ".help".yellow());
                        }
                    }
                    continue;
                }

                if let Err(e) = run_query(executor, input, format) {
                    println!("{} {}", "Error:".red().bold(), e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                if buffer.is_empty() {
                    println!("{}", "Type .quit to quit".dimmed());
                } else {
                    println!("{}", "Cancelled".dimmed());
                    buffer.clear();
                }
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("{} {:?}", "Error:".red(), err);
                break;
            }
        }
    }

    println!("{}", "Goodbye!".dimmed());
    let _ = rl.save_history(&history_file);
    Ok(())
}
