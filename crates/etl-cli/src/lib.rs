//! Command-line front end for the legacy row loader
//!
//! `etl load` reads a JSON-lines row export and a schema document, runs the
//! loader against an in-memory store and reports what was saved. `etl code`
//! prints the lookup code generated for each given name.

#![warn(unreachable_pub)]

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use etl_loader::{get_code, LoadSummary, Loader, LoaderConfig};
use etl_model::{Schema, SchemaRegistry};
use etl_store::{MemoryRowSource, MemoryStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Argument definitions for the `etl` binary
#[must_use]
pub fn command() -> Command {
    Command::new("etl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Import flat legacy value rows into domain objects")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("load")
                .about("Load a row export into an in-memory store")
                .arg(
                    Arg::new("rows")
                        .long("rows")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON-lines file of value rows"),
                )
                .arg(
                    Arg::new("schema")
                        .long("schema")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Schema document (.yaml or .json)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Loader configuration (.toml)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("code")
                .about("Print the lookup code generated for each name")
                .arg(
                    Arg::new("names")
                        .required(true)
                        .num_args(1..)
                        .help("Display names"),
                ),
        )
}

/// Result of `etl load`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Rows read from the export
    pub rows: usize,
    /// Loader counters
    #[serde(flatten)]
    pub summary: LoadSummary,
    /// Saved object count per type
    pub saved: BTreeMap<String, usize>,
}

impl LoadReport {
    /// Human-readable rendering
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Load Report:");
        let _ = writeln!(out, "  Rows: {}", self.rows);
        let _ = writeln!(out, "  Created: {}", self.summary.created);
        let _ = writeln!(out, "  Batches: {}", self.summary.batches_flushed);
        let _ = writeln!(out, "  Lookups Created: {}", self.summary.lookups_created);
        let _ = writeln!(
            out,
            "  Relationships Created: {}",
            self.summary.relationships_created
        );
        let _ = writeln!(out, "  Soft Failures: {}", self.summary.soft_failures);
        if !self.saved.is_empty() {
            let _ = writeln!(out, "Saved:");
            for (type_name, count) in &self.saved {
                let _ = writeln!(out, "  {type_name}: {count}");
            }
        }
        out
    }
}

/// Load `rows` against `schema` into a fresh in-memory store
///
/// # Errors
/// Fails if an input file cannot be read or parsed, or if the load aborts
pub fn run_load(rows: &Path, schema: &Path, config: Option<&Path>) -> Result<LoadReport> {
    let schema: Arc<dyn Schema> = Arc::new(
        SchemaRegistry::from_path(schema)
            .with_context(|| format!("failed to read schema {}", schema.display()))?,
    );
    let source = Arc::new(
        MemoryRowSource::from_jsonl_path(rows)
            .with_context(|| format!("failed to read rows {}", rows.display()))?,
    );
    let config = match config {
        Some(path) => LoaderConfig::from_path(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    let store = Arc::new(MemoryStore::new(Arc::clone(&schema)));

    let row_count = source.len();
    let mut loader = Loader::new(source, store.clone(), Arc::clone(&schema), config)?;
    let summary = loader.load().context("load aborted")?;

    let saved = schema
        .type_names()
        .into_iter()
        .filter_map(|type_name| {
            let count = store.objects_of(&type_name).len();
            (count > 0).then_some((type_name, count))
        })
        .collect();

    Ok(LoadReport {
        rows: row_count,
        summary,
        saved,
    })
}

/// `(name, code)` pairs for each name
#[must_use]
pub fn codes<S: AsRef<str>>(names: &[S]) -> Vec<(String, String)> {
    names
        .iter()
        .map(|name| (name.as_ref().to_string(), get_code(name.as_ref())))
        .collect()
}

/// Execute a parsed command line, returning what to print
///
/// # Errors
/// Propagates failures of the selected subcommand
pub fn execute(matches: &ArgMatches) -> Result<String> {
    match matches.subcommand() {
        Some(("load", args)) => {
            let rows = args
                .get_one::<PathBuf>("rows")
                .context("--rows is required")?;
            let schema = args
                .get_one::<PathBuf>("schema")
                .context("--schema is required")?;
            let config = args.get_one::<PathBuf>("config").map(PathBuf::as_path);

            let report = run_load(rows, schema, config)?;
            if args.get_flag("json") {
                Ok(serde_json::to_string_pretty(&report)?)
            } else {
                Ok(report.to_text())
            }
        }
        Some(("code", args)) => {
            let names: Vec<&String> = args
                .get_many::<String>("names")
                .context("at least one name is required")?
                .collect();
            let lines: Vec<String> = codes(&names)
                .into_iter()
                .map(|(name, code)| format!("{name}\t{code}"))
                .collect();
            Ok(lines.join("\n"))
        }
        Some((other, _)) => anyhow::bail!("unknown command: {other}"),
        None => anyhow::bail!("no command given"),
    }
}
