//! quadstore CLI: load documents into a local store and query it
//!
//! Opens the database directly; no server is involved.

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use oxrdf::{Literal, NamedNode, Term};
use quadstore::{Content, ContentLoader, Database, DatabaseConfig, FileContent, NodeId, NONE};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const POSITION_NAMES: [&str; 4] = ["subject", "predicate", "object", "graph"];

#[derive(Parser)]
#[command(name = "quadstore", version, about = "quadstore RDF database CLI")]
struct Cli {
    /// Database directory
    #[arg(long, default_value = "./quadstore_data", global = true, env = "QUADSTORE_DATA")]
    data_dir: PathBuf,

    /// YAML configuration file; overrides --data-dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an RDF/XML or N3 document, optionally gzipped
    Load {
        file: PathBuf,

        /// Graph IRI; defaults to the file URI
        #[arg(long)]
        graph: Option<String>,

        /// Content type overriding the file extension
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Find statements matching a pattern. `*` matches anything.
    Query {
        #[arg(default_value = "*")]
        subject: String,
        #[arg(default_value = "*")]
        predicate: String,
        #[arg(default_value = "*")]
        object: String,
        #[arg(default_value = "*")]
        graph: String,
    },
    /// Show store counters
    Stats,
    /// Flush storage and truncate the transaction log
    Checkpoint,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let result = open(&cli).and_then(|db| {
        let outcome = match cli.command {
            Commands::Load { ref file, ref graph, ref content_type } => {
                run_load(&db, file, graph.as_deref(), content_type.as_deref())
            }
            Commands::Query { ref subject, ref predicate, ref object, ref graph } => {
                run_query(&db, [subject, predicate, object, graph], &cli.format)
            }
            Commands::Stats => run_stats(&db, &cli.format),
            Commands::Checkpoint => db.checkpoint().map_err(Into::into),
        };
        db.close()?;
        outcome
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn open(cli: &Cli) -> CliResult<Database> {
    let config = match &cli.config {
        Some(path) => DatabaseConfig::from_yaml_file(path)?,
        None => DatabaseConfig::new(&cli.data_dir),
    };
    Ok(Database::open(config)?)
}

fn run_load(
    db: &Database,
    file: &Path,
    graph: Option<&str>,
    content_type: Option<&str>,
) -> CliResult<()> {
    let mut content = FileContent::new(file)?;
    if let Some(content_type) = content_type {
        content = content.with_content_type(content_type);
    }
    let graph = match graph {
        Some(iri) => NamedNode::new(iri)?,
        None => NamedNode::new(content.uri().unwrap_or("urn:default"))?,
    };

    let mut session = db.new_session();
    session.refresh()?;
    let loader = ContentLoader::new(db.config().parser.clone());
    let stats = loader.load(&mut session, &content, &Term::NamedNode(graph.clone()))?;
    session.commit()?;

    println!(
        "Loaded {} statements into <{}> ({} skipped, {} blank nodes)",
        stats.statements,
        graph.as_str(),
        stats.skipped,
        stats.blank_nodes
    );
    Ok(())
}

/// `*` is a wildcard; `<iri>`, `"text"`, `"text"@lang`, `"text"^^<iri>` or a
/// bare IRI otherwise.
fn parse_term(text: &str) -> CliResult<Option<Term>> {
    if text == "*" {
        return Ok(None);
    }
    if text.starts_with("_:") {
        return Err("blank nodes cannot be named in a pattern".into());
    }
    if let Some(iri) = text.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return Ok(Some(NamedNode::new(iri)?.into()));
    }
    if let Some(rest) = text.strip_prefix('"') {
        let end = rest.rfind('"').ok_or("unterminated literal")?;
        let (value, suffix) = (&rest[..end], &rest[end + 1..]);
        let literal = if suffix.is_empty() {
            Literal::new_simple_literal(value)
        } else if let Some(lang) = suffix.strip_prefix('@') {
            Literal::new_language_tagged_literal(value, lang)?
        } else if let Some(datatype) = suffix
            .strip_prefix("^^<")
            .and_then(|t| t.strip_suffix('>'))
        {
            Literal::new_typed_literal(value, NamedNode::new(datatype)?)
        } else {
            return Err(format!("unexpected literal suffix: {}", suffix).into());
        };
        return Ok(Some(literal.into()));
    }
    Ok(Some(NamedNode::new(text)?.into()))
}

fn run_query(db: &Database, pattern: [&String; 4], format: &OutputFormat) -> CliResult<()> {
    let snapshot = db.snapshot()?;
    let mut nodes: [NodeId; 4] = [NONE; 4];
    for (slot, text) in pattern.iter().enumerate() {
        if let Some(term) = parse_term(text)? {
            match snapshot.lookup(&term)? {
                Some(node) => nodes[slot] = node,
                None => {
                    // Unknown term: nothing can match.
                    println!("(no results)");
                    return Ok(());
                }
            }
        }
    }

    let tuples = snapshot.find_tuples(nodes[0], nodes[1], nodes[2], nodes[3])?;
    let columns: Vec<&str> = tuples.column_order().into_iter().map(|p| POSITION_NAMES[p]).collect();
    let mut rows = Vec::new();
    for row in tuples {
        let row = row?;
        let mut cells = Vec::with_capacity(row.len());
        for node in row {
            cells.push(snapshot.globalize(node)?.to_string());
        }
        rows.push(cells);
    }

    match format {
        OutputFormat::Json => {
            let records: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .zip(row)
                        .map(|(name, value)| (name.to_string(), serde_json::Value::from(value.as_str())))
                        .collect::<serde_json::Map<_, _>>()
                        .into()
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Csv => {
            println!("{}", columns.join(","));
            for row in &rows {
                let cells: Vec<String> = row.iter().map(|v| format_csv_value(v)).collect();
                println!("{}", cells.join(","));
            }
        }
        OutputFormat::Table => {
            if columns.is_empty() {
                // Fully bound pattern: report whether it exists.
                println!("{}", if rows.is_empty() { "false" } else { "true" });
                return Ok(());
            }
            if rows.is_empty() {
                println!("(no results)");
                return Ok(());
            }
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(&columns);
            for row in &rows {
                table.add_row(row);
            }
            println!("{}", table);
            println!("{} row(s)", rows.len());
        }
    }
    Ok(())
}

fn run_stats(db: &Database, format: &OutputFormat) -> CliResult<()> {
    let stats = db.stats();
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "statements": stats.statements,
                "nodes": stats.nodes,
                "next_gnode": stats.next_gnode,
                "next_blank": stats.next_blank,
                "overflow_bytes": stats.overflow_bytes,
                "failed": stats.failed,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            println!("Version:    {}", quadstore::version());
            println!("Statements: {}", stats.statements);
            println!("Nodes:      {}", stats.nodes);
            println!("Next node:  {}", stats.next_gnode);
            println!("Overflow:   {} bytes", stats.overflow_bytes);
            if stats.failed {
                println!("Status:     FAILED (a commit did not complete)");
            }
        }
    }
    Ok(())
}

fn format_csv_value(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
