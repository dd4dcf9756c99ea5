use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use squidex_query::{
    CollectOptions, Config, Document, DocumentStore, InMemoryStore, Query, QueryNode, Schema,
    SearchFrame,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CLI_INDEX: &str = "cli";

#[derive(Parser)]
#[command(name = "squidex-query")]
#[command(about = "Compose and evaluate Elasticsearch-style boolean queries", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true, env = "SQUIDEX_QUERY_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a query and print its finalized form
    Normalize { query: PathBuf },

    /// Print the negation of a query
    Negate { query: PathBuf },

    /// Combine queries left to right with one operator
    Combine {
        #[arg(long, value_enum, default_value = "and")]
        op: Operator,

        #[arg(required = true, num_args = 2..)]
        queries: Vec<PathBuf>,
    },

    /// Print the field types of an index mapping
    Schema {
        mapping: PathBuf,

        /// Index name inside the mapping response
        #[arg(long)]
        index: Option<String>,
    },

    /// Run a query over documents in memory
    Search {
        #[arg(long)]
        mapping: PathBuf,

        /// JSON array of document sources
        #[arg(long)]
        docs: PathBuf,

        /// Query to run; every document matches when omitted
        #[arg(long)]
        query: Option<PathBuf>,

        #[arg(long, default_value = "10")]
        size: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Operator {
    And,
    Or,
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn read_query(path: &Path) -> Result<Query> {
    let value = read_json(path)?;
    Query::try_from(value).with_context(|| format!("invalid query in {}", path.display()))
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}

/// Index name of a `{index: {mappings: ...}}` response
fn mapping_index(raw: &Value) -> Option<String> {
    let object = raw.as_object()?;
    match object.iter().next() {
        Some((name, body)) if object.len() == 1 && body.get("mappings").is_some() => {
            Some(name.clone())
        }
        _ => None,
    }
}

fn search(config: Config, mapping: &Path, docs: &Path, query: Option<&Path>, size: usize) -> Result<Vec<Document>> {
    let mapping = read_json(mapping)?;
    let mapping = match mapping_index(&mapping) {
        Some(index) => mapping[index.as_str()]["mappings"].clone(),
        None => mapping.get("mappings").cloned().unwrap_or(mapping),
    };

    let store = InMemoryStore::new(config.store);
    store.create_index(CLI_INDEX, mapping)?;
    let documents = match read_json(docs)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(source) => Ok(source),
                other => bail!("document is not an object: {}", other),
            })
            .collect::<Result<Vec<Document>>>()?,
        _ => bail!("{} must hold a JSON array of documents", docs.display()),
    };
    let indexed = store.bulk(CLI_INDEX, documents)?;
    debug!(indexed, "loaded documents");

    let store: Arc<dyn DocumentStore> = Arc::new(store);
    let mut frame = SearchFrame::open(store, CLI_INDEX)?.with_config(config.frame);
    if let Some(path) = query {
        frame = frame.select(read_query(path)?)?;
    }
    info!(total = frame.count()?, "query evaluated");

    let options = CollectOptions::default().with_limit(size).with_id().with_score();
    Ok(frame.collect(options)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    debug!("squidex-query v{}", squidex_query::VERSION);

    match args.command {
        Command::Normalize { query } => {
            print_json(&read_query(&query)?.finalize()?, args.pretty)?;
        }
        Command::Negate { query } => {
            print_json(&(!read_query(&query)?).finalize()?, args.pretty)?;
        }
        Command::Combine { op, queries } => {
            let mut combined: Option<Query> = None;
            for path in &queries {
                let query = read_query(path)?;
                combined = Some(match (combined, op) {
                    (None, _) => query,
                    (Some(acc), Operator::And) => acc & query,
                    (Some(acc), Operator::Or) => acc | query,
                });
            }
            match combined {
                Some(query) => print_json(&query.finalize()?, args.pretty)?,
                None => bail!("no queries given"),
            }
        }
        Command::Schema { mapping, index } => {
            let raw = read_json(&mapping)?;
            let index = index
                .or_else(|| mapping_index(&raw))
                .unwrap_or_else(|| CLI_INDEX.to_string());
            let schema = Schema::from_mapping(&index, &raw)?;
            let dtypes: serde_json::Map<String, Value> = schema
                .dtypes()
                .iter()
                .map(|(path, field_type)| (path.clone(), Value::from(field_type.dtype())))
                .collect();
            print_json(&Value::Object(dtypes), args.pretty)?;
        }
        Command::Search {
            mapping,
            docs,
            query,
            size,
        } => {
            let hits = search(config, &mapping, &docs, query.as_deref(), size)?;
            let hits: Vec<Value> = hits.into_iter().map(Value::Object).collect();
            print_json(&Value::Array(hits), args.pretty)?;
        }
    }

    Ok(())
}
