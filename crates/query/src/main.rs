//! Ash query CLI
//!
//! Runs one query against a registered model and prints the rows as JSON.
//!
//! Usage:
//!   ash-query post --filter '{"title": {"$ilike": "%rust%"}}' --include comments
//!   ash-query post --id 2 --fields posts=title
//!   ash-query post --sort=-title --page 1 --size 5 --explain
//!   ash-query post --create '{"title": "Hello", "authorId": 1}'
//!   ash-query post --id 2 --update '{"title": "Renamed"}'
//!   ash-query post --id 2 --delete

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ash_query::config::Config;
use ash_query::engine::{plan_query, record_options};
use ash_query::{Mode, ModelRegistry, Page, PgStore, QueryEngine, QueryOptions, db};
use clap::Parser;
use serde_json::{Value as JsonValue, json};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model name as declared in the schema.
    model: String,

    /// Schema document (overrides ASH_SCHEMA).
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Filter document as JSON.
    #[arg(long)]
    filter: Option<String>,

    /// Sparse fieldset, `type=attr1,attr2`; repeatable.
    #[arg(long = "fields", value_parser = parse_fieldset)]
    fields: Vec<(String, String)>,

    /// Sort keys, e.g. `-title,id`.
    #[arg(long)]
    sort: Option<String>,

    /// Page number.
    #[arg(long)]
    page: Option<u32>,

    /// Page size.
    #[arg(long)]
    size: Option<u32>,

    /// Relationships to include, comma-separated.
    #[arg(long)]
    include: Option<String>,

    /// Return at most one row.
    #[arg(long)]
    one: bool,

    /// Look up a single row by id.
    #[arg(long, conflicts_with_all = ["filter", "one"])]
    id: Option<String>,

    /// Print the planned SQL and dropped fragments instead of executing.
    #[arg(long)]
    explain: bool,

    /// Insert a row from a JSON object of attributes.
    #[arg(long, conflicts_with_all = ["id", "explain"])]
    create: Option<String>,

    /// Update the row given by --id from a JSON object of attributes.
    #[arg(long, requires = "id", conflicts_with = "explain")]
    update: Option<String>,

    /// Delete the row given by --id.
    #[arg(long, requires = "id", conflicts_with_all = ["update", "explain"])]
    delete: bool,
}

fn parse_fieldset(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(type_name, fields)| (type_name.trim().to_string(), fields.to_string()))
        .ok_or_else(|| format!("expected TYPE=FIELDS, got '{raw}'"))
}

fn parse_document(raw: &str, flag: &str) -> Result<JsonValue> {
    serde_json::from_str(raw).with_context(|| format!("{flag} must be a JSON document"))
}

impl Args {
    fn options(&self) -> Result<QueryOptions> {
        let filter = self
            .filter
            .as_deref()
            .map(|raw| parse_document(raw, "--filter"))
            .transpose()?;

        let page = (self.page.is_some() || self.size.is_some()).then_some(Page {
            number: self.page,
            size: self.size,
        });

        Ok(QueryOptions {
            filter,
            fields: self.fields.iter().cloned().collect(),
            sort: self.sort.clone(),
            page,
            include: self.include.clone(),
        })
    }

    /// Ids that parse as integers are compared as numbers.
    fn id_value(&self) -> Option<JsonValue> {
        self.id.as_deref().map(|id| match id.parse::<i64>() {
            Ok(n) => json!(n),
            Err(_) => json!(id),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    let schema_path = args.schema.clone().unwrap_or_else(|| config.schema_path.clone());
    let registry = ModelRegistry::load(&schema_path)
        .with_context(|| format!("failed to load schema {}", schema_path.display()))?;
    info!(models = registry.len(), schema = %schema_path.display(), "Schema loaded");

    let model = registry.model(&args.model).with_context(|| {
        let mut known: Vec<&str> = registry.models().map(|m| m.name.as_str()).collect();
        known.sort_unstable();
        format!("unknown model '{}' (known: {})", args.model, known.join(", "))
    })?;

    let options = args.options()?;

    if args.explain {
        let (options, mode) = match args.id_value() {
            Some(id) => (record_options(&model, id, &options), Mode::Single),
            None if args.one => (options, Mode::Single),
            None => (options, Mode::Many),
        };

        let planned = plan_query(&registry, &model, &options, mode);
        println!("{}", planned.plan.to_sql());
        for target in &planned.includes {
            println!("-- include {} from {}", target.name, target.related.table_name);
        }
        for fragment in &planned.dropped {
            println!("-- dropped: {fragment}");
        }
        return Ok(());
    }

    let pool = db::create_pool(&config).await?;
    let engine = QueryEngine::new(Arc::new(PgStore::new(pool)), Arc::new(registry))
        .with_timeout(config.query_timeout);
    engine
        .check_connection()
        .await
        .context("database is not reachable")?;

    let output = if let Some(data) = &args.create {
        let row = engine
            .create_record(&model, &parse_document(data, "--create")?)
            .await?;
        json!(row)
    } else if let (Some(data), Some(id)) = (&args.update, args.id_value()) {
        let row = engine
            .update_record(&model, id, &parse_document(data, "--update")?)
            .await?;
        json!(row)
    } else if let (true, Some(id)) = (args.delete, args.id_value()) {
        engine.delete_record(&model, id.clone()).await?;
        info!(model = %model.name, id = %id, "Record deleted");
        json!({ "deleted": id })
    } else if let Some(id) = args.id_value() {
        let row = engine.find_record(&model, id, &options).await?;
        json!(row)
    } else if args.one {
        let row = engine.query_record(&model, &options).await?;
        json!(row)
    } else {
        let rows = engine.query(&model, &options).await?;
        info!(rows = rows.len(), "Query complete");
        json!(rows)
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("failed to encode result")?
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
