//! Data Schema CLI
//!
//! Inspects configured schemas and reads records through them.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use data_schema::{
    convert_value, DataSchema, DataSchemaConfig, FieldSchema, FieldType, JsonFileStore, Record,
    SchemaCache, SchemaId, Value,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "data-schema")]
#[command(about = "Inspect data schemas and convert records")]
struct Cli {
    /// Config file to load on top of the defaults
    #[arg(short, long)]
    config: Option<String>,

    /// Schema fixture directory (overrides the config)
    #[arg(short, long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a schema's fields in position order
    Fields {
        id: u64,
    },

    /// List the fields making up a schema's uniqueness key
    Unique {
        id: u64,
    },

    /// Read a JSON array or object through a schema
    Read {
        id: u64,
        /// Record as JSON, e.g. '["5", "x"]' or '{"a": "5"}'
        record: String,
    },

    /// Convert a single value
    Convert {
        /// DATE, DATETIME, INT, FLOAT or STRING
        field_type: String,
        value: String,
        #[arg(short, long)]
        format: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Fields { id } => {
            let cache = open_cache(cli.config.as_deref(), cli.store)?;
            let schema = cache.load(SchemaId(id))?;
            print_header(&schema);
            for field in schema.fields() {
                print_field(field);
            }
        }

        Commands::Unique { id } => {
            let cache = open_cache(cli.config.as_deref(), cli.store)?;
            let schema = cache.load(SchemaId(id))?;
            print_header(&schema);
            for field in schema.unique_fields() {
                print_field(field);
            }
        }

        Commands::Read { id, record } => {
            let cache = open_cache(cli.config.as_deref(), cli.store)?;
            let schema = cache.load(SchemaId(id))?;
            let json: serde_json::Value =
                serde_json::from_str(&record).context("record is not valid JSON")?;
            let record = Record::from_json(json)?;

            let output: serde_json::Map<String, serde_json::Value> = schema
                .to_mapping(&record)?
                .into_iter()
                .map(|(k, v)| (k, v.to_json()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Convert { field_type, value, format } => {
            let field_type: FieldType = field_type.parse()?;
            let converted = convert_value(field_type, Value::from(value), format.as_deref())?;
            println!("{}", converted.to_json());
        }
    }

    Ok(())
}

fn open_cache(
    config_path: Option<&str>,
    store: Option<PathBuf>,
) -> anyhow::Result<SchemaCache<JsonFileStore>> {
    let config = DataSchemaConfig::load_from(config_path).context("loading configuration")?;
    let store_path = store.unwrap_or_else(|| config.store_path());
    let store = JsonFileStore::open_with_extension(&store_path, &config.store.extension)
        .with_context(|| format!("opening schema store {}", store_path.display()))?;
    Ok(SchemaCache::with_config(store, config.cache, config.convert))
}

fn print_header(schema: &DataSchema) {
    match &schema.model_type {
        Some(model) => println!("Schema {} ({})", schema.id, model.qualified_name()),
        None => println!("Schema {} (free-form)", schema.id),
    }
}

fn print_field(field: &FieldSchema) {
    let position = field
        .field_position
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let order = field
        .uniqueness_order
        .map(|o| format!("  unique #{}", o))
        .unwrap_or_default();
    let format = field
        .field_format
        .as_deref()
        .map(|f| format!("  format {}", f))
        .unwrap_or_default();
    println!("  [{}] {} : {}{}{}", position, field.field_key, field.field_type, order, format);
}
