//! Helios Bindings CLI (`hbind`)
//!
//! Opens one binding from a JSON settings file and runs a single verb
//! against it, printing the result as JSON on stdout.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};

use helios_bindings::types::{FieldMap, Found};
use helios_bindings::{
    Binding, BindingCapability, ConnectionRegistry, Criteria, FindOptions, Identifier, Model,
    Record, Settings, open_binding,
};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "hbind")]
#[command(about = "Run CRUD operations through a Helios binding")]
#[command(version)]
struct Cli {
    /// JSON settings file; its `binding` key selects orm, directory or rest.
    #[arg(short, long, env = "HBIND_SETTINGS")]
    settings: PathBuf,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "HBIND_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Find records.
    Find {
        /// Criteria as a JSON object of field to expected value.
        #[arg(short, long)]
        criteria: Option<String>,

        /// Options as a JSON object with `order`, `limit` and `offset`.
        #[arg(short, long)]
        options: Option<String>,
    },

    /// Read one record.
    Read {
        /// Record identifier.
        id: String,
    },

    /// Create a record from a JSON object of fields.
    Create {
        /// Fields as a JSON object.
        fields: String,
    },

    /// Update a record from a JSON object holding its identifier.
    Update {
        /// Model fields as a JSON object.
        model: String,
    },

    /// Delete one record.
    Delete {
        /// Record identifier.
        id: String,
    },

    /// List the verbs and options the binding supports.
    Capabilities,
}

/// Installs the tracing subscriber. Logs go to stderr.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_bindings={},hbind={}", level, level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn parse_object(label: &str, text: &str) -> anyhow::Result<FieldMap> {
    let value: Value =
        serde_json::from_str(text).with_context(|| format!("{} is not valid JSON", label))?;
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("{} must be a JSON object, got {}", label, other),
    }
}

fn found_to_json(found: Found<Record>) -> Value {
    match found {
        Found::Models(models) => Value::Array(
            models
                .into_iter()
                .map(|m| Value::Object(m.into_map()))
                .collect(),
        ),
        Found::Raw(value) => value,
        Found::Nothing => Value::Bool(false),
    }
}

async fn run(binding: &dyn Binding<Record>, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Find { criteria, options } => {
            let criteria = match criteria {
                Some(text) => Criteria::from(parse_object("criteria", &text)?),
                None => Criteria::new(),
            };
            let options = match options {
                Some(text) => FindOptions::from_map(&parse_object("options", &text)?)?,
                None => FindOptions::new(),
            };
            found_to_json(binding.find(&criteria, &options).await?)
        }
        Command::Read { id } => {
            Value::Object(binding.read(&Identifier::from(id)).await?.into_map())
        }
        Command::Create { fields } => {
            let created = binding.create(parse_object("fields", &fields)?).await?;
            Value::Object(created.into_map())
        }
        Command::Update { model } => {
            let model = Record::new(parse_object("model", &model)?);
            Value::Object(binding.update(&model).await?.into_map())
        }
        Command::Delete { id } => {
            let mut model = Record::default();
            model.set_identifier(Identifier::from(id));
            Value::Bool(binding.delete(&model).await?)
        }
        Command::Capabilities => {
            let supported: Vec<Value> = BindingCapability::ALL
                .iter()
                .filter(|capability| binding.supports(**capability))
                .map(|capability| Value::from(capability.to_string()))
                .collect();
            Value::Array(supported)
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let settings = Settings::from_file(&cli.settings)
        .with_context(|| format!("cannot load settings from {}", cli.settings.display()))?;
    debug!(settings = %cli.settings.display(), "Loaded settings");

    let binding = open_binding(ConnectionRegistry::global(), settings).await?;
    info!(backend = %binding.kind(), "Opened binding");

    let output = run(binding.as_ref(), cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
