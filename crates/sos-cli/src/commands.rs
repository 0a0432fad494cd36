use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::{Map, Value};
use sos_store::{Store, StoreOptions, StoreSettings};
use tracing::debug;

use crate::cli::*;

/// Result of one command, rendered as text or JSON.
#[derive(Debug, PartialEq)]
pub enum Output {
    Value(Value),
    Path(PathBuf),
    Updated { key: String, value: Value },
    Removed { key: String, existed: bool },
    Assured(Vec<String>),
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings(&cli.store)?;
    let options = StoreOptions::from_settings(settings).default_value(Value::Object(Map::new()));
    let mut store = Store::open(options)?;
    debug!(path = %store.store_file_path().display(), "using store");

    let output = execute(&mut store, cli.command).await?;
    render(&output, &cli.format)
}

/// Settings from `--config`, overlaid with explicit flags.
pub fn load_settings(args: &StoreArgs) -> anyhow::Result<StoreSettings> {
    let from_file = match &args.config {
        Some(path) => read_config(path)?,
        None => StoreSettings::default(),
    };
    let from_flags = StoreSettings {
        name: args.name.clone(),
        file_path: args.file.clone(),
        encrypt: args.passphrase.clone(),
        version: args.schema_version,
        ..StoreSettings::default()
    };
    Ok(from_file.merge(from_flags))
}

fn read_config(path: &Path) -> anyhow::Result<StoreSettings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Run `command` against `store`. Each mutating command is one write cycle.
pub async fn execute(store: &mut Store<Value>, command: Command) -> anyhow::Result<Output> {
    match command {
        Command::Show => Ok(Output::Value(store.read().await?)),
        Command::Get(args) => {
            let value = store
                .read_with(|data| data.get(&args.key).cloned())
                .await?
                .unwrap_or(Value::Null);
            Ok(Output::Value(value))
        }
        Command::Set(args) => {
            let value = parse_value(&args.value);
            let stored = value.clone();
            store
                .try_write(|data| {
                    object_mut(data).map(|obj| obj.insert(args.key.clone(), stored))
                })
                .await??;
            Ok(Output::Updated { key: args.key, value })
        }
        Command::Unset(args) => {
            let removed = store
                .try_write(|data| object_mut(data).map(|obj| obj.remove(&args.key)))
                .await??;
            Ok(Output::Removed {
                key: args.key,
                existed: removed.is_some(),
            })
        }
        Command::Incr(args) => {
            let value = store.try_write(|data| increment(data, &args.key, args.by)).await??;
            Ok(Output::Updated { key: args.key, value })
        }
        Command::Push(args) => {
            let item = parse_value(&args.value);
            let value = store.try_write(|data| push(data, &args.key, item)).await??;
            Ok(Output::Updated { key: args.key, value })
        }
        Command::Assure(args) => {
            let defaults: Value = serde_json::from_str(&args.defaults)
                .context("assure expects a JSON object")?;
            let Value::Object(fields) = &defaults else {
                bail!("assure expects a JSON object");
            };
            let before = store.read().await?;
            let added = fields
                .keys()
                .filter(|k| before.get(k.as_str()).is_none())
                .cloned()
                .collect();
            store.assure(&defaults).await?;
            Ok(Output::Assured(added))
        }
        Command::Path => Ok(Output::Path(store.store_file_path().to_path_buf())),
    }
}

/// Parse a command-line value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn object_mut(data: &mut Value) -> anyhow::Result<&mut Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map),
        other => bail!("store holds {}, not an object", kind_of(other)),
    }
}

fn increment(data: &mut Value, key: &str, by: i64) -> anyhow::Result<Value> {
    let obj = object_mut(data)?;
    let current = match obj.get(key) {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(n) => n,
            None => bail!("{key} is not an integer"),
        },
        Some(other) => bail!("{key} holds {}, not a number", kind_of(other)),
    };
    let next = current
        .checked_add(by)
        .with_context(|| format!("{key} would overflow"))?;
    obj.insert(key.to_string(), Value::from(next));
    Ok(Value::from(next))
}

fn push(data: &mut Value, key: &str, item: Value) -> anyhow::Result<Value> {
    let obj = object_mut(data)?;
    let slot = obj.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
    match slot {
        Value::Array(items) => {
            items.push(item);
            Ok(Value::Array(items.clone()))
        }
        other => bail!("{key} holds {}, not an array", kind_of(other)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn render(output: &Output, format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        let value = match output {
            Output::Value(v) => v.clone(),
            Output::Path(p) => Value::String(p.display().to_string()),
            Output::Updated { key, value } => serde_json::json!({ "key": key, "value": value }),
            Output::Removed { key, existed } => {
                serde_json::json!({ "key": key, "removed": existed })
            }
            Output::Assured(keys) => serde_json::json!({ "added": keys }),
        };
        println!("{}", serde_json::to_string(&value)?);
        return Ok(());
    }

    match output {
        Output::Value(v) => println!("{}", serde_json::to_string_pretty(v)?),
        Output::Path(p) => println!("{}", p.display()),
        Output::Updated { key, value } => {
            println!("{} {} = {}", "✓".green().bold(), key.yellow(), value)
        }
        Output::Removed { key, existed: true } => {
            println!("{} removed {}", "✓".green().bold(), key.yellow())
        }
        Output::Removed { key, existed: false } => {
            println!("{} {} was not set", "·".dimmed(), key.yellow())
        }
        Output::Assured(keys) if keys.is_empty() => {
            println!("{} all fields present", "✓".green().bold())
        }
        Output::Assured(keys) => {
            for key in keys {
                println!("  {} {}", "added:".green(), key);
            }
        }
    }
    Ok(())
}
