use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sos",
    about = "storeosaurus — inspect and edit single-file JSON stores",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Which store to open and how.
#[derive(Args, Clone, Debug, Default)]
pub struct StoreArgs {
    /// Store name; the file becomes `<name>.store.json`
    #[arg(short, long, global = true)]
    pub name: Option<String>,

    /// Explicit store file path (wins over --name)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Passphrase for obfuscated stores
    #[arg(short, long, global = true)]
    pub passphrase: Option<String>,

    /// Target schema version
    #[arg(long, global = true)]
    pub schema_version: Option<u32>,

    /// TOML file with store settings; flags override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the whole document
    Show,
    /// Print one top-level field
    Get(KeyArgs),
    /// Set a top-level field to a JSON value (bare words are strings)
    Set(SetArgs),
    /// Remove a top-level field
    Unset(KeyArgs),
    /// Add to a numeric field, starting from 0
    Incr(IncrArgs),
    /// Append a JSON value to an array field
    Push(SetArgs),
    /// Add missing top-level fields from a JSON object
    Assure(AssureArgs),
    /// Print the resolved store file path
    Path,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct SetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Args)]
pub struct IncrArgs {
    pub key: String,
    #[arg(long, default_value = "1", allow_negative_numbers = true)]
    pub by: i64,
}

#[derive(Args)]
pub struct AssureArgs {
    pub defaults: String,
}
