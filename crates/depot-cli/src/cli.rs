use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "depot",
    about = "Depot: blob, JSON and CSV storage from the command line",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Object store directory (overrides `[store] root` in the config file)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file [default: depot.toml, if present]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Raw byte blobs
    #[command(subcommand)]
    Blob(BlobCommand),
    /// JSON documents
    #[command(subcommand)]
    Json(JsonCommand),
    /// CSV record collections
    #[command(subcommand)]
    Csv(CsvCommand),
}

#[derive(Subcommand)]
pub enum BlobCommand {
    /// Upload a file under a key, replacing any existing blob
    Put(BlobPutArgs),
    /// Download a blob to stdout or a file
    Get(BlobGetArgs),
    /// Delete a blob (succeeds if it does not exist)
    Rm(KeyArgs),
    /// List keys, optionally under a prefix
    Ls(BlobLsArgs),
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct BlobPutArgs {
    pub key: String,
    pub file: PathBuf,
}

#[derive(Args)]
pub struct BlobGetArgs {
    pub key: String,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct BlobLsArgs {
    #[arg(default_value = "")]
    pub prefix: String,
}

#[derive(Subcommand)]
pub enum JsonCommand {
    /// Print a stored document
    Get(KeyArgs),
    /// Validate a local JSON file and store it
    Put(JsonPutArgs),
}

#[derive(Args)]
pub struct JsonPutArgs {
    pub key: String,
    pub file: PathBuf,
}

#[derive(Subcommand)]
pub enum CsvCommand {
    /// Store a JSON array of flat objects as CSV
    Import(CsvImportArgs),
    /// Print a stored CSV collection as a JSON array
    Export(KeyArgs),
}

#[derive(Args)]
pub struct CsvImportArgs {
    pub key: String,
    /// JSON file holding an array of objects with scalar fields
    pub file: PathBuf,
}
