//! Command-line interface for tabrecon

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tabrecon")]
#[command(about = "Reconcile two versions of a tabular dataset")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare two versions table by table
    Compare(CompareArgs),

    /// List the tables found in a file, directory or database
    Tables {
        /// File, directory or DuckDB database
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the key tabrecon would use for a table
    Key {
        /// File, directory or DuckDB database
        file: PathBuf,

        /// Table to inspect
        #[arg(long)]
        table: String,
    },

    /// Inspect or create configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args, Debug, Default)]
pub struct CompareArgs {
    /// Old version: file, directory or DuckDB database
    pub old: PathBuf,

    /// New version: file, directory or DuckDB database
    pub new: PathBuf,

    /// Tables to compare (comma separated, `*` for all)
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Key override as TABLE=COLUMN[,COLUMN...] (repeatable)
    #[arg(long = "key", value_parser = parse_key_override)]
    pub keys: Vec<(String, Vec<String>)>,

    /// Rows above the header as TABLE=N (repeatable)
    #[arg(long = "header-row", value_parser = parse_header_row)]
    pub header_rows: Vec<(String, usize)>,

    /// Write a report here (a file for json and xlsx, a directory for csv and parquet)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Report format: json, csv, parquet or xlsx
    #[arg(long)]
    pub format: Option<String>,

    /// Print the results as JSON
    #[arg(long)]
    pub json: bool,

    /// Label for the old version in reports
    #[arg(long)]
    pub old_label: Option<String>,

    /// Label for the new version in reports
    #[arg(long)]
    pub new_label: Option<String>,

    /// Uniqueness ratio a key column must exceed
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Compare tables in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Overwrite existing report files
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration and where it came from
    Show,

    /// Write a default configuration file
    Init {
        /// Write the global config instead of ./tabrecon.toml
        #[arg(long)]
        global: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse `table=col[,col...]`
pub fn parse_key_override(value: &str) -> Result<(String, Vec<String>), String> {
    let (table, columns) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE=COLUMN[,COLUMN...], got '{value}'"))?;
    let columns: Vec<String> = columns
        .split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(str::to_string)
        .collect();
    if table.trim().is_empty() || columns.is_empty() {
        return Err(format!("expected TABLE=COLUMN[,COLUMN...], got '{value}'"));
    }
    Ok((table.trim().to_string(), columns))
}

/// Parse `table=N`
pub fn parse_header_row(value: &str) -> Result<(String, usize), String> {
    let (table, row) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE=N, got '{value}'"))?;
    let row = row
        .trim()
        .parse()
        .map_err(|e| format!("invalid header row '{row}': {e}"))?;
    if table.trim().is_empty() {
        return Err(format!("expected TABLE=N, got '{value}'"));
    }
    Ok((table.trim().to_string(), row))
}
