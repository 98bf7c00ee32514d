use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Profile delimited, JSON-lines, and Parquet datasets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze input files and emit per-attribute statistics
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Input file or glob pattern (repeatable)
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<String>,
    /// Field delimiter: a named alias ('csv', 'tab', 'pipe'), any single
    /// character, a multi-character literal token, or 'json'/'parquet'
    /// for structured inputs; sniffed when omitted
    #[arg(short = 'd', long)]
    pub delimiter: Option<String>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Destination for the statistics report (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Seed for the bounded value sampler
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}
