pub mod cli;
pub mod dialect;
pub mod error;
pub mod io_utils;
pub mod profile;
pub mod reader;
pub mod record;
pub mod report;
pub mod schema;
pub mod source;
pub mod split;

use std::{env, sync::OnceLock};

use anyhow::{Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::cli::{Cli, Commands};
use crate::profile::{CancelToken, ProfileOptions, RunStatus};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("rowscope", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => handle_analyze(&args),
    }
}

fn handle_analyze(args: &cli::AnalyzeArgs) -> Result<()> {
    let cancel = CancelToken::new();
    {
        let token = cancel.clone();
        if let Err(err) = ctrlc::set_handler(move || token.cancel()) {
            warn!("could not install interrupt handler: {err}");
        }
    }

    let options = ProfileOptions {
        delimiter: args.delimiter.clone(),
        encoding: args.input_encoding.clone(),
        seed: args.seed,
    };
    let outcome = profile::run(&args.inputs, &options, &cancel, None)?;

    // The report is written even for a partial run; partial results are
    // meaningful, not an error state.
    let rows = report::build_rows(&outcome.profile);
    report::write_rows(&rows, args.output.as_deref())?;
    if let Some(path) = &args.output {
        info!("statistics for {} attribute(s) written to {:?}", rows.len(), path);
    }
    info!(
        "{} record(s) accepted, {} row(s) skipped across {} row(s) read",
        outcome.profile.total_records(),
        outcome.profile.rows_skipped(),
        outcome.profile.rows_read()
    );
    if let Some(candidate) = report::record_id_candidate(&rows, outcome.profile.total_records()) {
        info!("record-id candidate: {candidate}");
    }

    match outcome.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Interrupted => Err(anyhow!("interrupted by user")),
        RunStatus::Aborted(err) => Err(err),
    }
}
