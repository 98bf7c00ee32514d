//! The profile driver: expands input patterns, drives the row reader over
//! each file, and folds every accepted record into one cross-file schema
//! tree. The driver owns all cross-file state; a fatal error on one file
//! ends the run but the profile accumulated so far is preserved and
//! returned.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{error, info};

use crate::{
    dialect::{self, Dialect},
    error::IngestError,
    io_utils,
    reader::{FileCursor, RowReader},
    record::NormalizedRecord,
    schema::SchemaTree,
    source::{RawRow, RecordSource},
};

const PROGRESS_INTERVAL: u64 = 10_000;
const SNIFF_SAMPLE_LINES: usize = 8;

/// Cooperative cancellation flag, checked once per record iteration.
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Capability hook for an external mapping layer: a record maps to zero or
/// more replacement records. `None` drops the record.
pub trait RecordMapper {
    fn map(&self, record: NormalizedRecord) -> Option<Vec<NormalizedRecord>>;
}

#[derive(Debug, Clone, Default)]
pub struct ProfileOptions {
    /// Delimiter specifier; empty/absent means sniff per file extension
    /// and content.
    pub delimiter: Option<String>,
    /// Input encoding label; UTF-8 when absent.
    pub encoding: Option<String>,
    /// Seed for the bounded value sampler.
    pub seed: u64,
}

/// The accumulated statistical summary of one run.
#[derive(Debug)]
pub struct Profile {
    tree: SchemaTree,
    total_records: u64,
    sample: Option<NormalizedRecord>,
    rows_read: u64,
    rows_skipped: u64,
    rows_errored: u64,
}

impl Profile {
    fn new(seed: u64) -> Self {
        Self {
            tree: SchemaTree::new(seed),
            total_records: 0,
            sample: None,
            rows_read: 0,
            rows_skipped: 0,
            rows_errored: 0,
        }
    }

    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    /// Count of accepted records across all files; the denominator for
    /// population percentages.
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// First record seen across all files, retained for the mapping
    /// skeleton generator. Never mutated after capture.
    pub fn sample_record(&self) -> Option<&NormalizedRecord> {
        self.sample.as_ref()
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }

    pub fn rows_errored(&self) -> u64 {
        self.rows_errored
    }

    fn absorb_cursor(&mut self, cursor: &FileCursor) {
        self.rows_read += cursor.rows_read;
        self.rows_skipped += cursor.rows_skipped;
        self.rows_errored += cursor.rows_errored;
    }
}

#[derive(Debug)]
pub enum RunStatus {
    Completed,
    Interrupted,
    Aborted(anyhow::Error),
}

impl RunStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

#[derive(Debug)]
pub struct ProfileRun {
    pub profile: Profile,
    pub status: RunStatus,
}

/// Profiles every file matching `patterns` into a single cross-file
/// profile. Zero matches is an error; a fatal error or interrupt mid-run
/// returns the partial profile with a non-complete status.
pub fn run(
    patterns: &[String],
    options: &ProfileOptions,
    cancel: &CancelToken,
    mapper: Option<&dyn RecordMapper>,
) -> Result<ProfileRun> {
    let files = expand_patterns(patterns)?;
    let encoding = io_utils::resolve_encoding(options.encoding.as_deref())?;

    let mut profile = Profile::new(options.seed);
    let mut status = RunStatus::Completed;
    let mut canonical: Option<(Dialect, Option<Vec<String>>)> = None;

    'files: for (file_num, path) in files.iter().enumerate() {
        info!(
            "Analyzing '{}' ({} of {})",
            path.display(),
            file_num + 1,
            files.len()
        );

        let (file_dialect, shared_headers) = match &canonical {
            Some((dialect, headers)) => (dialect.clone(), headers.clone()),
            None => match resolve_dialect(path, options.delimiter.as_deref(), encoding)? {
                Ok(dialect) => {
                    info!("resolved dialect [{}]", dialect.describe());
                    (dialect, None)
                }
                Err(err) => {
                    error!("{}: {err}", path.display());
                    status = RunStatus::Aborted(err.into());
                    break 'files;
                }
            },
        };

        let source = open_source(path, &file_dialect, encoding)?;
        let mut reader = RowReader::new(
            source,
            FileCursor::new(path.clone(), file_dialect),
            shared_headers,
        );

        let mut file_status: Option<RunStatus> = None;
        loop {
            if cancel.is_cancelled() {
                info!("interrupt observed, stopping after the current record");
                file_status = Some(RunStatus::Interrupted);
                break;
            }
            match reader.next_record() {
                Ok(Some(record)) => {
                    absorb_record(&mut profile, record, mapper);
                    if reader.cursor().rows_read % PROGRESS_INTERVAL == 0 {
                        info!("{} record(s) processed", reader.cursor().rows_read);
                    }
                }
                Ok(None) => {
                    info!(
                        "{} record(s) processed, complete",
                        reader.cursor().rows_read
                    );
                    break;
                }
                Err(err) => {
                    error!("{}: {err}", path.display());
                    file_status = Some(RunStatus::Aborted(err.into()));
                    break;
                }
            }
        }

        profile.absorb_cursor(reader.cursor());
        if canonical.is_none() {
            canonical = Some((
                reader.cursor().dialect.clone(),
                reader.headers().map(|headers| headers.to_vec()),
            ));
        }
        if let Some(final_status) = file_status {
            status = final_status;
            break 'files;
        }
    }

    Ok(ProfileRun { profile, status })
}

fn absorb_record(profile: &mut Profile, record: NormalizedRecord, mapper: Option<&dyn RecordMapper>) {
    if profile.sample.is_none() {
        profile.tree.register(&record);
        profile.sample = Some(record.clone());
    }
    match mapper {
        None => {
            profile.total_records += 1;
            profile.tree.update(&record);
        }
        Some(mapper) => {
            for mapped in mapper.map(record).unwrap_or_default() {
                profile.total_records += 1;
                profile.tree.update(&mapped);
            }
        }
    }
}

fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern)
            .with_context(|| format!("Invalid input pattern '{pattern}'"))?;
        for entry in matches {
            let path = entry.with_context(|| format!("Expanding pattern '{pattern}'"))?;
            if path.is_file() {
                files.push(path);
            }
        }
    }
    if files.is_empty() {
        return Err(IngestError::NoInputMatched {
            pattern: patterns.join(", "),
        }
        .into());
    }
    Ok(files)
}

/// Resolves the file's dialect: an explicit specifier wins, then the
/// structured-format extensions, then content sniffing. The outer error is
/// a run-level failure (unreadable file); the inner one is an unresolved
/// dialect, fatal for the run but leaving the profile intact.
fn resolve_dialect(
    path: &Path,
    spec: Option<&str>,
    encoding: &'static Encoding,
) -> Result<Result<Dialect, IngestError>> {
    if let Some(spec) = spec
        && let Some(resolved) = dialect::parse_spec(spec)
    {
        return Ok(Ok(resolved));
    }
    if let Some(resolved) = dialect::dialect_for_extension(path) {
        return Ok(Ok(resolved));
    }
    let sample = read_sample(path, encoding)?;
    Ok(dialect::sniff(&sample))
}

fn read_sample(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let mut source = RecordSource::lines(path, encoding)?;
    let mut sample = String::new();
    let mut taken = 0;
    while taken < SNIFF_SAMPLE_LINES {
        match source.next_raw() {
            Some(Ok(RawRow::Line(line))) => {
                sample.push_str(&line);
                sample.push('\n');
                taken += 1;
            }
            Some(Ok(RawRow::Structured(_))) | Some(Err(_)) => continue,
            None => break,
        }
    }
    Ok(sample)
}

fn open_source(
    path: &Path,
    dialect: &Dialect,
    encoding: &'static Encoding,
) -> Result<RecordSource> {
    match dialect {
        Dialect::Parquet => RecordSource::parquet(path),
        _ => RecordSource::lines(path, encoding),
    }
}
