//! Raw record sources.
//!
//! Every input format reduces to one of two raw shapes: an owned line of
//! text (delimited and JSON-lines files) or an already-structured record
//! (Parquet batches). The row reader is indifferent to which source it is
//! driving; transport-level failures are returned as errors so the reader
//! can count them against its circuit breaker.

use std::{
    collections::VecDeque,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use arrow::{json::LineDelimitedWriter, record_batch::RecordBatch};
use encoding_rs::Encoding;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use crate::record::NormalizedRecord;

const PARQUET_BATCH_SIZE: usize = 1024;

/// One raw row pulled from a source.
#[derive(Debug)]
pub enum RawRow {
    Line(String),
    Structured(NormalizedRecord),
}

pub enum RecordSource {
    Lines(LineSource),
    Batches(ParquetSource),
}

impl RecordSource {
    /// Opens a decoded text-line source over a file.
    pub fn lines(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
        Ok(Self::lines_from(Box::new(BufReader::new(file)), encoding))
    }

    /// Wraps an arbitrary buffered reader as a text-line source.
    pub fn lines_from(reader: Box<dyn BufRead>, encoding: &'static Encoding) -> Self {
        RecordSource::Lines(LineSource {
            reader,
            encoding,
            buffer: Vec::new(),
            first_line: true,
        })
    }

    /// Opens a Parquet file as a stream of structured row objects.
    pub fn parquet(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
        let batches = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("Reading Parquet metadata from {path:?}"))?
            .with_batch_size(PARQUET_BATCH_SIZE)
            .build()
            .with_context(|| format!("Opening Parquet reader for {path:?}"))?;
        Ok(RecordSource::Batches(ParquetSource {
            batches,
            pending: VecDeque::new(),
        }))
    }

    /// Pulls the next raw row. `None` means the source is drained; an error
    /// is a transport-level failure for that row (or batch) only.
    pub fn next_raw(&mut self) -> Option<Result<RawRow>> {
        match self {
            RecordSource::Lines(source) => source.next_line().map(|r| r.map(RawRow::Line)),
            RecordSource::Batches(source) => {
                source.next_record().map(|r| r.map(RawRow::Structured))
            }
        }
    }
}

pub struct LineSource {
    reader: Box<dyn BufRead>,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
    first_line: bool,
}

impl LineSource {
    fn next_line(&mut self) -> Option<Result<String>> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                while matches!(self.buffer.last(), Some(b'\n') | Some(b'\r')) {
                    self.buffer.pop();
                }
                let decoded = crate::io_utils::decode_bytes(&self.buffer, self.encoding);
                let decoded = if self.first_line {
                    self.first_line = false;
                    decoded.map(|text| text.trim_start_matches('\u{feff}').to_string())
                } else {
                    decoded
                };
                Some(decoded)
            }
            Err(err) => Some(Err(err.into())),
        }
    }
}

pub struct ParquetSource {
    batches: ParquetRecordBatchReader,
    pending: VecDeque<NormalizedRecord>,
}

impl ParquetSource {
    fn next_record(&mut self) -> Option<Result<NormalizedRecord>> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            match self.batches.next()? {
                Ok(batch) => match batch_to_records(&batch) {
                    Ok(records) => self.pending.extend(records),
                    Err(err) => return Some(Err(err)),
                },
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

/// Converts one Arrow batch into row objects by way of the line-delimited
/// JSON writer. Null cells are omitted, which matches the absence rule for
/// statistics.
fn batch_to_records(batch: &RecordBatch) -> Result<Vec<NormalizedRecord>> {
    let mut raw = Vec::new();
    {
        let mut writer = LineDelimitedWriter::new(&mut raw);
        writer.write_batches(&[batch]).context("Encoding batch rows")?;
        writer.finish().context("Flushing batch rows")?;
    }
    let text = String::from_utf8(raw).context("Batch rows are not valid UTF-8")?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            NormalizedRecord::from_json_line(line)
                .map_err(|err| anyhow!("decoding batch row: {err}"))
        })
        .collect()
}
