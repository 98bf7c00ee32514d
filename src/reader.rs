//! The resilient row reader.
//!
//! Turns a raw record source into a stream of [`NormalizedRecord`]s while
//! recovering from malformed rows, mismatched column counts, duplicated
//! header rows, and blank lines. Row-level problems are logged and counted,
//! never propagated; ten consecutive failures with no good row in between
//! trip the circuit breaker and abort the file.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::{
    dialect::Dialect,
    error::IngestError,
    record::NormalizedRecord,
    source::{RawRow, RecordSource},
    split,
};

pub const CONSECUTIVE_ERROR_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    AwaitingHeader,
    Streaming,
    Exhausted,
    Aborted,
}

/// Per-file ingestion state: identity, resolved dialect, captured header,
/// and running counters. Created per file, never shared across files.
#[derive(Debug, Clone)]
pub struct FileCursor {
    pub path: PathBuf,
    pub dialect: Dialect,
    pub headers: Option<Vec<String>>,
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub rows_errored: u64,
    pub errored: bool,
}

impl FileCursor {
    pub fn new(path: impl Into<PathBuf>, dialect: Dialect) -> Self {
        Self {
            path: path.into(),
            dialect,
            headers: None,
            rows_read: 0,
            rows_skipped: 0,
            rows_errored: 0,
            errored: false,
        }
    }
}

pub struct RowReader {
    source: RecordSource,
    cursor: FileCursor,
    state: ReaderState,
}

impl RowReader {
    /// Builds a reader over `source`. A pre-supplied header (the canonical
    /// schema captured from an earlier file) starts the reader in the
    /// streaming state; structured sources never await a header.
    pub fn new(source: RecordSource, mut cursor: FileCursor, headers: Option<Vec<String>>) -> Self {
        if headers.is_some() {
            cursor.headers = headers;
        }
        let state = if cursor.headers.is_some() || cursor.dialect.is_structured() {
            ReaderState::Streaming
        } else {
            ReaderState::AwaitingHeader
        };
        Self {
            source,
            cursor,
            state,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn cursor(&self) -> &FileCursor {
        &self.cursor
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.cursor.headers.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.cursor.path
    }

    /// Pulls rows until one yields a record, the source drains, or the
    /// consecutive-error threshold is reached. A successful row resets the
    /// threshold counter.
    pub fn next_record(&mut self) -> Result<Option<NormalizedRecord>, IngestError> {
        let mut consecutive = 0u32;
        loop {
            if consecutive >= CONSECUTIVE_ERROR_LIMIT {
                self.state = ReaderState::Aborted;
                self.cursor.errored = true;
                return Err(IngestError::ConsecutiveErrors {
                    limit: CONSECUTIVE_ERROR_LIMIT,
                });
            }

            let raw = match self.source.next_raw() {
                None => {
                    self.state = ReaderState::Exhausted;
                    return Ok(None);
                }
                Some(Err(err)) => {
                    warn!(
                        "{}",
                        IngestError::RowFormat {
                            row: self.cursor.rows_read + 1,
                            message: err.to_string(),
                        }
                    );
                    self.cursor.rows_skipped += 1;
                    self.cursor.rows_errored += 1;
                    consecutive += 1;
                    continue;
                }
                Some(Ok(raw)) => raw,
            };
            self.cursor.rows_read += 1;

            let line = match raw {
                RawRow::Structured(record) => return Ok(Some(record)),
                RawRow::Line(line) => line,
            };

            if line.trim().is_empty() {
                debug!("row {} is blank", self.cursor.rows_read);
                self.cursor.rows_skipped += 1;
                continue;
            }

            let fields = match &self.cursor.dialect {
                Dialect::Delimited(strategy) => split::split_line(&line, strategy),
                _ => match NormalizedRecord::from_json_line(&line) {
                    Ok(record) => return Ok(Some(record)),
                    Err(err) => {
                        warn!(
                            "{}",
                            IngestError::RowFormat {
                                row: self.cursor.rows_read,
                                message: err.to_string(),
                            }
                        );
                        self.cursor.rows_skipped += 1;
                        self.cursor.rows_errored += 1;
                        consecutive += 1;
                        continue;
                    }
                },
            };

            let headers = match &self.cursor.headers {
                None => {
                    let headers: Vec<String> = fields.iter().map(|f| header_name(f)).collect();
                    debug!(
                        "captured header with {} column(s) from {:?}",
                        headers.len(),
                        self.cursor.path
                    );
                    self.cursor.headers = Some(headers);
                    self.cursor.rows_skipped += 1;
                    self.state = ReaderState::Streaming;
                    continue;
                }
                Some(headers) => headers,
            };

            if fields.len() != headers.len() {
                warn!(
                    "{}",
                    IngestError::RowFormat {
                        row: self.cursor.rows_read,
                        message: format!(
                            "has {} columns, expected {}",
                            fields.len(),
                            headers.len()
                        ),
                    }
                );
                self.cursor.rows_skipped += 1;
                self.cursor.rows_errored += 1;
                consecutive += 1;
                continue;
            }

            if is_embedded_header(&fields, headers) {
                self.cursor.rows_skipped += 1;
                // An expected header on row 1 is normal; deeper in the file
                // it usually signals a concatenation artifact.
                if self.cursor.rows_read != 1 {
                    warn!(
                        "{}",
                        IngestError::HeaderAmbiguity {
                            row: self.cursor.rows_read,
                        }
                    );
                    self.cursor.rows_errored += 1;
                    consecutive += 1;
                }
                continue;
            }

            return Ok(Some(NormalizedRecord::from_fields(headers, fields)));
        }
    }
}

fn header_name(field: &str) -> String {
    field
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// A data row whose first and last fields match the header's first and
/// last names (case-insensitively, after whitespace normalization) is a
/// duplicate embedded header.
fn is_embedded_header(fields: &[String], headers: &[String]) -> bool {
    match (fields.first(), fields.last(), headers.first(), headers.last()) {
        (Some(first), Some(last), Some(head_first), Some(head_last)) => {
            header_name(first).eq_ignore_ascii_case(head_first)
                && header_name(last).eq_ignore_ascii_case(head_last)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use crate::split::SplitStrategy;
    use encoding_rs::UTF_8;
    use std::io::Cursor;

    fn reader_for(data: &str, dialect: Dialect, headers: Option<Vec<String>>) -> RowReader {
        let source =
            RecordSource::lines_from(Box::new(Cursor::new(data.as_bytes().to_vec())), UTF_8);
        RowReader::new(source, FileCursor::new("test-input", dialect), headers)
    }

    fn comma() -> Dialect {
        Dialect::Delimited(SplitStrategy::Char(','))
    }

    fn drain(reader: &mut RowReader) -> Vec<NormalizedRecord> {
        let mut records = Vec::new();
        while let Some(record) = reader.next_record().expect("no fatal error") {
            records.push(record);
        }
        records
    }

    fn scalar(value: &str) -> FieldValue {
        FieldValue::Scalar(value.to_string())
    }

    #[test]
    fn captures_header_and_streams_rows() {
        let mut reader = reader_for("a,b\n1,2\n3,4\n", comma(), None);
        let records = drain(&mut reader);
        assert_eq!(reader.headers(), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("a"), Some(&scalar("1")));
        assert_eq!(records[1].get("b"), Some(&scalar("4")));
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert_eq!(reader.cursor().rows_read, 3);
        assert_eq!(reader.cursor().rows_skipped, 1); // the header row
    }

    #[test]
    fn header_names_are_whitespace_normalized() {
        let mut reader = reader_for("first name,last\tname\nx,y\n", comma(), None);
        drain(&mut reader);
        assert_eq!(
            reader.headers(),
            Some(&["first_name".to_string(), "last_name".to_string()][..])
        );
    }

    #[test]
    fn column_count_mismatch_drops_the_row() {
        let mut reader = reader_for("a,b\n1,2,3\n4,5\n", comma(), None);
        let records = drain(&mut reader);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("a"), Some(&scalar("4")));
        assert_eq!(reader.cursor().rows_skipped, 2); // header + bad row
        assert_eq!(reader.cursor().rows_errored, 1);
    }

    #[test]
    fn blank_lines_are_skipped_without_error() {
        let mut reader = reader_for("a,b\n1,2\n\n3,4\n", comma(), None);
        let records = drain(&mut reader);
        assert_eq!(records.len(), 2);
        assert_eq!(reader.cursor().rows_skipped, 2); // header + blank
        assert_eq!(reader.cursor().rows_errored, 0);
    }

    #[test]
    fn presupplied_header_skips_row_one_silently() {
        let headers = vec!["a".to_string(), "b".to_string()];
        let mut reader = reader_for("a,b\n1,2\n", comma(), Some(headers));
        let records = drain(&mut reader);
        assert_eq!(records.len(), 1);
        assert_eq!(reader.cursor().rows_skipped, 1);
        assert_eq!(reader.cursor().rows_errored, 0);
    }

    #[test]
    fn duplicate_header_deep_in_file_counts_as_error() {
        let mut reader = reader_for("a,b\n1,2\na,b\n3,4\n", comma(), None);
        let records = drain(&mut reader);
        assert_eq!(records.len(), 2);
        assert_eq!(reader.cursor().rows_skipped, 2); // header + embedded header
        assert_eq!(reader.cursor().rows_errored, 1);
    }

    #[test]
    fn embedded_header_match_is_case_insensitive() {
        let mut reader = reader_for("a,b\nA,B\n1,2\n", comma(), None);
        let records = drain(&mut reader);
        assert_eq!(records.len(), 1);
        assert_eq!(reader.cursor().rows_errored, 1);
    }

    #[test]
    fn ten_consecutive_bad_rows_abort_the_file() {
        let mut data = String::from("a,b\n");
        for _ in 0..10 {
            data.push_str("1,2,3\n");
        }
        data.push_str("ok,row\n");
        let mut reader = reader_for(&data, comma(), None);
        let err = reader.next_record().expect_err("breaker should trip");
        assert!(matches!(err, IngestError::ConsecutiveErrors { limit: 10 }));
        assert_eq!(reader.state(), ReaderState::Aborted);
        assert!(reader.cursor().errored);
    }

    #[test]
    fn good_row_resets_the_breaker() {
        let mut data = String::from("a,b\n");
        for _ in 0..9 {
            data.push_str("1,2,3\n");
        }
        data.push_str("1,2\n");
        for _ in 0..9 {
            data.push_str("1,2,3\n");
        }
        data.push_str("3,4\n");
        let mut reader = reader_for(&data, comma(), None);
        let records = drain(&mut reader);
        assert_eq!(records.len(), 2);
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert_eq!(reader.cursor().rows_errored, 18);
    }

    #[test]
    fn json_lines_parse_directly() {
        let mut reader = reader_for(
            "{\"a\":\"1\"}\n\nnot json\n{\"a\":\"2\"}\n",
            Dialect::JsonLines,
            None,
        );
        let records = drain(&mut reader);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("a"), Some(&scalar("2")));
        assert_eq!(reader.cursor().rows_skipped, 2); // blank + bad json
        assert_eq!(reader.cursor().rows_errored, 1);
    }

    #[test]
    fn undecodable_line_is_a_recoverable_transport_error() {
        let mut data = b"a,b\n1,2\n".to_vec();
        data.extend_from_slice(&[0xff, 0xfe, b'\n']);
        data.extend_from_slice(b"3,4\n");
        let source = RecordSource::lines_from(Box::new(Cursor::new(data)), UTF_8);
        let mut reader = RowReader::new(source, FileCursor::new("bytes", comma()), None);
        let records = drain(&mut reader);
        assert_eq!(records.len(), 2);
        assert_eq!(reader.cursor().rows_errored, 1);
        // The undecodable line never counts as a row read.
        assert_eq!(reader.cursor().rows_read, 3);
    }
}
