use thiserror::Error;

/// Ingestion failure taxonomy.
///
/// `RowFormat` and `HeaderAmbiguity` are recovered inside the row reader
/// (logged, counted, row dropped); the remaining variants end the file or
/// the run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("row {row}: {message}")]
    RowFormat { row: u64, message: String },
    #[error("row {row} contains the header")]
    HeaderAmbiguity { row: u64 },
    #[error("unable to determine the field delimiter from the input sample")]
    DialectUnresolved,
    #[error("aborted after {limit} consecutive row errors")]
    ConsecutiveErrors { limit: u32 },
    #[error("no input files matched '{pattern}'")]
    NoInputMatched { pattern: String },
}
