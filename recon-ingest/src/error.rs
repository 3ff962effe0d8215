use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

/// Errors raised while reading and normalizing a gateway file (spec.md §7:
/// `ReadError`, `ColumnValidation`). Duplicate-key and missing-pair failures belong to
/// the reconciler and are not modeled here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unrecognized file extension: {0}")]
    UnknownFormat(String),
    #[error("failed to read {filename}: {source}")]
    Read {
        filename: String,
        source: String,
    },
    #[error("missing required columns in {filename}: {missing:?}")]
    ColumnValidation {
        filename: String,
        missing: Vec<String>,
    },
}
