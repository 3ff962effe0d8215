use thiserror::Error;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors raised by the reconciler proper (spec.md §7: `ReconciliationError`). Read/
/// column-validation errors surface from `recon-ingest`; persistence errors from
/// `recon-store`.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{gateway}: missing paired file(s): {missing:?}")]
    MissingPairedFile { gateway: String, missing: Vec<String> },
    #[error("{label}: duplicate reconcilable keys: {duplicates:?}")]
    DuplicateKeys {
        label: String,
        duplicates: Vec<String>,
    },
}
