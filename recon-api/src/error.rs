use recon_config::ConfigError;
use recon_engine::ReconcileError;
use recon_ingest::IngestError;
use recon_store::StoreError;
use thiserror::Error;

use crate::blob::BlobError;
use crate::report::ReportError;

pub type FacadeResult<T> = Result<T, FacadeError>;

/// Tagged error surface for one reconciliation run or report request (spec.md §7).
/// Each variant wraps the originating crate's own error type rather than flattening it
/// to a string, so callers can still match on the underlying kind.
#[derive(Debug, Error)]
pub enum FacadeError {
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Report(#[from] ReportError),
}
