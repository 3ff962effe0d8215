#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod blob;
mod error;
pub mod report;
mod reconciliation;
pub mod telemetry;

pub use blob::BlobError;
pub use blob::BlobResult;
pub use blob::BlobStore;
pub use blob::LocalBlobStore;
pub use error::FacadeError;
pub use error::FacadeResult;
pub use reconciliation::ReconciliationFacade;
pub use reconciliation::RunResult;
pub use report::report_filename;
pub use report::write_csv;
pub use report::write_xlsx;
pub use report::ReportError;
pub use report::ReportFormat;
pub use report::ReportResult;
pub use telemetry::PipelineTelemetry;
pub use telemetry::TelemetryCounters;
