#![deny(clippy::print_stdout, clippy::print_stderr)]

//! File reader, normalizer and classifier for the reconciliation core (spec.md §4.2–§4.4).
//!
//! [`read_table`] turns raw bytes plus a filename into a [`table::RawTable`]; [`normalize`]
//! applies the eight-step `GatewayFile` pipeline against a [`recon_config::GatewayFileConfig`];
//! [`classify_external`] and [`classify_internal`] partition the normalized rows into the
//! transaction types the reconciler keys and matches. Reconciliation-key assignment and
//! matching themselves live downstream, in the reconciler.

mod classify;
mod error;
mod normalize;
mod reader;
mod table;

pub use classify::classify_external;
pub use classify::classify_internal;
pub use classify::ExternalPartitions;
pub use classify::InternalPartitions;
pub use error::IngestError;
pub use error::IngestResult;
pub use normalize::normalize;
pub use normalize::NormalizedRow;
pub use normalize::NormalizedTable;
pub use reader::read_table;
pub use table::RawTable;

use recon_config::GatewayFileConfig;

/// Reads and normalizes one gateway file in a single call, skipping the header rows
/// configured for the detected format (spec.md §4.2 step "Skips *k* header rows").
pub fn read_and_normalize(bytes: &[u8], filename: &str, config: &GatewayFileConfig) -> IngestResult<NormalizedTable> {
    let format = recon_config::FileFormat::from_extension(filename.rsplit('.').next().unwrap_or_default())
        .ok_or_else(|| IngestError::UnknownFormat(filename.to_string()))?;
    let raw = read_table(bytes, filename, config.header_rows_to_skip(format))?;
    normalize(raw, config, filename)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::table::RawTable;

    #[test]
    fn raw_table_drops_leading_columns_in_place() {
        let mut table = RawTable::new(
            vec!["pad1".into(), "pad2".into(), "Date".into()],
            vec![vec!["x".into(), "y".into(), "2025-01-01".into()]],
        );
        table.drop_leading_columns(2);
        assert_eq!(table.headers, vec!["Date".to_string()]);
        assert_eq!(table.rows[0], vec!["2025-01-01".to_string()]);
    }

    #[test]
    fn raw_table_truncates_before_trailer_marker() {
        let mut table = RawTable::new(
            vec!["Col".into()],
            vec![
                vec!["row one".into()],
                vec!["----- End of Statement -----".into()],
                vec!["row three".into()],
            ],
        );
        table.truncate_before_marker("----- End of Statement -----");
        assert_eq!(table.rows.len(), 1);
    }
}
