//! Report writer (spec.md §4.7): flat CSV or an eight-sheet XLSX workbook, both driven
//! by the same row selection the facade already filtered out of the store.

use chrono::NaiveDate;
use recon_store::ReconciliationStatus;
use recon_store::Transaction;
use recon_store::TransactionType;
use rust_xlsxwriter::Workbook;
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("workbook error: {0}")]
    Workbook(String),
    #[error("csv encoding error: {0}")]
    Csv(String),
}

impl From<XlsxError> for ReportError {
    fn from(err: XlsxError) -> Self {
        ReportError::Workbook(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Xlsx,
    Csv,
}

/// The eight sheets an XLSX report always contains, in this fixed order (spec.md §4.7,
/// P9).
const SHEET_NAMES: [&str; 8] = [
    "Unreconciled External",
    "Unreconciled Internal",
    "Reconciled External",
    "Reconciled Internal",
    "Manual External",
    "Manual Internal",
    "Charges",
    "Deposits",
];

fn sheet_index(transaction: &Transaction) -> usize {
    if transaction.transaction_type == TransactionType::Charge {
        return 6;
    }
    if transaction.transaction_type == TransactionType::Deposit {
        return 7;
    }
    let is_external = transaction.gateway_type == recon_store::GatewaySide::External;
    if transaction.manual_overlay.is_manually_reconciled {
        return if is_external { 4 } else { 5 };
    }
    match (transaction.reconciliation_status, is_external) {
        (ReconciliationStatus::Unreconciled, true) => 0,
        (ReconciliationStatus::Unreconciled, false) => 1,
        (ReconciliationStatus::Reconciled, true) => 2,
        (ReconciliationStatus::Reconciled, false) => 3,
    }
}

/// Filename pattern `reconciliation_{gateway}[_from_{d}][_to_{d}][_{run_id}].{ext}`
/// (spec.md §6.2).
#[must_use]
pub fn report_filename(
    gateway: &str,
    format: ReportFormat,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    run_id: Option<&str>,
) -> String {
    let mut name = format!("reconciliation_{gateway}");
    if let Some(from) = date_from {
        name.push_str(&format!("_from_{}", from.format("%Y-%m-%d")));
    }
    if let Some(to) = date_to {
        name.push_str(&format!("_to_{}", to.format("%Y-%m-%d")));
    }
    if let Some(run_id) = run_id {
        name.push_str(&format!("_{run_id}"));
    }
    let extension = match format {
        ReportFormat::Xlsx => "xlsx",
        ReportFormat::Csv => "csv",
    };
    name.push('.');
    name.push_str(extension);
    name
}

fn cell_date(transaction: &Transaction) -> String {
    transaction.date.map_or_else(String::new, |date| date.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn cell_note(transaction: &Transaction) -> String {
    transaction
        .manual_overlay
        .manual_recon_note
        .clone()
        .or_else(|| transaction.reconciliation_note.clone())
        .unwrap_or_default()
}

fn cell_status(status: ReconciliationStatus) -> &'static str {
    match status {
        ReconciliationStatus::Reconciled => "reconciled",
        ReconciliationStatus::Unreconciled => "unreconciled",
    }
}

const CSV_HEADER: [&str; 9] = [
    "Date",
    "Transaction Reference",
    "Details",
    "Debit",
    "Credit",
    "Reconciliation Status",
    "Reconciliation Note",
    "Reconciliation Key",
    "Run ID",
];

/// Emits the flat CSV form: one row per transaction, no sheet partitioning.
pub fn write_csv(transactions: &[Transaction]) -> ReportResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(|err| ReportError::Csv(err.to_string()))?;
    for transaction in transactions {
        writer
            .write_record([
                cell_date(transaction),
                transaction.transaction_id.clone(),
                transaction.narrative.clone(),
                transaction.debit.map_or_else(String::new, |amount| amount.to_string()),
                transaction.credit.map_or_else(String::new, |amount| amount.to_string()),
                cell_status(transaction.reconciliation_status).to_string(),
                cell_note(transaction),
                transaction.reconciliation_key.clone().unwrap_or_default(),
                transaction.run_id.clone(),
            ])
            .map_err(|err| ReportError::Csv(err.to_string()))?;
    }
    writer.into_inner().map_err(|err| ReportError::Csv(err.to_string()))
}

/// Emits the eight-sheet XLSX form. Every sheet is written even when empty (P9).
pub fn write_xlsx(transactions: &[Transaction]) -> ReportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut sheets: [Vec<&Transaction>; 8] = Default::default();
    for transaction in transactions {
        sheets[sheet_index(transaction)].push(transaction);
    }

    for (name, rows) in SHEET_NAMES.iter().zip(sheets.iter()) {
        let sheet = workbook.add_worksheet().set_name(name)?;
        for (col, header) in CSV_HEADER.iter().enumerate() {
            sheet.write_string(0, col as u16, *header)?;
        }
        for (row_idx, transaction) in rows.iter().enumerate() {
            let row = (row_idx + 1) as u32;
            sheet.write_string(row, 0, cell_date(transaction))?;
            sheet.write_string(row, 1, &transaction.transaction_id)?;
            sheet.write_string(row, 2, &transaction.narrative)?;
            sheet.write_string(row, 3, transaction.debit.map_or_else(String::new, |amount| amount.to_string()))?;
            sheet.write_string(row, 4, transaction.credit.map_or_else(String::new, |amount| amount.to_string()))?;
            sheet.write_string(row, 5, cell_status(transaction.reconciliation_status))?;
            sheet.write_string(row, 6, cell_note(transaction))?;
            sheet.write_string(row, 7, transaction.reconciliation_key.clone().unwrap_or_default())?;
            sheet.write_string(row, 8, &transaction.run_id)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use recon_store::GatewaySide;
    use recon_store::ManualReconOverlay;
    use rust_decimal::Decimal;

    use super::*;

    fn sample(transaction_type: TransactionType, gateway_type: GatewaySide, status: ReconciliationStatus, manual: bool) -> Transaction {
        Transaction {
            id: Some(1),
            gateway: format!("equity{}", gateway_type.suffix()),
            gateway_type,
            transaction_type,
            reconciliation_category: transaction_type.reconciliation_category(),
            date: NaiveDate::from_ymd_opt(2025, 1, 2).map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default()),
            transaction_id: "TXN001".to_string(),
            narrative: "Payout".to_string(),
            debit: Some(Decimal::new(150000, 2)),
            credit: None,
            reconciliation_status: status,
            reconciliation_note: None,
            reconciliation_key: Some("TXN001|1500|equity".to_string()),
            run_id: "RUN-1".to_string(),
            source_file: "equity.csv".to_string(),
            manual_overlay: ManualReconOverlay { is_manually_reconciled: manual, ..Default::default() },
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn sheet_assignment_follows_precedence_order() {
        let charge = sample(TransactionType::Charge, GatewaySide::External, ReconciliationStatus::Unreconciled, false);
        assert_eq!(sheet_index(&charge), 6);

        let deposit = sample(TransactionType::Deposit, GatewaySide::External, ReconciliationStatus::Reconciled, false);
        assert_eq!(sheet_index(&deposit), 7);

        let manual_internal = sample(TransactionType::Payout, GatewaySide::Internal, ReconciliationStatus::Unreconciled, true);
        assert_eq!(sheet_index(&manual_internal), 5);

        let unreconciled_external = sample(TransactionType::Debit, GatewaySide::External, ReconciliationStatus::Unreconciled, false);
        assert_eq!(sheet_index(&unreconciled_external), 0);

        let reconciled_internal = sample(TransactionType::Payout, GatewaySide::Internal, ReconciliationStatus::Reconciled, false);
        assert_eq!(sheet_index(&reconciled_internal), 3);
    }

    #[test]
    fn csv_prefers_manual_note_over_system_note() {
        let mut transaction = sample(TransactionType::Debit, GatewaySide::External, ReconciliationStatus::Reconciled, true);
        transaction.reconciliation_note = Some("System Reconciled".to_string());
        transaction.manual_overlay.manual_recon_note = Some("Confirmed by ops".to_string());
        let csv = write_csv(&[transaction]).expect("csv");
        let text = String::from_utf8(csv).expect("utf8");
        assert!(text.contains("Confirmed by ops"));
        assert!(!text.contains("System Reconciled"));
    }

    #[test]
    fn xlsx_always_contains_eight_sheets() {
        let bytes = write_xlsx(&[]).expect("xlsx");
        assert!(!bytes.is_empty());
    }

    #[test]
    fn filename_includes_optional_segments_in_order() {
        let name = report_filename(
            "equity",
            ReportFormat::Csv,
            NaiveDate::from_ymd_opt(2025, 1, 1),
            NaiveDate::from_ymd_opt(2025, 1, 31),
            Some("RUN-1"),
        );
        assert_eq!(name, "reconciliation_equity_from_2025-01-01_to_2025-01-31_RUN-1.csv");
    }
}
