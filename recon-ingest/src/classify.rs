use std::collections::HashSet;

use recon_config::GatewayFileConfig;
use recon_store::GatewaySide;
use recon_store::ManualReconOverlay;
use recon_store::ReconciliationCategory;
use recon_store::ReconciliationStatus;
use recon_store::RunId;
use recon_store::Transaction;
use recon_store::TransactionType;
use rust_decimal::Decimal;

use crate::normalize::NormalizedRow;
use crate::normalize::NormalizedTable;

/// External-side partitions produced by the classifier (spec.md §4.4).
#[derive(Debug, Clone, Default)]
pub struct ExternalPartitions {
    pub deposits: Vec<Transaction>,
    pub charges: Vec<Transaction>,
    pub debits: Vec<Transaction>,
}

/// Internal-side partitions. `refunds` and `topups` are both non-reconcilable and are
/// merged by callers into `PersistPartitions::internal_other`.
#[derive(Debug, Clone, Default)]
pub struct InternalPartitions {
    pub payouts: Vec<Transaction>,
    pub refunds: Vec<Transaction>,
    pub topups: Vec<Transaction>,
}

/// Partitions a normalized external table into deposits, charges and debits. Keys are
/// not assigned here — the reconciler assigns reconciliation keys once it knows which
/// partitions need date-suffixed variants (spec.md §3.2, §4.5.2 step 3).
#[must_use]
pub fn classify_external(
    table: &NormalizedTable,
    base_gateway: &str,
    charge_keywords: &HashSet<String>,
    run_id: &RunId,
    source_file: &str,
) -> ExternalPartitions {
    let mut partitions = ExternalPartitions::default();
    let gateway = format!("{base_gateway}{}", GatewaySide::External.suffix());

    for row in &table.rows {
        let is_charge = row_matches_any_keyword(row, charge_keywords);

        if is_charge && row.debit > Decimal::ZERO {
            partitions.charges.push(tag_auto_reconciled(
                row,
                &gateway,
                TransactionType::Charge,
                row.debit,
                run_id,
                source_file,
                "System Reconciled",
            ));
        } else if row.credit >= Decimal::ONE {
            partitions.deposits.push(tag_auto_reconciled(
                row,
                &gateway,
                TransactionType::Deposit,
                row.credit,
                run_id,
                source_file,
                "System Reconciled",
            ));
        } else if !is_charge && row.debit >= Decimal::ONE {
            partitions
                .debits
                .push(tag_reconcilable(row, &gateway, TransactionType::Debit, row.debit, run_id, source_file));
        }
        // Rows matching none of the above (zero-amount informational lines) are
        // discarded per spec.md §4.4.
    }

    partitions
}

/// Partitions a normalized internal table into payouts, refunds and top-ups. `config`
/// supplies the configured top-up marker; refunds are detected by a literal "refund"
/// substring in the narrative, matching the original gateway convention.
#[must_use]
pub fn classify_internal(
    table: &NormalizedTable,
    base_gateway: &str,
    config: &GatewayFileConfig,
    run_id: &RunId,
    source_file: &str,
) -> InternalPartitions {
    let mut partitions = InternalPartitions::default();
    let gateway = format!("{base_gateway}{}", GatewaySide::Internal.suffix());

    for row in &table.rows {
        let remark = row.details.to_ascii_lowercase();
        let is_topup = config
            .top_up_marker
            .as_deref()
            .is_some_and(|marker| remark.contains(&marker.to_ascii_lowercase()));
        let is_refund = remark.contains("refund");

        if is_topup {
            partitions.topups.push(tag_non_reconcilable(
                row,
                &gateway,
                TransactionType::Refund,
                row.debit,
                run_id,
                source_file,
            ));
        } else if is_refund {
            partitions.refunds.push(tag_non_reconcilable(
                row,
                &gateway,
                TransactionType::Refund,
                row.debit,
                run_id,
                source_file,
            ));
        } else {
            partitions.payouts.push(tag_reconcilable(
                row,
                &gateway,
                TransactionType::Payout,
                row.debit,
                run_id,
                source_file,
            ));
        }
    }

    partitions
}

fn row_matches_any_keyword(row: &NormalizedRow, keywords: &HashSet<String>) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let narrative = row.details.to_ascii_lowercase();
    let reference = row.reference.to_ascii_lowercase();
    keywords
        .iter()
        .any(|keyword| narrative.contains(keyword) || reference.contains(keyword))
}

fn tag_auto_reconciled(
    row: &NormalizedRow,
    gateway: &str,
    transaction_type: TransactionType,
    amount: Decimal,
    run_id: &RunId,
    source_file: &str,
    note: &str,
) -> Transaction {
    let mut transaction = base_transaction(row, gateway, transaction_type, amount, run_id, source_file);
    transaction.reconciliation_status = ReconciliationStatus::Reconciled;
    transaction.reconciliation_note = Some(note.to_string());
    debug_assert_eq!(transaction.reconciliation_category, ReconciliationCategory::AutoReconciled);
    transaction
}

fn tag_reconcilable(
    row: &NormalizedRow,
    gateway: &str,
    transaction_type: TransactionType,
    amount: Decimal,
    run_id: &RunId,
    source_file: &str,
) -> Transaction {
    base_transaction(row, gateway, transaction_type, amount, run_id, source_file)
}

fn tag_non_reconcilable(
    row: &NormalizedRow,
    gateway: &str,
    transaction_type: TransactionType,
    amount: Decimal,
    run_id: &RunId,
    source_file: &str,
) -> Transaction {
    base_transaction(row, gateway, transaction_type, amount, run_id, source_file)
}

fn base_transaction(
    row: &NormalizedRow,
    gateway: &str,
    transaction_type: TransactionType,
    amount: Decimal,
    run_id: &RunId,
    source_file: &str,
) -> Transaction {
    let gateway_type = if gateway.ends_with(GatewaySide::External.suffix()) {
        GatewaySide::External
    } else {
        GatewaySide::Internal
    };
    let (debit, credit) = match transaction_type {
        TransactionType::Deposit => (None, Some(amount)),
        _ => (Some(amount), None),
    };

    Transaction {
        id: None,
        gateway: gateway.to_string(),
        gateway_type,
        transaction_type,
        reconciliation_category: transaction_type.reconciliation_category(),
        date: row.date,
        transaction_id: row.reference.clone(),
        narrative: row.details.clone(),
        debit,
        credit,
        reconciliation_status: ReconciliationStatus::Unreconciled,
        reconciliation_note: None,
        reconciliation_key: None,
        run_id: run_id.clone(),
        source_file: source_file.to_string(),
        manual_overlay: ManualReconOverlay::default(),
        created_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use recon_store::ReconciliationStatus;
    use rust_decimal::Decimal;

    use super::*;

    fn row(reference: &str, details: &str, debit: Decimal, credit: Decimal) -> NormalizedRow {
        NormalizedRow {
            date: None,
            reference: reference.to_string(),
            details: details.to_string(),
            debit,
            credit,
        }
    }

    #[test]
    fn charge_keyword_match_wins_over_plain_debit() {
        let table = NormalizedTable {
            rows: vec![row("R1", "JENGA CHARGE", Decimal::new(5000, 2), Decimal::ZERO)],
        };
        let mut keywords = HashSet::new();
        keywords.insert("jenga charge".to_string());

        let partitions = classify_external(&table, "equity", &keywords, &"RUN-1".to_string(), "equity.csv");

        assert_eq!(partitions.charges.len(), 1);
        assert_eq!(partitions.debits.len(), 0);
        assert_eq!(partitions.charges[0].reconciliation_status, ReconciliationStatus::Reconciled);
    }

    #[test]
    fn deposits_use_credit_ge_one_threshold() {
        let table = NormalizedTable {
            rows: vec![
                row("R1", "Incoming", Decimal::ZERO, Decimal::new(150, 0)),
                row("R2", "Incoming", Decimal::ZERO, Decimal::new(50, 2)),
            ],
        };
        let partitions = classify_external(&table, "equity", &HashSet::new(), &"RUN-1".to_string(), "equity.csv");
        assert_eq!(partitions.deposits.len(), 1);
    }

    #[test]
    fn internal_topup_marker_is_non_reconcilable() {
        let table = NormalizedTable {
            rows: vec![row("R1", "TOP UP", Decimal::new(100, 0), Decimal::ZERO)],
        };
        let config = recon_config_fixture();
        let partitions = classify_internal(&table, "equity", &config, &"RUN-1".to_string(), "workpay_equity.csv");
        assert_eq!(partitions.topups.len(), 1);
        assert_eq!(partitions.payouts.len(), 0);
    }

    #[test]
    fn sub_unit_payout_is_kept_not_dropped() {
        let table = NormalizedTable {
            rows: vec![row("R1", "Payout to X", Decimal::new(50, 2), Decimal::ZERO)],
        };
        let config = recon_config_fixture();
        let partitions = classify_internal(&table, "equity", &config, &"RUN-1".to_string(), "workpay_equity.csv");
        assert_eq!(partitions.payouts.len(), 1, "a payout row below the old >= 1 threshold must still be kept");
    }

    fn recon_config_fixture() -> GatewayFileConfig {
        GatewayFileConfig {
            name: "equity".to_string(),
            config_type: recon_config::GatewayConfigType::Internal,
            filename_prefix: "workpay_equity".to_string(),
            expected_filetypes: vec![],
            header_row_config: Default::default(),
            end_of_data_signal: None,
            date_format: "%d-%m-%Y".to_string(),
            charge_keywords: vec![],
            required_columns: vec![],
            date_column: "Date".to_string(),
            reference_column: "Reference".to_string(),
            narrative_column: "Details".to_string(),
            debit_column: "Debit".to_string(),
            credit_column: "Credit".to_string(),
            numeric_columns: vec![],
            string_columns: vec![],
            reference_fallback_column: None,
            leading_spacer_columns: 0,
            top_up_marker: Some("TOP UP".to_string()),
        }
    }
}
