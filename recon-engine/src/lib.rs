#![deny(clippy::print_stdout, clippy::print_stderr)]

//! The composite-key reconciler (spec.md §4.5): key generation, carry-forward
//! closure, duplicate-key validation and deterministic matching. Pure with respect to
//! storage — [`plan`] takes already-classified partitions and an already-loaded
//! carry-forward pool and returns a [`ReconciliationPlan`] the caller chooses whether
//! to persist, which is how `preview()` and `run()` share one code path without
//! `preview()` ever writing (spec.md §4.5.3).

mod error;
mod key;
mod plan;

pub use error::ReconcileError;
pub use error::ReconcileResult;
pub use key::amount_for_key;
pub use key::base_key;
pub use key::normalize_reference;
pub use key::whole;
pub use plan::mint_run_id;
pub use plan::plan;
pub use plan::NoopAuditHook;
pub use plan::ReconciliationAuditHook;
pub use plan::ReconciliationEvent;
pub use plan::ReconciliationPlan;
pub use plan::RunSummary;
pub use plan::TracingAuditHook;

use recon_store::Transaction;

/// Duplicate-key validation for reconcilable partitions (spec.md §4.5.2 step 4):
/// groups by key, excluding `"NA"`/empty references, and fails listing up to ten
/// offending keys if any key occurs more than once.
pub fn validate_no_duplicate_keys(rows: &[Transaction], label: &str) -> ReconcileResult<()> {
    use std::collections::HashMap;

    let mut groups: HashMap<&str, Vec<&Transaction>> = HashMap::new();
    for row in rows {
        if row.transaction_id.eq_ignore_ascii_case("NA") || row.transaction_id.trim().is_empty() {
            continue;
        }
        if let Some(key) = row.reconciliation_key.as_deref() {
            groups.entry(key).or_default().push(row);
        }
    }

    let mut duplicates: Vec<String> = Vec::new();
    for members in groups.values() {
        if members.len() < 2 {
            continue;
        }
        duplicates.push(format!(
            "reference={}, amount={}, count={}, source={}",
            members[0].transaction_id,
            key::amount_for_key(members[0]),
            members.len(),
            members[0].source_file
        ));
        if duplicates.len() >= 10 {
            break;
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::DuplicateKeys {
            label: label.to_string(),
            duplicates,
        })
    }
}

#[cfg(test)]
mod tests {
    use recon_store::GatewaySide;
    use recon_store::ManualReconOverlay;
    use recon_store::ReconciliationStatus;
    use recon_store::TransactionType;
    use rust_decimal::Decimal;

    use super::*;

    fn row(reference: &str, key: &str) -> Transaction {
        Transaction {
            id: None,
            gateway: "equity_external".to_string(),
            gateway_type: GatewaySide::External,
            transaction_type: TransactionType::Debit,
            reconciliation_category: TransactionType::Debit.reconciliation_category(),
            date: None,
            transaction_id: reference.to_string(),
            narrative: "x".to_string(),
            debit: Some(Decimal::new(200, 0)),
            credit: None,
            reconciliation_status: ReconciliationStatus::Unreconciled,
            reconciliation_note: None,
            reconciliation_key: Some(key.to_string()),
            run_id: "RUN-1".to_string(),
            source_file: "equity.csv".to_string(),
            manual_overlay: ManualReconOverlay::default(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn duplicate_keys_are_reported_with_up_to_ten_entries() {
        let rows = vec![row("R1", "R1|200|equity"), row("R1", "R1|200|equity")];
        let result = validate_no_duplicate_keys(&rows, "external debits");
        assert!(matches!(result, Err(ReconcileError::DuplicateKeys { .. })));
    }

    #[test]
    fn na_references_are_excluded_from_duplicate_validation() {
        let rows = vec![row("NA", "NA|200|equity"), row("NA", "NA|200|equity")];
        let result = validate_no_duplicate_keys(&rows, "external debits");
        assert!(result.is_ok());
    }
}
