use std::collections::HashSet;

use chrono::Utc;
use recon_ingest::ExternalPartitions;
use recon_ingest::InternalPartitions;
use recon_store::ChargeReclassification;
use recon_store::GatewaySide;
use recon_store::PersistPartitions;
use recon_store::RunId;
use recon_store::Transaction;
use recon_store::TransactionType;
use uuid::Uuid;

use crate::error::ReconcileResult;
use crate::key;

/// Mints a `RUN-YYYYMMDD-HHMMSS-{8hex}` run id (spec.md §3.1 `ReconciliationRun.run_id`).
#[must_use]
pub fn mint_run_id() -> RunId {
    let now = Utc::now();
    let short = Uuid::new_v4().simple().to_string();
    format!("RUN-{}-{}", now.format("%Y%m%d-%H%M%S"), &short[..8])
}

/// An event emitted at the notable points of a reconciliation pass. Mirrors the
/// teacher's audit-hook pattern: zero or more hooks may be registered, each invoked
/// synchronously, with failures never propagated back into the pipeline.
#[derive(Debug, Clone)]
pub enum ReconciliationEvent {
    CarryForwardLoaded { gateway: String, pool_size: usize },
    ReclassifiedCharges { gateway: String, count: usize },
    Matched { gateway: String, matched: usize, carry_forward_matched: usize },
}

pub trait ReconciliationAuditHook: Send + Sync {
    fn record(&self, event: &ReconciliationEvent);
}

/// Default hook: routes every event through `tracing`, matching
/// `AccountingTelemetry`'s call-site convention for non-fatal pipeline bookkeeping.
#[derive(Default)]
pub struct TracingAuditHook;

impl ReconciliationAuditHook for TracingAuditHook {
    fn record(&self, event: &ReconciliationEvent) {
        match event {
            ReconciliationEvent::CarryForwardLoaded { gateway, pool_size } => {
                tracing::debug!(gateway, pool_size, "loaded carry-forward pool");
            }
            ReconciliationEvent::ReclassifiedCharges { gateway, count } => {
                tracing::info!(gateway, count, "carry-forward charge reclassification");
            }
            ReconciliationEvent::Matched {
                gateway,
                matched,
                carry_forward_matched,
            } => {
                tracing::info!(gateway, matched, carry_forward_matched, "reconciliation match complete");
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct NoopAuditHook;

impl ReconciliationAuditHook for NoopAuditHook {
    fn record(&self, _event: &ReconciliationEvent) {}
}

/// Run totals returned to the caller (spec.md §6.2 `summary`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_external: usize,
    pub total_internal: usize,
    pub matched: usize,
    pub unmatched_external: usize,
    pub unmatched_internal: usize,
    pub deposits: usize,
    pub charges: usize,
    pub carry_forward_matched: usize,
    pub carry_forward_reclassified_charges: usize,
}

/// The full output of one reconciliation pass: partitions ready to persist (keys
/// assigned, statuses set), carry-forward keys the persister must flip, the
/// reclassifications computed over the carry-forward pool, and a run summary.
/// Building a `ReconciliationPlan` never touches the store; `preview()` and `run()`
/// both call [`plan`] and differ only in whether the caller commits the result
/// (spec.md §4.5.3).
#[derive(Debug, Clone)]
pub struct ReconciliationPlan {
    pub partitions: PersistPartitions,
    pub carry_forward_matched_keys: Vec<String>,
    pub reclassifications: Vec<ChargeReclassification>,
    pub summary: RunSummary,
}

struct CarryForwardSplit {
    external_keys: HashSet<String>,
    internal_keys: HashSet<String>,
    reclassifications: Vec<ChargeReclassification>,
}

/// Builds a [`ReconciliationPlan`] from already-classified partitions and the loaded
/// carry-forward pool. `base_gateway` is the unsuffixed family name (spec.md §3.1).
pub fn plan(
    base_gateway: &str,
    run_id: &RunId,
    mut external: ExternalPartitions,
    mut internal: InternalPartitions,
    carry_forward_pool: Vec<Transaction>,
    charge_keywords: &HashSet<String>,
    hook: &dyn ReconciliationAuditHook,
) -> ReconcileResult<ReconciliationPlan> {
    hook.record(&ReconciliationEvent::CarryForwardLoaded {
        gateway: base_gateway.to_string(),
        pool_size: carry_forward_pool.len(),
    });

    key::assign_date_suffixed_keys(&mut external.deposits, base_gateway);
    key::assign_date_suffixed_keys(&mut external.charges, base_gateway);
    key::assign_plain_keys(&mut external.debits, base_gateway);
    key::assign_plain_keys(&mut internal.payouts, base_gateway);

    crate::validate_no_duplicate_keys(&external.debits, "external debits")?;
    crate::validate_no_duplicate_keys(&internal.payouts, "internal payouts")?;

    let split = split_carry_forward_pool(carry_forward_pool, charge_keywords, run_id);
    hook.record(&ReconciliationEvent::ReclassifiedCharges {
        gateway: base_gateway.to_string(),
        count: split.reclassifications.len(),
    });

    let new_external: HashSet<String> = keyed_non_na(&external.debits);
    let new_internal: HashSet<String> = keyed_non_na(&internal.payouts);
    let all_external: HashSet<String> = new_external.union(&split.external_keys).cloned().collect();
    let all_internal: HashSet<String> = new_internal.union(&split.internal_keys).cloned().collect();
    let matched: HashSet<String> = all_external.intersection(&all_internal).cloned().collect();

    mark_matched(&mut external.debits, &matched);
    mark_matched(&mut internal.payouts, &matched);

    let carry_forward_keys: HashSet<String> = split.external_keys.union(&split.internal_keys).cloned().collect();
    let carry_forward_matched_keys: Vec<String> = matched.intersection(&carry_forward_keys).cloned().collect();

    hook.record(&ReconciliationEvent::Matched {
        gateway: base_gateway.to_string(),
        matched: matched.len(),
        carry_forward_matched: carry_forward_matched_keys.len(),
    });

    let summary = RunSummary {
        total_external: external.deposits.len() + external.charges.len() + external.debits.len(),
        total_internal: internal.payouts.len() + internal.refunds.len() + internal.topups.len(),
        matched: matched.len(),
        unmatched_external: external.debits.iter().filter(|row| !matched_key(row, &matched)).count(),
        unmatched_internal: internal.payouts.iter().filter(|row| !matched_key(row, &matched)).count(),
        deposits: external.deposits.len(),
        charges: external.charges.len(),
        carry_forward_matched: carry_forward_matched_keys.len(),
        carry_forward_reclassified_charges: split.reclassifications.len(),
    };

    let mut internal_other = internal.refunds;
    internal_other.extend(internal.topups);

    Ok(ReconciliationPlan {
        partitions: PersistPartitions {
            external_deposits: external.deposits,
            external_debits: external.debits,
            external_charges: external.charges,
            internal_payouts: internal.payouts,
            internal_other,
        },
        carry_forward_matched_keys,
        reclassifications: split.reclassifications,
        summary,
    })
}

fn keyed_non_na(rows: &[Transaction]) -> HashSet<String> {
    rows.iter()
        .filter(|row| !is_na_reference(&row.transaction_id))
        .filter_map(|row| row.reconciliation_key.clone())
        .collect()
}

fn matched_key(row: &Transaction, matched: &HashSet<String>) -> bool {
    row.reconciliation_key.as_deref().is_some_and(|key| matched.contains(key))
}

fn mark_matched(rows: &mut [Transaction], matched: &HashSet<String>) {
    for row in rows.iter_mut() {
        if is_na_reference(&row.transaction_id) {
            continue;
        }
        if matched_key(row, matched) {
            row.reconciliation_status = recon_store::ReconciliationStatus::Reconciled;
            row.reconciliation_note = Some("System Reconciled".to_string());
        }
    }
}

fn is_na_reference(reference: &str) -> bool {
    reference.eq_ignore_ascii_case("NA") || reference.trim().is_empty()
}

/// Splits the carry-forward pool (spec.md §4.5.2 step 2) into eligible external/
/// internal key sets and the set of charge reclassifications to apply. `run_id` is
/// only used in the reclassification note text — the FK itself is deliberately left
/// untouched (the new run row does not exist yet).
fn split_carry_forward_pool(
    pool: Vec<Transaction>,
    charge_keywords: &HashSet<String>,
    run_id: &RunId,
) -> CarryForwardSplit {
    let mut external_keys = HashSet::new();
    let mut internal_keys = HashSet::new();
    let mut reclassifications = Vec::new();

    for row in pool {
        let Some(key) = row.reconciliation_key.clone() else {
            continue;
        };
        match row.gateway_type {
            GatewaySide::External => {
                let matches_keyword = row_matches_any_keyword(&row.narrative, &row.transaction_id, charge_keywords);
                if matches_keyword {
                    if let Some(id) = row.id {
                        let note = format!("System Reconciled - Charge (carry-forward reclassified, run: {run_id})");
                        reclassifications.push(ChargeReclassification { transaction_id: id, note });
                    }
                } else {
                    external_keys.insert(key);
                }
            }
            GatewaySide::Internal => {
                internal_keys.insert(key);
            }
        }
    }

    CarryForwardSplit {
        external_keys,
        internal_keys,
        reclassifications,
    }
}

fn row_matches_any_keyword(narrative: &str, reference: &str, keywords: &HashSet<String>) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let narrative = narrative.to_ascii_lowercase();
    let reference = reference.to_ascii_lowercase();
    keywords.iter().any(|keyword| narrative.contains(keyword) || reference.contains(keyword))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use recon_store::GatewaySide;
    use recon_store::ManualReconOverlay;
    use recon_store::ReconciliationStatus;
    use rust_decimal::Decimal;

    use super::*;

    fn debit_row(reference: &str, amount: Decimal, gateway_type: GatewaySide, transaction_type: TransactionType) -> Transaction {
        Transaction {
            id: None,
            gateway: format!("equity{}", gateway_type.suffix()),
            gateway_type,
            transaction_type,
            reconciliation_category: transaction_type.reconciliation_category(),
            date: NaiveDate::from_ymd_opt(2025, 1, 2).map(|d| d.and_hms_opt(0, 0, 0).unwrap()),
            transaction_id: reference.to_string(),
            narrative: "Payout to X".to_string(),
            debit: Some(amount),
            credit: None,
            reconciliation_status: ReconciliationStatus::Unreconciled,
            reconciliation_note: None,
            reconciliation_key: None,
            run_id: "RUN-SEED".to_string(),
            source_file: "equity.csv".to_string(),
            manual_overlay: ManualReconOverlay::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn clean_match_reconciles_both_sides() {
        let external = ExternalPartitions {
            deposits: vec![],
            charges: vec![],
            debits: vec![debit_row("TXN001", Decimal::new(150000, 2), GatewaySide::External, TransactionType::Debit)],
        };
        let internal = InternalPartitions {
            payouts: vec![debit_row("TXN001", Decimal::new(150000, 2), GatewaySide::Internal, TransactionType::Payout)],
            refunds: vec![],
            topups: vec![],
        };

        let result = plan(
            "equity",
            &"RUN-2".to_string(),
            external,
            internal,
            vec![],
            &HashSet::new(),
            &NoopAuditHook,
        )
        .expect("plan succeeds");

        assert_eq!(result.summary.matched, 1);
        assert_eq!(result.summary.unmatched_external, 0);
        assert_eq!(result.summary.unmatched_internal, 0);
        assert_eq!(
            result.partitions.external_debits[0].reconciliation_status,
            ReconciliationStatus::Reconciled
        );
    }

    #[test]
    fn duplicate_reconcilable_keys_fail_before_any_match() {
        let external = ExternalPartitions {
            deposits: vec![],
            charges: vec![],
            debits: vec![
                debit_row("R1", Decimal::new(200, 0), GatewaySide::External, TransactionType::Debit),
                debit_row("R1", Decimal::new(200, 0), GatewaySide::External, TransactionType::Debit),
            ],
        };
        let internal = InternalPartitions::default();

        let result = plan("equity", &"RUN-1".to_string(), external, internal, vec![], &HashSet::new(), &NoopAuditHook);
        assert!(result.is_err());
    }

    #[test]
    fn carry_forward_match_reconciles_prior_unmatched_row() {
        let mut prior = debit_row("TXN9", Decimal::new(700, 0), GatewaySide::External, TransactionType::Debit);
        prior.id = Some(42);
        prior.reconciliation_key = Some(key::base_key("TXN9", Decimal::new(700, 0), "equity"));

        let external = ExternalPartitions::default();
        let internal = InternalPartitions {
            payouts: vec![debit_row("TXN9", Decimal::new(700, 0), GatewaySide::Internal, TransactionType::Payout)],
            refunds: vec![],
            topups: vec![],
        };

        let result = plan(
            "equity",
            &"RUN-2".to_string(),
            external,
            internal,
            vec![prior],
            &HashSet::new(),
            &NoopAuditHook,
        )
        .expect("plan succeeds");

        assert_eq!(result.summary.carry_forward_matched, 1);
        assert_eq!(result.carry_forward_matched_keys.len(), 1);
    }

    #[test]
    fn already_charged_carry_forward_row_reuses_the_reclassified_note() {
        let mut keywords = HashSet::new();
        keywords.insert("jenga charge".to_string());

        let mut already_charge = debit_row("R1", Decimal::new(500, 2), GatewaySide::External, TransactionType::Charge);
        already_charge.id = Some(7);
        already_charge.narrative = "Jenga Charge".to_string();
        already_charge.reconciliation_key = Some(key::base_key("R1", Decimal::new(500, 2), "equity"));

        let mut newly_matched = debit_row("R2", Decimal::new(500, 2), GatewaySide::External, TransactionType::Debit);
        newly_matched.id = Some(8);
        newly_matched.narrative = "Jenga Charge".to_string();
        newly_matched.reconciliation_key = Some(key::base_key("R2", Decimal::new(500, 2), "equity"));

        let split = split_carry_forward_pool(vec![already_charge, newly_matched], &keywords, &"RUN-2".to_string());
        assert_eq!(split.reclassifications.len(), 2);
        let notes: HashSet<_> = split.reclassifications.iter().map(|r| r.note.clone()).collect();
        assert_eq!(notes.len(), 1, "both branches must produce the same reclassified note text");
        assert!(notes.iter().next().expect("one note").contains("carry-forward reclassified, run: RUN-2"));
    }
}
