#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Data model and persistence contract for the reconciliation core.
//!
//! A `Transaction` is the single unified row produced by ingestion, classification and
//! matching; a `ReconciliationRun` is the lightweight record of one pipeline execution.
//! `TransactionStore` is the persister's contract: per-row savepoint-emulated inserts,
//! carry-forward pool queries, and the atomic run-record-before-rows ordering.

use async_trait::async_trait;
use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::Utc;
use rust_decimal::Decimal;

mod memory;

pub use memory::InMemoryTransactionStore;

#[cfg(feature = "postgres-store")]
mod postgres;
#[cfg(feature = "postgres-store")]
pub use postgres::PostgresTransactionStore;

pub type RunId = String;
pub type TransactionId = u64;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("unique violation on (reconciliation_key, gateway): {key} / {gateway}")]
    UniqueViolation { key: String, gateway: String },
    #[error("operation error: {0}")]
    Operation(String),
}

/// One of {deposit, debit, charge, payout, refund} per spec.md §3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Deposit,
    Debit,
    Charge,
    Payout,
    Refund,
}

impl TransactionType {
    #[must_use]
    pub fn reconciliation_category(self) -> ReconciliationCategory {
        match self {
            TransactionType::Debit | TransactionType::Payout => {
                ReconciliationCategory::Reconcilable
            }
            TransactionType::Deposit | TransactionType::Charge => {
                ReconciliationCategory::AutoReconciled
            }
            TransactionType::Refund => ReconciliationCategory::NonReconcilable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconciliationCategory {
    Reconcilable,
    AutoReconciled,
    NonReconcilable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewaySide {
    External,
    Internal,
}

impl GatewaySide {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            GatewaySide::External => "_external",
            GatewaySide::Internal => "_internal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationStatus {
    Reconciled,
    Unreconciled,
}

/// The manual-reconciliation overlay, written only by the external collaborator named
/// in spec.md §1; the core reads it only to exclude rows from carry-forward eligibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualReconOverlay {
    pub is_manually_reconciled: bool,
    pub manual_recon_note: Option<String>,
    pub authorization_status: Option<String>,
}

impl ManualReconOverlay {
    #[must_use]
    pub fn is_carry_forward_eligible(&self) -> bool {
        !self.is_manually_reconciled
            && self.authorization_status.as_deref() != Some("pending")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Option<TransactionId>,
    pub gateway: String,
    pub gateway_type: GatewaySide,
    pub transaction_type: TransactionType,
    pub reconciliation_category: ReconciliationCategory,
    pub date: Option<NaiveDateTime>,
    pub transaction_id: String,
    pub narrative: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub reconciliation_status: ReconciliationStatus,
    pub reconciliation_note: Option<String>,
    pub reconciliation_key: Option<String>,
    pub run_id: RunId,
    pub source_file: String,
    pub manual_overlay: ManualReconOverlay,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    #[must_use]
    pub fn is_carry_forward_eligible(&self) -> bool {
        self.reconciliation_key.is_some()
            && self.reconciliation_status == ReconciliationStatus::Unreconciled
            && self.manual_overlay.is_carry_forward_eligible()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationRun {
    pub run_id: RunId,
    pub gateway: String,
    pub status: RunStatus,
    pub total_external: usize,
    pub total_internal: usize,
    pub matched: usize,
    pub unmatched_external: usize,
    pub unmatched_internal: usize,
    pub carry_forward_matched: usize,
    pub created_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A reclassification applied to a carry-forward candidate whose narrative now matches
/// a charge keyword (spec.md §4.5.2 step 2). `run_id` is deliberately *not* touched —
/// the new run row does not exist yet when this is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReclassification {
    pub transaction_id: TransactionId,
    pub note: String,
}

/// The five new-data partitions a run persists, in the order spec.md §4.6 lists them.
#[derive(Debug, Clone, Default)]
pub struct PersistPartitions {
    pub external_deposits: Vec<Transaction>,
    pub external_debits: Vec<Transaction>,
    pub external_charges: Vec<Transaction>,
    pub internal_payouts: Vec<Transaction>,
    pub internal_other: Vec<Transaction>,
}

impl PersistPartitions {
    fn into_ordered_vecs(self) -> [Vec<Transaction>; 5] {
        [
            self.external_deposits,
            self.external_debits,
            self.external_charges,
            self.internal_payouts,
            self.internal_other,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub external_records: usize,
    pub internal_records: usize,
    pub deposits: usize,
    pub debits: usize,
    pub charges: usize,
    pub payouts: usize,
    pub total: usize,
    pub duplicates_skipped: usize,
    pub carry_forward_updated: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub gateway_like: Option<String>,
    pub date_from: Option<NaiveDateTime>,
    pub date_to: Option<NaiveDateTime>,
    pub run_id: Option<RunId>,
}

/// The persister's contract (spec.md §4.6). All mutation on one store happens under the
/// appearance of a single transaction per run: implementations must ensure
/// `persist_run` is atomic (all-or-nothing except for the documented per-row
/// duplicate-skip local recovery) and that the run record becomes visible before any
/// row referencing it (invariant I5).
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn persist_run(
        &self,
        run: ReconciliationRun,
        partitions: PersistPartitions,
        carry_forward_matched_keys: Vec<String>,
        carry_forward_external_gateway: String,
        carry_forward_internal_gateway: String,
    ) -> StoreResult<PersistOutcome>;

    /// Loads the carry-forward pool for a base gateway: transactions on either side
    /// that are unreconciled, keyed, and not excluded by the manual-recon overlay.
    async fn load_carry_forward_pool(
        &self,
        base_external_gateway: &str,
        base_internal_gateway: &str,
    ) -> StoreResult<Vec<Transaction>>;

    /// Applies charge reclassifications computed over the carry-forward pool. Called
    /// only from `run()`; `preview()` must never call this (spec.md §4.5.3).
    async fn apply_reclassifications(
        &self,
        reclassifications: Vec<ChargeReclassification>,
    ) -> StoreResult<usize>;

    async fn query_transactions(&self, filter: TransactionFilter) -> StoreResult<Vec<Transaction>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconciliation_category_follows_transaction_type() {
        assert_eq!(
            TransactionType::Debit.reconciliation_category(),
            ReconciliationCategory::Reconcilable
        );
        assert_eq!(
            TransactionType::Payout.reconciliation_category(),
            ReconciliationCategory::Reconcilable
        );
        assert_eq!(
            TransactionType::Deposit.reconciliation_category(),
            ReconciliationCategory::AutoReconciled
        );
        assert_eq!(
            TransactionType::Charge.reconciliation_category(),
            ReconciliationCategory::AutoReconciled
        );
        assert_eq!(
            TransactionType::Refund.reconciliation_category(),
            ReconciliationCategory::NonReconcilable
        );
    }

    #[test]
    fn manual_overlay_excludes_pending_authorization() {
        let overlay = ManualReconOverlay {
            is_manually_reconciled: false,
            manual_recon_note: None,
            authorization_status: Some("pending".to_string()),
        };
        assert!(!overlay.is_carry_forward_eligible());
    }

    #[test]
    fn manual_overlay_excludes_manually_reconciled_rows() {
        let overlay = ManualReconOverlay {
            is_manually_reconciled: true,
            manual_recon_note: Some("handled by ops".to_string()),
            authorization_status: None,
        };
        assert!(!overlay.is_carry_forward_eligible());
    }

    #[test]
    fn gateway_side_suffix_matches_invariant_i4() {
        assert_eq!(GatewaySide::External.suffix(), "_external");
        assert_eq!(GatewaySide::Internal.suffix(), "_internal");
    }
}
