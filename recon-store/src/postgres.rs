use async_trait::async_trait;

use crate::ChargeReclassification;
use crate::PersistOutcome;
use crate::PersistPartitions;
use crate::ReconciliationRun;
use crate::StoreError;
use crate::StoreResult;
use crate::Transaction;
use crate::TransactionFilter;
use crate::TransactionStore;

/// Placeholder for a real Postgres-backed store. The persistence contract in
/// `persist_run` requires one DB transaction wrapping a run-record insert, per-row
/// savepoints for duplicate skipping, and the carry-forward `UPDATE` (spec.md §4.6) —
/// wiring that up is future work, tracked outside this crate.
#[derive(Clone)]
pub struct PostgresTransactionStore {
    connection_string: String,
}

impl PostgresTransactionStore {
    #[must_use]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn persist_run(
        &self,
        run: ReconciliationRun,
        partitions: PersistPartitions,
        carry_forward_matched_keys: Vec<String>,
        carry_forward_external_gateway: String,
        carry_forward_internal_gateway: String,
    ) -> StoreResult<PersistOutcome> {
        let _ = (
            &self.connection_string,
            run,
            partitions,
            carry_forward_matched_keys,
            carry_forward_external_gateway,
            carry_forward_internal_gateway,
        );
        Err(StoreError::Operation(
            "postgres transaction store not yet implemented".into(),
        ))
    }

    async fn load_carry_forward_pool(
        &self,
        base_external_gateway: &str,
        base_internal_gateway: &str,
    ) -> StoreResult<Vec<Transaction>> {
        let _ = (&self.connection_string, base_external_gateway, base_internal_gateway);
        Err(StoreError::Operation(
            "postgres transaction store not yet implemented".into(),
        ))
    }

    async fn apply_reclassifications(
        &self,
        reclassifications: Vec<ChargeReclassification>,
    ) -> StoreResult<usize> {
        let _ = (&self.connection_string, reclassifications);
        Err(StoreError::Operation(
            "postgres transaction store not yet implemented".into(),
        ))
    }

    async fn query_transactions(&self, filter: TransactionFilter) -> StoreResult<Vec<Transaction>> {
        let _ = (&self.connection_string, filter);
        Err(StoreError::Operation(
            "postgres transaction store not yet implemented".into(),
        ))
    }
}
