use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;

use crate::ChargeReclassification;
use crate::GatewaySide;
use crate::PersistOutcome;
use crate::PersistPartitions;
use crate::ReconciliationRun;
use crate::ReconciliationStatus;
use crate::RunId;
use crate::StoreError;
use crate::StoreResult;
use crate::Transaction;
use crate::TransactionFilter;
use crate::TransactionId;
use crate::TransactionStore;
use crate::TransactionType;

#[derive(Default)]
struct State {
    transactions: HashMap<TransactionId, Transaction>,
    key_index: HashMap<(String, String), TransactionId>,
    runs: HashMap<RunId, ReconciliationRun>,
    next_id: TransactionId,
}

impl State {
    fn next_transaction_id(&mut self) -> TransactionId {
        self.next_id += 1;
        self.next_id
    }

    /// Inserts one row, emulating the per-row nested-savepoint duplicate skip of
    /// spec.md §4.6 step 2: a `(reconciliation_key, gateway)` collision is a local,
    /// non-fatal outcome rather than a whole-batch failure. A `None` key (refunds,
    /// top-ups — keyed rows only per `recon-engine`'s `plan()`) is exempt from the
    /// uniqueness check per I2 and always inserts.
    fn insert_one(&mut self, mut tx: Transaction) -> bool {
        let Some(key) = tx.reconciliation_key.clone() else {
            let id = self.next_transaction_id();
            tx.id = Some(id);
            self.transactions.insert(id, tx);
            return true;
        };
        let index_key = (key, tx.gateway.clone());
        if self.key_index.contains_key(&index_key) {
            return false;
        }
        let id = self.next_transaction_id();
        tx.id = Some(id);
        self.key_index.insert(index_key, id);
        self.transactions.insert(id, tx);
        true
    }
}

pub struct InMemoryTransactionStore {
    state: Mutex<State>,
}

impl Default for InMemoryTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransactionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn persist_run(
        &self,
        run: ReconciliationRun,
        partitions: PersistPartitions,
        carry_forward_matched_keys: Vec<String>,
        carry_forward_external_gateway: String,
        carry_forward_internal_gateway: String,
    ) -> StoreResult<PersistOutcome> {
        let mut state = self.state.lock().await;

        if state.runs.contains_key(&run.run_id) {
            return Err(StoreError::Operation(format!(
                "run {} already exists",
                run.run_id
            )));
        }

        // Invariant I5: the run row becomes visible before any row references it.
        let run_id = run.run_id.clone();
        state.runs.insert(run_id.clone(), run);

        let mut outcome = PersistOutcome::default();
        for rows in partitions.into_ordered_vecs() {
            for tx in rows {
                let is_external = tx.gateway_type == GatewaySide::External;
                let transaction_type = tx.transaction_type;
                if state.insert_one(tx) {
                    outcome.total += 1;
                    if is_external {
                        outcome.external_records += 1;
                    } else {
                        outcome.internal_records += 1;
                    }
                    match transaction_type {
                        TransactionType::Deposit => outcome.deposits += 1,
                        TransactionType::Debit => outcome.debits += 1,
                        TransactionType::Charge => outcome.charges += 1,
                        TransactionType::Payout => outcome.payouts += 1,
                        TransactionType::Refund => {}
                    }
                } else {
                    outcome.duplicates_skipped += 1;
                }
            }
        }

        // Carry-forward status updates happen after all new-data inserts, so the
        // inserted rows are visible to the match set (spec.md §5 ordering guarantee).
        let matched: HashSet<&str> = carry_forward_matched_keys.iter().map(String::as_str).collect();
        for tx in state.transactions.values_mut() {
            if tx.reconciliation_status != ReconciliationStatus::Unreconciled {
                continue;
            }
            let Some(key) = tx.reconciliation_key.as_deref() else {
                continue;
            };
            if !matched.contains(key) {
                continue;
            }
            if tx.gateway != carry_forward_external_gateway && tx.gateway != carry_forward_internal_gateway {
                continue;
            }
            tx.reconciliation_status = ReconciliationStatus::Reconciled;
            tx.reconciliation_note = Some(format!("System Reconciled (carry-forward, run: {run_id})"));
            tx.run_id = run_id.clone();
            outcome.carry_forward_updated += 1;
        }

        Ok(outcome)
    }

    async fn load_carry_forward_pool(
        &self,
        base_external_gateway: &str,
        base_internal_gateway: &str,
    ) -> StoreResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .values()
            .filter(|tx| tx.gateway == base_external_gateway || tx.gateway == base_internal_gateway)
            .filter(|tx| tx.is_carry_forward_eligible())
            .cloned()
            .collect())
    }

    async fn apply_reclassifications(
        &self,
        reclassifications: Vec<ChargeReclassification>,
    ) -> StoreResult<usize> {
        let mut state = self.state.lock().await;
        let mut applied = 0usize;
        for reclass in reclassifications {
            let Some(tx) = state.transactions.get_mut(&reclass.transaction_id) else {
                continue;
            };
            tx.transaction_type = TransactionType::Charge;
            tx.reconciliation_category = TransactionType::Charge.reconciliation_category();
            tx.reconciliation_status = ReconciliationStatus::Reconciled;
            tx.reconciliation_note = Some(reclass.note);
            applied += 1;
        }
        Ok(applied)
    }

    async fn query_transactions(&self, filter: TransactionFilter) -> StoreResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        let in_range = |date: Option<NaiveDateTime>| -> bool {
            match date {
                Some(d) => {
                    filter.date_from.is_none_or(|from| d >= from) && filter.date_to.is_none_or(|to| d <= to)
                }
                None => filter.date_from.is_none() && filter.date_to.is_none(),
            }
        };
        Ok(state
            .transactions
            .values()
            .filter(|tx| filter.gateway_like.as_ref().is_none_or(|g| &tx.gateway == g))
            .filter(|tx| filter.run_id.as_ref().is_none_or(|r| &tx.run_id == r))
            .filter(|tx| in_range(tx.date))
            .cloned()
            .collect())
    }
}
