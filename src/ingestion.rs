use std::sync::Arc;
use tracing::{error, info, warn};

use crate::context::ServiceContext;
use crate::dispatcher::{RecomputeTrigger, TaskRef, TriggerReason};
use crate::error::ServiceError;
use crate::metrics;
use crate::model::TransactionInput;
use crate::persistence::LedgerStore;

pub const RECEIVED_MESSAGE: &str = "Transaction received";

#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    pub message: String,
    pub task: TaskRef,
}

/// Write path: dedup, persist, trigger a recompute.
pub struct IngestionService {
    store: Arc<dyn LedgerStore>,
    trigger: RecomputeTrigger,
    ctx: ServiceContext,
}

impl IngestionService {
    pub fn new(store: Arc<dyn LedgerStore>, trigger: RecomputeTrigger, ctx: ServiceContext) -> Self {
        Self {
            store,
            trigger,
            ctx,
        }
    }

    /// Persists a new transaction and schedules a recompute.
    ///
    /// The `exists` pre-check only short-circuits the common case. Two
    /// concurrent submissions of one id can both pass it; the store's insert
    /// then rejects the loser with the same duplicate error.
    pub fn ingest(&self, input: TransactionInput) -> Result<IngestReceipt, ServiceError> {
        let transaction_id = input.transaction_id.clone();

        if self.store.exists(&transaction_id)? {
            return Err(self.reject_duplicate(transaction_id));
        }

        let tx = input.into_transaction(self.ctx.time.now());
        if let Err(e) = self.store.insert(&tx) {
            return Err(match ServiceError::from(e) {
                ServiceError::DuplicateTransaction { transaction_id } => {
                    self.reject_duplicate(transaction_id)
                }
                other => other,
            });
        }
        metrics::inc_ingested();

        let task = self
            .trigger
            .fire(TriggerReason::TransactionWritten {
                transaction_id: transaction_id.clone(),
            })
            .map_err(|e| {
                // The row is committed; the periodic repair will pick it up.
                error!(transaction_id = %transaction_id, "Recompute trigger failed: {}", e);
                ServiceError::from(e)
            })?;

        info!(
            transaction_id = %transaction_id,
            amount = tx.amount,
            task_id = %task.task_id,
            "✅ Transaction received"
        );

        Ok(IngestReceipt {
            message: RECEIVED_MESSAGE.to_string(),
            task,
        })
    }

    /// Deletes every transaction and the summary row in one store transaction.
    pub fn purge(&self) -> Result<u64, ServiceError> {
        let removed = self.store.delete_all()?;
        metrics::inc_purged(removed);
        info!(removed, "🗑️ All transactions deleted");
        Ok(removed)
    }

    fn reject_duplicate(&self, transaction_id: String) -> ServiceError {
        metrics::inc_duplicates();
        warn!(transaction_id = %transaction_id, "Duplicate transaction rejected");
        ServiceError::DuplicateTransaction { transaction_id }
    }
}
