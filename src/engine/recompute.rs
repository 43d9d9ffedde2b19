use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::engine::statistics;
use crate::error::ServiceError;
use crate::metrics;
use crate::model::{Summary, Transaction};
use crate::persistence::LedgerStore;

/// Rebuilds the singleton summary from the full transaction set.
///
/// Performs no retries of its own: a failed run leaves the previous summary in
/// place and the error goes back to the caller (the worker redelivers).
pub struct RecomputeService {
    store: Arc<dyn LedgerStore>,
}

impl RecomputeService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn recompute(&self) -> Result<Summary, ServiceError> {
        let started = Instant::now();
        match self.store.recompute_summary(summarize) {
            Ok(summary) => {
                let elapsed = started.elapsed().as_secs_f64();
                metrics::inc_recomputes();
                metrics::observe_recompute_latency(elapsed);
                metrics::set_summary_total(summary.total_transactions as i64);
                info!(
                    total_transactions = summary.total_transactions,
                    average_amount = summary.average_amount,
                    elapsed_ms = elapsed * 1000.0,
                    "📊 Summary recomputed"
                );
                Ok(summary)
            }
            Err(e) => {
                metrics::inc_recompute_failures();
                error!("❌ Recompute failed: {}", e);
                Err(e.into())
            }
        }
    }
}

fn summarize(transactions: &[Transaction]) -> Summary {
    if transactions.is_empty() {
        info!("No transactions stored, resetting summary");
        return Summary::empty();
    }
    statistics::compute(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, SummaryStore, TransactionStore};
    use chrono::Utc;

    fn tx(id: &str, amount: f64) -> Transaction {
        Transaction {
            transaction_id: id.into(),
            user_id: "u".into(),
            amount,
            currency: "USD".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_store_resets_existing_summary() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_summary(&Summary {
                total_transactions: 9,
                average_amount: 3.0,
                top_transactions: vec![],
            })
            .unwrap();

        let service = RecomputeService::new(store.clone());
        assert_eq!(service.recompute().unwrap(), Summary::empty());
        assert_eq!(store.get_summary().unwrap(), Some(Summary::empty()));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        for (i, amount) in [5.0, 1.0, 9.0, 3.0].iter().enumerate() {
            store.insert(&tx(&format!("t{}", i), *amount)).unwrap();
        }
        let service = RecomputeService::new(store.clone());

        let first = service.recompute().unwrap();
        let second = service.recompute().unwrap();
        assert_eq!(first, second);
        assert_eq!(store.get_summary().unwrap(), Some(second));
    }

    #[test]
    fn test_failure_keeps_previous_summary() {
        let store = Arc::new(MemoryStore::new());
        store.insert(&tx("a", 10.0)).unwrap();
        let service = RecomputeService::new(store.clone());
        let before = service.recompute().unwrap();

        store.set_available(false);
        let err = service.recompute().unwrap_err();
        assert!(matches!(err, ServiceError::StoreUnavailable(_)));

        store.set_available(true);
        assert_eq!(store.get_summary().unwrap(), Some(before));
    }
}
