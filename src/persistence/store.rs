use crate::model::{Summary, Transaction};
use crate::persistence::redb_store::{
    RedbStore, StoreError, STATISTICS_TABLE, SUMMARY_KEY, TRANSACTIONS_TABLE,
};
use redb::ReadableTable;
use std::sync::Arc;
use tracing::debug;

/// Signature of the aggregate function a recompute applies to the full set.
pub type SummaryFn = fn(&[Transaction]) -> Summary;

/// Keyed storage of transaction records.
pub trait TransactionStore: Send + Sync {
    fn get(&self, transaction_id: &str) -> Result<Option<Transaction>, StoreError>;

    fn get_all(&self) -> Result<Vec<Transaction>, StoreError>;

    fn exists(&self, transaction_id: &str) -> Result<bool, StoreError> {
        Ok(self.get(transaction_id)?.is_some())
    }

    /// Must fail with `StoreError::Duplicate` when the id is already stored,
    /// even when two callers race past an earlier `exists` check.
    fn insert(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Removes every transaction together with the summary row.
    fn delete_all(&self) -> Result<u64, StoreError>;
}

/// Storage of the singleton summary row.
pub trait SummaryStore: Send + Sync {
    fn get_summary(&self) -> Result<Option<Summary>, StoreError>;

    fn upsert_summary(&self, summary: &Summary) -> Result<(), StoreError>;

    /// Reads the whole transaction set, applies `compute` and upserts the
    /// result, all inside one store transaction. Either the new summary is
    /// committed or the previous one is left untouched.
    fn recompute_summary(&self, compute: SummaryFn) -> Result<Summary, StoreError>;
}

/// Everything the services need from a backend.
pub trait LedgerStore: TransactionStore + SummaryStore {}

impl<T: TransactionStore + SummaryStore> LedgerStore for T {}

/// redb-backed repository.
pub struct PersistenceStore {
    store: Arc<RedbStore>,
}

impl PersistenceStore {
    pub fn new(store: Arc<RedbStore>) -> Self {
        Self { store }
    }
}

impl TransactionStore for PersistenceStore {
    fn get(&self, transaction_id: &str) -> Result<Option<Transaction>, StoreError> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(TRANSACTIONS_TABLE)?;
        let maybe_guard = table.get(transaction_id)?;
        let maybe_tx = maybe_guard
            .map(|v| serde_json::from_slice::<Transaction>(&v.value()))
            .transpose()?;
        Ok(maybe_tx)
    }

    fn get_all(&self) -> Result<Vec<Transaction>, StoreError> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(TRANSACTIONS_TABLE)?;
        let mut items = Vec::new();
        for res in table.range::<&str>(..)? {
            let (_, v) = res?;
            let item: Transaction = serde_json::from_slice(&v.value())?;
            items.push(item);
        }
        Ok(items)
    }

    fn exists(&self, transaction_id: &str) -> Result<bool, StoreError> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(TRANSACTIONS_TABLE)?;
        let exists = table.get(transaction_id)?.is_some();
        Ok(exists)
    }

    fn insert(&self, tx: &Transaction) -> Result<(), StoreError> {
        let uow = self.store.unit_of_work()?;
        uow.insert_transaction(tx)?;
        uow.commit()?;
        debug!(transaction_id = %tx.transaction_id, "Transaction committed");
        Ok(())
    }

    fn delete_all(&self) -> Result<u64, StoreError> {
        let uow = self.store.unit_of_work()?;
        let removed = uow.clear()?;
        uow.commit()?;
        Ok(removed)
    }
}

impl SummaryStore for PersistenceStore {
    fn get_summary(&self) -> Result<Option<Summary>, StoreError> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(STATISTICS_TABLE)?;
        let maybe_guard = table.get(SUMMARY_KEY)?;
        let maybe_summary = maybe_guard
            .map(|v| serde_json::from_slice::<Summary>(&v.value()))
            .transpose()?;
        Ok(maybe_summary)
    }

    fn upsert_summary(&self, summary: &Summary) -> Result<(), StoreError> {
        let uow = self.store.unit_of_work()?;
        uow.upsert_summary(summary)?;
        uow.commit()?;
        Ok(())
    }

    fn recompute_summary(&self, compute: SummaryFn) -> Result<Summary, StoreError> {
        let uow = self.store.unit_of_work()?;
        let transactions = uow.load_transactions()?;
        let summary = compute(&transactions);
        uow.upsert_summary(&summary)?;
        uow.commit()?;
        Ok(summary)
    }
}
