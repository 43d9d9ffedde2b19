use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::{Summary, Transaction};
use crate::persistence::redb_store::StoreError;
use crate::persistence::store::{SummaryFn, SummaryStore, TransactionStore};

#[derive(Default)]
struct Tables {
    transactions: BTreeMap<String, Transaction>,
    summary: Option<Summary>,
}

/// Non-durable backend. Every operation takes the single lock, so each call is
/// atomic with respect to every other call.
///
/// Can be switched offline with `set_available(false)` to exercise failure
/// paths.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore for MemoryStore {
    fn get(&self, transaction_id: &str) -> Result<Option<Transaction>, StoreError> {
        self.ensure_available()?;
        Ok(self.tables.read().transactions.get(transaction_id).cloned())
    }

    fn get_all(&self) -> Result<Vec<Transaction>, StoreError> {
        self.ensure_available()?;
        Ok(self.tables.read().transactions.values().cloned().collect())
    }

    fn insert(&self, tx: &Transaction) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        if tables.transactions.contains_key(&tx.transaction_id) {
            return Err(StoreError::Duplicate(tx.transaction_id.clone()));
        }
        tables
            .transactions
            .insert(tx.transaction_id.clone(), tx.clone());
        Ok(())
    }

    fn delete_all(&self) -> Result<u64, StoreError> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        let removed = tables.transactions.len() as u64;
        tables.transactions.clear();
        tables.summary = None;
        Ok(removed)
    }
}

impl SummaryStore for MemoryStore {
    fn get_summary(&self) -> Result<Option<Summary>, StoreError> {
        self.ensure_available()?;
        Ok(self.tables.read().summary.clone())
    }

    fn upsert_summary(&self, summary: &Summary) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.tables.write().summary = Some(summary.clone());
        Ok(())
    }

    fn recompute_summary(&self, compute: SummaryFn) -> Result<Summary, StoreError> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        let snapshot: Vec<Transaction> = tables.transactions.values().cloned().collect();
        let summary = compute(&snapshot);
        tables.summary = Some(summary.clone());
        Ok(summary)
    }
}
