use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{Summary, Transaction};

pub(crate) const TRANSACTIONS_TABLE: TableDefinition<&str, Vec<u8>> =
    TableDefinition::new("transactions");
pub(crate) const STATISTICS_TABLE: TableDefinition<&str, Vec<u8>> =
    TableDefinition::new("statistics");

/// Fixed key of the singleton summary row.
pub(crate) const SUMMARY_KEY: &str = "summary";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redb error: {0}")]
    Redb(#[from] redb::Error),
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transaction {0} already exists")]
    Duplicate(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Data integrity error: {0}")]
    Integrity(String),
}

pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let store = Self { db: Arc::new(db) };
        store.initialize()?;
        info!("📦 Redb Database opened");
        Ok(store)
    }

    /// Creates both tables so read transactions never hit a missing table.
    fn initialize(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let _ = txn.open_table(TRANSACTIONS_TABLE)?;
            let _ = txn.open_table(STATISTICS_TABLE)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn begin_read(&self) -> Result<redb::ReadTransaction<'_>, StoreError> {
        Ok(self.db.begin_read()?)
    }

    /// Opens a write transaction scoped to the returned unit of work.
    ///
    /// redb admits one writer at a time, so everything done through a single
    /// `UnitOfWork` is serialized against every other writer.
    pub fn unit_of_work(&self) -> Result<UnitOfWork<'_>, StoreError> {
        Ok(UnitOfWork {
            txn: Some(self.db.begin_write()?),
        })
    }
}

/// A write transaction that commits only through `commit()`.
/// Dropping it on any other path (an early `?`, a panic) rolls it back.
pub struct UnitOfWork<'db> {
    txn: Option<WriteTransaction<'db>>,
}

impl<'db> UnitOfWork<'db> {
    fn txn(&self) -> Result<&WriteTransaction<'db>, StoreError> {
        self.txn
            .as_ref()
            .ok_or_else(|| StoreError::Integrity("unit of work already closed".into()))
    }

    /// Inserts a transaction, rejecting an id that is already stored.
    /// The check and the write share this write transaction.
    pub fn insert_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut table = self.txn()?.open_table(TRANSACTIONS_TABLE)?;
        if table.get(tx.transaction_id.as_str())?.is_some() {
            return Err(StoreError::Duplicate(tx.transaction_id.clone()));
        }
        let data = serde_json::to_vec(tx)?;
        table.insert(tx.transaction_id.as_str(), data)?;
        Ok(())
    }

    pub fn load_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let table = self.txn()?.open_table(TRANSACTIONS_TABLE)?;
        let mut items = Vec::new();
        for res in table.range::<&str>(..)? {
            let (_, v) = res?;
            let item: Transaction = serde_json::from_slice(&v.value())?;
            items.push(item);
        }
        Ok(items)
    }

    /// Writes the singleton row under its fixed key, replacing any previous one.
    pub fn upsert_summary(&self, summary: &Summary) -> Result<(), StoreError> {
        let mut table = self.txn()?.open_table(STATISTICS_TABLE)?;
        let data = serde_json::to_vec(summary)?;
        let previous = table.insert(SUMMARY_KEY, data)?;
        debug!(replaced = previous.is_some(), "Summary row written");
        Ok(())
    }

    /// Removes every transaction and the summary row. Returns how many
    /// transactions were removed.
    pub fn clear(&self) -> Result<u64, StoreError> {
        let txn = self.txn()?;
        let mut transactions = txn.open_table(TRANSACTIONS_TABLE)?;
        let mut ids = Vec::new();
        for res in transactions.range::<&str>(..)? {
            let (k, _) = res?;
            ids.push(k.value().to_string());
        }
        for id in &ids {
            transactions.remove(id.as_str())?;
        }

        let mut statistics = txn.open_table(STATISTICS_TABLE)?;
        statistics.remove(SUMMARY_KEY)?;
        Ok(ids.len() as u64)
    }

    pub fn commit(mut self) -> Result<(), StoreError> {
        match self.txn.take() {
            Some(txn) => Ok(txn.commit()?),
            None => Err(StoreError::Integrity("unit of work already closed".into())),
        }
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if let Some(txn) = self.txn.take() {
            debug!("↩️ Rolling back uncommitted unit of work");
            if let Err(e) = txn.abort() {
                warn!("Rollback failed: {}", e);
            }
        }
    }
}
