use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted transaction record. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

/// Request body of `POST /transactions`.
///
/// `timestamp` is optional; ingestion fills it with the current time when absent.
/// Amounts are not sign- or range-checked and currencies are free-form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInput {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TransactionInput {
    pub fn into_transaction(self, ingested_at: DateTime<Utc>) -> Transaction {
        Transaction {
            transaction_id: self.transaction_id,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            timestamp: self.timestamp.unwrap_or(ingested_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopTransaction {
    pub transaction_id: String,
    pub amount: f64,
}

/// The singleton aggregate row. Always replaced wholesale by a recompute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub total_transactions: u64,
    pub average_amount: f64,
    pub top_transactions: Vec<TopTransaction>,
}

impl Summary {
    pub fn empty() -> Self {
        Self {
            total_transactions: 0,
            average_amount: 0.0,
            top_transactions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_transactions == 0
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::empty()
    }
}

// --- Wire responses ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub message: String,
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatisticsResponse {
    pub total_transactions: u64,
    pub average_transaction_amount: f64,
    pub top_transactions: Vec<TopTransaction>,
}

impl From<Summary> for StatisticsResponse {
    fn from(summary: Summary) -> Self {
        Self {
            total_transactions: summary.total_transactions,
            average_transaction_amount: summary.average_amount,
            top_transactions: summary.top_transactions,
        }
    }
}
