use std::sync::Arc;

use crate::error::ServiceError;
use crate::model::Summary;
use crate::persistence::LedgerStore;

/// Read-only view of the last committed summary. Never recomputes.
pub struct QueryService {
    store: Arc<dyn LedgerStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn get_summary(&self) -> Result<Summary, ServiceError> {
        Ok(self.store.get_summary()?.unwrap_or_else(Summary::empty))
    }
}
