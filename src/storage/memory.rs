// In-memory result sink
// Keeps the full history for inspection; nothing survives a restart.

use super::*;
use async_trait::async_trait;
use tokio::sync::Mutex;

pub struct MemorySink {
    history: Mutex<Vec<CheckRecord>>,
    index: CheckIndex,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            index: CheckIndex::new(),
        }
    }

    /// Every stored record, in append order.
    pub async fn records(&self) -> Vec<CheckRecord> {
        self.history.lock().await.clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn list_known_targets(&self) -> Result<Vec<Target>, StorageError> {
        Ok(self.index.known_targets())
    }

    async fn append(&self, outcome: &CheckOutcome) -> Result<CheckRecord, StorageError> {
        let mut history = self.history.lock().await;
        let record = CheckRecord::from_outcome(self.index.allocate_id(), outcome);
        history.push(record.clone());
        self.index.record(record.clone());
        Ok(record)
    }

    async fn latest_per_target(&self) -> Result<Vec<CheckRecord>, StorageError> {
        Ok(self.index.latest())
    }
}
