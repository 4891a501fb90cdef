// Result sink abstraction
// Persists check outcomes and answers the queries the API layer needs.

mod file;
mod memory;

pub use file::FileSink;
pub use memory::MemorySink;

use crate::probe::{CheckOutcome, Target};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Storage backend for check outcomes.
///
/// Implementations must accept concurrent `append` calls; the scheduler
/// writes one record per finished probe without coordinating across targets.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Distinct targets that have at least one stored record, sorted.
    async fn list_known_targets(&self) -> Result<Vec<Target>, StorageError>;

    async fn append(&self, outcome: &CheckOutcome) -> Result<CheckRecord, StorageError>;

    /// Most recent record per target, newest first.
    async fn latest_per_target(&self) -> Result<Vec<CheckRecord>, StorageError>;
}

/// A stored outcome. Field names match the JSON the web front-end reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub id: u64,
    #[serde(rename = "url")]
    pub target: Target,
    pub status_code: u16,
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl CheckRecord {
    pub fn from_outcome(id: u64, outcome: &CheckOutcome) -> Self {
        Self {
            id,
            target: outcome.target.clone(),
            status_code: outcome.status_code,
            latency_ms: outcome.latency_ms,
            created_at: outcome.created_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Id allocation plus the latest record per target, shared by the backends.
struct CheckIndex {
    next_id: AtomicU64,
    latest: DashMap<Target, CheckRecord>,
}

impl CheckIndex {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            latest: DashMap::new(),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn resume_after(&self, id: u64) {
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    /// Keeps the record with the highest id for its target.
    fn record(&self, record: CheckRecord) {
        match self.latest.entry(record.target.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().id < record.id {
                    entry.insert(record);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
        }
    }

    fn known_targets(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = self.latest.iter().map(|e| e.key().clone()).collect();
        targets.sort();
        targets
    }

    fn latest(&self) -> Vec<CheckRecord> {
        let mut records: Vec<CheckRecord> = self.latest.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records
    }
}
