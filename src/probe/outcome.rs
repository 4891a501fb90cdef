// src/probe/outcome.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status recorded when a probe could not obtain a response.
pub const UNREACHABLE_STATUS: u16 = 0;

/// An endpoint identifier, compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Result of a single probe against one target.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub target: Target,
    pub status_code: u16,
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
    /// Why the probe failed; only set for unreachable outcomes.
    pub error: Option<String>,
}

impl CheckOutcome {
    pub fn reachable(target: Target, status_code: u16, latency_ms: u64) -> Self {
        Self {
            target,
            status_code,
            latency_ms,
            created_at: Utc::now(),
            error: None,
        }
    }

    pub fn unreachable(target: Target, latency_ms: u64, error: String) -> Self {
        Self {
            target,
            status_code: UNREACHABLE_STATUS,
            latency_ms,
            created_at: Utc::now(),
            error: Some(error),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.status_code != UNREACHABLE_STATUS
    }
}
