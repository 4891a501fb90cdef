// src/probe/mod.rs
mod executor;
mod http;
mod outcome;

pub use executor::{ProbeExecutor, DEFAULT_PROBE_TIMEOUT};
pub use http::HttpProbe;
pub use outcome::{CheckOutcome, Target, UNREACHABLE_STATUS};

use async_trait::async_trait;
use std::time::Duration;

/// One request/response exchange against a target, returning its status code.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn get(&self, target: &Target) -> Result<u16, ProbeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}
