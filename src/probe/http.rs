// src/probe/http.rs
use super::{Probe, ProbeError, Target};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Plain GET probe. Any HTTP response counts as a completed probe,
/// whatever its status.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("uptime-sentinel/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn get(&self, target: &Target) -> Result<u16, ProbeError> {
        let response = self.client.get(target.as_str()).send().await?;
        Ok(response.status().as_u16())
    }
}
