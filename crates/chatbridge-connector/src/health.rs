//! Health probe for the external bridge process.

use std::time::Duration;

use chatbridge_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    /// Milliseconds since the bridge started.
    #[serde(default)]
    pub uptime: f64,
    #[serde(default)]
    pub active_connections: u64,
    #[serde(default)]
    pub active_tabs: u64,
}

impl HealthReport {
    pub fn uptime_secs(&self) -> u64 {
        (self.uptime / 1000.0).round().max(0.0) as u64
    }
}

pub async fn check_health(url: &str) -> Result<HealthReport> {
    let client = reqwest::Client::builder()
        .timeout(HEALTH_TIMEOUT)
        .build()
        .map_err(|e| Error::Http(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Http(format!("{}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Http(format!("{} returned {}", url, status)));
    }

    let report: HealthReport = response
        .json()
        .await
        .map_err(|e| Error::Http(format!("invalid health body: {}", e)))?;
    debug!(status = %report.status, tabs = report.active_tabs, "Bridge health");
    Ok(report)
}
