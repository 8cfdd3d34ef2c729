use anyhow::{bail, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config::Config;

const DEFAULT_METRICS_BASE: &str = "http://127.0.0.1:8091";

/// Client for the external metrics service (CrystalBLEU, TER, EED, CLIPScore,
/// KID). The metric math lives server-side; this client only ships
/// reference/prediction payloads.
pub struct MetricsClient {
    client: Client,
    base: String,
}

impl MetricsClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base = cfg
            .get("METRICS_BASE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_METRICS_BASE.to_string());

        // Honor REQUEST_TIMEOUT if present; metric batches can be slow
        let timeout_secs = cfg
            .get("REQUEST_TIMEOUT")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(120);

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { client, base })
    }

    pub async fn score(&self, metric: &str, references: Value, predictions: Value) -> Result<Value> {
        let url = format!("{}/score/{}", self.base.trim_end_matches('/'), metric);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "references": references, "predictions": predictions }))
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => Ok(resp.json::<Value>().await?),
            status => {
                let text = resp.text().await.unwrap_or_default();
                bail!("metrics service failed on {}: {} - {}", metric, status, text)
            }
        }
    }
}
