//! HTTP client for an external evaluation service
//!
//! Sends the training configuration plus a bounded sample of processed rows
//! and expects [`TrainingResults`] back as camelCase JSON. The API key is
//! read from an environment variable at call time, never stored in the
//! config, so it stays out of serialized state and logs.

use super::{TrainingOracle, TrainingRequest, TrainingResults};
use crate::error::{NeuroflowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "http://localhost:8000/v1/evaluate";
const DEFAULT_API_KEY_ENV: &str = "NEUROFLOW_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a [`RemoteOracle`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Training oracle backed by a remote HTTP service
#[derive(Debug, Clone)]
pub struct RemoteOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl RemoteOracle {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NeuroflowError::Oracle(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<String> {
        std::env::var(&self.config.api_key_env).map_err(|_| {
            NeuroflowError::Oracle(format!(
                "API key environment variable '{}' is not set",
                self.config.api_key_env
            ))
        })
    }
}

impl TrainingOracle for RemoteOracle {
    fn evaluate(
        &self,
        request: &TrainingRequest,
    ) -> impl Future<Output = Result<TrainingResults>> + Send {
        let client = self.client.clone();
        let endpoint = self.config.endpoint.clone();
        let api_key = self.api_key();
        let payload = build_payload(request);

        async move {
            let api_key = api_key?;
            debug!(endpoint = %endpoint, "sending evaluation request");

            let response = client
                .post(&endpoint)
                .bearer_auth(api_key)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    NeuroflowError::Oracle(format!("evaluation request failed: {e}"))
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(NeuroflowError::Oracle(format!(
                    "evaluation service returned {status}: {body}"
                )));
            }

            let results: TrainingResults = response.json().await.map_err(|e| {
                NeuroflowError::Oracle(format!("malformed evaluation response: {e}"))
            })?;
            validate_results(&results)?;
            Ok(results)
        }
    }
}

/// Wire payload: configuration, per-column stats, and only the leading sample
/// of processed rows. Full datasets never leave the process.
fn build_payload(request: &TrainingRequest) -> serde_json::Value {
    json!({
        "targetColumn": request.target_column,
        "featureColumns": request.feature_columns,
        "scalerChoice": request.scaler_choice.to_string(),
        "splitRatio": request.split_ratio,
        "model": request.model.to_string(),
        "columnStats": request.column_stats,
        "sampleRows": request.sample(),
        "totalRows": request.rows.len(),
    })
}

/// Reject responses with metrics outside [0, 1] or non-finite values before
/// they reach pipeline state.
fn validate_results(results: &TrainingResults) -> Result<()> {
    let metrics = [
        ("accuracy", results.accuracy),
        ("precision", results.precision),
        ("recall", results.recall),
        ("f1Score", results.f1_score),
    ];
    for (name, value) in metrics {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(NeuroflowError::Oracle(format!(
                "evaluation response has out-of-range {name}: {value}"
            )));
        }
    }
    for imp in &results.feature_importance {
        if !imp.value.is_finite() {
            return Err(NeuroflowError::Oracle(format!(
                "evaluation response has non-finite importance for '{}'",
                imp.name
            )));
        }
    }
    Ok(())
}
