// Prometheus instant-query client
use crate::scaling::scaling_error::ScalingError;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

// {"status":"success","data":{"resultType":"vector","result":[{"metric":{},"value":[1700000000.1,"42"]}]}}
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryData {
    #[serde(default)]
    pub result: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
pub struct QueryResult {
    pub value: (f64, String),
}

impl QueryResponse {
    /// First sample of the result vector; empty or non-numeric results read as 0.
    pub fn first_value(&self) -> f64 {
        self.data
            .as_ref()
            .and_then(|d| d.result.first())
            .and_then(|r| r.value.1.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

#[derive(Clone)]
pub struct PrometheusClient {
    client: reqwest::Client,
    base_url: String,
}

impl PrometheusClient {
    pub fn new(base_url: &str) -> Result<Self, ScalingError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(QUERY_TIMEOUT)
            .build()
            .map_err(|e| ScalingError::Config(format!("Unable to build Prometheus client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn query(&self, promql: &str) -> Result<f64, ScalingError> {
        let url = format!("{}/api/v1/query", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("query", promql)])
            .send()
            .await
            .map_err(|e| ScalingError::transport("Prometheus request failed", e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            ScalingError::HttpError(status, format!("Failed to read response: {}", e))
        })?;
        if status != StatusCode::OK {
            return Err(ScalingError::HttpError(status, body));
        }

        let parsed: QueryResponse = serde_json::from_str(&body)?;
        if parsed.status != "success" {
            return Err(ScalingError::QueryFailed(
                parsed.error.unwrap_or_else(|| format!("status {}", parsed.status)),
            ));
        }
        Ok(parsed.first_value())
    }
}
