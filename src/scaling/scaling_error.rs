// Errors shared by the metrics client, the container runtime and config loading
use reqwest::StatusCode;
use serde_json::Error as JsonError;

#[derive(thiserror::Error, Debug)]
pub enum ScalingError {
    #[error("HTTP error ({0}): {1}")]
    HttpError(StatusCode, String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] JsonError),

    #[error("Prometheus query failed: {0}")]
    QueryFailed(String),

    #[error("All metric queries failed")]
    MetricsUnavailable,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Container runtime error: {0}")]
    Runtime(String),
}

impl ScalingError {
    // reqwest errors carry no status when the request never reached the server
    pub(crate) fn transport(context: &str, err: reqwest::Error) -> Self {
        ScalingError::HttpError(
            err.status().unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
            format!("{}: {}", context, err),
        )
    }
}
