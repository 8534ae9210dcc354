// Controller configuration, read once from the environment at start-up
use super::scaling_error::ScalingError;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_PROMETHEUS_URL: &str = "http://prometheus:9090";
const DEFAULT_DOCKER_HOST: &str = "http://localhost:2375";
const DEFAULT_CONTAINER_PREFIX: &str = "conference-app";
const DEFAULT_CONTAINER_IMAGE: &str = "conference-app:latest";
const DEFAULT_SCALE_UP_THRESHOLD: f64 = 80.0;
const DEFAULT_SCALE_DOWN_THRESHOLD: f64 = 30.0;
const DEFAULT_MIN_REPLICAS: u32 = 2;
const DEFAULT_MAX_REPLICAS: u32 = 10;
const DEFAULT_CHECK_INTERVAL_MS: u64 = 30_000;
const DEFAULT_SCALE_COOLDOWN_MS: u64 = 300_000;
const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone)]
pub struct ScalingConfig {
    pub prometheus_url: String,
    /// CPU / memory percentage above which a replica is added.
    pub scale_up_threshold: f64,
    /// CPU / memory percentage both readings must stay under before a replica is removed.
    pub scale_down_threshold: f64,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub check_interval: Duration,
    pub scale_cooldown: Duration,
    pub port: u16,
    pub docker_host: String,
    pub container_prefix: String,
    pub container_image: String,
    pub docker_network: Option<String>,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            prometheus_url: DEFAULT_PROMETHEUS_URL.to_string(),
            scale_up_threshold: DEFAULT_SCALE_UP_THRESHOLD,
            scale_down_threshold: DEFAULT_SCALE_DOWN_THRESHOLD,
            min_replicas: DEFAULT_MIN_REPLICAS,
            max_replicas: DEFAULT_MAX_REPLICAS,
            check_interval: Duration::from_millis(DEFAULT_CHECK_INTERVAL_MS),
            scale_cooldown: Duration::from_millis(DEFAULT_SCALE_COOLDOWN_MS),
            port: DEFAULT_PORT,
            docker_host: DEFAULT_DOCKER_HOST.to_string(),
            container_prefix: DEFAULT_CONTAINER_PREFIX.to_string(),
            container_image: DEFAULT_CONTAINER_IMAGE.to_string(),
            docker_network: None,
        }
    }
}

impl ScalingConfig {
    pub fn from_env() -> Result<Self, ScalingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScalingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            prometheus_url: lookup("PROMETHEUS_URL").unwrap_or(defaults.prometheus_url),
            scale_up_threshold: parse_env(&lookup, "SCALE_UP_THRESHOLD", defaults.scale_up_threshold)?,
            scale_down_threshold: parse_env(&lookup, "SCALE_DOWN_THRESHOLD", defaults.scale_down_threshold)?,
            min_replicas: parse_env(&lookup, "MIN_REPLICAS", defaults.min_replicas)?,
            max_replicas: parse_env(&lookup, "MAX_REPLICAS", defaults.max_replicas)?,
            check_interval: Duration::from_millis(parse_env(&lookup, "CHECK_INTERVAL", DEFAULT_CHECK_INTERVAL_MS)?),
            scale_cooldown: Duration::from_millis(parse_env(&lookup, "SCALE_COOLDOWN", DEFAULT_SCALE_COOLDOWN_MS)?),
            port: parse_env(&lookup, "PORT", defaults.port)?,
            docker_host: lookup("DOCKER_HOST").unwrap_or(defaults.docker_host),
            container_prefix: lookup("CONTAINER_PREFIX").unwrap_or(defaults.container_prefix),
            container_image: lookup("CONTAINER_IMAGE").unwrap_or(defaults.container_image),
            docker_network: lookup("DOCKER_NETWORK").filter(|v| !v.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScalingError> {
        if self.max_replicas == 0 {
            return Err(ScalingError::Config("MAX_REPLICAS must be at least 1".into()));
        }
        if self.min_replicas > self.max_replicas {
            return Err(ScalingError::Config(format!(
                "MIN_REPLICAS ({}) exceeds MAX_REPLICAS ({})",
                self.min_replicas, self.max_replicas
            )));
        }
        if !(self.scale_down_threshold > 0.0 && self.scale_down_threshold < self.scale_up_threshold) {
            return Err(ScalingError::Config(format!(
                "thresholds must satisfy 0 < SCALE_DOWN_THRESHOLD ({}) < SCALE_UP_THRESHOLD ({})",
                self.scale_down_threshold, self.scale_up_threshold
            )));
        }
        if self.check_interval.is_zero() {
            return Err(ScalingError::Config("CHECK_INTERVAL must be greater than 0".into()));
        }
        if self.container_prefix.is_empty() {
            return Err(ScalingError::Config("CONTAINER_PREFIX must not be empty".into()));
        }
        Ok(())
    }

    /// Replica `n` is always `{prefix}-{n}`.
    pub fn instance_name(&self, replica: u32) -> String {
        format!("{}-{}", self.container_prefix, replica)
    }

    /// The subset reported on the HTTP endpoints.
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            scale_up_threshold: self.scale_up_threshold,
            scale_down_threshold: self.scale_down_threshold,
            min_replicas: self.min_replicas,
            max_replicas: self.max_replicas,
            check_interval: self.check_interval.as_millis() as u64,
            scale_cooldown: self.scale_cooldown.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub check_interval: u64,
    pub scale_cooldown: u64,
}

fn parse_env<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ScalingError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| ScalingError::Config(format!("Invalid {} value: {}", key, v)))
        })
        .transpose()
        .map(|v| v.unwrap_or(default))
}
