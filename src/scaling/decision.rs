// Composite load score and the scale decision derived from it
use super::scaling_config::ScalingConfig;
use crate::metrics::sample::MetricsSample;
use serde::Serialize;
use std::time::Duration;

/// p95 latency (seconds) that saturates the latency score.
pub const LATENCY_TARGET_SECS: f64 = 2.0;
/// Error percentage that saturates the error score.
pub const ERROR_RATE_TARGET: f64 = 5.0;
pub const SCALE_UP_SCORE: f64 = 0.8;
pub const SCALE_DOWN_SCORE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDecision {
    ScaleUp,
    ScaleDown,
    NoAction,
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadScores {
    pub cpu: f64,
    pub memory: f64,
    pub latency: f64,
    pub error: f64,
    pub overall: f64,
}

impl LoadScores {
    // request rate is not part of the score
    pub fn compute(sample: &MetricsSample, scale_up_threshold: f64) -> Self {
        let cpu = ratio(sample.cpu_usage, scale_up_threshold);
        let memory = ratio(sample.memory_usage, scale_up_threshold);
        let latency = ratio(sample.response_time_p95, LATENCY_TARGET_SECS);
        let error = ratio(sample.error_rate, ERROR_RATE_TARGET);
        Self {
            cpu,
            memory,
            latency,
            error,
            overall: (cpu + memory + latency + error) / 4.0,
        }
    }
}

fn ratio(value: f64, target: f64) -> f64 {
    (value.max(0.0) / target).min(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub scores: LoadScores,
    pub decision: ScaleDecision,
}

/// `since_last_action` is `None` when no scaling action has happened yet.
pub fn evaluate(
    sample: &MetricsSample,
    config: &ScalingConfig,
    since_last_action: Option<Duration>,
) -> Evaluation {
    let scores = LoadScores::compute(sample, config.scale_up_threshold);

    let in_cooldown = since_last_action.is_some_and(|elapsed| elapsed < config.scale_cooldown);
    let decision = if in_cooldown {
        ScaleDecision::Cooldown
    } else if scores.overall > SCALE_UP_SCORE
        || sample.cpu_usage > config.scale_up_threshold
        || sample.memory_usage > config.scale_up_threshold
    {
        ScaleDecision::ScaleUp
    } else if scores.overall < SCALE_DOWN_SCORE
        && sample.cpu_usage < config.scale_down_threshold
        && sample.memory_usage < config.scale_down_threshold
    {
        ScaleDecision::ScaleDown
    } else {
        ScaleDecision::NoAction
    };

    Evaluation { scores, decision }
}
