// One poll cycle's worth of load readings
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    CpuUsage,
    MemoryUsage,
    RequestRate,
    ResponseTimeP95,
    ErrorRate,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::CpuUsage,
        MetricKind::MemoryUsage,
        MetricKind::RequestRate,
        MetricKind::ResponseTimeP95,
        MetricKind::ErrorRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "cpuUsage",
            MetricKind::MemoryUsage => "memoryUsage",
            MetricKind::RequestRate => "requestRate",
            MetricKind::ResponseTimeP95 => "responseTimeP95",
            MetricKind::ErrorRate => "errorRate",
        }
    }
}

/// Percentages are 0-100, `response_time_p95` is in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSample {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub request_rate: f64,
    pub response_time_p95: f64,
    pub error_rate: f64,
}

impl MetricsSample {
    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::CpuUsage => self.cpu_usage,
            MetricKind::MemoryUsage => self.memory_usage,
            MetricKind::RequestRate => self.request_rate,
            MetricKind::ResponseTimeP95 => self.response_time_p95,
            MetricKind::ErrorRate => self.error_rate,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: f64) {
        match kind {
            MetricKind::CpuUsage => self.cpu_usage = value,
            MetricKind::MemoryUsage => self.memory_usage = value,
            MetricKind::RequestRate => self.request_rate = value,
            MetricKind::ResponseTimeP95 => self.response_time_p95 = value,
            MetricKind::ErrorRate => self.error_rate = value,
        }
    }
}

/// PromQL expressions used to fill a sample.
#[derive(Debug, Clone)]
pub struct MetricQueries {
    pub cpu_usage: String,
    pub memory_usage: String,
    pub request_rate: String,
    pub response_time_p95: String,
    pub error_rate: String,
}

impl MetricQueries {
    /// Container-level queries are scoped to names starting with `prefix`.
    pub fn for_prefix(prefix: &str) -> Self {
        let selector = format!("name=~\"{}.*\"", prefix);
        Self {
            cpu_usage: format!(
                "avg(rate(container_cpu_usage_seconds_total{{{}}}[1m])) * 100",
                selector
            ),
            memory_usage: format!(
                "avg(container_memory_usage_bytes{{{0}}} / container_spec_memory_limit_bytes{{{0}}}) * 100",
                selector
            ),
            request_rate: "sum(rate(http_requests_total[1m]))".to_string(),
            response_time_p95:
                "histogram_quantile(0.95, sum(rate(http_request_duration_seconds_bucket[5m])) by (le))"
                    .to_string(),
            error_rate: "sum(rate(http_requests_total{status=~\"5..\"}[5m])) / sum(rate(http_requests_total[5m])) * 100"
                .to_string(),
        }
    }

    pub fn get(&self, kind: MetricKind) -> &str {
        match kind {
            MetricKind::CpuUsage => &self.cpu_usage,
            MetricKind::MemoryUsage => &self.memory_usage,
            MetricKind::RequestRate => &self.request_rate,
            MetricKind::ResponseTimeP95 => &self.response_time_p95,
            MetricKind::ErrorRate => &self.error_rate,
        }
    }
}
