// Bounded per-metric history, kept only for display on /metrics
use super::sample::{MetricKind, MetricsSample};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;

pub const HISTORY_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub cpu_usage: Vec<HistoryPoint>,
    pub memory_usage: Vec<HistoryPoint>,
    pub request_rate: Vec<HistoryPoint>,
    pub response_time_p95: Vec<HistoryPoint>,
    pub error_rate: Vec<HistoryPoint>,
}

pub struct MetricsHistory {
    series: DashMap<MetricKind, VecDeque<HistoryPoint>>,
    capacity: usize,
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, sample: &MetricsSample, at: DateTime<Utc>) {
        for kind in MetricKind::ALL {
            let mut points = self.series.entry(kind).or_default();
            points.push_back(HistoryPoint {
                timestamp: at,
                value: sample.get(kind),
            });
            while points.len() > self.capacity {
                points.pop_front();
            }
        }
    }

    /// Oldest first.
    pub fn series(&self, kind: MetricKind) -> Vec<HistoryPoint> {
        self.series
            .get(&kind)
            .map(|points| points.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            cpu_usage: self.series(MetricKind::CpuUsage),
            memory_usage: self.series(MetricKind::MemoryUsage),
            request_rate: self.series(MetricKind::RequestRate),
            response_time_p95: self.series(MetricKind::ResponseTimeP95),
            error_rate: self.series(MetricKind::ErrorRate),
        }
    }
}
