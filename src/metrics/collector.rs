// Fills a MetricsSample from five independent Prometheus queries
use super::prometheus::PrometheusClient;
use super::sample::{MetricKind, MetricQueries, MetricsSample};
use crate::scaling::scaling_error::ScalingError;
use async_trait::async_trait;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn collect(&self) -> Result<MetricsSample, ScalingError>;
}

pub struct PrometheusCollector {
    client: PrometheusClient,
    queries: MetricQueries,
}

impl PrometheusCollector {
    pub fn new(client: PrometheusClient, queries: MetricQueries) -> Self {
        Self { client, queries }
    }
}

#[async_trait]
impl MetricsSource for PrometheusCollector {
    /// A failed query contributes 0; only a sample where every query failed is an error.
    async fn collect(&self) -> Result<MetricsSample, ScalingError> {
        let q = &self.queries;
        let (cpu, memory, requests, p95, errors) = tokio::join!(
            self.client.query(q.get(MetricKind::CpuUsage)),
            self.client.query(q.get(MetricKind::MemoryUsage)),
            self.client.query(q.get(MetricKind::RequestRate)),
            self.client.query(q.get(MetricKind::ResponseTimeP95)),
            self.client.query(q.get(MetricKind::ErrorRate)),
        );

        let mut sample = MetricsSample::default();
        let mut failures = 0;
        for (kind, result) in MetricKind::ALL
            .into_iter()
            .zip([cpu, memory, requests, p95, errors])
        {
            match result {
                Ok(value) => sample.set(kind, value),
                Err(e) => {
                    log::warn!("Failed to fetch metric {}: {}", kind.as_str(), e);
                    failures += 1;
                }
            }
        }

        if failures == MetricKind::ALL.len() {
            return Err(ScalingError::MetricsUnavailable);
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn vector_body(value: &str) -> String {
        format!(
            r#"{{"status":"success","data":{{"resultType":"vector","result":[{{"metric":{{}},"value":[1700000000,"{}"]}}]}}}}"#,
            value
        )
    }

    #[tokio::test]
    async fn test_collect_substitutes_zero_for_failed_query() {
        let mut server = Server::new_async().await;
        let queries = MetricQueries::for_prefix("conference-app");

        let readings = [
            (queries.cpu_usage.clone(), "85"),
            (queries.memory_usage.clone(), "50"),
            (queries.request_rate.clone(), "120"),
            (queries.response_time_p95.clone(), "0.5"),
        ];
        let mut mocks = Vec::new();
        for (query, value) in readings {
            mocks.push(
                server
                    .mock("GET", "/api/v1/query")
                    .match_query(Matcher::UrlEncoded("query".into(), query))
                    .with_status(200)
                    .with_body(vector_body(value))
                    .create_async()
                    .await,
            );
        }
        let _failing = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), queries.error_rate.clone()))
            .with_status(503)
            .create_async()
            .await;

        let collector = PrometheusCollector::new(PrometheusClient::new(&server.url()).unwrap(), queries);
        let sample = collector.collect().await.unwrap();

        for mock in mocks {
            mock.assert_async().await;
        }
        assert_eq!(sample.cpu_usage, 85.0);
        assert_eq!(sample.memory_usage, 50.0);
        assert_eq!(sample.request_rate, 120.0);
        assert_eq!(sample.response_time_p95, 0.5);
        assert_eq!(sample.error_rate, 0.0);
    }

    #[tokio::test]
    async fn test_collect_fails_when_backend_unreachable() {
        let collector = PrometheusCollector::new(
            PrometheusClient::new("http://127.0.0.1:1").unwrap(),
            MetricQueries::for_prefix("conference-app"),
        );
        assert!(matches!(
            collector.collect().await,
            Err(ScalingError::MetricsUnavailable)
        ));
    }
}
