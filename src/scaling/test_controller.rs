
#[cfg(test)]
mod tests {
    use super::fakes::{FakeMetrics, FakeRuntime};
    use crate::metrics::sample::{MetricKind, MetricsSample};
    use crate::scaling::controller::{CycleReport, ScalingController};
    use crate::scaling::decision::ScaleDecision;
    use crate::scaling::scaling_config::ScalingConfig;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    const PREFIX: &str = "conference-app";

    fn config(cooldown: Duration) -> ScalingConfig {
        ScalingConfig {
            min_replicas: 2,
            max_replicas: 5,
            scale_cooldown: cooldown,
            ..ScalingConfig::default()
        }
    }

    fn busy() -> MetricsSample {
        MetricsSample {
            cpu_usage: 85.0,
            memory_usage: 50.0,
            request_rate: 200.0,
            response_time_p95: 0.5,
            error_rate: 0.0,
        }
    }

    fn idle() -> MetricsSample {
        MetricsSample {
            cpu_usage: 20.0,
            memory_usage: 20.0,
            request_rate: 1.0,
            response_time_p95: 0.1,
            error_rate: 0.0,
        }
    }

    fn controller(
        cfg: ScalingConfig,
        runtime: Arc<FakeRuntime>,
        metrics: FakeMetrics,
    ) -> ScalingController {
        ScalingController::new(cfg, runtime, Arc::new(metrics))
    }

    #[tokio::test]
    async fn test_busy_cycle_scales_up() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 2));
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::new(busy()));

        let report = ctl.run_cycle().await;

        match report {
            CycleReport::Evaluated { evaluation, scaled } => {
                assert_eq!(evaluation.decision, ScaleDecision::ScaleUp);
                assert!(scaled);
            }
            CycleReport::Skipped => panic!("cycle should not be skipped"),
        }
        assert_eq!(ctl.state().current_replicas(), 3);
        assert!(ctl.state().last_scale_action().is_some());
        assert!(!ctl.state().scaling_in_progress());
        assert_eq!(runtime.calls(), vec!["start conference-app-3"]);
    }

    #[tokio::test]
    async fn test_idle_cycle_scales_down_highest_replica() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 5));
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::new(idle()));

        ctl.run_cycle().await;

        assert_eq!(ctl.state().current_replicas(), 4);
        assert_eq!(runtime.calls(), vec!["stop conference-app-5 30s"]);
        assert_eq!(runtime.running.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_second_cycle_within_cooldown() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 2));
        let ctl = controller(config(Duration::from_secs(300)), runtime.clone(), FakeMetrics::new(busy()));

        ctl.run_cycle().await;
        let second = ctl.run_cycle().await;

        assert_eq!(
            second,
            CycleReport::Evaluated {
                evaluation: ctl.last_evaluation().unwrap(),
                scaled: false
            }
        );
        assert_eq!(ctl.last_evaluation().unwrap().decision, ScaleDecision::Cooldown);
        assert_eq!(ctl.state().current_replicas(), 3);
        assert_eq!(runtime.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_unavailable_skips_cycle() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 3));
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::unavailable());

        assert_eq!(ctl.run_cycle().await, CycleReport::Skipped);
        assert_eq!(ctl.state().current_replicas(), 3);
        assert!(runtime.calls().is_empty());
        assert!(ctl.history().series(MetricKind::CpuUsage).is_empty());
        assert!(ctl.last_evaluation().is_none());
    }

    #[tokio::test]
    async fn test_list_failure_keeps_last_known_count() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 4));
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::new(idle()));
        assert_eq!(ctl.sync_replicas().await, 4);

        runtime.fail_list.store(true, Ordering::SeqCst);
        assert_eq!(ctl.sync_replicas().await, 4);
        assert_eq!(ctl.state().current_replicas(), 4);
    }

    #[tokio::test]
    async fn test_bounds_never_crossed() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 5));
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::new(busy()));
        ctl.sync_replicas().await;

        assert!(!ctl.scale_up().await);
        assert_eq!(ctl.state().current_replicas(), 5);

        for _ in 0..10 {
            ctl.scale_down().await;
            let replicas = ctl.state().current_replicas();
            assert!((2..=5).contains(&replicas));
        }
        assert_eq!(ctl.state().current_replicas(), 2);
        assert!(!ctl.scale_down().await);
        assert!(ctl.state().last_scale_action().is_some());
    }

    #[tokio::test]
    async fn test_failed_operation_clears_in_flight_flag() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 2));
        runtime.fail_ops.store(true, Ordering::SeqCst);
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::new(busy()));
        ctl.sync_replicas().await;

        assert!(!ctl.scale_up().await);
        assert!(!ctl.state().scaling_in_progress());
        assert_eq!(ctl.state().current_replicas(), 2);
        assert!(ctl.state().last_scale_action().is_none());

        runtime.fail_ops.store(false, Ordering::SeqCst);
        assert!(ctl.scale_up().await);
        assert_eq!(ctl.state().current_replicas(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_operation_is_rejected() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 3));
        *runtime.op_delay.lock().unwrap() = Some(Duration::from_millis(20));
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::new(busy()));
        ctl.sync_replicas().await;

        let (first, second) = tokio::join!(ctl.scale_up(), ctl.scale_down());

        assert!(first);
        assert!(!second);
        assert_eq!(ctl.state().current_replicas(), 4);
        assert_eq!(runtime.calls(), vec!["start conference-app-4"]);
    }

    #[tokio::test]
    async fn test_history_recorded_each_cycle() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 3));
        let ctl = controller(config(Duration::from_secs(300)), runtime, FakeMetrics::new(busy()));

        for _ in 0..12 {
            ctl.run_cycle().await;
        }

        let cpu = ctl.history().series(MetricKind::CpuUsage);
        assert_eq!(cpu.len(), 10);
        assert!(cpu.iter().all(|p| p.value == 85.0));
    }

    #[tokio::test]
    async fn test_scale_down_picks_highest_live_number() {
        let runtime = Arc::new(FakeRuntime::with_numbers(PREFIX, &[1, 2, 4]));
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::new(idle()));

        ctl.run_cycle().await;

        assert_eq!(runtime.calls(), vec!["stop conference-app-4 30s"]);
        assert_eq!(ctl.state().replica_numbers(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_scale_up_fills_gap_instead_of_reusing_running_name() {
        let runtime = Arc::new(FakeRuntime::with_numbers(PREFIX, &[1, 3]));
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::new(busy()));

        ctl.run_cycle().await;

        assert_eq!(runtime.calls(), vec!["start conference-app-2"]);
        assert_eq!(ctl.state().replica_numbers(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_partial_scale_down_then_scale_up() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 3));
        runtime.fail_remove.store(true, Ordering::SeqCst);
        let metrics = Arc::new(FakeMetrics::new(idle()));
        let ctl = ScalingController::new(config(Duration::ZERO), runtime.clone(), metrics.clone());

        // stop succeeds, remove fails: conference-app-3 is left stopped
        ctl.run_cycle().await;
        assert_eq!(ctl.state().current_replicas(), 3);
        assert!(ctl.state().last_scale_action().is_none());
        assert!(!ctl.state().scaling_in_progress());

        runtime.fail_remove.store(false, Ordering::SeqCst);
        *metrics.sample.lock().unwrap() = Some(busy());
        ctl.run_cycle().await;

        assert_eq!(
            runtime.calls(),
            vec!["stop conference-app-3 30s", "start conference-app-3"]
        );
        assert_eq!(ctl.state().replica_numbers(), vec![1, 2, 3]);
        assert!(runtime.stopped.lock().unwrap().is_empty());

        // the next scale down targets a container that exists
        assert!(ctl.scale_down().await);
        assert_eq!(runtime.calls().last().unwrap(), "stop conference-app-3 30s");
    }

    #[tokio::test]
    async fn test_vanished_replica_recovered_on_resync() {
        let runtime = Arc::new(FakeRuntime::with_replicas(PREFIX, 4));
        let ctl = controller(config(Duration::ZERO), runtime.clone(), FakeMetrics::new(idle()));
        ctl.sync_replicas().await;

        // removed outside the autoscaler
        runtime.running.lock().unwrap().retain(|n| n != "conference-app-4");

        assert!(!ctl.scale_down().await);
        assert_eq!(ctl.state().current_replicas(), 4);
        assert!(!ctl.state().scaling_in_progress());

        ctl.run_cycle().await;
        assert_eq!(ctl.state().replica_numbers(), vec![1, 2]);
        assert_eq!(
            runtime.calls(),
            vec!["stop conference-app-4 30s", "stop conference-app-3 30s"]
        );
    }

    #[tokio::test]
    async fn test_fake_runtime_rejects_unknown_and_duplicate_names() {
        use crate::scaling::container_runtime::ContainerRuntime;
        use crate::scaling::scaling_error::ScalingError;
        use reqwest::StatusCode;

        let runtime = FakeRuntime::with_replicas(PREFIX, 2);
        let err = runtime.stop_and_remove("conference-app-9", Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, ScalingError::HttpError(StatusCode::NOT_FOUND, _)));
        let err = runtime.create_and_start("conference-app-2").await.unwrap_err();
        assert!(matches!(err, ScalingError::HttpError(StatusCode::CONFLICT, _)));
        assert_eq!(runtime.running.lock().unwrap().len(), 2);
    }
}
