// Scaling controller: replica bookkeeping plus one poll cycle's worth of work
use super::container_runtime::ContainerRuntime;
use super::decision::{self, Evaluation, ScaleDecision};
use super::scaling_config::ScalingConfig;
use crate::metrics::collector::MetricsSource;
use crate::metrics::history::MetricsHistory;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(30);
const NEVER: i64 = i64::MIN;

/// Process-wide mutable state. Lost on restart; the replica count is
/// recovered from the runtime on the next cycle.
pub struct ControllerState {
    // replica numbers believed to be running
    replicas: Mutex<BTreeSet<u32>>,
    scaling_in_progress: AtomicBool,
    // unix millis of the last successful scale action
    last_scale_action: AtomicI64,
}

impl ControllerState {
    pub fn new(initial_replicas: u32) -> Self {
        Self {
            replicas: Mutex::new((1..=initial_replicas).collect()),
            scaling_in_progress: AtomicBool::new(false),
            last_scale_action: AtomicI64::new(NEVER),
        }
    }

    fn replicas(&self) -> MutexGuard<'_, BTreeSet<u32>> {
        self.replicas.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current_replicas(&self) -> u32 {
        self.replicas().len() as u32
    }

    /// Ascending.
    pub fn replica_numbers(&self) -> Vec<u32> {
        self.replicas().iter().copied().collect()
    }

    pub fn scaling_in_progress(&self) -> bool {
        self.scaling_in_progress.load(Ordering::SeqCst)
    }

    pub fn last_scale_action(&self) -> Option<DateTime<Utc>> {
        match self.last_scale_action.load(Ordering::SeqCst) {
            NEVER => None,
            millis => Utc.timestamp_millis_opt(millis).single(),
        }
    }

    pub fn since_last_action(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_scale_action()
            .map(|at| (now - at).to_std().unwrap_or(Duration::ZERO))
    }

    fn set_replicas(&self, replicas: BTreeSet<u32>) {
        *self.replicas() = replicas;
    }

    fn add_replica(&self, replica: u32) {
        self.replicas().insert(replica);
    }

    fn remove_replica(&self, replica: u32) {
        self.replicas().remove(&replica);
    }

    /// Lowest number not in use, so gaps are filled before growing.
    fn next_free_replica(&self) -> u32 {
        let replicas = self.replicas();
        (1..).find(|n| !replicas.contains(n)).unwrap_or(1)
    }

    fn highest_replica(&self) -> Option<u32> {
        self.replicas().last().copied()
    }

    fn mark_action(&self, at: DateTime<Utc>) {
        self.last_scale_action.store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

/// Holds the in-flight flag for the life of one scale operation.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// Metrics could not be collected at all; no decision was made.
    Skipped,
    Evaluated { evaluation: Evaluation, scaled: bool },
}

pub struct ScalingController {
    config: ScalingConfig,
    runtime: Arc<dyn ContainerRuntime>,
    metrics: Arc<dyn MetricsSource>,
    state: ControllerState,
    history: MetricsHistory,
    last_evaluation: Mutex<Option<Evaluation>>,
}

impl ScalingController {
    pub fn new(
        config: ScalingConfig,
        runtime: Arc<dyn ContainerRuntime>,
        metrics: Arc<dyn MetricsSource>,
    ) -> Self {
        let state = ControllerState::new(config.min_replicas);
        Self {
            config,
            runtime,
            metrics,
            state,
            history: MetricsHistory::default(),
            last_evaluation: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ScalingConfig {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    pub fn last_evaluation(&self) -> Option<Evaluation> {
        *self
            .last_evaluation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the tracked replicas with the live ones; keeps the
    /// last-known set if the runtime cannot be listed.
    pub async fn sync_replicas(&self) -> u32 {
        match self.runtime.list_running(&self.config.container_prefix).await {
            Ok(containers) => {
                log::debug!(
                    "Running replicas: {:?}",
                    containers.iter().map(|c| (&c.name, &c.id)).collect::<Vec<_>>()
                );
                let live: BTreeSet<u32> = containers.iter().map(|c| c.replica).collect();
                let tracked = self.state.replica_numbers();
                if !live.iter().eq(tracked.iter()) {
                    log::info!("Replicas resynced from runtime: {:?} => {:?}", tracked, live);
                }
                let count = live.len() as u32;
                self.state.set_replicas(live);
                count
            }
            Err(e) => {
                let tracked = self.state.current_replicas();
                log::warn!("Failed to list containers, keeping replica count {}: {}", tracked, e);
                tracked
            }
        }
    }

    pub async fn run_cycle(&self) -> CycleReport {
        self.sync_replicas().await;

        let sample = match self.metrics.collect().await {
            Ok(sample) => sample,
            Err(e) => {
                log::error!("Skipping scaling cycle, metrics unavailable: {}", e);
                return CycleReport::Skipped;
            }
        };
        let now = Utc::now();
        self.history.record(&sample, now);

        let evaluation = decision::evaluate(&sample, &self.config, self.state.since_last_action(now));
        *self
            .last_evaluation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(evaluation);

        log::info!(
            "[Evaluate] cpu={:.1}% mem={:.1}% rps={:.1} p95={:.3}s err={:.2}% score={:.3} replicas={} decision={:?}",
            sample.cpu_usage,
            sample.memory_usage,
            sample.request_rate,
            sample.response_time_p95,
            sample.error_rate,
            evaluation.scores.overall,
            self.state.current_replicas(),
            evaluation.decision
        );

        let scaled = match evaluation.decision {
            ScaleDecision::ScaleUp => self.scale_up().await,
            ScaleDecision::ScaleDown => self.scale_down().await,
            ScaleDecision::Cooldown => {
                log::debug!("In cooldown, no scaling this cycle");
                false
            }
            ScaleDecision::NoAction => false,
        };
        CycleReport::Evaluated { evaluation, scaled }
    }

    /// Adds one replica. `false` when another operation is in flight, the
    /// maximum is reached, or the runtime call fails.
    pub async fn scale_up(&self) -> bool {
        let Some(_in_flight) = InFlight::acquire(&self.state.scaling_in_progress) else {
            log::warn!("Scale up rejected: scaling already in progress");
            return false;
        };
        let current = self.state.current_replicas();
        if current >= self.config.max_replicas {
            log::info!("Scale up rejected: already at max replicas ({})", self.config.max_replicas);
            return false;
        }

        let replica = self.state.next_free_replica();
        let name = self.config.instance_name(replica);
        match self.runtime.create_and_start(&name).await {
            Ok(()) => {
                self.state.add_replica(replica);
                self.state.mark_action(Utc::now());
                log::info!("[Scale] up {} => {} ({})", current, current + 1, name);
                self.refresh_load_balancer();
                true
            }
            Err(e) => {
                log::error!("Scale up with {} failed: {}", name, e);
                false
            }
        }
    }

    /// Removes the highest-numbered replica.
    pub async fn scale_down(&self) -> bool {
        let Some(_in_flight) = InFlight::acquire(&self.state.scaling_in_progress) else {
            log::warn!("Scale down rejected: scaling already in progress");
            return false;
        };
        let current = self.state.current_replicas();
        if current <= self.config.min_replicas {
            log::info!("Scale down rejected: already at min replicas ({})", self.config.min_replicas);
            return false;
        }

        let Some(replica) = self.state.highest_replica() else {
            return false;
        };
        let name = self.config.instance_name(replica);
        match self.runtime.stop_and_remove(&name, STOP_GRACE_PERIOD).await {
            Ok(()) => {
                self.state.remove_replica(replica);
                self.state.mark_action(Utc::now());
                log::info!("[Scale] down {} => {} ({})", current, current - 1, name);
                self.refresh_load_balancer();
                true
            }
            Err(e) => {
                log::error!("Scale down of {} failed: {}", name, e);
                false
            }
        }
    }

    // Upstream reconfiguration is not implemented: new replicas only get
    // traffic if the proxy discovers them on its own.
    fn refresh_load_balancer(&self) {
        let upstreams: Vec<String> = self
            .state
            .replica_numbers()
            .into_iter()
            .map(|n| self.config.instance_name(n))
            .collect();
        log::info!("Load balancer upstreams would be: [{}]", upstreams.join(", "));
    }
}
