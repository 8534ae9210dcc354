// Fixed-interval driver for the scaling controller
use super::controller::{CycleReport, ScalingController};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Runs cycles forever. A cycle always finishes before the next tick is
/// taken, so a slow container operation delays the schedule instead of
/// overlapping with it. The first cycle runs immediately.
pub async fn run(controller: Arc<ScalingController>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!("Scaling controller polling every {:?}", period);

    loop {
        ticker.tick().await;
        if let CycleReport::Evaluated { scaled: true, .. } = controller.run_cycle().await {
            log::debug!(
                "Cycle finished with a scale action, replicas now {}",
                controller.state().current_replicas()
            );
        }
    }
}
