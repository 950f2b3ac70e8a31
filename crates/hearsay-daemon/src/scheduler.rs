// crates/hearsay-daemon/src/scheduler.rs
//
// Background scheduler for the Hearsay daemon.
//
// Two independent timers: the consensus tick recomputes reputations, the
// housekeeping tick prunes network caches. A failed tick is logged and the
// next one still fires.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use hearsay_node::Node;

/// Tick counts, reported when the scheduler stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub consensus_ticks: u64,
    pub failed_consensus_ticks: u64,
    pub housekeeping_ticks: u64,
}

pub struct Scheduler {
    node: Arc<Node>,
    consensus_interval: Duration,
    housekeeping_interval: Duration,
}

impl Scheduler {
    pub fn new(node: Arc<Node>, consensus_interval: Duration, housekeeping_interval: Duration) -> Self {
        Self {
            node,
            consensus_interval,
            housekeeping_interval,
        }
    }

    /// Run until ctrl-c.
    pub async fn run(&self) -> Result<SchedulerStats, Box<dyn std::error::Error>> {
        let stats = self
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Scheduler received shutdown signal");
            })
            .await;
        Ok(stats)
    }

    /// Run until `shutdown` resolves. First ticks fire one period after start.
    pub async fn run_until<F>(&self, shutdown: F) -> SchedulerStats
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            "Scheduler started (consensus every {:?}, housekeeping every {:?})",
            self.consensus_interval,
            self.housekeeping_interval
        );

        let mut consensus = interval_at(Instant::now() + self.consensus_interval, self.consensus_interval);
        consensus.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut housekeeping = interval_at(
            Instant::now() + self.housekeeping_interval,
            self.housekeeping_interval,
        );
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats = SchedulerStats::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = consensus.tick() => {
                    stats.consensus_ticks += 1;
                    if !self.consensus_tick().await {
                        stats.failed_consensus_ticks += 1;
                    }
                }
                _ = housekeeping.tick() => {
                    stats.housekeeping_ticks += 1;
                    self.node.housekeeping().await;
                }
            }
        }

        stats
    }

    async fn consensus_tick(&self) -> bool {
        match self.node.run_consensus_tick().await {
            Ok(tick) => {
                tracing::info!(
                    "Consensus tick: {} reputations updated, {} rumors in feed",
                    tick.reputations.len(),
                    tick.feed_length
                );
                true
            }
            Err(e) => {
                tracing::error!("Consensus tick failed: {}", e);
                false
            }
        }
    }
}
