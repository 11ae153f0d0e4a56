//! §4.8 Scheduler Loop: repeatedly leases the soonest-due test from a
//! [`TestQueue`], runs it through the [`crate::scenario_runner`], and
//! requeues it at the resolved delay, until the queue reports nothing due
//! or a shutdown is observed.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config_store::{ConfigStore, TestQueue};
use crate::connection_pool::PoolConfig;
use crate::item_cache::ItemCache;
use crate::macros::MacroResolver;
use crate::preprocessing::PreprocessingSink;
use crate::scenario_runner::{run_test, ShutdownSignal};

/// Ties together the collaborators one poller worker needs for its loop.
/// `Arc`-based so a single instance can be cloned into several spawned
/// worker tasks (§5 "a pool of poller workers runs in parallel").
#[derive(Clone)]
pub struct Scheduler {
    pub store: Arc<dyn ConfigStore>,
    pub queue: Arc<dyn TestQueue>,
    pub resolver: Arc<dyn MacroResolver + Send + Sync>,
    pub item_cache: Arc<dyn ItemCache>,
    pub sink: Arc<dyn PreprocessingSink>,
}

impl Scheduler {
    /// Processes every due test at `now`, one at a time, returning how many
    /// were processed. A user-macro handle is conceptually opened for the
    /// duration of the batch; in this engine that's just `self.resolver`,
    /// reused across every test `process` runs.
    pub async fn process(&self, now: i64, shutdown: &dyn ShutdownSignal) -> usize {
        let mut processed = 0;

        loop {
            if !shutdown.is_running() {
                debug!("shutdown observed, ending poll batch");
                break;
            }

            let Some((testid, nextcheck)) = self.queue.next_due(now) else {
                break;
            };
            debug!(testid, nextcheck, "leasing due test");

            let test = match self.store.load_test(testid) {
                Ok(test) => test,
                Err(e) => {
                    // Can't run a test we can't load; requeue at the default
                    // interval rather than spin on the same broken testid.
                    tracing::warn!(testid, error = %e, "failed to load due test, requeuing");
                    self.queue.requeue(now, testid, crate::scenario_runner::DEFAULT_INTERVAL);
                    processed += 1;
                    continue;
                }
            };

            let outcome = run_test(
                &test,
                self.resolver.as_ref(),
                self.item_cache.as_ref(),
                self.sink.as_ref(),
                PoolConfig::default(),
                shutdown,
                now,
            )
            .await;

            self.queue.requeue(now, testid, outcome.delay_seconds);
            processed += 1;
        }

        info!(processed, "scheduler batch complete");
        processed
    }
}
