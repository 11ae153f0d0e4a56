use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use httptest_poller::config::Config;
use httptest_poller::config_store::InMemoryConfigStore;
use httptest_poller::item_cache::InMemoryItemCache;
use httptest_poller::macros::NoopMacroResolver;
use httptest_poller::metrics::{self, SCHEDULER_DUE_TESTS_TOTAL};
use httptest_poller::preprocessing::InMemoryPreprocessingSink;
use httptest_poller::scenario_runner::ShutdownSignal;
use httptest_poller::scheduler::Scheduler;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Flips to `false` once a termination signal is observed, so in-flight
/// `Scheduler::process` batches wind down between steps instead of being
/// aborted mid-request (§4.8's shutdown-flag check).
struct SignalFlag(Arc<AtomicBool>);

impl ShutdownSignal for SignalFlag {
    fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    init_tracing(config.json_logs);

    metrics::register_metrics()?;
    let registry = Arc::new(Mutex::new(prometheus::default_registry().clone()));

    let store = Arc::new(InMemoryConfigStore::new());
    let scheduler = Scheduler {
        store: store.clone(),
        queue: store,
        resolver: Arc::new(NoopMacroResolver),
        item_cache: Arc::new(InMemoryItemCache::new()),
        sink: Arc::new(InMemoryPreprocessingSink::new()),
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            running.store(false, Ordering::Relaxed);
        });
    }

    info!(
        workers = config.poller_workers,
        tick = ?config.poll_tick_interval,
        "starting poller workers"
    );

    let mut worker_handles = Vec::new();
    for worker_id in 0..config.poller_workers {
        let scheduler = scheduler.clone();
        let running = running.clone();
        let tick = config.poll_tick_interval;
        worker_handles.push(tokio::spawn(async move {
            let shutdown = SignalFlag(running.clone());
            while shutdown.is_running() {
                let now = unix_now();
                let processed = scheduler.process(now, &shutdown).await;
                if processed > 0 {
                    SCHEDULER_DUE_TESTS_TOTAL
                        .with_label_values(&["processed"])
                        .inc_by(processed as u64);
                }
                tokio::time::sleep(tick).await;
            }
            info!(worker_id, "poller worker stopped");
        }));
    }

    let metrics_server = tokio::spawn(metrics::start_metrics_server(
        config.metrics_port,
        registry,
    ));

    for handle in worker_handles {
        let _ = handle.await;
    }
    metrics_server.abort();

    Ok(())
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
