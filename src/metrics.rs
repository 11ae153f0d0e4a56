//! Engine-observability metrics (§10.4): orthogonal to and additional to
//! the `Metric Emitter`'s own output, which goes to the preprocessing
//! sink, not Prometheus. Structural shape is the teacher's `metrics.rs`:
//! `lazy_static` + `prometheus` + a `hyper` `/metrics` endpoint.

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use prometheus::{Encoder, Gauge, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::env;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

lazy_static::lazy_static! {
    pub static ref METRIC_NAMESPACE: String =
        env::var("METRIC_NAMESPACE").unwrap_or_else(|_| "httptest_poller".to_string());

    /// Total httptest executions, labeled by outcome (`ok`, `fail_cfg`, `failed`).
    pub static ref HTTPTEST_EXECUTIONS_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("httptest_executions_total", "Total number of web scenario executions")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["status"]
        ).unwrap();

    /// Per-step wall-clock duration.
    pub static ref HTTPTEST_STEP_DURATION_SECONDS: HistogramVec =
        HistogramVec::new(
            prometheus::HistogramOpts::new(
                "httptest_step_duration_seconds",
                "Web scenario step duration in seconds"
            ).namespace(METRIC_NAMESPACE.as_str()),
            &["test", "step"]
        ).unwrap();

    /// Per-step response status codes observed.
    pub static ref HTTPTEST_STEP_STATUS_CODES_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("httptest_step_status_codes_total", "Response status codes observed per step")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["test", "step", "code"]
        ).unwrap();

    /// Number of web scenarios currently executing.
    pub static ref CONCURRENT_HTTPTESTS: Gauge =
        Gauge::with_opts(
            Opts::new("concurrent_httptests", "Number of web scenario executions currently in flight")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();

    /// Number of tests the scheduler found due on its most recent batch.
    pub static ref SCHEDULER_DUE_TESTS_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("scheduler_due_tests_total", "Total number of due tests leased by the scheduler loop")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["outcome"]
        ).unwrap();
}

/// Registers all metrics with the default Prometheus registry.
pub fn register_metrics() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    prometheus::default_registry().register(Box::new(HTTPTEST_EXECUTIONS_TOTAL.clone()))?;
    prometheus::default_registry().register(Box::new(HTTPTEST_STEP_DURATION_SECONDS.clone()))?;
    prometheus::default_registry().register(Box::new(HTTPTEST_STEP_STATUS_CODES_TOTAL.clone()))?;
    prometheus::default_registry().register(Box::new(CONCURRENT_HTTPTESTS.clone()))?;
    prometheus::default_registry().register(Box::new(SCHEDULER_DUE_TESTS_TOTAL.clone()))?;
    Ok(())
}

/// HTTP handler for the Prometheus metrics endpoint.
pub async fn metrics_handler(
    _req: Request<Body>,
    registry: Arc<Mutex<Registry>>,
) -> Result<Response<Body>, hyper::Error> {
    let encoder = TextEncoder::new();
    let metric_families = registry.lock().unwrap().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();

    let response = Response::builder()
        .status(200)
        .header("Content-Type", encoder.format_type())
        .body(Body::from(buffer))
        .unwrap();

    Ok(response)
}

/// Starts the Prometheus metrics HTTP server.
pub async fn start_metrics_server(port: u16, registry: Arc<Mutex<Registry>>) {
    let addr = ([0, 0, 0, 0], port).into();

    let make_svc = make_service_fn(move |_conn| {
        let registry_clone = registry.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                let registry_clone_inner = registry_clone.clone();
                async move { metrics_handler(req, registry_clone_inner).await }
            }))
        }
    });

    let server = Server::bind(&addr).serve(make_svc);
    info!(port = port, addr = %addr, "Metrics server listening");

    if let Err(e) = server.await {
        error!(error = %e, "Metrics server error");
    }
}

/// Gathers and encodes metrics as a string, for one-shot output.
pub fn gather_metrics_string(registry: &Arc<Mutex<Registry>>) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.lock().unwrap().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap_or_else(|e| {
        eprintln!("Error encoding metrics to UTF-8: {}", e);
        String::from("# ERROR ENCODING METRICS TO UTF-8")
    })
}
