//! §4.7 Scenario Runner: the state machine that drives one test execution
//! end to end, owning the per-test [`MacroCache`] and the test-scope and
//! step-scope [`VariableScope`]s, and funneling every collaborator's error
//! into the single `err_str` the original design propagates (§7).

use reqwest::Method;
use tracing::{debug, error, info};

use crate::connection_pool::PoolConfig;
use crate::errors::EngineError;
use crate::evaluator::{evaluate, EvaluationInputs};
use crate::field_loader::load_fields;
use crate::header_assembler::{assemble_headers, join_headers};
use crate::http_driver::{DriverSession, StepRequest};
use crate::item_cache::ItemCache;
use crate::macros::{substitute_variables, MacroCache, MacroMode, MacroResolver};
use crate::metric_emitter::{emit_step_metrics, emit_test_metrics, TestOutcome};
use crate::metrics::{
    CONCURRENT_HTTPTESTS, HTTPTEST_EXECUTIONS_TOTAL, HTTPTEST_STEP_DURATION_SECONDS,
    HTTPTEST_STEP_STATUS_CODES_TOTAL,
};
use crate::model::{HttpStep, HttpTest, PostType, StepStats, VariableScope};
use crate::preprocessing::PreprocessingSink;
use crate::status_codes::StatusCodeList;
use crate::url_composer::compose_url;
use crate::utils::parse_time_suffix;

/// Default requeue interval, used whenever a test's own delay can't be
/// resolved (invalid delay string, or a configuration failure before the
/// delay is even consulted).
pub const DEFAULT_INTERVAL: u64 = 60;

const MIN_TIMEOUT_SECONDS: u64 = 1;
const MAX_TIMEOUT_SECONDS: u64 = 3600;

/// What a shutdown-aware caller polls between suspension points (§5).
pub trait ShutdownSignal {
    fn is_running(&self) -> bool;
}

/// Always running; used by callers that don't need graceful shutdown (unit
/// tests, the demonstration binary's single-shot mode).
pub struct AlwaysRunning;

impl ShutdownSignal for AlwaysRunning {
    fn is_running(&self) -> bool {
        true
    }
}

/// Keeps `concurrent_httptests` accurate across every early-return path in
/// [`run_test`] by decrementing on drop rather than at each `return`.
struct ConcurrencyGuard;

impl ConcurrencyGuard {
    fn acquire() -> Self {
        CONCURRENT_HTTPTESTS.inc();
        Self
    }
}

impl Drop for ConcurrencyGuard {
    fn drop(&mut self) {
        CONCURRENT_HTTPTESTS.dec();
    }
}

/// The result of running one test to completion, ready for the Scheduler
/// Loop to requeue with.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub lastfailedstep: u32,
    pub lasterror: Option<String>,
    pub delay_seconds: u64,
}

/// Applies unmasked macro expansion then variable substitution to a raw
/// step attribute (url or body) that isn't itself a field row but still
/// ends up on the wire (§4.1's value-treatment, generalized to the step's
/// own template strings).
fn expand_wire_text(
    resolver: &dyn MacroResolver,
    cache: &mut MacroCache,
    hostid: u64,
    scope: &VariableScope,
    text: &str,
) -> Result<String, String> {
    let expanded = cache.resolve(resolver, text, hostid, MacroMode::Unmasked)?;
    Ok(substitute_variables(scope, &expanded))
}

/// Runs `test` to completion against real collaborators, returning the
/// outcome the Scheduler Loop requeues with. Never returns an `Err`: every
/// failure funnels into `RunOutcome::lasterror` per §7's "propagation
/// policy" — the scheduler only ever sees "test complete, here's its
/// outcome."
#[allow(clippy::too_many_arguments)]
pub async fn run_test(
    test: &HttpTest,
    resolver: &dyn MacroResolver,
    item_cache: &dyn ItemCache,
    sink: &dyn PreprocessingSink,
    pool_config: PoolConfig,
    shutdown: &dyn ShutdownSignal,
    now: i64,
) -> RunOutcome {
    info!(testid = test.id, host = %test.host, name = %test.name, "starting test execution");
    let _concurrency = ConcurrencyGuard::acquire();

    let delay_seconds = match parse_time_suffix(&test.delay) {
        Ok(seconds) => seconds,
        Err(_) => {
            let lasterror = EngineError::InvalidDelay(test.delay.clone()).to_string();
            error!(testid = test.id, error = %lasterror, "FAIL_CFG: invalid delay");
            let outcome = TestOutcome {
                speed: 0.0,
                laststep: 1,
                lasterror: Some(lasterror.clone()),
            };
            emit_test_metrics(item_cache, sink, now, &test.item_bindings, &outcome);
            sink.flush();
            HTTPTEST_EXECUTIONS_TOTAL.with_label_values(&["fail_cfg"]).inc();
            return RunOutcome {
                lastfailedstep: 1,
                lasterror: Some(lasterror),
                delay_seconds: DEFAULT_INTERVAL,
            };
        }
    };

    let mut cache = MacroCache::new();
    let mut test_scope = VariableScope::new();

    let test_fields = match load_fields(resolver, &mut cache, test.hostid, &test_scope, &test.fields) {
        Ok(fields) => fields,
        Err(e) => {
            let lasterror = e.to_string();
            error!(testid = test.id, error = %lasterror, "FAIL_CFG: load_test_fields failed");
            return finish_with_fail_cfg(item_cache, sink, test, 1, lasterror, delay_seconds, now);
        }
    };
    // `test_fields.variables` holds *definitions* (literal/regex/xpath/
    // jsonpath expressions), not values — they are (re-)evaluated against
    // each step's body by the Response Evaluator, never pre-seeded here.
    let test_variable_defs = test_fields.variables;
    let test_headers = test_fields.headers;

    let driver = match DriverSession::build(test, pool_config) {
        Ok(driver) => driver,
        Err(e) => {
            let lasterror = e.to_string();
            error!(testid = test.id, error = %lasterror, "FAIL_CFG: open_driver failed");
            return finish_with_fail_cfg(item_cache, sink, test, 1, lasterror, delay_seconds, now);
        }
    };

    let mut lastfailedstep: u32 = 0;
    let mut lasterror: Option<String> = None;
    let mut speeds: Vec<f64> = Vec::new();

    for step in &test.steps {
        if !shutdown.is_running() {
            debug!(testid = test.id, step = step.no, "shutdown observed before step dispatch");
            break;
        }

        match run_step(
            resolver,
            &mut cache,
            &driver,
            test,
            step,
            &mut test_scope,
            &test_headers,
            &test_variable_defs,
            item_cache,
            sink,
            now,
        )
        .await
        {
            Ok(StepOutcome { speed_download, evaluation }) => {
                speeds.push(speed_download);
                if let Err(e) = evaluation {
                    lastfailedstep = step.no;
                    lasterror = Some(e);
                    break;
                }
            }
            Err(e) => {
                lastfailedstep = step.no;
                lasterror = Some(e);
                break;
            }
        }

        if !shutdown.is_running() {
            debug!(testid = test.id, step = step.no, "shutdown observed after step perform");
            break;
        }
    }

    let speed = if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    };

    let outcome = TestOutcome {
        speed,
        laststep: lastfailedstep,
        lasterror: lasterror.clone(),
    };
    emit_test_metrics(item_cache, sink, now, &test.item_bindings, &outcome);
    sink.flush();
    HTTPTEST_EXECUTIONS_TOTAL
        .with_label_values(&[if lasterror.is_some() { "failed" } else { "ok" }])
        .inc();

    info!(
        testid = test.id,
        lastfailedstep,
        had_error = lasterror.is_some(),
        "test execution complete"
    );

    RunOutcome {
        lastfailedstep,
        lasterror,
        delay_seconds,
    }
}

fn finish_with_fail_cfg(
    item_cache: &dyn ItemCache,
    sink: &dyn PreprocessingSink,
    test: &HttpTest,
    lastfailedstep: u32,
    lasterror: String,
    delay_seconds: u64,
    now: i64,
) -> RunOutcome {
    let outcome = TestOutcome {
        speed: 0.0,
        laststep: lastfailedstep,
        lasterror: Some(lasterror.clone()),
    };
    emit_test_metrics(item_cache, sink, now, &test.item_bindings, &outcome);
    sink.flush();
    HTTPTEST_EXECUTIONS_TOTAL.with_label_values(&["fail_cfg"]).inc();
    RunOutcome {
        lastfailedstep,
        lasterror: Some(lasterror),
        delay_seconds,
    }
}

struct StepOutcome {
    speed_download: f64,
    /// `Ok(())` if the evaluator passed; `Err(message)` if it didn't. Either
    /// way the driver's stats have already been emitted by the time this is
    /// returned.
    evaluation: Result<(), String>,
}

#[allow(clippy::too_many_arguments)]
async fn run_step(
    resolver: &dyn MacroResolver,
    cache: &mut MacroCache,
    driver: &DriverSession,
    test: &HttpTest,
    step: &HttpStep,
    test_scope: &mut VariableScope,
    test_headers: &[(String, String)],
    test_variable_defs: &[(String, String)],
    item_cache: &dyn ItemCache,
    sink: &dyn PreprocessingSink,
    now: i64,
) -> Result<StepOutcome, String> {
    let mut step_scope = VariableScope::new();

    let step_fields = load_fields(resolver, cache, test.hostid, test_scope, &step.fields)
        .map_err(|e| e.to_string())?;
    for (name, value) in &step_fields.variables {
        step_scope.set(name.clone(), value.clone());
    }

    let chosen_headers: &[(String, String)] = if step_fields.headers.is_empty() {
        test_headers
    } else {
        &step_fields.headers
    };
    let raw_headers = join_headers(chosen_headers);
    let assembled = assemble_headers(&raw_headers);

    let url_template = expand_wire_text(resolver, cache, test.hostid, test_scope, &step.url)?;
    let url = compose_url(&url_template, &step_fields.query_fields).map_err(|e| e.to_string())?;

    let timeout_seconds = parse_time_suffix(&step.timeout)
        .ok()
        .filter(|&t| (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&t))
        .ok_or_else(|| {
            EngineError::InvalidTimeout(
                step.timeout.clone(),
                "must resolve to 1-3600 seconds".to_string(),
            )
            .to_string()
        })?;

    let body = match step.post_type {
        PostType::Raw => {
            let posts = expand_wire_text(resolver, cache, test.hostid, &*test_scope, &step.posts)?;
            if posts.is_empty() {
                None
            } else {
                Some(posts)
            }
        }
        PostType::Form => {
            if step_fields.post_fields.is_empty() {
                None
            } else {
                Some(
                    step_fields
                        .post_fields
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join("&"),
                )
            }
        }
    };
    let method = if body.is_some() { Method::POST } else { Method::GET };

    let status_codes = StatusCodeList::parse(&step.status_codes).unwrap_or_default();

    let req = StepRequest {
        method,
        url: &url,
        headers: &assembled.headers,
        cookie: assembled.cookie.as_deref(),
        body: body.as_deref(),
        timeout: std::time::Duration::from_secs(timeout_seconds),
        follow_redirects: step.follow_redirects,
        retrieve_mode: step.retrieve_mode,
    };

    let (stats, evaluation) = match driver.perform(&req, test.retries).await {
        Ok(resp) => {
            HTTPTEST_STEP_DURATION_SECONDS
                .with_label_values(&[&test.name, &step.no.to_string()])
                .observe(resp.stats.total_time);
            HTTPTEST_STEP_STATUS_CODES_TOTAL
                .with_label_values(&[&test.name, &step.no.to_string(), &resp.stats.response_code.to_string()])
                .inc();
            let eval_inputs = EvaluationInputs {
                response_code: resp.stats.response_code,
                body: resp.body.as_deref().unwrap_or(""),
                url: &url,
                status_codes: &status_codes,
                status_codes_raw: &step.status_codes,
                required: &step.required,
                test_variables: test_variable_defs,
                step_variables: &step_fields.variables,
            };
            let result = evaluate(&eval_inputs, test_scope, &mut step_scope)
                .map_err(|e| e.to_string());
            (resp.stats, result)
        }
        Err(e) => (StepStats::default(), Err(e.to_string())),
    };

    emit_step_metrics(item_cache, sink, now, &step.item_bindings, &stats);

    Ok(StepOutcome {
        speed_download: stats.speed_download,
        evaluation,
    })
}
