//! Error taxonomy for the scenario poller (§7): a closed `thiserror` enum
//! per module, aggregated into a single [`EngineError`] that the Scenario
//! Runner folds into one `err_str` per test.

use thiserror::Error;

/// Field Loader failures (§4.1).
#[derive(Error, Debug)]
pub enum FieldLoadError {
    #[error("macro expansion failed: {0}")]
    MacroExpansion(String),
    #[error("unknown field type for field {name}")]
    UnknownFieldType { name: String },
}

/// URL Composer failures (§4.2).
#[derive(Error, Debug)]
pub enum UrlComposeError {
    #[error("cannot encode unicode URL into punycode: {0}")]
    Punycode(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Header Assembler failures (§4.3).
#[derive(Error, Debug)]
pub enum HeaderAssembleError {
    #[error("invalid header line: {0}")]
    InvalidHeaderLine(String),
}

/// HTTP Driver failures (§4.4): transport errors only. A non-2xx/3xx status
/// is never represented here; it is a [`crate::evaluator`] concern.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("{message}: {detail}")]
    Transport { message: String, detail: String },
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("failed to prepare TLS material: {0}")]
    TlsPrepare(String),
}

/// Response Evaluator failures (§4.5). Display strings are the literal,
/// user-facing templates the specification calls for.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("response code \"{code}\" did not match any of the required status codes \"{list}\"")]
    StatusCodeMismatch { code: i64, list: String },
    #[error("required pattern \"{pattern}\" was not found on {url}")]
    RequiredPatternMissing { pattern: String, url: String },
    #[error("error in scenario variables \"{pairs}\": {reason}")]
    ScenarioVariableExtraction { pairs: String, reason: String },
    #[error("error in step variables \"{pairs}\": {reason}")]
    StepVariableExtraction { pairs: String, reason: String },
}

/// Variable-extraction failures, wrapped by [`EvaluatorError`] via `reason`.
#[derive(Error, Debug)]
pub enum VariableError {
    #[error("regex did not match")]
    RegexNoMatch,
    #[error("regex capture group {0} not found")]
    RegexGroupNotFound(usize),
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
    #[error("JSONPath query returned no results")]
    JsonPathNoMatch,
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("XPath query failed: {0}")]
    XPath(String),
}

/// The bounded `Result`-style error the `XML` helper object returns instead
/// of throwing through a `setjmp`/`longjmp` guard (§9 Design Notes).
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("invalid XML: {0}")]
    Parse(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XPath evaluation failed: {0}")]
    XPath(String),
}

/// Scheduler Loop failures (§4.8).
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("config store error: {0}")]
    ConfigStore(String),
}

/// Config store contract failures (§6).
#[derive(Error, Debug)]
pub enum ConfigStoreError {
    #[error("test {0} not found")]
    TestNotFound(u64),
    #[error("store query failed: {0}")]
    Query(String),
}

/// Single funnel every per-test error collapses into, mirroring the
/// original's single `err_str` (§7 "Propagation policy"). The Scenario
/// Runner converts whichever variant it catches into this and carries only
/// the rendered message from that point on.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    FieldLoad(#[from] FieldLoadError),
    #[error(transparent)]
    UrlCompose(#[from] UrlComposeError),
    #[error(transparent)]
    HeaderAssemble(#[from] HeaderAssembleError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),
    #[error("update interval \"{0}\" is invalid")]
    InvalidDelay(String),
    #[error("invalid timeout \"{0}\": {1}")]
    InvalidTimeout(String, String),
}
