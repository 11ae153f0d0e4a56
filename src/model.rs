//! Core data types for one HTTP test scenario: tests, steps, fields, and the
//! variable scopes that substitution and extraction read and write.

use indexmap::IndexMap;

/// Authentication mode attached to a test. Credentials, when required, live
/// alongside on [`HttpTest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Basic,
    Ntlm,
    Digest,
    Kerberos,
    Bearer,
}

/// How a step's body is encoded before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostType {
    /// `posts` is sent as-is.
    Raw,
    /// `post_fields` are form-encoded and joined with `&`.
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowRedirects {
    Off,
    On,
}

/// Controls which callbacks the HTTP driver wires up and whether the request
/// is issued with `NOBODY` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveMode {
    Content,
    Headers,
    Both,
}

/// TLS material for a test's driver session.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub key_password: Option<String>,
    pub verify_peer: bool,
    pub verify_host: bool,
}

/// One monitoring scenario: a named, ordered sequence of steps sharing a
/// driver session (cookie jar, TLS material, auth).
#[derive(Debug, Clone)]
pub struct HttpTest {
    pub id: u64,
    pub name: String,
    pub hostid: u64,
    pub host: String,
    pub agent: String,
    pub authentication: AuthMode,
    pub http_user: Option<String>,
    pub http_password: Option<String>,
    pub http_proxy: Option<String>,
    pub retries: u32,
    pub tls: TlsOptions,
    /// Raw delay string, e.g. "1m", "30s"; resolved to seconds by the runner.
    pub delay: String,
    /// Test-scope field rows (headers and variables only; query/post fields
    /// are meaningless outside a step and are ignored if present).
    pub fields: Vec<FieldRow>,
    /// Item bindings for test-level metrics (speed, laststep, lasterror).
    pub item_bindings: Vec<ItemBinding<TestItemKind>>,
    pub steps: Vec<HttpStep>,
}

/// One request within a test.
#[derive(Debug, Clone)]
pub struct HttpStep {
    pub id: u64,
    pub no: u32,
    pub name: String,
    pub url: String,
    /// Raw timeout string; resolves to 1-3600 seconds.
    pub timeout: String,
    pub posts: String,
    pub required: String,
    pub status_codes: String,
    pub post_type: PostType,
    pub follow_redirects: FollowRedirects,
    pub retrieve_mode: RetrieveMode,
    pub fields: Vec<FieldRow>,
    /// Item bindings for step-level metrics (rspcode, time, speed).
    pub item_bindings: Vec<ItemBinding<StepItemKind>>,
}

/// The three item kinds a step's response can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepItemKind {
    RspCode,
    Time,
    Speed,
}

/// The three item kinds a completed test can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestItemKind {
    Speed,
    LastStep,
    LastError,
}

/// One `httptestitem`/`httpstepitem` row: a metric kind bound to a concrete
/// item to forward a value to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemBinding<K> {
    pub kind: K,
    pub itemid: u64,
}

/// A field row as loaded from the config store, prior to classification.
#[derive(Debug, Clone)]
pub struct FieldRow {
    pub name: String,
    pub value: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Header,
    Variable,
    QueryField,
    PostField,
}

/// A classified field, grouped by what it contributes to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Header(String, String),
    Variable(String, String),
    QueryField(String, String),
    PostField(String, String),
}

/// Ordered (name, value) pairs classified out of a field list. Order mirrors
/// field-id order from the config store because that becomes wire order.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedFields {
    pub headers: Vec<(String, String)>,
    pub variables: Vec<(String, String)>,
    pub query_fields: Vec<(String, String)>,
    pub post_fields: Vec<(String, String)>,
}

impl ClassifiedFields {
    pub fn push(&mut self, field: Field) {
        match field {
            Field::Header(k, v) => self.headers.push((k, v)),
            Field::Variable(k, v) => self.variables.push((k, v)),
            Field::QueryField(k, v) => self.query_fields.push((k, v)),
            Field::PostField(k, v) => self.post_fields.push((k, v)),
        }
    }
}

/// An ordered name -> value scope. Two of these exist per test: one at
/// test-scope (alive for the whole test) and one at step-scope (recreated
/// per step). Insertion order is preserved because it backs log messages
/// such as `"a=1 b=2"` in the evaluator's error templates.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    values: IndexMap<String, String>,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Renders as `"k1=v1 k2=v2"`, used in evaluator error messages (§4.5).
    pub fn format_pairs(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Per-step stats gathered by the HTTP driver, zeroed before each attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepStats {
    pub response_code: i64,
    pub total_time: f64,
    pub speed_download: f64,
}
