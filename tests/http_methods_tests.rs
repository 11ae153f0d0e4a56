//! Exercises the method-selection and body-encoding rules the Scenario
//! Runner applies per step: GET when there is no body, POST with a raw
//! body, POST with form-encoded fields, and manual redirect following.

use httptest_poller::connection_pool::PoolConfig;
use httptest_poller::item_cache::InMemoryItemCache;
use httptest_poller::macros::NoopMacroResolver;
use httptest_poller::model::{
    AuthMode, FieldKind, FieldRow, FollowRedirects, HttpStep, HttpTest, PostType, RetrieveMode,
    TlsOptions,
};
use httptest_poller::preprocessing::InMemoryPreprocessingSink;
use httptest_poller::scenario_runner::{run_test, AlwaysRunning};

use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scenario(server: &MockServer, step: HttpStep) -> HttpTest {
    HttpTest {
        id: 1,
        name: "method test".into(),
        hostid: 1,
        host: server.uri(),
        agent: "method-test-agent".into(),
        authentication: AuthMode::None,
        http_user: None,
        http_password: None,
        http_proxy: None,
        retries: 0,
        tls: TlsOptions::default(),
        delay: "60".into(),
        fields: vec![],
        item_bindings: vec![],
        steps: vec![step],
    }
}

fn base_step(url: String) -> HttpStep {
    HttpStep {
        id: 1,
        no: 1,
        name: "step".into(),
        url,
        timeout: "5".into(),
        posts: String::new(),
        required: String::new(),
        status_codes: "200".into(),
        post_type: PostType::Raw,
        follow_redirects: FollowRedirects::Off,
        retrieve_mode: RetrieveMode::Content,
        fields: vec![],
        item_bindings: vec![],
    }
}

#[tokio::test]
async fn step_with_no_body_issues_a_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let test = scenario(&server, base_step(format!("{}/plain", server.uri())));
    let resolver = NoopMacroResolver;
    let item_cache = InMemoryItemCache::new();
    let sink = InMemoryPreprocessingSink::new();

    let outcome = run_test(
        &test,
        &resolver,
        &item_cache,
        &sink,
        PoolConfig::default(),
        &AlwaysRunning,
        0,
    )
    .await;
    assert_eq!(outcome.lastfailedstep, 0);
}

#[tokio::test]
async fn raw_post_type_sends_the_posts_string_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/raw"))
        .and(body_string("{\"raw\":true}"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut step = base_step(format!("{}/raw", server.uri()));
    step.posts = "{\"raw\":true}".to_string();
    step.post_type = PostType::Raw;

    let test = scenario(&server, step);
    let resolver = NoopMacroResolver;
    let item_cache = InMemoryItemCache::new();
    let sink = InMemoryPreprocessingSink::new();

    let outcome = run_test(
        &test,
        &resolver,
        &item_cache,
        &sink,
        PoolConfig::default(),
        &AlwaysRunning,
        0,
    )
    .await;
    assert_eq!(outcome.lastfailedstep, 0);
}

#[tokio::test]
async fn form_post_type_joins_encoded_fields_with_ampersand() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/form"))
        .and(body_string("user=jane%20doe&role=admin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut step = base_step(format!("{}/form", server.uri()));
    step.post_type = PostType::Form;
    step.fields = vec![
        FieldRow {
            name: "user".into(),
            value: "jane doe".into(),
            kind: FieldKind::PostField,
        },
        FieldRow {
            name: "role".into(),
            value: "admin".into(),
            kind: FieldKind::PostField,
        },
    ];

    let test = scenario(&server, step);
    let resolver = NoopMacroResolver;
    let item_cache = InMemoryItemCache::new();
    let sink = InMemoryPreprocessingSink::new();

    let outcome = run_test(
        &test,
        &resolver,
        &item_cache,
        &sink,
        PoolConfig::default(),
        &AlwaysRunning,
        0,
    )
    .await;
    assert_eq!(outcome.lastfailedstep, 0);
}

#[tokio::test]
async fn follow_redirects_on_chases_a_single_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/end", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/end"))
        .respond_with(ResponseTemplate::new(200).set_body_string("arrived"))
        .mount(&server)
        .await;

    let mut step = base_step(format!("{}/start", server.uri()));
    step.follow_redirects = FollowRedirects::On;

    let test = scenario(&server, step);
    let resolver = NoopMacroResolver;
    let item_cache = InMemoryItemCache::new();
    let sink = InMemoryPreprocessingSink::new();

    let outcome = run_test(
        &test,
        &resolver,
        &item_cache,
        &sink,
        PoolConfig::default(),
        &AlwaysRunning,
        0,
    )
    .await;
    assert_eq!(outcome.lastfailedstep, 0);
}

#[tokio::test]
async fn follow_redirects_off_evaluates_the_redirect_response_itself() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/end", server.uri())),
        )
        .mount(&server)
        .await;

    let mut step = base_step(format!("{}/start", server.uri()));
    step.follow_redirects = FollowRedirects::Off;
    step.status_codes = "200".into();

    let test = scenario(&server, step);
    let resolver = NoopMacroResolver;
    let item_cache = InMemoryItemCache::new();
    let sink = InMemoryPreprocessingSink::new();

    let outcome = run_test(
        &test,
        &resolver,
        &item_cache,
        &sink,
        PoolConfig::default(),
        &AlwaysRunning,
        0,
    )
    .await;
    assert_eq!(outcome.lastfailedstep, 1);
    assert!(outcome.lasterror.unwrap().contains("302"));
}
