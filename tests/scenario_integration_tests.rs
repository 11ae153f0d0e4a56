//! End-to-end executions of one test through `run_test`, against a real
//! (mocked) HTTP server, covering the happy path and the early-break
//! semantics on a failing step.

use httptest_poller::connection_pool::PoolConfig;
use httptest_poller::item_cache::{InMemoryItemCache, ItemHandle, ValueType};
use httptest_poller::macros::NoopMacroResolver;
use httptest_poller::model::{
    AuthMode, FollowRedirects, HttpStep, HttpTest, ItemBinding, PostType, RetrieveMode,
    StepItemKind, TestItemKind, TlsOptions,
};
use httptest_poller::preprocessing::InMemoryPreprocessingSink;
use httptest_poller::scenario_runner::{run_test, AlwaysRunning};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn base_test(host: &str) -> HttpTest {
    HttpTest {
        id: 1,
        name: "two step scenario".into(),
        hostid: 1,
        host: host.into(),
        agent: "integration-test-agent".into(),
        authentication: AuthMode::None,
        http_user: None,
        http_password: None,
        http_proxy: None,
        retries: 0,
        tls: TlsOptions::default(),
        delay: "60".into(),
        fields: vec![],
        item_bindings: vec![
            ItemBinding {
                kind: TestItemKind::Speed,
                itemid: 100,
            },
            ItemBinding {
                kind: TestItemKind::LastStep,
                itemid: 101,
            },
            ItemBinding {
                kind: TestItemKind::LastError,
                itemid: 102,
            },
        ],
        steps: vec![],
    }
}

fn seeded_cache(itemids: &[u64]) -> InMemoryItemCache {
    let cache = InMemoryItemCache::new();
    for &itemid in itemids {
        cache.insert(ItemHandle {
            itemid,
            hostid: 1,
            value_type: ValueType::Float,
            active: true,
            host_monitored: true,
            in_no_data_maintenance: false,
        });
    }
    cache
}

#[tokio::test]
async fn two_passing_steps_emit_zero_lastfailedstep() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/step1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok one"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/step2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok two"))
        .mount(&server)
        .await;

    let mut test = base_test(&server.uri());
    test.steps = vec![
        HttpStep {
            id: 1,
            no: 1,
            name: "first".into(),
            url: format!("{}/step1", server.uri()),
            timeout: "5".into(),
            posts: String::new(),
            required: String::new(),
            status_codes: "200".into(),
            post_type: PostType::Raw,
            follow_redirects: FollowRedirects::Off,
            retrieve_mode: RetrieveMode::Content,
            fields: vec![],
            item_bindings: vec![ItemBinding {
                kind: StepItemKind::RspCode,
                itemid: 1,
            }],
        },
        HttpStep {
            id: 2,
            no: 2,
            name: "second".into(),
            url: format!("{}/step2", server.uri()),
            timeout: "5".into(),
            posts: String::new(),
            required: String::new(),
            status_codes: "200".into(),
            post_type: PostType::Raw,
            follow_redirects: FollowRedirects::Off,
            retrieve_mode: RetrieveMode::Content,
            fields: vec![],
            item_bindings: vec![ItemBinding {
                kind: StepItemKind::RspCode,
                itemid: 2,
            }],
        },
    ];

    let resolver = NoopMacroResolver;
    let item_cache = seeded_cache(&[1, 2, 100, 101, 102]);
    let sink = InMemoryPreprocessingSink::new();

    let outcome = run_test(
        &test,
        &resolver,
        &item_cache,
        &sink,
        PoolConfig::default(),
        &AlwaysRunning,
        1_000,
    )
    .await;

    assert_eq!(outcome.lastfailedstep, 0);
    assert!(outcome.lasterror.is_none());
    assert_eq!(outcome.delay_seconds, 60);

    let submissions = sink.drain();
    // Two rspcode submissions (one per step), plus test-level speed/laststep
    // (lasterror is skipped because there was no failure).
    assert_eq!(submissions.len(), 4);
}

#[tokio::test]
async fn second_step_failing_status_code_stops_execution_and_sets_lasterror() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/step1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/step2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut test = base_test(&server.uri());
    test.steps = vec![
        HttpStep {
            id: 1,
            no: 1,
            name: "first".into(),
            url: format!("{}/step1", server.uri()),
            timeout: "5".into(),
            posts: String::new(),
            required: String::new(),
            status_codes: "200".into(),
            post_type: PostType::Raw,
            follow_redirects: FollowRedirects::Off,
            retrieve_mode: RetrieveMode::Content,
            fields: vec![],
            item_bindings: vec![],
        },
        HttpStep {
            id: 2,
            no: 2,
            name: "second".into(),
            url: format!("{}/step2", server.uri()),
            timeout: "5".into(),
            posts: String::new(),
            required: String::new(),
            status_codes: "200".into(),
            post_type: PostType::Raw,
            follow_redirects: FollowRedirects::Off,
            retrieve_mode: RetrieveMode::Content,
            fields: vec![],
            item_bindings: vec![],
        },
        HttpStep {
            id: 3,
            no: 3,
            name: "never reached".into(),
            url: format!("{}/step3", server.uri()),
            timeout: "5".into(),
            posts: String::new(),
            required: String::new(),
            status_codes: "200".into(),
            post_type: PostType::Raw,
            follow_redirects: FollowRedirects::Off,
            retrieve_mode: RetrieveMode::Content,
            fields: vec![],
            item_bindings: vec![],
        },
    ];

    let resolver = NoopMacroResolver;
    let item_cache = seeded_cache(&[100, 101, 102]);
    let sink = InMemoryPreprocessingSink::new();

    let outcome = run_test(
        &test,
        &resolver,
        &item_cache,
        &sink,
        PoolConfig::default(),
        &AlwaysRunning,
        1_000,
    )
    .await;

    assert_eq!(outcome.lastfailedstep, 2);
    assert!(outcome.lasterror.unwrap().contains("500"));

    let submissions = sink.drain();
    assert_eq!(submissions.len(), 3);
}
