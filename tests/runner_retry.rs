//! The stored-cookie-then-supplied-cookie retry is an explicit two-attempt
//! transition: stale cache falls back to the caller's cookie exactly once.

use std::sync::Arc;

use anyhow::Result;
use renewd::config::{EngineConfig, PacingConfig};
use renewd::notify::LogNotifier;
use renewd::runner::{AccountSpec, Runner};
use renewd::store::{CookieStore, MemoryCookieStore};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> EngineConfig {
    EngineConfig {
        base_url: server.uri(),
        pacing: PacingConfig::none(),
        ..Default::default()
    }
}

fn runner_with(server: &MockServer, store: Arc<MemoryCookieStore>) -> Runner {
    Runner::new(test_config(server), store, Arc::new(LogNotifier))
}

const EMPTY_DASHBOARD: &str =
    r#"<html><head><meta name="csrf-token" content="t"></head><body></body></html>"#;

#[tokio::test]
async fn stale_stored_cookie_falls_back_to_supplied_cookie() -> Result<()> {
    let server = MockServer::start().await;

    // The cached session bounces to login.
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .and(header("cookie", "session=stale"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>Log in</p>", "text/html"))
        .mount(&server)
        .await;

    // The caller-supplied cookie still works.
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .and(header("cookie", "session=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(EMPTY_DASHBOARD, "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCookieStore::new());
    store.set("acct", "session=stale").await?;

    let runner = runner_with(&server, store.clone());
    let summary = runner
        .run(&[AccountSpec::new("acct", "session=fresh")])
        .await;

    let outcome = &summary.accounts[0];
    assert!(outcome.authenticated);
    assert_eq!(outcome.services_found, 0);
    Ok(())
}

#[tokio::test]
async fn no_retry_when_supplied_cookie_matches_stored() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>Log in</p>", "text/html"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCookieStore::new());
    store.set("acct", "session=dead").await?;

    let runner = runner_with(&server, store.clone());
    let summary = runner
        .run(&[AccountSpec::new("acct", "session=dead")])
        .await;

    let outcome = &summary.accounts[0];
    assert!(!outcome.authenticated);
    assert!(outcome
        .errors
        .iter()
        .any(|e| e.contains("not authenticated")));
    Ok(())
}

#[tokio::test]
async fn one_bad_account_does_not_stop_the_next() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .and(header("cookie", "session=bad"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>Log in</p>", "text/html"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .and(header("cookie", "session=good"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(EMPTY_DASHBOARD, "text/html"))
        .mount(&server)
        .await;

    let runner = runner_with(&server, Arc::new(MemoryCookieStore::new()));
    let summary = runner
        .run(&[
            AccountSpec::new("first", "session=bad"),
            AccountSpec::new("second", "session=good"),
        ])
        .await;

    assert!(!summary.accounts[0].authenticated);
    assert!(summary.accounts[1].authenticated);
    Ok(())
}
