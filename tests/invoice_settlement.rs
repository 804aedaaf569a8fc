use std::sync::Arc;

use anyhow::Result;
use renewd::config::{EngineConfig, PacingConfig};
use renewd::invoice::{InvoiceOutcome, InvoiceResolver};
use renewd::session::Session;
use renewd::store::{CookieStore, MemoryCookieStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> EngineConfig {
    EngineConfig {
        base_url: server.uri(),
        pacing: PacingConfig::none(),
        ..Default::default()
    }
}

fn session_for(server: &MockServer, store: Arc<MemoryCookieStore>) -> Session {
    Session::new(&config_for(server), "acct", "session=valid", store).unwrap()
}

const SETTLED_INVOICE_HTML: &str = r#"<html><body>
  <p>Invoice #9 - Paid</p>
  <form action="/logout"><button>Log out</button></form>
</body></html>"#;

#[tokio::test]
async fn settled_invoice_resolves_the_same_way_twice() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoice/9"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SETTLED_INVOICE_HTML, "text/html"))
        .expect(2)
        .mount(&server)
        .await;

    let mut session = session_for(&server, Arc::new(MemoryCookieStore::new()));
    let mut resolver = InvoiceResolver::new(&mut session);

    let first = resolver.settle_invoice("/invoice/9").await?;
    let second = resolver.settle_invoice("/invoice/9").await?;
    assert_eq!(first, InvoiceOutcome::AlreadySettled);
    assert_eq!(second, InvoiceOutcome::AlreadySettled);

    // Resolution never POSTed anything.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.to_string() == "GET"));
    Ok(())
}

#[tokio::test]
async fn non_200_payment_is_an_anomaly_not_an_error() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoice/12"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<form action="/invoice/12/pay">
                 <input type="hidden" name="_token" value="t">
                 <button>Pay</button>
               </form>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/invoice/12/pay"))
        .respond_with(ResponseTemplate::new(419).set_body_raw("expired", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server, Arc::new(MemoryCookieStore::new()));
    let mut resolver = InvoiceResolver::new(&mut session);

    let outcome = resolver.settle_invoice("/invoice/12").await?;
    assert_eq!(outcome, InvoiceOutcome::AnomalousStatus(419));
    Ok(())
}

#[tokio::test]
async fn discovery_walks_each_unpaid_invoice_once() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/service/5/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<a href="/invoice/9">Invoice 9</a>
               <a href="/invoice/9">Invoice 9 again</a>
               <a href="/invoice/9/download">PDF</a>
               <a href="/invoice/11">Invoice 11</a>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    for invoice in ["9", "11"] {
        Mock::given(method("GET"))
            .and(path(format!("/invoice/{invoice}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(SETTLED_INVOICE_HTML, "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut session = session_for(&server, Arc::new(MemoryCookieStore::new()));
    let mut resolver = InvoiceResolver::new(&mut session);

    let stats = resolver.settle_service_invoices("5").await?;
    assert_eq!(stats.paid, 0);
    assert!(stats.anomalies.is_empty());
    Ok(())
}

#[tokio::test]
async fn refreshed_cookies_are_persisted_to_the_store() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=rotated; Path=/; HttpOnly")
                .set_body_raw("<html><body></body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCookieStore::new());
    let mut session = session_for(&server, store.clone());
    assert_eq!(session.account_key(), "acct");
    session.verify().await?;

    // A bare dashboard page carries no csrf meta token.
    assert_eq!(session.csrf_token(), None);

    let persisted = store.get("acct").await?.expect("cookie persisted");
    assert_eq!(persisted, "session=rotated");
    Ok(())
}
