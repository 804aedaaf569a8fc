//! Authenticated dashboard session for one account.
//!
//! A `Session` owns the cookie-carrying client, the cached page-level
//! anti-forgery token, and the list of services discovered on the
//! dashboard. It is created per account at workflow start and discarded at
//! the end of the account's run; its final cookie state is pushed through
//! the injected `CookieStore` whenever the dashboard refreshes it.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::cookies::CookieJar;
use crate::error::{EngineError, EngineResult};
use crate::html::Page;
use crate::http::{DashboardClient, Exchange};
use crate::store::CookieStore;

const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// A manageable service discovered on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: String,
    pub manage_path: String,
}

/// One account's authenticated session state.
pub struct Session {
    client: DashboardClient,
    config: EngineConfig,
    account_key: String,
    store: Arc<dyn CookieStore>,
    csrf_token: Option<String>,
    services: Vec<Service>,
}

impl Session {
    /// Create a session seeded with a raw cookie string the caller believes
    /// is valid. Nothing is verified until `verify` runs.
    pub fn new(
        config: &EngineConfig,
        account_key: impl Into<String>,
        cookie_str: &str,
        store: Arc<dyn CookieStore>,
    ) -> EngineResult<Self> {
        let jar = CookieJar::parse(cookie_str);
        let client = DashboardClient::new(config, jar)?;
        Ok(Self {
            client,
            config: config.clone(),
            account_key: account_key.into(),
            store,
            csrf_token: None,
            services: Vec::new(),
        })
    }

    pub fn account_key(&self) -> &str {
        &self.account_key
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// Verify the session is still authenticated and enumerate services.
    ///
    /// A redirect landing on the login surface is terminal for the account;
    /// establishing a fresh session is the caller's job, not the engine's.
    pub async fn verify(&mut self) -> EngineResult<Vec<Service>> {
        debug!(account = %self.account_key, "verifying session");
        let exchange = self.get("/dashboard").await?;

        if exchange.final_url.contains(&self.config.login_path) {
            info!(account = %self.account_key, "session rejected, landed on login");
            return Err(EngineError::NotAuthenticated);
        }

        {
            let page = Page::parse(&exchange.body);
            if let Some(token) = page.csrf_meta_token() {
                self.csrf_token = Some(token);
            }
            self.services = page
                .service_links()
                .into_iter()
                .map(|(id, manage_path)| Service { id, manage_path })
                .collect();
        }

        info!(
            account = %self.account_key,
            services = self.services.len(),
            "session verified"
        );
        Ok(self.services.clone())
    }

    /// GET a page, persisting any cookie refresh.
    pub async fn get(&mut self, path_or_url: &str) -> EngineResult<Exchange> {
        let exchange = self.client.get(path_or_url).await?;
        self.persist_refreshed_cookies().await;
        Ok(exchange)
    }

    /// POST a form with the anti-forgery header and a `Referer`, persisting
    /// any cookie refresh.
    pub async fn post_form(
        &mut self,
        path_or_url: &str,
        fields: &[(String, String)],
        referer: &str,
    ) -> EngineResult<Exchange> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.csrf_token {
            if let Ok(value) = HeaderValue::from_str(token) {
                headers.insert(CSRF_HEADER, value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(REFERER, value);
        }

        let exchange = self.client.post_form(path_or_url, fields, headers).await?;
        self.persist_refreshed_cookies().await;
        Ok(exchange)
    }

    /// Resolve a possibly-relative path against the dashboard origin.
    pub fn resolve(&self, path_or_url: &str) -> String {
        self.client.resolve(path_or_url)
    }

    /// Current cookie state, for callers that persist on their own terms.
    pub fn cookie_string(&self) -> String {
        self.client.cookie_string()
    }

    /// Push the refreshed cookie string to the store when the last exchange
    /// changed the jar. Store failures are logged, never fatal: a renewal
    /// run must not die because the cache is unwritable.
    async fn persist_refreshed_cookies(&mut self) {
        if !self.client.take_cookies_changed() {
            return;
        }
        let cookie = self.client.cookie_string();
        if let Err(err) = self.store.set(&self.account_key, &cookie).await {
            warn!(account = %self.account_key, error = %err, "failed to persist refreshed cookies");
        } else {
            debug!(account = %self.account_key, "persisted refreshed cookies");
        }
    }
}
