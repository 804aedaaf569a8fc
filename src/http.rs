//! HTTP exchange layer for the dashboard.
//!
//! The dashboard leans on 302 redirects to move the browser between pages
//! (renew POST -> invoice page, stale session -> login), so the client is
//! built with redirects disabled and chases 301/302 hops itself. That keeps
//! the cookie jar authoritative mid-chain and lets callers see the URL an
//! action actually landed on.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::cookies::CookieJar;
use crate::error::{EngineError, EngineResult};

/// Outcome of one logical exchange after redirect resolution.
///
/// `final_url` is the URL actually reached; downstream logic uses it to
/// detect "did this action land on an invoice page".
#[derive(Debug)]
pub struct Exchange {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    pub final_url: String,
}

impl Exchange {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Cookie-authenticated HTTP client bound to a single dashboard origin.
pub struct DashboardClient {
    http: Client,
    origin: String,
    max_redirects: usize,
    jar: CookieJar,
    cookies_changed: bool,
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

impl DashboardClient {
    /// Create a client seeded with an existing cookie jar.
    ///
    /// Redirects must stay disabled on the underlying client; the exchange
    /// loop inspects status codes itself.
    pub fn new(config: &EngineConfig, jar: CookieJar) -> EngineResult<Self> {
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http,
            origin: config.origin().to_string(),
            max_redirects: config.max_redirects,
            jar,
            cookies_changed: false,
        })
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    /// Current jar rendered as a raw cookie string, for persistence.
    pub fn cookie_string(&self) -> String {
        self.jar.header_value()
    }

    /// True if any exchange since the last call refreshed the jar.
    pub fn take_cookies_changed(&mut self) -> bool {
        std::mem::take(&mut self.cookies_changed)
    }

    /// Resolve a possibly-relative path against the dashboard origin.
    pub fn resolve(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else if path_or_url.starts_with('/') {
            format!("{}{}", self.origin, path_or_url)
        } else {
            format!("{}/{}", self.origin, path_or_url)
        }
    }

    /// GET a page.
    pub async fn get(&mut self, path_or_url: &str) -> EngineResult<Exchange> {
        self.exchange(Method::GET, path_or_url, None, HeaderMap::new())
            .await
    }

    /// POST a form-encoded body with extra headers.
    pub async fn post_form(
        &mut self,
        path_or_url: &str,
        fields: &[(String, String)],
        extra_headers: HeaderMap,
    ) -> EngineResult<Exchange> {
        self.exchange(Method::POST, path_or_url, Some(fields.to_vec()), extra_headers)
            .await
    }

    /// Perform one logical exchange, following 301/302 hops manually.
    ///
    /// Redirect bodies are always dropped and every hop is a GET, matching
    /// browser semantics for 302 responses to non-GET requests. The jar is
    /// folded from each hop's `Set-Cookie` headers before the next request
    /// is built.
    pub async fn exchange(
        &mut self,
        method: Method,
        path_or_url: &str,
        form: Option<Vec<(String, String)>>,
        extra_headers: HeaderMap,
    ) -> EngineResult<Exchange> {
        let mut method = method;
        let mut url = self.resolve(path_or_url);
        let mut form = form;
        let mut extra_headers = Some(extra_headers);
        let mut hops = 0usize;

        loop {
            let mut request = self.http.request(method.clone(), &url);

            if let Some(fields) = &form {
                request = request.form(fields);
            }

            // Fixed browser-identity headers first, then the caller's
            // extras (extras win), then Cookie recomputed from the jar,
            // which always wins so mid-chain refreshes are never stale.
            let mut headers = Self::browser_headers(&self.origin);
            if method == Method::POST && form.is_some() {
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
            }
            if let Some(extras) = extra_headers.take() {
                for (name, value) in extras.iter() {
                    headers.insert(name.clone(), value.clone());
                }
            }
            if !self.jar.is_empty() {
                if let Ok(cookie) = HeaderValue::from_str(&self.jar.header_value()) {
                    headers.insert(COOKIE, cookie);
                }
            }

            trace!(%method, %url, "exchange");
            let response = request.headers(headers).send().await?;

            let status = response.status();
            let headers = response.headers().clone();

            let set_cookies = headers
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok());
            if self.jar.apply_set_cookie(set_cookies) {
                self.cookies_changed = true;
            }

            let location = headers.get(LOCATION).and_then(|v| v.to_str().ok());
            if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND {
                if let Some(location) = location {
                    hops += 1;
                    if hops > self.max_redirects {
                        return Err(EngineError::RedirectLoop {
                            hops: self.max_redirects,
                        });
                    }
                    let next = self.resolve(location);
                    debug!(from = %url, to = %next, "following redirect");
                    method = Method::GET;
                    form = None;
                    url = next;
                    continue;
                }
            }

            let body = response.text().await?;
            return Ok(Exchange {
                status,
                headers,
                body,
                final_url: url,
            });
        }
    }

    fn browser_headers(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            "sec-ch-ua",
            HeaderValue::from_static(
                "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
            ),
        );
        headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
        if let Ok(referer) = HeaderValue::from_str(&format!("{origin}/")) {
            headers.insert(reqwest::header::REFERER, referer);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn client() -> DashboardClient {
        let config = EngineConfig {
            base_url: "https://dash.example.com".to_string(),
            ..Default::default()
        };
        DashboardClient::new(&config, CookieJar::new()).unwrap()
    }

    #[test]
    fn resolve_keeps_absolute_urls() {
        let c = client();
        assert_eq!(
            c.resolve("https://elsewhere.example.com/x"),
            "https://elsewhere.example.com/x"
        );
    }

    #[test]
    fn resolve_joins_root_relative_paths() {
        let c = client();
        assert_eq!(
            c.resolve("/service/5/manage"),
            "https://dash.example.com/service/5/manage"
        );
    }

    #[test]
    fn resolve_inserts_missing_slash() {
        let c = client();
        assert_eq!(c.resolve("dashboard"), "https://dash.example.com/dashboard");
    }
}
