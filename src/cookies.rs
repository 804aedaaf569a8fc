//! Cookie jar for a single-host dashboard session.
//!
//! The jar is the single source of truth for outgoing `Cookie` headers. It
//! must be folded from every response's `Set-Cookie` headers before the
//! next request is built, including mid-redirect, so a multi-hop chain
//! carries cookies set along the way.

/// Cookie attribute keys that may appear in a raw header string but are not
/// cookies themselves.
const ATTRIBUTE_KEYS: &[&str] = &["path", "domain", "expires", "httponly", "secure", "samesite"];

/// An ordered name -> value cookie map.
///
/// No eviction and no expiry: the engine talks to exactly one host and the
/// jar lives only as long as its session, so `Max-Age`/`Domain` scoping is
/// deliberately ignored.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw `Cookie`-header-style string (`a=1; b=2`).
    ///
    /// Attribute-only keys (`Path`, `HttpOnly`, ...) are dropped; duplicate
    /// keys keep the last value seen.
    pub fn parse(cookie_str: &str) -> Self {
        let mut jar = Self::new();
        jar.merge_str(cookie_str);
        jar
    }

    /// Merge another raw cookie string into the jar.
    pub fn merge_str(&mut self, cookie_str: &str) {
        for pair in cookie_str.split(';') {
            if let Some((key, value)) = pair.split_once('=') {
                let key = key.trim();
                let value = value.trim();
                if key.is_empty() {
                    continue;
                }
                if ATTRIBUTE_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                    continue;
                }
                self.set(key, value);
            }
        }
    }

    /// Set or overwrite a single cookie, preserving insertion order.
    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == name) {
            entry.1 = value.to_string();
        } else {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Fold `Set-Cookie` header values into the jar.
    ///
    /// Only the `name=value` part before the first `;` matters; attributes
    /// are discarded. Returns true if any cookie was added or changed, so
    /// callers know when to persist the refreshed session.
    pub fn apply_set_cookie<'a>(&mut self, headers: impl IntoIterator<Item = &'a str>) -> bool {
        let mut changed = false;
        for raw in headers {
            let first_part = raw.split(';').next().unwrap_or("");
            if let Some((key, value)) = first_part.split_once('=') {
                let key = key.trim();
                let value = value.trim();
                if key.is_empty() {
                    continue;
                }
                if self.get(key) != Some(value) {
                    self.set(key, value);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Render the jar as a `Cookie` request header value.
    pub fn header_value(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
