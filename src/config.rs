use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default dashboard base URL.
fn default_base_url() -> String {
    "https://dash.hidencloud.com".to_string()
}

/// Default renewal period in days.
fn default_renew_days() -> u32 {
    10
}

/// Default per-request timeout (30 seconds).
fn default_request_timeout_secs() -> u64 {
    30
}

/// Default redirect hop cap.
fn default_max_redirects() -> usize {
    10
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_invoice_path() -> String {
    "/invoice/".to_string()
}

fn default_balance_topup_path() -> String {
    "balance/add".to_string()
}

/// A randomized sleep window in milliseconds.
///
/// The engine sleeps a uniformly random duration inside the window between
/// paced steps so request timing stays unpredictable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct JitterWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl JitterWindow {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A zero-width window, so paced code runs without sleeping in tests.
    pub const fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }
}

/// Pacing windows between workflow steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PacingConfig {
    /// Delay before each service is processed.
    pub service: JitterWindow,

    /// Delay between fetching the manage page and submitting the renewal.
    pub submit: JitterWindow,

    /// Delay between invoices within one service.
    pub invoice: JitterWindow,

    /// Delay between accounts.
    pub account: JitterWindow,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            service: JitterWindow::new(2_000, 4_000),
            submit: JitterWindow::new(1_000, 2_000),
            invoice: JitterWindow::new(3_000, 5_000),
            account: JitterWindow::new(3_000, 8_000),
        }
    }
}

impl PacingConfig {
    /// All-zero pacing, for tests and dry runs.
    pub fn none() -> Self {
        Self {
            service: JitterWindow::none(),
            submit: JitterWindow::none(),
            invoice: JitterWindow::none(),
            account: JitterWindow::none(),
        }
    }
}

/// Engine configuration.
///
/// Every field has a default, so an empty TOML file (or no file at all)
/// yields a working configuration pointed at the production dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Dashboard origin all relative paths resolve against.
    pub base_url: String,

    /// Days requested per renewal submission.
    pub renew_days: u32,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum redirect hops before an exchange fails.
    pub max_redirects: usize,

    /// Path fragment that marks a redirect to the login surface.
    pub login_path: String,

    /// Path fragment that marks an invoice page URL.
    pub invoice_path: String,

    /// Action fragment that marks the balance top-up form, which payment
    /// resolution must never submit.
    pub balance_topup_path: String,

    /// Pacing windows between steps.
    pub pacing: PacingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            renew_days: default_renew_days(),
            request_timeout_secs: default_request_timeout_secs(),
            max_redirects: default_max_redirects(),
            login_path: default_login_path(),
            invoice_path: default_invoice_path(),
            balance_topup_path: default_balance_topup_path(),
            pacing: PacingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL with any trailing slash removed, for path concatenation.
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
