//! Multi-account run driver.
//!
//! Accounts are processed strictly sequentially with jitter between them;
//! parallel runs against the same host invite correlated rate-limiting.
//! Nothing raised by one account is allowed to terminate the run: every
//! failure lands in the aggregated summary instead.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::notify::Notifier;
use crate::pace;
use crate::renewal::RenewalWorkflow;
use crate::report::{AccountOutcome, RunSummary};
use crate::session::Session;
use crate::store::CookieStore;

/// One account to process: its identity plus the caller-supplied cookie
/// used when no fresher stored session exists.
#[derive(Debug, Clone)]
pub struct AccountSpec {
    pub key: String,
    pub cookie: String,
}

impl AccountSpec {
    pub fn new(key: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cookie: cookie.into(),
        }
    }
}

/// Drives a full run across accounts and sends the summary once at the end.
pub struct Runner {
    config: EngineConfig,
    store: Arc<dyn CookieStore>,
    notifier: Arc<dyn Notifier>,
}

impl Runner {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn CookieStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
        }
    }

    /// Process every account sequentially and notify once.
    pub async fn run(&self, accounts: &[AccountSpec]) -> RunSummary {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(accounts.len());

        for (index, account) in accounts.iter().enumerate() {
            if index > 0 {
                pace::jitter(self.config.pacing.account).await;
            }
            info!(account = %account.key, "starting account");
            outcomes.push(self.process_account(account).await);
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            accounts: outcomes,
        };

        if let Err(err) = self
            .notifier
            .send("Service renewal summary", &summary.render())
            .await
        {
            error!(error = %err, "failed to deliver run summary");
        }

        summary
    }

    /// Process one account with the two-attempt cookie fallback.
    ///
    /// Attempt one prefers the stored cookie (it may be fresher than what
    /// the caller supplied). If that session is rejected and the supplied
    /// cookie differs, attempt two uses the supplied cookie. There is no
    /// third attempt; establishing new credentials is out of scope.
    async fn process_account(&self, account: &AccountSpec) -> AccountOutcome {
        let stored = match self.store.get(&account.key).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(account = %account.key, error = %err, "cookie store read failed");
                None
            }
        };

        let first_cookie = stored.clone().unwrap_or_else(|| account.cookie.clone());
        let first = self.attempt(&account.key, &first_cookie).await;

        match first {
            Ok(outcome) => outcome,
            Err(EngineError::NotAuthenticated) => {
                let fallback_differs = stored.as_deref().is_some_and(|s| s != account.cookie);
                if !fallback_differs {
                    return Self::failed_outcome(&account.key, &EngineError::NotAuthenticated);
                }
                info!(account = %account.key, "stored session rejected, retrying with supplied cookie");
                match self.attempt(&account.key, &account.cookie).await {
                    Ok(outcome) => outcome,
                    Err(err) => Self::failed_outcome(&account.key, &err),
                }
            }
            Err(err) => Self::failed_outcome(&account.key, &err),
        }
    }

    /// One verification-plus-workflow pass with a specific cookie string.
    async fn attempt(&self, key: &str, cookie: &str) -> Result<AccountOutcome, EngineError> {
        let mut session = Session::new(&self.config, key, cookie, self.store.clone())?;
        let services = session.verify().await?;

        let mut outcome = AccountOutcome::new(key);
        outcome.authenticated = true;
        outcome.services_found = services.len() as u32;

        let stats = RenewalWorkflow::new(&mut session).run().await;
        outcome.services_renewed = stats.renewed;
        outcome.invoices_paid = stats.invoices_paid;
        outcome.errors = stats.errors;
        Ok(outcome)
    }

    fn failed_outcome(key: &str, err: &EngineError) -> AccountOutcome {
        warn!(account = %key, error = %err, "account failed");
        let mut outcome = AccountOutcome::new(key);
        outcome.errors.push(err.to_string());
        outcome
    }
}
