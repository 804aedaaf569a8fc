//! Aggregated run outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOutcome {
    pub account_key: String,
    pub authenticated: bool,
    pub services_found: u32,
    pub services_renewed: u32,
    pub invoices_paid: u32,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AccountOutcome {
    pub fn new(account_key: impl Into<String>) -> Self {
        Self {
            account_key: account_key.into(),
            authenticated: false,
            services_found: 0,
            services_renewed: 0,
            invoices_paid: 0,
            errors: Vec::new(),
        }
    }
}

/// One full multi-account run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub accounts: Vec<AccountOutcome>,
}

impl RunSummary {
    pub fn total_renewed(&self) -> u32 {
        self.accounts.iter().map(|a| a.services_renewed).sum()
    }

    pub fn total_paid(&self) -> u32 {
        self.accounts.iter().map(|a| a.invoices_paid).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.accounts
            .iter()
            .any(|a| !a.errors.is_empty() || !a.authenticated)
    }

    /// Render the human-readable summary handed to the notification sink.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for account in &self.accounts {
            out.push_str(&format!("[{}]\n", account.account_key));
            if !account.authenticated {
                out.push_str("  not authenticated, skipped\n");
            } else {
                out.push_str(&format!(
                    "  services: {} found, {} renewed, {} invoices paid\n",
                    account.services_found, account.services_renewed, account.invoices_paid
                ));
            }
            for error in &account.errors {
                out.push_str(&format!("  error: {error}\n"));
            }
        }
        out.push_str(&format!(
            "total: {} renewed, {} paid across {} account(s)\n",
            self.total_renewed(),
            self.total_paid(),
            self.accounts.len()
        ));
        if self.total_paid() > 0 {
            // Payments are judged on HTTP status alone; a 200 error page
            // would still have counted. Callers deserve the caveat.
            out.push_str("note: payment success is inferred from HTTP 200 only\n");
        }
        out
    }
}
