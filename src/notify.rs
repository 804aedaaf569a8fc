//! Notification sink seam.
//!
//! The engine produces a structured summary; delivering it anywhere real
//! (chat webhook, email, push) is a collaborator's job behind this trait.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Delivers the end-of-run summary. Invoked exactly once per run.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, title: &str, body: &str) -> Result<()>;
}

/// Default sink: writes the summary to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, title: &str, body: &str) -> Result<()> {
        info!(%title, "run summary:\n{body}");
        Ok(())
    }
}
