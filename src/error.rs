//! Engine error taxonomy.
//!
//! Failures are isolated at the smallest meaningful unit (one invoice, one
//! service, one account) and surface in the aggregated run summary; no
//! single unit is allowed to take down a multi-account run.

/// Errors produced by the renewal engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Session verification landed on the login surface. Terminal for the
    /// account; the engine never attempts credential-based recovery.
    #[error("session is not authenticated (redirected to login)")]
    NotAuthenticated,

    /// Network or timeout failure during an exchange.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Redirect chain exceeded the hop cap.
    #[error("redirect loop: exceeded {hops} hops")]
    RedirectLoop { hops: usize },

    /// Expected token, form, or link was missing from the page.
    #[error("unexpected markup: {0}")]
    MarkupMismatch(String),

    /// A POST came back with a status the workflow does not recognize.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
}

impl EngineError {
    pub fn markup(what: impl Into<String>) -> Self {
        Self::MarkupMismatch(what.into())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
