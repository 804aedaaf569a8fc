//! Invoice discovery and payment.
//!
//! Two entry points: discovery mode walks a service's unpaid-invoice
//! listing and settles each invoice in turn; direct mode starts from an
//! invoice page the renewal redirect already landed on.
//!
//! An invoice page without a payment form is a normal terminal state, not a
//! failure: the dashboard renders no form once an invoice is settled.

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::html::{Page, PaymentForm};
use crate::pace;
use crate::session::Session;

/// Terminal state of one invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceOutcome {
    /// The payment POST came back 200.
    ///
    /// That status is the only success signal the dashboard gives; the body
    /// is never inspected, so a 200 error page would still count. The run
    /// summary flags this.
    Paid,

    /// No payment form on the page; nothing left to do.
    AlreadySettled,

    /// The payment POST returned something other than 200. Recorded as an
    /// anomaly, never escalated.
    AnomalousStatus(u16),
}

/// Aggregate of one discovery pass over a service's unpaid invoices.
#[derive(Debug, Default)]
pub struct InvoiceStats {
    pub paid: u32,
    pub anomalies: Vec<String>,
}

/// Settles invoices against an authenticated session.
pub struct InvoiceResolver<'a> {
    session: &'a mut Session,
}

impl<'a> InvoiceResolver<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// Discovery mode: list a service's unpaid invoices and settle each.
    pub async fn settle_service_invoices(&mut self, service_id: &str) -> EngineResult<InvoiceStats> {
        let listing_path = format!("/service/{service_id}/invoices?where=unpaid");
        let exchange = self.session.get(&listing_path).await?;

        let invoice_path = self.session.config().invoice_path.clone();
        let links = Page::parse(&exchange.body).invoice_links(&invoice_path);

        if links.is_empty() {
            info!(service = service_id, "no unpaid invoices");
            return Ok(InvoiceStats::default());
        }

        let pacing = self.session.config().pacing.invoice;
        let mut stats = InvoiceStats::default();
        for link in links {
            match self.settle_invoice(&link).await {
                Ok(outcome) => stats.record(&link, outcome),
                Err(err) => {
                    warn!(invoice = %link, error = %err, "invoice settlement failed");
                    stats.anomalies.push(format!("invoice {link}: {err}"));
                }
            }
            pace::jitter(pacing).await;
        }
        Ok(stats)
    }

    /// Open one invoice page and settle it.
    pub async fn settle_invoice(&mut self, invoice_url: &str) -> EngineResult<InvoiceOutcome> {
        info!(invoice = %invoice_url, "opening invoice");
        let exchange = self.session.get(invoice_url).await?;
        let final_url = exchange.final_url.clone();
        self.settle_from_page(&exchange.body, &final_url).await
    }

    /// Direct mode: settle from an already-fetched invoice page.
    pub async fn settle_from_page(
        &mut self,
        html: &str,
        invoice_url: &str,
    ) -> EngineResult<InvoiceOutcome> {
        let form = {
            let topup = self.session.config().balance_topup_path.clone();
            Page::parse(html).payment_form(&topup)
        };

        let Some(form) = form else {
            info!(invoice = %invoice_url, "no payment form, treating as settled");
            return Ok(InvoiceOutcome::AlreadySettled);
        };

        self.submit_payment(&form, invoice_url).await
    }

    /// Resubmit the payment form with all hidden fields intact.
    async fn submit_payment(
        &mut self,
        form: &PaymentForm,
        invoice_url: &str,
    ) -> EngineResult<InvoiceOutcome> {
        info!(invoice = %invoice_url, action = %form.action, "submitting payment");
        let referer = self.session.resolve(invoice_url);
        let exchange = self
            .session
            .post_form(&form.action, &form.fields, &referer)
            .await?;

        if exchange.status == StatusCode::OK {
            info!(invoice = %invoice_url, "payment accepted");
            Ok(InvoiceOutcome::Paid)
        } else {
            warn!(
                invoice = %invoice_url,
                status = exchange.status.as_u16(),
                "payment returned unexpected status"
            );
            Ok(InvoiceOutcome::AnomalousStatus(exchange.status.as_u16()))
        }
    }
}

impl InvoiceStats {
    /// Fold one invoice's outcome into the counters.
    pub fn record(&mut self, link: &str, outcome: InvoiceOutcome) {
        match outcome {
            InvoiceOutcome::Paid => self.paid += 1,
            InvoiceOutcome::AlreadySettled => {}
            InvoiceOutcome::AnomalousStatus(status) => {
                let anomaly = EngineError::UnexpectedStatus {
                    status,
                    url: link.to_string(),
                };
                self.anomalies.push(anomaly.to_string());
            }
        }
    }
}
