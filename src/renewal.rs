//! Per-service renewal workflow.
//!
//! Services run strictly one after another with jitter between them. A
//! failure inside one service is caught and recorded; the remaining
//! services still run.

use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::html::Page;
use crate::invoice::{InvoiceResolver, InvoiceStats};
use crate::pace;
use crate::session::{Service, Session};

/// Counters for one account's pass over its services.
#[derive(Debug, Default)]
pub struct WorkflowStats {
    pub renewed: u32,
    pub invoices_paid: u32,
    pub errors: Vec<String>,
}

/// Drives renewal for every service discovered on a session.
pub struct RenewalWorkflow<'a> {
    session: &'a mut Session,
}

impl<'a> RenewalWorkflow<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// Process every discovered service sequentially.
    pub async fn run(&mut self) -> WorkflowStats {
        let services = self.session.services().to_vec();
        let pacing = self.session.config().pacing.service;
        let mut stats = WorkflowStats::default();

        for service in &services {
            pace::jitter(pacing).await;
            match self.process_service(service).await {
                Ok(invoices) => {
                    stats.renewed += 1;
                    stats.invoices_paid += invoices.paid;
                    stats.errors.extend(invoices.anomalies);
                }
                Err(err) => {
                    warn!(service = %service.id, error = %err, "service renewal failed");
                    stats.errors.push(format!("service {}: {err}", service.id));
                }
            }
        }
        stats
    }

    /// Renew one service, then resolve whatever invoice the renewal raised.
    async fn process_service(&mut self, service: &Service) -> EngineResult<InvoiceStats> {
        info!(service = %service.id, "processing service");

        let manage_path = format!("/service/{}/manage", service.id);
        let manage = self.session.get(&manage_path).await?;

        let form_token = Page::parse(&manage.body)
            .form_token()
            .ok_or_else(|| EngineError::markup("renewal form token (_token) not found"))?;

        let renew_days = self.session.config().renew_days;
        info!(service = %service.id, days = renew_days, "submitting renewal");
        pace::jitter(self.session.config().pacing.submit).await;

        let fields = vec![
            ("_token".to_string(), form_token),
            ("days".to_string(), renew_days.to_string()),
        ];
        let referer = self.session.resolve(&manage_path);
        let renew = self
            .session
            .post_form(&format!("/service/{}/renew", service.id), &fields, &referer)
            .await?;

        let invoice_path = self.session.config().invoice_path.clone();
        let mut resolver = InvoiceResolver::new(self.session);

        if renew.final_url.contains(&invoice_path) {
            // The renewal redirected straight onto a payable invoice.
            info!(service = %service.id, invoice = %renew.final_url, "renewal raised an invoice");
            let outcome = resolver
                .settle_from_page(&renew.body, &renew.final_url)
                .await?;
            let mut stats = InvoiceStats::default();
            stats.record(&renew.final_url, outcome);
            Ok(stats)
        } else {
            // Some flows queue the invoice instead of redirecting to it.
            info!(service = %service.id, "no invoice redirect, checking unpaid listing");
            resolver.settle_service_invoices(&service.id).await
        }
    }
}
