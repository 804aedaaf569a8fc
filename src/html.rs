//! Typed queries over dashboard markup.
//!
//! All HTML the engine cares about goes through `Page`, which wraps a parsed
//! document and exposes the handful of lookups the workflow needs: the two
//! anti-forgery tokens, service-management links, unpaid invoice links, and
//! the payment form. Callers never touch selectors directly.
//!
//! Token absence is not an error at this layer; callers decide whether a
//! missing token is fatal for their particular submission.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

fn sel(selector: &'static str) -> Selector {
    Selector::parse(selector).expect("valid selector")
}

fn service_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/service/(\d+)/manage").expect("valid pattern"))
}

/// A payment form lifted off an invoice page: its action URL and every
/// `<input>` inside it, in document order, values defaulted to empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentForm {
    pub action: String,
    pub fields: Vec<(String, String)>,
}

/// A parsed dashboard page.
pub struct Page {
    document: Html,
}

impl Page {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// The page-level anti-forgery token from `<meta name="csrf-token">`.
    pub fn csrf_meta_token(&self) -> Option<String> {
        self.document
            .select(&sel(r#"meta[name="csrf-token"]"#))
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string)
    }

    /// The per-form token from `<input name="_token">`.
    pub fn form_token(&self) -> Option<String> {
        self.document
            .select(&sel(r#"input[name="_token"]"#))
            .next()
            .and_then(|el| el.value().attr("value"))
            .map(str::to_string)
    }

    /// All service-management links, as `(id, href)` pairs deduplicated by
    /// id. The dashboard repeats links to the same service (card + sidebar),
    /// so dedup happens here, preserving first-seen order.
    pub fn service_links(&self) -> Vec<(String, String)> {
        let mut services: Vec<(String, String)> = Vec::new();
        for anchor in self.document.select(&sel(r#"a[href*="/service/"]"#)) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(captures) = service_id_pattern().captures(href) {
                let id = captures[1].to_string();
                if !services.iter().any(|(existing, _)| *existing == id) {
                    services.push((id, href.to_string()));
                }
            }
        }
        services
    }

    /// Distinct invoice-page links, excluding direct-download links.
    pub fn invoice_links(&self, invoice_path: &str) -> Vec<String> {
        let mut links: Vec<String> = Vec::new();
        for anchor in self.document.select(&sel("a[href]")) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if href.contains(invoice_path)
                && !href.contains("download")
                && !links.iter().any(|l| l == href)
            {
                links.push(href.to_string());
            }
        }
        links
    }

    /// The first form whose submit button mentions "pay" and whose action is
    /// not the balance top-up endpoint.
    ///
    /// `None` means the page has nothing payable on it, which the resolver
    /// treats as "already settled".
    pub fn payment_form(&self, balance_topup_path: &str) -> Option<PaymentForm> {
        for form in self.document.select(&sel("form")) {
            let Some(action) = form.value().attr("action") else {
                continue;
            };
            if action.contains(balance_topup_path) {
                continue;
            }

            let button_text: String = form
                .select(&sel("button"))
                .flat_map(|b| b.text())
                .collect::<String>()
                .trim()
                .to_lowercase();
            if !button_text.contains("pay") {
                continue;
            }

            return Some(PaymentForm {
                action: action.to_string(),
                fields: collect_inputs(form),
            });
        }
        None
    }
}

fn collect_inputs(form: ElementRef<'_>) -> Vec<(String, String)> {
    form.select(&sel("input"))
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or("");
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
