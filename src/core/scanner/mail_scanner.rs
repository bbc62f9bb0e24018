// src/core/scanner/mail_scanner.rs

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{conclude, guarded, ProbeError};
use crate::core::catalog::Category;
use crate::core::models::{CategoryResult, Score, TestResult};
use crate::core::network::{dns_lookup_or_empty, Network, RecordType};

const MX_RECORDS: &str = "MX Records";
const STARTTLS: &str = "STARTTLS";
const STARTTLS_SUPPORT: &str = "STARTTLS Support";
const DKIM: &str = "DKIM";

const NO_MX: &str = "No MX records found";

/// Selectors tried under `_domainkey`. Anything else cannot be discovered from DNS.
pub const DKIM_SELECTORS: [&str; 6] = ["default", "mail", "email", "dkim", "selector1", "selector2"];

// --- Categories ---

/// MX presence plus STARTTLS on the exchangers. This is the email report's transport category.
pub async fn run_starttls_category(net: &dyn Network, domain: &str) -> CategoryResult {
    info!(target = domain, category = "starttls", "Starting category.");
    let mut category = CategoryResult::new(Category::Starttls);

    let mx = mx_records(net, domain).await;
    let has_mx = mx.score.passed();
    category.record("mx_records", mx);

    let support = if has_mx {
        starttls(net, domain, STARTTLS_SUPPORT).await
    } else {
        TestResult::skipped(STARTTLS_SUPPORT, NO_MX)
    };
    category.record("starttls_support", support);

    conclude(category)
}

/// DKIM selectors, skipped when the domain publishes no MX.
pub async fn run_dkim_category(net: &dyn Network, domain: &str) -> CategoryResult {
    info!(target = domain, category = "dkim", "Starting category.");
    let mut category = CategoryResult::new(Category::Dkim);

    // Only an empty MX answer skips; a failed MX query still probes DKIM.
    let result = match dns_lookup_or_empty(net, domain, RecordType::Mx).await {
        Ok(hosts) if hosts.is_empty() => TestResult::skipped(DKIM, NO_MX),
        _ => dkim(net, domain).await,
    };
    category.record("dkim", result);

    conclude(category)
}

/// The composite MX, STARTTLS and DKIM group. Not part of any report's weight table.
pub async fn run_mail_category(net: &dyn Network, domain: &str) -> CategoryResult {
    info!(target = domain, category = "mail", "Starting category.");
    let mut category = CategoryResult::new(Category::Mail);

    let mx = mx_records(net, domain).await;
    let has_mx = mx.score.passed();
    category.record("mx_records", mx);

    if has_mx {
        let (tls, dkim) = tokio::join!(starttls(net, domain, STARTTLS), dkim(net, domain));
        category.record("starttls", tls);
        category.record("dkim", dkim);
    } else {
        category.record("starttls", TestResult::skipped(STARTTLS, NO_MX));
        category.record("dkim", TestResult::skipped(DKIM, NO_MX));
    }

    conclude(category)
}

// --- Probes ---

pub async fn mx_records(net: &dyn Network, domain: &str) -> TestResult {
    guarded(MX_RECORDS, async {
        let records = dns_lookup_or_empty(net, domain, RecordType::Mx).await?;
        let score = if records.is_empty() { Score::Failed } else { Score::Good };
        Ok::<_, ProbeError>(TestResult::done(MX_RECORDS, score, json!({ "records": records })))
    })
    .await
}

/// What one exchanger said about STARTTLS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStarttls {
    pub server: String,
    pub starttls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// EHLO against every MX host. A host that cannot be reached counts as not
/// supporting STARTTLS; it never fails the probe as a whole.
pub async fn starttls(net: &dyn Network, domain: &str, name: &str) -> TestResult {
    guarded(name, async {
        let hosts = dns_lookup_or_empty(net, domain, RecordType::Mx).await?;
        if hosts.is_empty() {
            return Ok(TestResult::skipped(name, NO_MX));
        }

        let mut servers = Vec::with_capacity(hosts.len());
        for host in hosts {
            let outcome = match net.smtp_capabilities(&host).await {
                Ok(keywords) => {
                    let supported = keywords.iter().any(|k| k.eq_ignore_ascii_case("STARTTLS"));
                    debug!(target = domain, server = %host, starttls = supported, "EHLO completed.");
                    ServerStarttls { server: host, starttls: supported, error: None }
                }
                Err(e) => {
                    warn!(target = domain, server = %host, error = %e, "SMTP session failed.");
                    ServerStarttls { server: host, starttls: false, error: Some(e.to_string()) }
                }
            };
            servers.push(outcome);
        }

        Ok::<_, ProbeError>(grade_starttls(name, &servers))
    })
    .await
}

pub fn grade_starttls(name: &str, servers: &[ServerStarttls]) -> TestResult {
    let supporting = servers.iter().filter(|s| s.starttls).count();
    if supporting == servers.len() {
        TestResult::done(name, Score::Good, json!({ "servers": servers }))
    } else if supporting > 0 {
        TestResult::done(
            name,
            Score::Warning,
            json!({ "servers": servers, "note": "Some servers don't support STARTTLS" }),
        )
    } else {
        TestResult::done(
            name,
            Score::Failed,
            json!({ "servers": servers, "note": "No servers support STARTTLS" }),
        )
    }
}

/// Tries each common selector; a TXT record starting with `v=DKIM1` under any of them is GOOD.
pub async fn dkim(net: &dyn Network, domain: &str) -> TestResult {
    let mut found = Vec::new();
    for selector in DKIM_SELECTORS {
        let name = format!("{selector}._domainkey.{domain}");
        match dns_lookup_or_empty(net, &name, RecordType::Txt).await {
            Ok(records) => {
                if let Some(record) = records.iter().find(|r| r.trim_start().starts_with("v=DKIM1")) {
                    found.push(json!({ "selector": selector, "record": record }));
                }
            }
            Err(e) => debug!(target = domain, selector, error = %e, "DKIM selector lookup failed."),
        }
    }

    if found.is_empty() {
        TestResult::done(
            DKIM,
            Score::Failed,
            json!({ "records": [], "note": "No DKIM records found with common selectors" }),
        )
    } else {
        TestResult::done(DKIM, Score::Good, json!({ "records": found }))
    }
}
