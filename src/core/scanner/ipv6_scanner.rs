// src/core/scanner/ipv6_scanner.rs

use serde_json::json;
use tracing::{debug, info};

use super::{conclude, guarded, ProbeError};
use crate::core::catalog::Category;
use crate::core::models::{CategoryResult, Score, TestResult};
use crate::core::network::{dns_lookup_or_empty, probe_tcp_port, resolve_addresses, Network, RecordType};

const AAAA_RECORDS: &str = "AAAA Records";
const REACHABILITY: &str = "IPv6 Reachability";
const CLIENT_IPV6: &str = "IPv6 Connection";

const HTTP_PORT: u16 = 80;

/// AAAA presence and reachability of the website over IPv6.
pub async fn run_ipv6_category(net: &dyn Network, domain: &str) -> CategoryResult {
    info!(target = domain, category = "ipv6", "Starting category.");
    let mut category = CategoryResult::new(Category::Ipv6);

    let aaaa = aaaa_records(net, domain).await;
    let has_aaaa = aaaa.score.passed();
    category.record("aaaa_records", aaaa);

    let reach = if has_aaaa {
        reachability(net, domain).await
    } else {
        TestResult::skipped(REACHABILITY, "No AAAA records found")
    };
    category.record("reachability", reach);

    conclude(category)
}

/// The connection report's only category: did the client reach us over IPv6?
pub fn run_client_ipv6_category(client_ip: &str) -> CategoryResult {
    info!(target = client_ip, category = "ipv6", "Starting category.");
    let mut category = CategoryResult::new(Category::ClientIpv6);
    category.record("client_ipv6", client_ipv6(client_ip));
    conclude(category)
}

pub async fn aaaa_records(net: &dyn Network, domain: &str) -> TestResult {
    guarded(AAAA_RECORDS, async {
        let records = dns_lookup_or_empty(net, domain, RecordType::Aaaa).await?;
        let score = if records.is_empty() { Score::Failed } else { Score::Good };
        Ok::<_, ProbeError>(TestResult::done(AAAA_RECORDS, score, json!({ "records": records })))
    })
    .await
}

/// Connects to port 80 on each IPv6 address in turn; the first success wins.
pub async fn reachability(net: &dyn Network, domain: &str) -> TestResult {
    let addresses = resolve_addresses(net, domain).await;
    if addresses.ipv6.is_empty() {
        return TestResult::done(
            REACHABILITY,
            Score::Failed,
            json!({ "reachable": false, "reason": "No IPv6 addresses found" }),
        );
    }

    for address in &addresses.ipv6 {
        if probe_tcp_port(net, address, HTTP_PORT).await {
            debug!(target = domain, address = %address, "IPv6 address reachable.");
            return TestResult::done(
                REACHABILITY,
                Score::Good,
                json!({ "reachable": true, "address": address }),
            );
        }
    }

    TestResult::done(
        REACHABILITY,
        Score::Failed,
        json!({ "reachable": false, "reason": "Cannot connect to IPv6 addresses" }),
    )
}

// A colon only ever appears in IPv6 literals.
pub fn client_ipv6(client_ip: &str) -> TestResult {
    let has_ipv6 = client_ip.contains(':');
    let score = if has_ipv6 { Score::Good } else { Score::Failed };
    TestResult::done(CLIENT_IPV6, score, json!({ "has_ipv6": has_ipv6 }))
}
