// src/core/scanner/dmarc_scanner.rs

use indexmap::IndexMap;
use serde_json::json;
use tracing::info;

use super::{conclude, guarded, ProbeError};
use crate::core::catalog::Category;
use crate::core::models::{CategoryResult, Score, TestResult};
use crate::core::network::{dns_lookup_or_empty, Network, RecordType};

const DMARC_RECORD: &str = "DMARC Record";
const POLICY: &str = "DMARC Policy";

const DMARC_PREFIX: &str = "v=DMARC1";

pub async fn run_dmarc_category(net: &dyn Network, domain: &str) -> CategoryResult {
    info!(target = domain, category = "dmarc", "Starting category.");
    let mut category = CategoryResult::new(Category::Dmarc);

    let record = dmarc_record(net, domain).await;
    let has_record = record.score.passed();
    category.record("dmarc_record", record);

    let policy = if has_record {
        dmarc_policy(net, domain).await
    } else {
        TestResult::skipped(POLICY, "No DMARC record found")
    };
    category.record("policy", policy);

    conclude(category)
}

async fn dmarc_records(net: &dyn Network, domain: &str) -> Result<Vec<String>, ProbeError> {
    let txt = dns_lookup_or_empty(net, &format!("_dmarc.{domain}"), RecordType::Txt).await?;
    Ok(txt.into_iter().filter(|r| r.starts_with(DMARC_PREFIX)).collect())
}

pub async fn dmarc_record(net: &dyn Network, domain: &str) -> TestResult {
    guarded(DMARC_RECORD, async {
        let records = dmarc_records(net, domain).await?;
        let result = match records.as_slice() {
            [] => TestResult::done(DMARC_RECORD, Score::Failed, json!({ "records": [] })),
            [single] => TestResult::done(DMARC_RECORD, Score::Good, json!({ "record": single })),
            many => TestResult::done(
                DMARC_RECORD,
                Score::Warning,
                json!({ "records": many, "note": "Multiple DMARC records found" }),
            ),
        };
        Ok::<_, ProbeError>(result)
    })
    .await
}

/// Grades the first DMARC record's `p=` tag and notes reporting and alignment.
pub async fn dmarc_policy(net: &dyn Network, domain: &str) -> TestResult {
    guarded(POLICY, async {
        let records = dmarc_records(net, domain).await?;
        let result = match records.first() {
            Some(record) => assess_policy(record),
            None => TestResult::skipped(POLICY, "No DMARC record found"),
        };
        Ok::<_, ProbeError>(result)
    })
    .await
}

/// `;`-separated `tag=value` pairs in record order. Pairs without `=` are dropped.
pub fn parse_tags(record: &str) -> IndexMap<String, String> {
    record
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(tag, value)| (tag.trim().to_string(), value.trim().to_string()))
        .collect()
}

pub fn assess_policy(record: &str) -> TestResult {
    let tags = parse_tags(record);
    let policy = tags.get("p").map(String::as_str).unwrap_or("none");

    let (score, note) = match policy {
        "reject" => (Score::Good, "Strong policy (reject)"),
        "quarantine" => (Score::Sufficient, "Medium policy (quarantine)"),
        _ => (Score::Warning, "Weak policy (none)"),
    };

    let has_reporting = tags.contains_key("rua") || tags.contains_key("ruf");
    let tag_is_strict = |tag: &str| tags.get(tag).is_some_and(|v| v == "s");
    let strict_alignment = tag_is_strict("aspf") && tag_is_strict("adkim");

    TestResult::done(
        POLICY,
        score,
        json!({
            "record": record,
            "policy": policy,
            "note": note,
            "has_reporting": has_reporting,
            "strict_alignment": strict_alignment,
            "tags": tags,
        }),
    )
}
