// src/core/scanner/spf_scanner.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::{debug, info};

use super::{conclude, guarded, ProbeError};
use crate::core::catalog::Category;
use crate::core::models::{CategoryResult, Score, TestResult};
use crate::core::network::{dns_lookup, dns_lookup_or_empty, Network, RecordType};

const SPF_RECORD: &str = "SPF Record";
const SYNTAX: &str = "SPF Syntax";

const SPF_PREFIX: &str = "v=spf1";
const MAX_DNS_LOOKUPS: usize = 10;

/// One whitespace-separated SPF term: optional qualifier, name, then an
/// optional `:`, `/` or `=` argument.
static TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<qualifier>[+\-~?])?(?P<name>[A-Za-z][A-Za-z0-9_.\-]*)(?:[:/=](?P<value>.*))?$")
        .expect("SPF term pattern is valid")
});

pub async fn run_spf_category(net: &dyn Network, domain: &str) -> CategoryResult {
    info!(target = domain, category = "spf", "Starting category.");
    let mut category = CategoryResult::new(Category::Spf);

    let record = spf_record(net, domain).await;
    let has_record = record.score.passed();
    category.record("spf_record", record);

    let syntax = if has_record {
        spf_syntax(net, domain).await
    } else {
        TestResult::skipped(SYNTAX, "No SPF record found")
    };
    category.record("syntax", syntax);

    conclude(category)
}

async fn spf_records(net: &dyn Network, domain: &str) -> Result<Vec<String>, ProbeError> {
    let txt = dns_lookup_or_empty(net, domain, RecordType::Txt).await?;
    Ok(txt.into_iter().filter(|r| r.starts_with(SPF_PREFIX)).collect())
}

/// Exactly one `v=spf1` TXT record is GOOD; several are ambiguous.
pub async fn spf_record(net: &dyn Network, domain: &str) -> TestResult {
    guarded(SPF_RECORD, async {
        let records = spf_records(net, domain).await?;
        let result = match records.as_slice() {
            [] => TestResult::done(SPF_RECORD, Score::Failed, json!({ "records": [] })),
            [single] => TestResult::done(SPF_RECORD, Score::Good, json!({ "record": single })),
            many => TestResult::done(
                SPF_RECORD,
                Score::Warning,
                json!({ "records": many, "note": "Multiple SPF records found" }),
            ),
        };
        Ok::<_, ProbeError>(result)
    })
    .await
}

/// Checks the first SPF record for the common mistakes.
pub async fn spf_syntax(net: &dyn Network, domain: &str) -> TestResult {
    guarded(SYNTAX, async {
        let records = spf_records(net, domain).await?;
        let Some(record) = records.into_iter().next() else {
            return Ok(TestResult::skipped(SYNTAX, "No SPF record found"));
        };

        let terms = parse_terms(&record);
        let mut errors = static_errors(&terms);

        for include in terms.iter().filter(|t| t.name == "include").filter_map(|t| t.value.as_deref()) {
            match dns_lookup(net, include, RecordType::Txt).await {
                Ok(txt) if txt.iter().any(|r| r.contains("include:")) => {
                    errors.push(format!("Nested includes detected: {include}"));
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(target = domain, include, error = %e, "Included SPF domain did not resolve.");
                    errors.push(format!("Cannot resolve included domain: {include}"));
                }
            }
        }

        let lookups = count_lookups(&terms);
        let result = if errors.is_empty() {
            TestResult::done(SYNTAX, Score::Good, json!({ "record": record, "valid": true, "lookups": lookups }))
        } else {
            TestResult::done(SYNTAX, Score::Warning, json!({ "record": record, "errors": errors, "lookups": lookups }))
        };
        Ok::<_, ProbeError>(result)
    })
    .await
}

// --- Term parsing ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpfTerm {
    pub qualifier: Option<char>,
    /// Lower-cased mechanism or modifier name.
    pub name: String,
    pub value: Option<String>,
}

/// Splits a record into terms, dropping the `v=spf1` version tag and any
/// token that is not shaped like a term.
pub fn parse_terms(record: &str) -> Vec<SpfTerm> {
    record
        .split_whitespace()
        .skip(1)
        .filter_map(|token| {
            let caps = TERM.captures(token)?;
            Some(SpfTerm {
                qualifier: caps.name("qualifier").and_then(|q| q.as_str().chars().next()),
                name: caps.name("name")?.as_str().to_ascii_lowercase(),
                value: caps.name("value").map(|v| v.as_str().to_string()).filter(|v| !v.is_empty()),
            })
        })
        .collect()
}

/// Terms that cost the receiver a DNS query.
pub fn count_lookups(terms: &[SpfTerm]) -> usize {
    terms
        .iter()
        .filter(|t| matches!(t.name.as_str(), "include" | "exists" | "a" | "mx"))
        .count()
}

fn static_errors(terms: &[SpfTerm]) -> Vec<String> {
    let mut errors = Vec::new();
    if !terms.iter().any(|t| t.name == "all") {
        errors.push("Missing 'all' mechanism".to_string());
    }
    let lookups = count_lookups(terms);
    if lookups > MAX_DNS_LOOKUPS {
        errors.push(format!("Too many DNS lookups ({lookups}), maximum is {MAX_DNS_LOOKUPS}"));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qualifiers_and_arguments() {
        let terms = parse_terms("v=spf1 ip4:192.0.2.0/24 include:_spf.example.com ~all");
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0].name, "ip4");
        assert_eq!(terms[0].value.as_deref(), Some("192.0.2.0/24"));
        assert_eq!(terms[1].value.as_deref(), Some("_spf.example.com"));
        assert_eq!(terms[2], SpfTerm { qualifier: Some('~'), name: "all".into(), value: None });
    }

    #[test]
    fn bare_a_and_mx_count_as_lookups() {
        let terms = parse_terms("v=spf1 a mx a:web.example.com exists:%{i}.x.example.com ip6:2001:db8::/32 -all");
        assert_eq!(count_lookups(&terms), 4);
    }

    #[test]
    fn missing_all_is_reported() {
        let errors = static_errors(&parse_terms("v=spf1 mx"));
        assert_eq!(errors, vec!["Missing 'all' mechanism".to_string()]);
        assert!(static_errors(&parse_terms("v=spf1 mx -ALL")).is_empty());
    }

    #[test]
    fn too_many_lookups_are_reported() {
        let record = format!("v=spf1 {} -all", "a ".repeat(11));
        let errors = static_errors(&parse_terms(&record));
        assert_eq!(errors, vec!["Too many DNS lookups (11), maximum is 10".to_string()]);
    }

    #[test]
    fn redirect_modifier_is_not_an_all_mechanism() {
        let terms = parse_terms("v=spf1 redirect=_spf.example.com");
        assert_eq!(terms[0].name, "redirect");
        assert!(!static_errors(&terms).is_empty());
    }
}
