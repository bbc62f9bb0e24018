// Website report integration tests

mod common;

use serde_json::json;
use std::sync::Arc;

use common::{
    assert_report_consistent, healthy_website, response, valid_certificate, MockNetwork, ALL_SECURITY_HEADERS,
};
use healthscan::config::Config;
use healthscan::core::catalog::RunnerKind;
use healthscan::core::models::{ProbeStatus, Rating, Score, TestStatus, TlsVersion};
use healthscan::core::network::{DnsError, RecordType};
use healthscan::core::scanner::run_website_tests;

#[tokio::test]
async fn healthy_site_scores_full_marks() {
    let report = run_website_tests(Arc::new(healthy_website()), &Config::default(), "example.com").await;

    assert_eq!(report.status, TestStatus::Done);
    assert_eq!(report.score, Some(100.0));
    assert_eq!(report.rating, Some(Rating::Excellent));
    let keys: Vec<_> = report.categories.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["ipv6", "dnssec", "tls", "appsecpriv"]);
    assert_report_consistent(&report, RunnerKind::Website);

    let dnskeys = report.category("dnssec").unwrap().test("dnskey_records").unwrap();
    assert_eq!(
        dnskeys.detail("records"),
        Some(&json!([
            { "key_tag": 31589, "algorithm": 13, "type": "KSK" },
            { "key_tag": 11019, "algorithm": 13, "type": "ZSK" }
        ]))
    );
}

#[tokio::test]
async fn missing_aaaa_skips_reachability() {
    let net = MockNetwork::new().with_records("example.com", RecordType::A, &["192.0.2.10"]);
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let ipv6 = report.category("ipv6").unwrap();
    assert_eq!(ipv6.test("aaaa_records").unwrap().score, Score::Failed);
    let reach = ipv6.test("reachability").unwrap();
    assert_eq!(reach.status, ProbeStatus::Skipped);
    assert_eq!(reach.score, Score::Failed);
    assert_eq!(reach.detail("reason"), Some(&json!("No AAAA records found")));
    assert_eq!(ipv6.score, Some(0.0));
    assert_report_consistent(&report, RunnerKind::Website);
}

#[tokio::test]
async fn closed_https_port_skips_handshake_probes() {
    let net = MockNetwork::new();
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let tls = report.category("tls").unwrap();
    assert_eq!(tls.test("https_availability").unwrap().score, Score::Failed);
    for key in ["certificate", "tls_version", "cipher_suites"] {
        let test = tls.test(key).unwrap();
        assert_eq!(test.status, ProbeStatus::Skipped, "{key}");
        assert_eq!(test.detail("reason"), Some(&json!("HTTPS not available")));
    }
    assert_eq!(tls.score, Some(0.0));
}

#[tokio::test]
async fn network_failures_become_error_results() {
    let net = healthy_website()
        .with_dns_error("example.com", RecordType::Aaaa, DnsError::Resolution("SERVFAIL".into()))
        .with_http_error("http://example.com", "connection refused");
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    assert_eq!(report.status, TestStatus::Done);
    let aaaa = report.category("ipv6").unwrap().test("aaaa_records").unwrap();
    assert_eq!(aaaa.status, ProbeStatus::Error);
    assert_eq!(aaaa.score, Score::Failed);
    assert_eq!(aaaa.detail("error"), Some(&json!("DNS resolution error: SERVFAIL")));

    let redirect = report.category("appsecpriv").unwrap().test("https_redirect").unwrap();
    assert_eq!(redirect.status, ProbeStatus::Error);
    assert!(redirect.detail("error").unwrap().as_str().unwrap().contains("connection refused"));
    assert_report_consistent(&report, RunnerKind::Website);
}

#[tokio::test]
async fn partial_headers_and_plain_http_lower_appsecpriv() {
    let net = healthy_website()
        .with_http("http://example.com", response("http://example.com/", &[], &[]))
        .with_http(
            "https://example.com",
            response("https://example.com/", &ALL_SECURITY_HEADERS[..3], &["lang=en; Path=/"]),
        );
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let app = report.category("appsecpriv").unwrap();
    assert_eq!(app.test("https_redirect").unwrap().score, Score::Failed);
    let headers = app.test("security_headers").unwrap();
    assert_eq!(headers.score, Score::Warning);
    assert_eq!(headers.detail("found"), Some(&json!(3)));
    assert_eq!(app.test("cookie_security").unwrap().score, Score::Bad);
    // (0 + 50 + 25) / 3
    assert_eq!(app.score, Some(25.0));
}

#[tokio::test]
async fn tls12_only_server_is_sufficient() {
    let net = MockNetwork::new()
        .with_open_port("example.com", 443)
        .with_certificate("example.com", valid_certificate(&["www.example.com"]))
        .with_tls("example.com", Some(TlsVersion::Tls12), TlsVersion::Tls12, "AES128-SHA")
        .with_tls("example.com", None, TlsVersion::Tls12, "AES128-SHA");
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let tls = report.category("tls").unwrap();
    let certificate = tls.test("certificate").unwrap();
    assert_eq!(certificate.score, Score::Failed);
    assert_eq!(certificate.detail("reason"), Some(&json!("Certificate does not match domain")));

    let version = tls.test("tls_version").unwrap();
    assert_eq!(version.score, Score::Sufficient);
    assert_eq!(version.detail("supported_versions"), Some(&json!(["TLSv1.2"])));
    assert_eq!(tls.test("cipher_suites").unwrap().score, Score::Warning);
    // (100 + 0 + 75 + 50) / 4
    assert_eq!(tls.score, Some(56.25));
}

#[tokio::test]
async fn dnssec_validation_failure_is_scored_not_errored() {
    let net = healthy_website().with_validation("example.com", Err(DnsError::Validation("bogus RRSIG".into())));
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let validation = report.category("dnssec").unwrap().test("validation").unwrap();
    assert_eq!(validation.status, ProbeStatus::Done);
    assert_eq!(validation.score, Score::Failed);
    assert_eq!(validation.detail("error"), Some(&json!("DNSSEC validation failed")));
}

#[tokio::test]
async fn unsigned_zone_fails_key_probes() {
    let net = MockNetwork::new().with_validation(
        "example.com",
        Err(DnsError::NameNotFound("example.com".into())),
    );
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let dnssec = report.category("dnssec").unwrap();
    assert_eq!(dnssec.test("dnskey_records").unwrap().detail("records"), Some(&json!([])));
    assert_eq!(dnssec.test("ds_records").unwrap().score, Score::Failed);
    assert_eq!(dnssec.test("validation").unwrap().score, Score::Failed);
    assert_eq!(dnssec.score, Some(0.0));
}

#[tokio::test]
async fn validated_lookup_without_answer_still_counts_as_valid() {
    let net = healthy_website().with_validation(
        "example.com",
        Err(DnsError::NoRecord { name: "example.com".into(), record_type: "A".into() }),
    );
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let dnssec = report.category("dnssec").unwrap();
    let validation = dnssec.test("validation").unwrap();
    assert_eq!(validation.status, ProbeStatus::Done);
    assert_eq!(validation.score, Score::Good);
    assert_eq!(validation.detail("valid"), Some(&json!(true)));
    assert_eq!(validation.detail("note"), Some(&json!("No A record but validation passed")));
    assert_eq!(dnssec.score, Some(100.0));
}

#[tokio::test]
async fn nonexistent_domain_fails_key_lookups_with_a_reason() {
    let net = healthy_website()
        .with_dnskey_error("example.com", DnsError::NameNotFound("example.com".into()))
        .with_ds_error("example.com", DnsError::NameNotFound("example.com".into()));
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let dnssec = report.category("dnssec").unwrap();
    for key in ["dnskey_records", "ds_records"] {
        let test = dnssec.test(key).unwrap();
        assert_eq!(test.status, ProbeStatus::Done, "{key}");
        assert_eq!(test.score, Score::Failed, "{key}");
        assert_eq!(test.detail("error"), Some(&json!("Domain does not exist")), "{key}");
        assert!(test.detail("records").is_none(), "{key}");
    }
    // only validation passes
    assert_eq!(dnssec.score, Some(100.0 / 3.0));
}

#[tokio::test]
async fn dnskey_query_failure_is_an_error_result() {
    let net = healthy_website()
        .with_dnskey_error("example.com", DnsError::Resolution("SERVFAIL".into()));
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let dnskeys = report.category("dnssec").unwrap().test("dnskey_records").unwrap();
    assert_eq!(dnskeys.status, ProbeStatus::Error);
    assert_eq!(dnskeys.detail("error"), Some(&json!("DNS resolution error: SERVFAIL")));
}

#[tokio::test]
async fn legacy_protocol_fails_cipher_grading() {
    let net = healthy_website()
        .with_tls("example.com", None, TlsVersion::Tls10, "ECDHE-RSA-AES128-SHA");
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    let cipher = report.category("tls").unwrap().test("cipher_suites").unwrap();
    assert_eq!(cipher.status, ProbeStatus::Done);
    assert_eq!(cipher.score, Score::Failed);
    assert_eq!(cipher.detail("protocol"), Some(&json!("TLSv1.0")));
    assert_eq!(cipher.detail("reason"), Some(&json!("Insecure cipher suite, Insecure protocol")));
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let net = Arc::new(healthy_website().with_http("http://example.com", response("http://example.com/", &[], &[])));
    let first = run_website_tests(net.clone(), &Config::default(), "example.com").await;
    let second = run_website_tests(net, &Config::default(), "example.com").await;

    assert_eq!(first.status, second.status);
    assert_eq!(first.score, second.score);
    assert_eq!(first.categories, second.categories);
}

#[tokio::test]
async fn disabled_categories_are_omitted_and_weights_renormalized() {
    let config = Config { check_dnssec: false, check_tls: false, ..Config::default() };
    let net = MockNetwork::new()
        .with_records("example.com", RecordType::Aaaa, &["2001:db8::10"])
        .with_open_port("2001:db8::10", 80);
    let report = run_website_tests(Arc::new(net), &config, "example.com").await;

    let keys: Vec<_> = report.categories.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["ipv6", "appsecpriv"]);
    assert_eq!(report.category("ipv6").unwrap().score, Some(100.0));
    // appsecpriv: every request errors, so (0 + 0 + 0) / 3
    assert_eq!(report.score, Some(50.0));
    assert_report_consistent(&report, RunnerKind::Website);
}

#[tokio::test]
async fn crashing_category_aborts_the_report() {
    let net = healthy_website().crashing_on("example.com");
    let report = run_website_tests(Arc::new(net), &Config::default(), "example.com").await;

    assert_eq!(report.status, TestStatus::Error);
    assert!(report.categories.is_empty());
    assert_eq!(report.score, None);
    assert!(report.error.as_deref().unwrap().starts_with("ipv6: task failed"));
}
