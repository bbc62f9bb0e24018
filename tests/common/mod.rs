// Shared fixtures for the report integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};

use healthscan::core::catalog::RunnerKind;
use healthscan::core::models::{
    CertificateInfo, DnskeyInfo, DsInfo, HttpResponse, ReportResult, TlsSession, TlsVersion,
};
use healthscan::core::network::{DnsError, NetError, Network, RecordType};
use healthscan::core::scoring::round1;

/// A `Network` that answers from fixed tables. Anything not configured
/// behaves like an empty zone or a closed port.
#[derive(Default)]
pub struct MockNetwork {
    records: HashMap<(String, RecordType), Result<Vec<String>, DnsError>>,
    dnskeys: HashMap<String, Result<Vec<DnskeyInfo>, DnsError>>,
    ds: HashMap<String, Result<Vec<DsInfo>, DnsError>>,
    validation: HashMap<String, Result<Vec<String>, DnsError>>,
    open_ports: HashSet<(String, u16)>,
    http: HashMap<String, Result<HttpResponse, String>>,
    certificates: HashMap<String, CertificateInfo>,
    tls: Vec<(String, Option<TlsVersion>, TlsSession)>,
    smtp: HashMap<String, Vec<String>>,
    crash_on: HashSet<String>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, name: &str, record_type: RecordType, values: &[&str]) -> Self {
        let values = values.iter().map(|v| v.to_string()).collect();
        self.records.insert((name.to_string(), record_type), Ok(values));
        self
    }

    pub fn with_dns_error(mut self, name: &str, record_type: RecordType, error: DnsError) -> Self {
        self.records.insert((name.to_string(), record_type), Err(error));
        self
    }

    pub fn with_dnskeys(mut self, name: &str, keys: Vec<DnskeyInfo>) -> Self {
        self.dnskeys.insert(name.to_string(), Ok(keys));
        self
    }

    pub fn with_dnskey_error(mut self, name: &str, error: DnsError) -> Self {
        self.dnskeys.insert(name.to_string(), Err(error));
        self
    }

    pub fn with_ds(mut self, name: &str, records: Vec<DsInfo>) -> Self {
        self.ds.insert(name.to_string(), Ok(records));
        self
    }

    pub fn with_ds_error(mut self, name: &str, error: DnsError) -> Self {
        self.ds.insert(name.to_string(), Err(error));
        self
    }

    pub fn with_validation(mut self, name: &str, outcome: Result<Vec<String>, DnsError>) -> Self {
        self.validation.insert(name.to_string(), outcome);
        self
    }

    pub fn with_open_port(mut self, host: &str, port: u16) -> Self {
        self.open_ports.insert((host.to_string(), port));
        self
    }

    pub fn with_http(mut self, url: &str, response: HttpResponse) -> Self {
        self.http.insert(url.to_string(), Ok(response));
        self
    }

    pub fn with_http_error(mut self, url: &str, message: &str) -> Self {
        self.http.insert(url.to_string(), Err(message.to_string()));
        self
    }

    pub fn with_certificate(mut self, host: &str, info: CertificateInfo) -> Self {
        self.certificates.insert(host.to_string(), info);
        self
    }

    /// Replaces any handshake already configured for `host` with the same pin.
    pub fn with_tls(mut self, host: &str, pinned: Option<TlsVersion>, protocol: TlsVersion, cipher: &str) -> Self {
        self.tls.retain(|(h, p, _)| !(h == host && *p == pinned));
        self.tls.push((host.to_string(), pinned, TlsSession { protocol, cipher: cipher.to_string() }));
        self
    }

    pub fn with_smtp(mut self, host: &str, keywords: &[&str]) -> Self {
        self.smtp.insert(host.to_string(), keywords.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Makes every DNS lookup of `name` panic, as a bug inside a runner would.
    pub fn crashing_on(mut self, name: &str) -> Self {
        self.crash_on.insert(name.to_string());
        self
    }

    fn no_record(name: &str, record_type: &str) -> DnsError {
        DnsError::NoRecord { name: name.to_string(), record_type: record_type.to_string() }
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn lookup(&self, name: &str, record_type: RecordType) -> Result<Vec<String>, DnsError> {
        if self.crash_on.contains(name) {
            panic!("resolver crashed on {name}");
        }
        self.records
            .get(&(name.to_string(), record_type))
            .cloned()
            .unwrap_or_else(|| Err(Self::no_record(name, &record_type.to_string())))
    }

    async fn dnskey(&self, name: &str) -> Result<Vec<DnskeyInfo>, DnsError> {
        self.dnskeys.get(name).cloned().unwrap_or_else(|| Err(Self::no_record(name, "DNSKEY")))
    }

    async fn ds(&self, name: &str) -> Result<Vec<DsInfo>, DnsError> {
        self.ds.get(name).cloned().unwrap_or_else(|| Err(Self::no_record(name, "DS")))
    }

    async fn validated_lookup(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.validation.get(name).cloned().unwrap_or_else(|| Err(Self::no_record(name, "A")))
    }

    async fn tcp_connect(&self, host: &str, port: u16) -> bool {
        self.open_ports.contains(&(host.to_string(), port))
    }

    async fn http_get(&self, url: &str) -> Result<HttpResponse, NetError> {
        match self.http.get(url) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(NetError::Http(message.clone())),
            None => Err(NetError::Http(format!("error sending request for url ({url})"))),
        }
    }

    async fn peer_certificate(&self, host: &str) -> Result<Option<CertificateInfo>, NetError> {
        Ok(self.certificates.get(host).cloned())
    }

    async fn tls_handshake(&self, host: &str, version: Option<TlsVersion>) -> Result<TlsSession, NetError> {
        self.tls
            .iter()
            .find(|(h, pinned, _)| h == host && *pinned == version)
            .map(|(_, _, session)| session.clone())
            .ok_or_else(|| NetError::Tls("received fatal alert: ProtocolVersion".to_string()))
    }

    async fn smtp_capabilities(&self, host: &str) -> Result<Vec<String>, NetError> {
        self.smtp.get(host).cloned().ok_or_else(|| {
            NetError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"))
        })
    }
}

// --- Fixtures ---

pub fn valid_certificate(names: &[&str]) -> CertificateInfo {
    let now = Utc::now();
    CertificateInfo {
        subject_cn: names.first().map(|n| n.to_string()),
        issuer_cn: Some("Example Issuing CA".to_string()),
        dns_names: names.iter().map(|n| n.to_string()).collect(),
        not_before: now - Duration::days(30),
        not_after: now + Duration::days(60),
    }
}

pub fn response(final_url: &str, headers: &[(&str, &str)], cookies: &[&str]) -> HttpResponse {
    HttpResponse {
        final_url: final_url.to_string(),
        status: 200,
        headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        set_cookies: cookies.iter().map(|c| c.to_string()).collect(),
    }
}

pub const ALL_SECURITY_HEADERS: [(&str, &str); 6] = [
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("content-security-policy", "default-src 'self'"),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

/// Every website check passes for `example.com`.
pub fn healthy_website() -> MockNetwork {
    MockNetwork::new()
        .with_records("example.com", RecordType::A, &["192.0.2.10"])
        .with_records("example.com", RecordType::Aaaa, &["2001:db8::10"])
        .with_open_port("2001:db8::10", 80)
        .with_open_port("example.com", 443)
        .with_dnskeys(
            "example.com",
            vec![
                DnskeyInfo { key_tag: 31589, algorithm: 13, flags: 257 },
                DnskeyInfo { key_tag: 11019, algorithm: 13, flags: 256 },
            ],
        )
        .with_ds("example.com", vec![DsInfo { key_tag: 31589, algorithm: 13, digest_type: 2 }])
        .with_validation("example.com", Ok(vec!["192.0.2.10".to_string()]))
        .with_http("http://example.com", response("https://example.com/", &[], &[]))
        .with_http(
            "https://example.com",
            response(
                "https://example.com/",
                &ALL_SECURITY_HEADERS,
                &["sid=31d4d96e; Path=/; Secure; HttpOnly; SameSite=Strict"],
            ),
        )
        .with_certificate("example.com", valid_certificate(&["example.com", "*.example.com"]))
        .with_tls("example.com", Some(TlsVersion::Tls12), TlsVersion::Tls12, "ECDHE-RSA-AES128-GCM-SHA256")
        .with_tls("example.com", Some(TlsVersion::Tls13), TlsVersion::Tls13, "TLS_AES_128_GCM_SHA256")
        .with_tls("example.com", None, TlsVersion::Tls13, "TLS_AES_256_GCM_SHA384")
}

/// Every email check passes for `example.com`.
pub fn healthy_mail_domain() -> MockNetwork {
    MockNetwork::new()
        .with_records("example.com", RecordType::Txt, &["v=spf1 mx include:_spf.example.com -all"])
        .with_records("_spf.example.com", RecordType::Txt, &["v=spf1 ip4:192.0.2.0/24 -all"])
        .with_records("_dmarc.example.com", RecordType::Txt, &["v=DMARC1; p=reject; rua=mailto:dmarc@example.com"])
        .with_records("example.com", RecordType::Mx, &["mx1.example.com", "mx2.example.com"])
        .with_records("selector1._domainkey.example.com", RecordType::Txt, &["v=DKIM1; k=rsa; p=MIGfMA0GCSq"])
        .with_smtp("mx1.example.com", &["PIPELINING", "SIZE", "STARTTLS", "8BITMIME"])
        .with_smtp("mx2.example.com", &["STARTTLS"])
}

// --- Invariant checks ---

/// Every test score is one of the five levels, every category score is the
/// mean of its tests, and the report score is the renormalized weighted sum.
pub fn assert_report_consistent(report: &ReportResult, kind: RunnerKind) {
    let mut weighted = Vec::new();
    for (key, category) in &report.categories {
        assert!(!category.tests.is_empty(), "{key} has no tests");
        let sum: u32 = category
            .tests
            .values()
            .map(|t| {
                let value = u32::from(t.score.value());
                assert!([0, 25, 50, 75, 100].contains(&value));
                value
            })
            .sum();
        let mean = f64::from(sum) / category.tests.len() as f64;
        assert_eq!(category.score, Some(mean), "{key} score is not the mean of its tests");

        let weight = kind
            .weights()
            .iter()
            .find(|(c, _)| c.key() == key)
            .map(|(_, w)| *w)
            .expect("category belongs to the runner");
        weighted.push((mean, weight));
    }

    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    let expected = if total > 0.0 {
        round1(weighted.iter().map(|(s, w)| s * w / total).sum())
    } else {
        0.0
    };
    assert_eq!(report.score, Some(expected));
}
