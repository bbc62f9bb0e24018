// src/core/scanner/tls_scanner.rs

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};

use super::{conclude, guarded, ProbeError};
use crate::core::catalog::Category;
use crate::core::models::{CategoryResult, CertificateInfo, Score, TestResult, TlsVersion};
use crate::core::network::{probe_tcp_port, Network};

const HTTPS_AVAILABILITY: &str = "HTTPS Availability";
const CERTIFICATE: &str = "Certificate";
const TLS_VERSION: &str = "TLS Version";
const CIPHER_SUITES: &str = "Cipher Suites";

const HTTPS_PORT: u16 = 443;

/// Modern AEAD suites with forward secrecy, spelled the way OpenSSL reports them.
pub const APPROVED_CIPHER_SUITES: &[&str] = &[
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_AES_128_GCM_SHA256",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
];

/// HTTPS availability gates the three handshake-based probes.
pub async fn run_tls_category(net: &dyn Network, domain: &str) -> CategoryResult {
    info!(target = domain, category = "tls", "Starting category.");
    let mut category = CategoryResult::new(Category::Tls);

    let availability = https_availability(net, domain).await;
    let available = availability.score.passed();
    category.record("https_availability", availability);

    if available {
        let (certificate, version, cipher) = tokio::join!(
            certificate(net, domain),
            tls_version(net, domain),
            cipher_suites(net, domain)
        );
        category.record("certificate", certificate);
        category.record("tls_version", version);
        category.record("cipher_suites", cipher);
    } else {
        for (key, name) in [
            ("certificate", CERTIFICATE),
            ("tls_version", TLS_VERSION),
            ("cipher_suites", CIPHER_SUITES),
        ] {
            category.record(key, TestResult::skipped(name, "HTTPS not available"));
        }
    }

    conclude(category)
}

pub async fn https_availability(net: &dyn Network, domain: &str) -> TestResult {
    let available = probe_tcp_port(net, domain, HTTPS_PORT).await;
    let score = if available { Score::Good } else { Score::Failed };
    TestResult::done(HTTPS_AVAILABILITY, score, json!({ "available": available }))
}

pub async fn certificate(net: &dyn Network, domain: &str) -> TestResult {
    guarded(CERTIFICATE, async {
        let result = match net.peer_certificate(domain).await? {
            Some(info) => assess_certificate(&info, domain, Utc::now()),
            None => TestResult::done(
                CERTIFICATE,
                Score::Failed,
                json!({ "valid": false, "reason": "No certificate found" }),
            ),
        };
        Ok::<_, ProbeError>(result)
    })
    .await
}

/// Judges a leaf certificate at instant `now`: it must be inside its validity
/// window and name `domain` in its common name or a DNS SAN.
pub fn assess_certificate(info: &CertificateInfo, domain: &str, now: DateTime<Utc>) -> TestResult {
    let in_window = info.not_before <= now && now <= info.not_after;
    let cn_match = info.subject_cn.as_deref().is_some_and(|cn| name_matches(cn, domain));
    let san_match = info.dns_names.iter().any(|san| name_matches(san, domain));
    let domain_match = cn_match || san_match;

    let mut details = json!({
        "valid": in_window && domain_match,
        "issuer": info.issuer_cn,
        "expires": info.not_after.to_rfc3339(),
        "subject": info.subject_cn,
        "alt_names": info.dns_names,
    });

    if in_window && domain_match {
        return TestResult::done(CERTIFICATE, Score::Good, details);
    }

    let mut reasons = Vec::new();
    if !in_window {
        reasons.push("Certificate is not valid");
    }
    if !domain_match {
        reasons.push("Certificate does not match domain");
    }
    debug!(target = domain, reasons = ?reasons, "Certificate rejected.");
    details["reason"] = json!(reasons.join(", "));
    TestResult::done(CERTIFICATE, Score::Failed, details)
}

/// Exact match, or a `*.` wildcard standing for exactly one leftmost label.
pub fn name_matches(pattern: &str, domain: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(suffix) => match domain.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == domain,
    }
}

/// Pinned handshakes at 1.2 and 1.3; a failed handshake just means "not offered".
pub async fn tls_version(net: &dyn Network, domain: &str) -> TestResult {
    let (tls12, tls13) = tokio::join!(
        net.tls_handshake(domain, Some(TlsVersion::Tls12)),
        net.tls_handshake(domain, Some(TlsVersion::Tls13))
    );

    let mut supported = Vec::new();
    for (version, outcome) in [(TlsVersion::Tls12, tls12), (TlsVersion::Tls13, tls13)] {
        match outcome {
            Ok(session) => supported.push(session.protocol),
            Err(e) => debug!(target = domain, version = version.as_str(), error = %e, "Pinned handshake failed."),
        }
    }

    let score = if supported.contains(&TlsVersion::Tls13) {
        Score::Good
    } else if supported.contains(&TlsVersion::Tls12) {
        Score::Sufficient
    } else {
        Score::Failed
    };
    let names: Vec<_> = supported.iter().map(|v| v.as_str()).collect();
    TestResult::done(TLS_VERSION, score, json!({ "supported_versions": names }))
}

pub async fn cipher_suites(net: &dyn Network, domain: &str) -> TestResult {
    guarded(CIPHER_SUITES, async {
        let session = net.tls_handshake(domain, None).await?;
        Ok::<_, ProbeError>(grade_cipher(session.protocol, &session.cipher))
    })
    .await
}

pub fn grade_cipher(protocol: TlsVersion, cipher: &str) -> TestResult {
    let secure_cipher = APPROVED_CIPHER_SUITES.contains(&cipher);
    let secure_protocol = protocol.is_secure();

    if secure_cipher && secure_protocol {
        return TestResult::done(
            CIPHER_SUITES,
            Score::Good,
            json!({ "cipher": cipher, "protocol": protocol.as_str(), "secure": true }),
        );
    }

    let mut reasons = Vec::new();
    if !secure_cipher {
        reasons.push("Insecure cipher suite");
    }
    if !secure_protocol {
        reasons.push("Insecure protocol");
    }
    let score = if secure_protocol { Score::Warning } else { Score::Failed };
    TestResult::done(
        CIPHER_SUITES,
        score,
        json!({
            "cipher": cipher,
            "protocol": protocol.as_str(),
            "secure": false,
            "reason": reasons.join(", "),
        }),
    )
}
