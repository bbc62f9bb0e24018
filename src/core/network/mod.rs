// src/core/network/mod.rs

// The probes never touch sockets or resolvers directly. Everything goes
// through the `Network` trait so a report can be produced against live
// infrastructure (`LiveNetwork`) or against fixed responses in tests.
pub mod dns;
pub mod live;
pub mod transport;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::core::models::{CertificateInfo, DnskeyInfo, DsInfo, HttpResponse, TlsSession, TlsVersion};

pub use self::live::LiveNetwork;

/// Record types the probes ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Mx,
    Txt,
}

/// Typed DNS failure. "No record" and "no such name" are legitimate negative
/// answers; `Resolution` is a query that could not be answered at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsError {
    #[error("no {record_type} record for {name}")]
    NoRecord { name: String, record_type: String },
    #[error("domain {0} does not exist")]
    NameNotFound(String),
    #[error("DNSSEC validation failed: {0}")]
    Validation(String),
    #[error("DNS resolution error: {0}")]
    Resolution(String),
}

impl DnsError {
    /// True for answers that mean "nothing published here".
    pub fn is_negative_answer(&self) -> bool {
        matches!(self, DnsError::NoRecord { .. } | DnsError::NameNotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum NetError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("invalid host name: {0}")]
    InvalidName(String),
    #[error("background task failed: {0}")]
    Task(String),
}

/// The black-box collaborators every probe relies on.
#[async_trait]
pub trait Network: Send + Sync {
    /// Record values in resolver order: addresses as text, MX exchanges
    /// without the trailing dot, TXT character-strings concatenated.
    async fn lookup(&self, name: &str, record_type: RecordType) -> Result<Vec<String>, DnsError>;

    async fn dnskey(&self, name: &str) -> Result<Vec<DnskeyInfo>, DnsError>;

    async fn ds(&self, name: &str) -> Result<Vec<DsInfo>, DnsError>;

    /// A-record lookup through a DNSSEC-validating resolver.
    async fn validated_lookup(&self, name: &str) -> Result<Vec<String>, DnsError>;

    /// Connect-only reachability check; any failure is `false`.
    async fn tcp_connect(&self, host: &str, port: u16) -> bool;

    /// GET with redirects followed.
    async fn http_get(&self, url: &str) -> Result<HttpResponse, NetError>;

    /// Leaf certificate from a handshake on port 443 that does not verify the chain.
    async fn peer_certificate(&self, host: &str) -> Result<Option<CertificateInfo>, NetError>;

    /// Handshake on port 443, pinned to `version` when given.
    async fn tls_handshake(&self, host: &str, version: Option<TlsVersion>) -> Result<TlsSession, NetError>;

    /// EHLO keywords (upper-cased) advertised by the SMTP server on port 25.
    async fn smtp_capabilities(&self, host: &str) -> Result<Vec<String>, NetError>;
}

pub async fn dns_lookup(
    net: &dyn Network,
    name: &str,
    record_type: RecordType,
) -> Result<Vec<String>, DnsError> {
    debug!(name, %record_type, "DNS lookup.");
    let result = net.lookup(name, record_type).await;
    if let Err(e) = &result {
        debug!(name, %record_type, error = %e, "DNS lookup returned no data.");
    }
    result
}

/// Like `dns_lookup`, but a negative answer is an empty list. Query errors still propagate.
pub async fn dns_lookup_or_empty(
    net: &dyn Network,
    name: &str,
    record_type: RecordType,
) -> Result<Vec<String>, DnsError> {
    match dns_lookup(net, name, record_type).await {
        Err(e) if e.is_negative_answer() => Ok(Vec::new()),
        other => other,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedAddresses {
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
}

/// Resolves both address families independently; a failing family is empty.
pub async fn resolve_addresses(net: &dyn Network, name: &str) -> ResolvedAddresses {
    let (ipv4, ipv6) = tokio::join!(
        dns_lookup(net, name, RecordType::A),
        dns_lookup(net, name, RecordType::Aaaa)
    );
    ResolvedAddresses {
        ipv4: ipv4.unwrap_or_default(),
        ipv6: ipv6.unwrap_or_default(),
    }
}

pub async fn probe_tcp_port(net: &dyn Network, host: &str, port: u16) -> bool {
    let open = net.tcp_connect(host, port).await;
    debug!(host, port, open, "TCP probe finished.");
    open
}
