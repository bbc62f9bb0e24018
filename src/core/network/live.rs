// src/core/network/live.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use super::dns::DnsClient;
use super::{transport, DnsError, NetError, Network, RecordType};
use crate::config::Config;
use crate::core::models::{CertificateInfo, DnskeyInfo, DsInfo, HttpResponse, TlsSession, TlsVersion};

/// Talks to real resolvers and servers. One instance is shared by every
/// category of a run.
pub struct LiveNetwork {
    dns: DnsClient,
    http: reqwest::Client,
    tls_timeout: Duration,
    default_timeout: Duration,
    ehlo_domain: String,
}

impl LiveNetwork {
    pub fn new(config: &Config) -> Result<Self, NetError> {
        info!(
            dns_timeout = config.dns_timeout,
            tls_timeout = config.tls_timeout,
            http_timeout = config.http_timeout,
            "Initializing live network."
        );
        Ok(Self {
            dns: DnsClient::new(config.dns_timeout()),
            http: transport::build_http_client(&config.user_agent, config.http_timeout())?,
            tls_timeout: config.tls_timeout(),
            default_timeout: config.default_timeout(),
            ehlo_domain: config.smtp_ehlo_domain.clone(),
        })
    }
}

#[async_trait]
impl Network for LiveNetwork {
    async fn lookup(&self, name: &str, record_type: RecordType) -> Result<Vec<String>, DnsError> {
        self.dns.lookup(name, record_type).await
    }

    async fn dnskey(&self, name: &str) -> Result<Vec<DnskeyInfo>, DnsError> {
        self.dns.dnskey(name).await
    }

    async fn ds(&self, name: &str) -> Result<Vec<DsInfo>, DnsError> {
        self.dns.ds(name).await
    }

    async fn validated_lookup(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.dns.validated_lookup(name).await
    }

    async fn tcp_connect(&self, host: &str, port: u16) -> bool {
        transport::tcp_connect(host, port, self.default_timeout).await
    }

    async fn http_get(&self, url: &str) -> Result<HttpResponse, NetError> {
        transport::http_get(&self.http, url).await
    }

    async fn peer_certificate(&self, host: &str) -> Result<Option<CertificateInfo>, NetError> {
        transport::peer_certificate(host, self.tls_timeout).await
    }

    async fn tls_handshake(&self, host: &str, version: Option<TlsVersion>) -> Result<TlsSession, NetError> {
        transport::tls_handshake(host, version, self.tls_timeout).await
    }

    async fn smtp_capabilities(&self, host: &str) -> Result<Vec<String>, NetError> {
        transport::smtp_capabilities(host, &self.ehlo_domain, self.default_timeout).await
    }
}
