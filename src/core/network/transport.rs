// src/core/network/transport.rs

use chrono::{DateTime, Utc};
use native_tls::TlsConnector as NativeTlsConnector;
use openssl::error::ErrorStack;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use reqwest::header::SET_COOKIE;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{debug, error, info};
use x509_parser::prelude::*;

use super::NetError;
use crate::core::models::{CertificateInfo, HttpResponse, TlsSession, TlsVersion};

const HTTPS_PORT: u16 = 443;
const SMTP_PORT: u16 = 25;

// --- TCP ---

pub async fn tcp_connect(host: &str, port: u16, limit: Duration) -> bool {
    let attempt = match host.parse::<IpAddr>() {
        Ok(ip) => timeout(limit, TcpStream::connect(SocketAddr::new(ip, port))).await,
        Err(_) => timeout(limit, TcpStream::connect((host, port))).await,
    };
    match attempt {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "TCP connect failed.");
            false
        }
        Err(_) => {
            debug!(host, port, "TCP connect timed out.");
            false
        }
    }
}

// --- HTTP ---

pub fn build_http_client(user_agent: &str, limit: Duration) -> Result<reqwest::Client, NetError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(limit)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| {
            error!(error = %e, "Failed to build HTTP client.");
            NetError::Http(format!("Failed to build HTTP client: {e}"))
        })
}

pub async fn http_get(client: &reqwest::Client, url: &str) -> Result<HttpResponse, NetError> {
    let response = client.get(url).send().await.map_err(|e| NetError::Http(e.to_string()))?;
    info!(url, status = %response.status(), final_url = %response.url(), "Received HTTP response.");

    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
        })
        .collect();
    let set_cookies = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect();

    Ok(HttpResponse {
        final_url: response.url().to_string(),
        status: response.status().as_u16(),
        headers,
        set_cookies,
    })
}

// --- Certificate retrieval ---

/// Runs the blocking native-tls handshake on the blocking pool, name
/// resolution included, under one overall deadline.
pub async fn peer_certificate(host: &str, limit: Duration) -> Result<Option<CertificateInfo>, NetError> {
    certificate_on_port(host, HTTPS_PORT, limit).await
}

pub(crate) async fn certificate_on_port(
    host: &str,
    port: u16,
    limit: Duration,
) -> Result<Option<CertificateInfo>, NetError> {
    let host = host.to_string();
    debug!(host = %host, "Spawning blocking task for certificate retrieval.");
    match timeout(limit, spawn_blocking(move || fetch_certificate(&host, port, limit))).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(panic = %e, "Blocking certificate task failed.");
            Err(NetError::Task(e.to_string()))
        }
        Err(_) => Err(NetError::Timeout(limit)),
    }
}

fn fetch_certificate(host: &str, port: u16, limit: Duration) -> Result<Option<CertificateInfo>, NetError> {
    // Validity and name matching are judged by the caller, so accept anything here.
    let connector = NativeTlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| NetError::Tls(format!("TlsConnector Error: {e}")))?;

    let stream = connect_any(host, port, limit)?;
    stream.set_read_timeout(Some(limit))?;
    stream.set_write_timeout(Some(limit))?;

    let stream = connector
        .connect(host, stream)
        .map_err(|e| NetError::Tls(format!("TLS Handshake Error: {e}")))?;

    let cert = match stream.peer_certificate() {
        Ok(Some(cert)) => cert,
        Ok(None) => {
            debug!(host, "Handshake completed without a peer certificate.");
            return Ok(None);
        }
        Err(e) => return Err(NetError::Tls(format!("Could not get peer certificate: {e}"))),
    };
    let der = cert
        .to_der()
        .map_err(|e| NetError::Tls(format!("Could not convert certificate to DER: {e}")))?;
    parse_certificate(&der).map(Some)
}

/// Tries each resolved address in turn; the last failure is reported.
pub(crate) fn connect_any(host: &str, port: u16, limit: Duration) -> Result<std::net::TcpStream, NetError> {
    let mut last_error = None;
    for addr in (host, port).to_socket_addrs()? {
        match std::net::TcpStream::connect_timeout(&addr, limit) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(host, %addr, error = %e, "Connect attempt failed.");
                last_error = Some(e);
            }
        }
    }
    Err(match last_error {
        Some(e) => NetError::Io(e),
        None => NetError::InvalidName(host.to_string()),
    })
}

pub fn parse_certificate(der: &[u8]) -> Result<CertificateInfo, NetError> {
    let (_, x509) =
        parse_x509_certificate(der).map_err(|e| NetError::Tls(format!("X.509 Parse Error: {e}")))?;
    info!(subject = %x509.subject(), issuer = %x509.issuer(), "Parsed peer certificate.");

    let validity = x509.validity();
    let dns_names = match x509.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(CertificateInfo {
        subject_cn: first_common_name(x509.subject()),
        issuer_cn: first_common_name(x509.issuer()),
        dns_names,
        not_before: asn1_time_to_chrono_utc(&validity.not_before),
        not_after: asn1_time_to_chrono_utc(&validity.not_after),
    })
}

fn first_common_name(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

// --- Version-pinned handshakes ---

/// Every suite the local OpenSSL still knows, legacy ones included, so a
/// weak server configuration is observed instead of refused.
const PERMISSIVE_CIPHERS: &str = "ALL:@SECLEVEL=0";

fn ssl_version(version: TlsVersion) -> SslVersion {
    match version {
        TlsVersion::Tls10 => SslVersion::TLS1,
        TlsVersion::Tls11 => SslVersion::TLS1_1,
        TlsVersion::Tls12 => SslVersion::TLS1_2,
        TlsVersion::Tls13 => SslVersion::TLS1_3,
    }
}

/// Maps OpenSSL's `version_str()` onto the protocols the scanner grades.
pub(crate) fn protocol_from_name(name: &str) -> Option<TlsVersion> {
    match name {
        "TLSv1" | "TLSv1.0" => Some(TlsVersion::Tls10),
        "TLSv1.1" => Some(TlsVersion::Tls11),
        "TLSv1.2" => Some(TlsVersion::Tls12),
        "TLSv1.3" => Some(TlsVersion::Tls13),
        _ => None,
    }
}

/// Chain and hostname checks are off; the certificate probe judges those.
fn handshake_connector(version: Option<TlsVersion>) -> Result<SslConnector, ErrorStack> {
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    builder.set_verify(SslVerifyMode::NONE);
    builder.set_cipher_list(PERMISSIVE_CIPHERS)?;
    if let Some(version) = version {
        builder.set_min_proto_version(Some(ssl_version(version)))?;
        builder.set_max_proto_version(Some(ssl_version(version)))?;
    }
    Ok(builder.build())
}

/// `Some(version)` pins both ends of the protocol range.
pub async fn tls_handshake(
    host: &str,
    version: Option<TlsVersion>,
    limit: Duration,
) -> Result<TlsSession, NetError> {
    handshake_on_port(host, HTTPS_PORT, version, limit).await
}

pub(crate) async fn handshake_on_port(
    host: &str,
    port: u16,
    version: Option<TlsVersion>,
    limit: Duration,
) -> Result<TlsSession, NetError> {
    let connector =
        handshake_connector(version).map_err(|e| NetError::Tls(format!("SslConnector Error: {e}")))?;

    let stream = timeout(limit, TcpStream::connect((host, port)))
        .await
        .map_err(|_| NetError::Timeout(limit))??;
    let stream = stream.into_std()?;
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(limit))?;
    stream.set_write_timeout(Some(limit))?;

    let host = host.to_string();
    let handshake = spawn_blocking(move || negotiate(&connector, &host, stream));
    match timeout(limit, handshake).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(panic = %e, "Blocking handshake task failed.");
            Err(NetError::Task(e.to_string()))
        }
        Err(_) => Err(NetError::Timeout(limit)),
    }
}

fn negotiate(connector: &SslConnector, host: &str, stream: std::net::TcpStream) -> Result<TlsSession, NetError> {
    let stream = connector
        .configure()
        .map_err(|e| NetError::Tls(e.to_string()))?
        .verify_hostname(false)
        .connect(host, stream)
        .map_err(|e| NetError::Tls(e.to_string()))?;

    let ssl = stream.ssl();
    let protocol = protocol_from_name(ssl.version_str())
        .ok_or_else(|| NetError::Tls(format!("unexpected protocol version {}", ssl.version_str())))?;
    let cipher = ssl.current_cipher().map(|c| c.name().to_string()).unwrap_or_default();
    debug!(host, protocol = protocol.as_str(), cipher = %cipher, "TLS handshake completed.");
    Ok(TlsSession { protocol, cipher })
}

// --- SMTP ---

pub async fn smtp_capabilities(host: &str, ehlo_domain: &str, limit: Duration) -> Result<Vec<String>, NetError> {
    timeout(limit, smtp_dialogue(host, ehlo_domain))
        .await
        .map_err(|_| NetError::Timeout(limit))?
}

async fn smtp_dialogue(host: &str, ehlo_domain: &str) -> Result<Vec<String>, NetError> {
    let stream = TcpStream::connect((host, SMTP_PORT)).await?;
    let mut reader = BufReader::new(stream);

    let greeting = read_reply(&mut reader).await?;
    if greeting.code != 220 {
        return Err(NetError::Smtp(format!("expected 220 greeting, got {}", greeting.code)));
    }

    let ehlo = format!("EHLO {ehlo_domain}\r\n");
    reader.get_mut().write_all(ehlo.as_bytes()).await?;
    reader.get_mut().flush().await?;

    let reply = read_reply(&mut reader).await?;
    if reply.code != 250 {
        return Err(NetError::Smtp(format!("EHLO rejected with {}", reply.code)));
    }

    // Best effort; the capabilities are already in hand.
    let _ = reader.get_mut().write_all(b"QUIT\r\n").await;
    Ok(ehlo_keywords(&reply.lines))
}

#[derive(Debug, PartialEq)]
pub(crate) struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

/// Reads one possibly multi-line reply (`250-...` continuations, `250 ...` last).
pub(crate) async fn read_reply<R>(reader: &mut R) -> Result<SmtpReply, NetError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut raw = String::new();
        if reader.read_line(&mut raw).await? == 0 {
            return Err(NetError::Smtp("connection closed mid-reply".to_string()));
        }
        let line = raw.trim_end();
        let code: u16 = line
            .get(..3)
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| NetError::Smtp(format!("malformed reply line {line:?}")))?;
        let continued = line.as_bytes().get(3) == Some(&b'-');
        lines.push(line.get(4..).unwrap_or_default().to_string());
        if !continued {
            return Ok(SmtpReply { code, lines });
        }
    }
}

/// The first EHLO line is the server's greeting; the rest are keywords with parameters.
pub(crate) fn ehlo_keywords(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_ascii_uppercase)
        .collect()
}
