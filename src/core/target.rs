// src/core/target.rs

use std::net::IpAddr;
use thiserror::Error;
use url::Url;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Input rejected before any probe runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("missing domain")]
    MissingDomain,
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error("invalid client IP address: {0}")]
    InvalidClientIp(String),
}

/// Turns user input into the bare, lower-cased host name the probes expect.
///
/// Accepts either a plain name (`Example.COM.`) or a URL (`https://example.com/path`),
/// in which case only the host is kept.
pub fn normalize_domain(input: &str) -> Result<String, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::MissingDomain);
    }

    let host = if trimmed.contains("://") {
        Url::parse(trimmed)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or_else(|| InputError::InvalidDomain(trimmed.to_string()))?
    } else {
        trimmed.to_string()
    };

    let domain = host.trim_end_matches('.').to_ascii_lowercase();
    if is_valid_domain(&domain) {
        Ok(domain)
    } else {
        Err(InputError::InvalidDomain(trimmed.to_string()))
    }
}

fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain.len() <= MAX_DOMAIN_LEN
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= MAX_LABEL_LEN
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

/// Parses and re-renders a client address in canonical form.
pub fn parse_client_ip(input: &str) -> Result<String, InputError> {
    input
        .trim()
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| InputError::InvalidClientIp(input.trim().to_string()))
}
