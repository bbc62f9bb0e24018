// src/config.rs

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Prefix shared by every environment variable the scanner reads.
pub const ENV_PREFIX: &str = "HEALTHSCAN_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Process-wide settings, built once at startup and handed to every runner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds allowed for one DNS query.
    pub dns_timeout: u64,
    /// Seconds allowed for a TLS handshake.
    pub tls_timeout: u64,
    /// Seconds allowed for an HTTP request, redirects included.
    pub http_timeout: u64,
    /// Seconds for everything else (TCP probes, SMTP sessions).
    pub default_timeout: u64,
    pub smtp_ehlo_domain: String,
    pub user_agent: String,
    pub check_ipv6: bool,
    pub check_dnssec: bool,
    pub check_tls: bool,
    pub check_appsecpriv: bool,
    pub check_mail: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dns_timeout: 5,
            tls_timeout: 10,
            http_timeout: 10,
            default_timeout: 10,
            smtp_ehlo_domain: "internet.nl".to_string(),
            user_agent: concat!("healthscan/", env!("CARGO_PKG_VERSION")).to_string(),
            check_ipv6: true,
            check_dnssec: true,
            check_tls: true,
            check_appsecpriv: true,
            check_mail: true,
        }
    }
}

impl Config {
    /// Builds the configuration from `HEALTHSCAN_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads a JSON file; keys it omits keep their default value.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: display.clone(), source })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path: display, source })
    }

    /// Applies environment overrides on top of `self`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_value(&lookup, "DNS_TIMEOUT", &mut self.dns_timeout)?;
        override_value(&lookup, "TLS_TIMEOUT", &mut self.tls_timeout)?;
        override_value(&lookup, "HTTP_TIMEOUT", &mut self.http_timeout)?;
        override_value(&lookup, "DEFAULT_TIMEOUT", &mut self.default_timeout)?;
        override_value(&lookup, "SMTP_EHLO_DOMAIN", &mut self.smtp_ehlo_domain)?;
        override_value(&lookup, "USER_AGENT", &mut self.user_agent)?;
        override_flag(&lookup, "CHECK_IPV6", &mut self.check_ipv6)?;
        override_flag(&lookup, "CHECK_DNSSEC", &mut self.check_dnssec)?;
        override_flag(&lookup, "CHECK_TLS", &mut self.check_tls)?;
        override_flag(&lookup, "CHECK_APPSECPRIV", &mut self.check_appsecpriv)?;
        override_flag(&lookup, "CHECK_MAIL", &mut self.check_mail)?;
        Ok(self)
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_env_overrides(lookup)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout)
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_timeout)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout)
    }
}

fn override_value<F, T>(lookup: &F, name: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let key = format!("{ENV_PREFIX}{name}");
    if let Some(raw) = lookup(&key) {
        debug!(key = %key, value = %raw, "Applying configuration override.");
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw.clone() })?;
    }
    Ok(())
}

// Flags accept the usual spellings; anything else is rejected rather than read as false.
fn override_flag<F>(lookup: &F, name: &str, slot: &mut bool) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let key = format!("{ENV_PREFIX}{name}");
    if let Some(raw) = lookup(&key) {
        *slot = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => return Err(ConfigError::InvalidValue { key, value: raw }),
        };
    }
    Ok(())
}
