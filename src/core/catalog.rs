//! Static description of every category the scanner knows about and of the
//! three report runners that group them. Keys and titles here are what ends
//! up in the serialized report, so they double as the public JSON vocabulary.

use crate::config::Config;
use std::fmt;
use strum::EnumIter;

/// A themed group of related probes whose scores are averaged into one sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Category {
    /// AAAA presence and reachability of the website over IPv6.
    Ipv6,
    /// DNSKEY / DS publication and resolver-side validation.
    Dnssec,
    /// HTTPS availability, certificate, protocol version and cipher.
    Tls,
    /// HTTP-to-HTTPS redirect, security headers, cookie flags.
    AppSecPriv,
    /// Composite MX / STARTTLS / DKIM group. Library entry point only.
    Mail,
    Spf,
    Dkim,
    Dmarc,
    /// MX presence plus STARTTLS support on the mail exchangers.
    Starttls,
    /// Whether the connecting client itself came in over IPv6.
    ClientIpv6,
}

impl Category {
    /// The key the category is stored under in a report.
    pub fn key(self) -> &'static str {
        match self {
            Category::Ipv6 | Category::ClientIpv6 => "ipv6",
            Category::Dnssec => "dnssec",
            Category::Tls => "tls",
            Category::AppSecPriv => "appsecpriv",
            Category::Mail => "mail",
            Category::Spf => "spf",
            Category::Dkim => "dkim",
            Category::Dmarc => "dmarc",
            Category::Starttls => "starttls",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Category::Ipv6 | Category::ClientIpv6 => "IPv6",
            Category::Dnssec => "DNSSEC",
            Category::Tls => "TLS",
            Category::AppSecPriv => "Security & Privacy",
            Category::Mail => "Mail",
            Category::Spf => "SPF",
            Category::Dkim => "DKIM",
            Category::Dmarc => "DMARC",
            Category::Starttls => "STARTTLS",
        }
    }

    /// Whether the configuration's feature flags let this category run.
    pub fn is_enabled(self, config: &Config) -> bool {
        match self {
            Category::Ipv6 | Category::ClientIpv6 => config.check_ipv6,
            Category::Dnssec => config.check_dnssec,
            Category::Tls => config.check_tls,
            Category::AppSecPriv => config.check_appsecpriv,
            Category::Mail
            | Category::Spf
            | Category::Dkim
            | Category::Dmarc
            | Category::Starttls => config.check_mail,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// The three report entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RunnerKind {
    Website,
    Email,
    Connection,
}

static WEBSITE_WEIGHTS: &[(Category, f64)] = &[
    (Category::Ipv6, 0.25),
    (Category::Dnssec, 0.25),
    (Category::Tls, 0.25),
    (Category::AppSecPriv, 0.25),
];

static EMAIL_WEIGHTS: &[(Category, f64)] = &[
    (Category::Spf, 0.25),
    (Category::Dkim, 0.25),
    (Category::Dmarc, 0.25),
    (Category::Starttls, 0.25),
];

static CONNECTION_WEIGHTS: &[(Category, f64)] = &[(Category::ClientIpv6, 1.0)];

impl RunnerKind {
    /// Categories in report order, each with its fixed weight.
    pub fn weights(self) -> &'static [(Category, f64)] {
        match self {
            RunnerKind::Website => WEBSITE_WEIGHTS,
            RunnerKind::Email => EMAIL_WEIGHTS,
            RunnerKind::Connection => CONNECTION_WEIGHTS,
        }
    }

    /// The weight table restricted to the categories the configuration enables.
    pub fn enabled_weights(self, config: &Config) -> Vec<(Category, f64)> {
        self.weights()
            .iter()
            .copied()
            .filter(|(category, _)| category.is_enabled(config))
            .collect()
    }
}
