// src/core/models.rs

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::core::catalog::Category;

// --- Score Primitives ---

/// The closed set of sub-test scores. Aggregation code only ever sees these
/// five values (or averages of them), never a raw integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Score {
    Good,
    Sufficient,
    Warning,
    Bad,
    Failed,
}

impl Score {
    pub const fn value(self) -> u8 {
        match self {
            Score::Good => 100,
            Score::Sufficient => 75,
            Score::Warning => 50,
            Score::Bad => 25,
            Score::Failed => 0,
        }
    }

    /// Anything above FAILED counts as a satisfied prerequisite for skip decisions.
    pub fn passed(self) -> bool {
        self != Score::Failed
    }

    /// Maps a 0.0..=1.0 ratio onto the graded scale shared by the header and cookie probes.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 0.9 {
            Score::Good
        } else if ratio >= 0.7 {
            Score::Sufficient
        } else if ratio >= 0.4 {
            Score::Warning
        } else {
            Score::Bad
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.value()
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            100 => Ok(Score::Good),
            75 => Ok(Score::Sufficient),
            50 => Ok(Score::Warning),
            25 => Ok(Score::Bad),
            0 => Ok(Score::Failed),
            other => Err(format!("{other} is not a valid score")),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

// Lifecycle of a category or report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    NotStarted,
    Scheduled,
    Running,
    Done,
    Error,
}

// Outcome of a single leaf probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Done,
    Error,
    Skipped,
}

/// Human classification of a continuous 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Excellent,
    Good,
    Sufficient,
    Bad,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Rating::Excellent
        } else if score >= 75.0 {
            Rating::Good
        } else if score >= 50.0 {
            Rating::Sufficient
        } else {
            Rating::Bad
        }
    }
}

pub type Details = Map<String, Value>;

// --- Test Result ---

/// The uniform record every leaf probe produces exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: ProbeStatus,
    pub score: Score,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}

impl TestResult {
    pub fn new(name: &str, status: ProbeStatus, score: Score, details: Value) -> Self {
        let details = match details {
            Value::Object(map) if !map.is_empty() => Some(map),
            _ => None,
        };
        Self { name: name.to_string(), status, score, details }
    }

    pub fn done(name: &str, score: Score, details: Value) -> Self {
        Self::new(name, ProbeStatus::Done, score, details)
    }

    /// A dependent test that did not run because its prerequisite failed.
    pub fn skipped(name: &str, reason: &str) -> Self {
        Self::new(
            name,
            ProbeStatus::Skipped,
            Score::Failed,
            serde_json::json!({ "reason": reason }),
        )
    }

    pub fn error(name: &str, message: impl Into<String>) -> Self {
        Self::new(
            name,
            ProbeStatus::Error,
            Score::Failed,
            serde_json::json!({ "error": message.into() }),
        )
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.as_ref().and_then(|d| d.get(key))
    }
}

// --- Category Result ---

/// A themed group of leaf results, scored by their unweighted mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub name: String,
    pub status: TestStatus,
    pub tests: IndexMap<String, TestResult>,
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CategoryResult {
    pub fn new(category: Category) -> Self {
        Self {
            name: category.title().to_string(),
            status: TestStatus::Running,
            tests: IndexMap::new(),
            score: None,
            error: None,
        }
    }

    /// Stores a result under its key. Keys are unique within a category.
    pub fn record(&mut self, key: &str, result: TestResult) {
        self.tests.insert(key.to_string(), result);
    }

    pub fn test(&self, key: &str) -> Option<&TestResult> {
        self.tests.get(key)
    }

    /// Aggregates the stored tests. An empty category is a runner fault.
    pub fn finish(mut self) -> Self {
        match crate::core::scoring::mean_score(self.tests.values().map(|t| t.score)) {
            Ok(score) => {
                self.score = Some(score);
                self.status = TestStatus::Done;
            }
            Err(e) => {
                self.score = None;
                self.status = TestStatus::Error;
                self.error = Some(e.to_string());
            }
        }
        self
    }
}

// --- Report ---

/// What a report is about: a domain, or the connecting client's address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    #[serde(rename = "domain")]
    Domain(String),
    #[serde(rename = "client_ip")]
    ClientIp(String),
}

impl Subject {
    pub fn as_str(&self) -> &str {
        match self {
            Subject::Domain(s) | Subject::ClientIp(s) => s,
        }
    }
}

/// The final, weighted report returned by the top-level runners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResult {
    #[serde(flatten)]
    pub subject: Subject,
    pub timestamp: String,
    pub status: TestStatus,
    pub categories: IndexMap<String, CategoryResult>,
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportResult {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            timestamp: iso_timestamp(Utc::now()),
            status: TestStatus::Running,
            categories: IndexMap::new(),
            score: None,
            rating: None,
            error: None,
        }
    }

    pub fn category(&self, key: &str) -> Option<&CategoryResult> {
        self.categories.get(key)
    }

    /// All-or-nothing failure: gathered categories are discarded.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.categories.clear();
        self.score = None;
        self.rating = None;
        self.status = TestStatus::Error;
        self.error = Some(message.into());
        self
    }
}

pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

// --- Network Records ---

/// Leaf certificate facts extracted from a TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub subject_cn: Option<String>,
    pub issuer_cn: Option<String>,
    pub dns_names: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

// A DNSKEY record as seen by the probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnskeyInfo {
    pub key_tag: u16,
    pub algorithm: u8,
    pub flags: u16,
}

// A DS record from the parent zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsInfo {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub final_url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub set_cookies: Vec<String>,
}

impl HttpResponse {
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "TLSv1.0")]
    Tls10,
    #[serde(rename = "TLSv1.1")]
    Tls11,
    #[serde(rename = "TLSv1.2")]
    Tls12,
    #[serde(rename = "TLSv1.3")]
    Tls13,
}

impl TlsVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, TlsVersion::Tls12 | TlsVersion::Tls13)
    }
}

// What a completed handshake negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSession {
    pub protocol: TlsVersion,
    pub cipher: String,
}
