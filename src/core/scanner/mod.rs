// src/core/scanner/mod.rs

// One module per category. Each exposes its leaf probes and a
// `run_<category>_category` runner; this file holds the shared probe boundary
// and the three report entry points.
pub mod appsecpriv_scanner;
pub mod dmarc_scanner;
pub mod dnssec_scanner;
pub mod ipv6_scanner;
pub mod mail_scanner;
pub mod spf_scanner;
pub mod tls_scanner;

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::core::catalog::{Category, RunnerKind};
use crate::core::models::{CategoryResult, Rating, ReportResult, Subject, TestResult, TestStatus};
use crate::core::network::{DnsError, NetError, Network};
use crate::core::scoring::weighted_score;

/// Anything a leaf probe can fail with before it has a verdict.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Dns(#[from] DnsError),
    #[error(transparent)]
    Net(#[from] NetError),
}

/// Why a whole report was abandoned.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{category}: {message}")]
    Category { category: &'static str, message: String },
    #[error("{category}: task failed: {message}")]
    Task { category: &'static str, message: String },
}

// --- Probe boundary ---

/// Awaits a probe and converts its error, if any, into an `error` result.
/// Every fallible leaf probe goes through here exactly once.
pub(crate) async fn guarded<F>(name: &str, probe: F) -> TestResult
where
    F: Future<Output = Result<TestResult, ProbeError>>,
{
    match probe.await {
        Ok(result) => result,
        Err(e) => {
            warn!(test = name, error = %e, "Probe failed.");
            TestResult::error(name, e.to_string())
        }
    }
}

/// Aggregates a category and logs the outcome.
pub(crate) fn conclude(category: CategoryResult) -> CategoryResult {
    let category = category.finish();
    match (&category.status, category.score) {
        (TestStatus::Done, Some(score)) => {
            info!(category = %category.name, score, tests = category.tests.len(), "Category finished.");
        }
        _ => error!(category = %category.name, error = ?category.error, "Category failed."),
    }
    category
}

/// Dispatches to the runner for `category`. `target` is a domain, or the
/// client address for the connection category.
pub async fn run_category(category: Category, net: &dyn Network, target: &str) -> CategoryResult {
    match category {
        Category::Ipv6 => ipv6_scanner::run_ipv6_category(net, target).await,
        Category::Dnssec => dnssec_scanner::run_dnssec_category(net, target).await,
        Category::Tls => tls_scanner::run_tls_category(net, target).await,
        Category::AppSecPriv => appsecpriv_scanner::run_appsecpriv_category(net, target).await,
        Category::Mail => mail_scanner::run_mail_category(net, target).await,
        Category::Spf => spf_scanner::run_spf_category(net, target).await,
        Category::Dkim => mail_scanner::run_dkim_category(net, target).await,
        Category::Dmarc => dmarc_scanner::run_dmarc_category(net, target).await,
        Category::Starttls => mail_scanner::run_starttls_category(net, target).await,
        Category::ClientIpv6 => ipv6_scanner::run_client_ipv6_category(target),
    }
}

// --- Reports ---

/// IPv6, DNSSEC, TLS and Security & Privacy for a website.
pub async fn run_website_tests(net: Arc<dyn Network>, config: &Config, domain: &str) -> ReportResult {
    run_report(RunnerKind::Website, net, config, Subject::Domain(domain.to_string())).await
}

/// SPF, DKIM, DMARC and STARTTLS for a mail domain.
pub async fn run_email_tests(net: Arc<dyn Network>, config: &Config, domain: &str) -> ReportResult {
    run_report(RunnerKind::Email, net, config, Subject::Domain(domain.to_string())).await
}

/// Whether the client reached us over IPv6.
pub async fn run_connection_tests(net: Arc<dyn Network>, config: &Config, client_ip: &str) -> ReportResult {
    run_report(RunnerKind::Connection, net, config, Subject::ClientIp(client_ip.to_string())).await
}

/// Runs every enabled category of `kind` on its own task and weighs the results.
///
/// Categories are collected in weight-table order regardless of which task
/// finishes first. The first category that errors (or whose task dies) fails
/// the whole report and the remaining tasks are aborted.
async fn run_report(kind: RunnerKind, net: Arc<dyn Network>, config: &Config, subject: Subject) -> ReportResult {
    let mut report = ReportResult::new(subject);
    let target = report.subject.as_str().to_string();
    let enabled = kind.enabled_weights(config);
    info!(runner = %kind, target = %target, categories = enabled.len(), "Starting report.");

    let tasks: Vec<(Category, f64, JoinHandle<CategoryResult>)> = enabled
        .into_iter()
        .map(|(category, weight)| {
            let net = Arc::clone(&net);
            let target = target.clone();
            let span = info_span!("category", key = category.key(), target = %target);
            let handle = tokio::spawn(
                async move { run_category(category, net.as_ref(), &target).await }.instrument(span),
            );
            (category, weight, handle)
        })
        .collect();

    let mut entries = Vec::with_capacity(tasks.len());
    let mut pending = tasks.into_iter();
    while let Some((category, weight, handle)) = pending.next() {
        let outcome = match handle.await {
            Ok(result) if result.status == TestStatus::Error => Err(RunnerError::Category {
                category: category.key(),
                message: result.error.unwrap_or_else(|| "category failed".to_string()),
            }),
            Ok(result) => Ok(result),
            Err(e) => Err(RunnerError::Task { category: category.key(), message: e.to_string() }),
        };

        match outcome {
            Ok(result) => {
                entries.push((result.score, weight));
                report.categories.insert(category.key().to_string(), result);
            }
            Err(e) => {
                for (_, _, rest) in pending {
                    rest.abort();
                }
                error!(runner = %kind, target = %target, error = %e, "Report aborted.");
                return report.fail(e.to_string());
            }
        }
    }

    let score = weighted_score(&entries);
    report.score = Some(score);
    report.rating = Some(Rating::from_score(score));
    report.status = TestStatus::Done;
    info!(runner = %kind, target = %target, score, "Report finished.");
    report
}
