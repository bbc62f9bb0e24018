// src/core/scanner/appsecpriv_scanner.rs

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{conclude, guarded, ProbeError};
use crate::core::catalog::Category;
use crate::core::models::{CategoryResult, Score, TestResult};
use crate::core::network::Network;

const HTTPS_REDIRECT: &str = "HTTPS Redirect";
const SECURITY_HEADERS_TEST: &str = "Security Headers";
const COOKIE_SECURITY: &str = "Cookie Security";

/// The response headers every site is expected to send.
pub const SECURITY_HEADERS: [&str; 6] = [
    "Strict-Transport-Security",
    "Content-Security-Policy",
    "X-Content-Type-Options",
    "X-Frame-Options",
    "X-XSS-Protection",
    "Referrer-Policy",
];

pub async fn run_appsecpriv_category(net: &dyn Network, domain: &str) -> CategoryResult {
    info!(target = domain, category = "appsecpriv", "Starting category.");
    let mut category = CategoryResult::new(Category::AppSecPriv);

    let (redirect, headers, cookies) = tokio::join!(
        https_redirect(net, domain),
        security_headers(net, domain),
        cookie_security(net, domain)
    );
    category.record("https_redirect", redirect);
    category.record("security_headers", headers);
    category.record("cookie_security", cookies);

    conclude(category)
}

/// Plain HTTP with redirects followed must end up on an https:// URL.
pub async fn https_redirect(net: &dyn Network, domain: &str) -> TestResult {
    guarded(HTTPS_REDIRECT, async {
        let response = net.http_get(&format!("http://{domain}")).await?;
        let redirects = response.final_url.starts_with("https://");
        let score = if redirects { Score::Good } else { Score::Failed };
        Ok::<_, ProbeError>(TestResult::done(
            HTTPS_REDIRECT,
            score,
            json!({ "redirects": redirects, "final_url": response.final_url }),
        ))
    })
    .await
}

pub async fn security_headers(net: &dyn Network, domain: &str) -> TestResult {
    guarded(SECURITY_HEADERS_TEST, async {
        let response = net.http_get(&format!("https://{domain}")).await?;

        let mut present = Map::new();
        let mut found = 0usize;
        for header in SECURITY_HEADERS {
            let has = response.has_header(header);
            if !has {
                debug!(target = domain, header, "Security header missing.");
            }
            found += usize::from(has);
            present.insert(header.to_string(), Value::Bool(has));
        }

        let score = Score::from_ratio(found as f64 / SECURITY_HEADERS.len() as f64);
        Ok::<_, ProbeError>(TestResult::done(
            SECURITY_HEADERS_TEST,
            score,
            json!({ "headers": present, "found": found, "total": SECURITY_HEADERS.len() }),
        ))
    })
    .await
}

pub async fn cookie_security(net: &dyn Network, domain: &str) -> TestResult {
    guarded(COOKIE_SECURITY, async {
        let response = net.http_get(&format!("https://{domain}")).await?;
        let cookies: Vec<CookieFlags> = response.set_cookies.iter().map(|raw| CookieFlags::parse(raw)).collect();
        Ok::<_, ProbeError>(grade_cookies(&cookies))
    })
    .await
}

// --- Cookie attributes ---

/// The protective attributes of one `Set-Cookie` header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CookieFlags {
    pub secure: bool,
    pub http_only: bool,
    pub same_site: bool,
}

impl CookieFlags {
    /// Reads the attributes after the leading `name=value` pair. Names are
    /// case-insensitive and `SameSite` counts whatever its value.
    pub fn parse(set_cookie: &str) -> Self {
        let mut flags = CookieFlags::default();
        for attribute in set_cookie.split(';').skip(1) {
            let name = attribute.split('=').next().unwrap_or_default().trim();
            if name.eq_ignore_ascii_case("secure") {
                flags.secure = true;
            } else if name.eq_ignore_ascii_case("httponly") {
                flags.http_only = true;
            } else if name.eq_ignore_ascii_case("samesite") {
                flags.same_site = true;
            }
        }
        flags
    }
}

/// Averages the secure, httponly and samesite fractions. No cookies is GOOD.
pub fn grade_cookies(cookies: &[CookieFlags]) -> TestResult {
    if cookies.is_empty() {
        return TestResult::done(
            COOKIE_SECURITY,
            Score::Good,
            json!({ "cookies": 0, "note": "No cookies set" }),
        );
    }

    let count = |pick: fn(&CookieFlags) -> bool| cookies.iter().filter(|c| pick(c)).count();
    let secure = count(|c| c.secure);
    let http_only = count(|c| c.http_only);
    let same_site = count(|c| c.same_site);

    let total = cookies.len() as f64;
    let ratio = (secure as f64 / total + http_only as f64 / total + same_site as f64 / total) / 3.0;

    TestResult::done(
        COOKIE_SECURITY,
        Score::from_ratio(ratio),
        json!({
            "cookies": cookies.len(),
            "secure": secure,
            "httponly": http_only,
            "samesite": same_site,
            "security_score": crate::core::scoring::round1(ratio * 100.0),
        }),
    )
}
