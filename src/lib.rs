// src/lib.rs

pub mod config;
pub mod core;
pub mod logging;

pub use crate::config::Config;
pub use crate::core::models::{CategoryResult, ReportResult, Score, TestResult};
pub use crate::core::network::{LiveNetwork, Network};
pub use crate::core::scanner::{run_connection_tests, run_email_tests, run_website_tests};
