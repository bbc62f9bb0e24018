// src/main.rs

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use healthscan::config::Config;
use healthscan::core::models::{ReportResult, TestStatus};
use healthscan::core::network::{LiveNetwork, Network};
use healthscan::core::scanner::{run_connection_tests, run_email_tests, run_website_tests};
use healthscan::core::target::{normalize_domain, parse_client_ip, InputError};
use healthscan::logging;

const EXIT_FAILURE: i32 = 1;
const EXIT_INVALID_INPUT: i32 = 2;

/// External health check of a domain's DNS, TLS, web and mail configuration.
#[derive(Parser, Debug)]
#[command(name = "healthscan", version, about)]
struct Cli {
    /// JSON configuration file; `HEALTHSCAN_*` variables still apply on top.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Print the report on a single line.
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// IPv6, DNSSEC, TLS and security headers of a website.
    Website { domain: String },
    /// SPF, DKIM, DMARC and STARTTLS of a mail domain.
    Email { domain: String },
    /// Whether a client address is IPv6.
    Connection {
        #[arg(value_name = "CLIENT_IP")]
        client_ip: String,
    },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Logging is best effort; a read-only home must not stop a scan.
    if let Err(e) = logging::initialize_logging() {
        eprintln!("healthscan: file logging disabled: {e}");
    }

    let code = match execute(&cli).await {
        Ok(report) => {
            print_json(&report, cli.compact)?;
            if report.status == TestStatus::Done { 0 } else { EXIT_FAILURE }
        }
        Err(report) => {
            let message = format!("{report:#}");
            error!(error = %message, "Run failed.");
            print_json(&ErrorBody { error: &message }, cli.compact)?;
            if report.downcast_ref::<InputError>().is_some() {
                EXIT_INVALID_INPUT
            } else {
                EXIT_FAILURE
            }
        }
    };
    std::process::exit(code)
}

async fn execute(cli: &Cli) -> Result<ReportResult> {
    let config = load_config(cli.config.as_deref())?;
    info!(command = ?cli.command, "Starting healthscan.");

    // Validate before touching the network.
    let target = match &cli.command {
        Command::Website { domain } | Command::Email { domain } => normalize_domain(domain)?,
        Command::Connection { client_ip } => parse_client_ip(client_ip)?,
    };

    let net: Arc<dyn Network> =
        Arc::new(LiveNetwork::new(&config).wrap_err("could not initialize network clients")?);

    let report = match &cli.command {
        Command::Website { .. } => run_website_tests(net, &config, &target).await,
        Command::Email { .. } => run_email_tests(net, &config, &target).await,
        Command::Connection { .. } => run_connection_tests(net, &config, &target).await,
    };
    Ok(report)
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let base = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = base.with_env_overrides(|key| std::env::var(key).ok())?;
    info!(?config, "Configuration loaded.");
    Ok(config)
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{rendered}");
    Ok(())
}
