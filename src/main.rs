mod cli;

use futures::future::join_all;
use gh_ratelimit::config::Config;
use gh_ratelimit::http::{ApiError, GitHubClient};
use gh_ratelimit::{RateLimitInfo, RateLimitSource};
use log::{info, warn};
use serde::Serialize;
use std::io::Write;
use tokio::time::Instant;

#[derive(Debug, Serialize)]
struct Report {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate: Option<RateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

#[derive(Debug, Serialize)]
struct RateReport {
    remaining: i64,
    used: i64,
    reset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_at: Option<String>,
}

impl RateReport {
    fn from_info(info: RateLimitInfo) -> Option<Self> {
        info.is_valid().then(|| Self {
            remaining: info.remaining,
            used: info.used,
            reset: info.reset,
            reset_at: info.reset_at(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    code: &'static str,
    message: String,
    retriable: bool,
}

async fn fetch(client: &GitHubClient, path: &str, deadline: Option<Instant>) -> Report {
    match client.get_text(path, deadline).await {
        Ok(res) => Report {
            path: path.to_string(),
            status: Some(res.status.as_u16()),
            rate: RateReport::from_info(res.rate),
            error: None,
        },
        Err(err) => {
            warn!("GET {} failed: {}", path, err);
            let status = match &err {
                ApiError::Status { status, .. } => Some(status.as_u16()),
                _ => None,
            };
            Report {
                path: path.to_string(),
                status,
                rate: err.rate_limit().and_then(RateReport::from_info),
                error: Some(ErrorReport {
                    code: err.code(),
                    message: err.to_string(),
                    retriable: err.retriable(),
                }),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli::build_cli().get_matches();
    let opts = cli::CliOptions::from_matches(&matches);

    cli::init_logging(opts.log_level.as_deref());

    if opts.version {
        println!("gh-ratelimit {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut cfg = Config::from_env().map_err(anyhow::Error::msg)?;
    if let Some(n) = opts.max_concurrent {
        cfg.max_concurrent = n;
    }
    if let Some(t) = opts.threshold {
        cfg.rate_threshold = Some(t);
    }
    info!(
        "fetching {} path(s) from {} with max_concurrent={}",
        opts.paths.len(),
        cfg.api_url,
        cfg.max_concurrent
    );

    let client = GitHubClient::new(cfg)?;
    let deadline = opts.timeout.map(|t| Instant::now() + t);
    let reports = join_all(opts.paths.iter().map(|p| fetch(&client, p, deadline))).await;
    client.close();

    let mut out = std::io::stdout().lock();
    for report in &reports {
        writeln!(out, "{}", serde_json::to_string(report)?)?;
    }
    out.flush()?;

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} request(s) failed", failed, reports.len());
    }
    Ok(())
}
