use crate::config::Config;
use crate::ratelimit::{
    AdmissionError, BuildError, RateLimitInfo, RateLimitSource, RateLimitTransport, SendError,
    Sender,
};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use url::Url;

const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Clone)]
pub struct RestResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub rate: RateLimitInfo,
}

/// Failures surfaced by [`GitHubClient`]. Non-success statuses keep the
/// rate-limit snapshot of the response that carried them.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error("request to GitHub failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("GitHub returned {status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
        rate: RateLimitInfo,
    },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid request path: {0}")]
    Path(#[from] url::ParseError),
    #[error("request path {0:?} resolves outside the configured API root")]
    ForeignPath(String),
}

impl ApiError {
    /// Stable short code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Admission(AdmissionError::Timeout) => "timeout",
            ApiError::Admission(AdmissionError::Closed) => "closed",
            ApiError::Transport(_) => "upstream_error",
            ApiError::Status { status, rate, .. } => {
                // GitHub reports an exhausted primary limit as 403 with remaining=0.
                if *status == StatusCode::FORBIDDEN && rate.is_valid() && rate.remaining == 0 {
                    "rate_limited"
                } else {
                    map_status(*status).0
                }
            }
            ApiError::Decode(_) => "decode_error",
            ApiError::Path(_) | ApiError::ForeignPath(_) => "bad_request",
        }
    }

    pub fn retriable(&self) -> bool {
        match self {
            ApiError::Admission(AdmissionError::Timeout) | ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => {
                self.code() == "rate_limited" || map_status(*status).1
            }
            _ => false,
        }
    }
}

impl RateLimitSource for ApiError {
    fn rate_limit(&self) -> Option<RateLimitInfo> {
        match self {
            ApiError::Status { rate, .. } => Some(*rate),
            _ => None,
        }
    }
}

impl From<SendError<reqwest::Error>> for ApiError {
    fn from(err: SendError<reqwest::Error>) -> Self {
        match err {
            SendError::Admission(e) => ApiError::Admission(e),
            SendError::Transport(e) => ApiError::Transport(e),
        }
    }
}

/// Error-code classification for a non-success status: `(code, retriable)`.
pub fn map_status(status: StatusCode) -> (&'static str, bool) {
    match status {
        StatusCode::BAD_REQUEST => ("bad_request", false),
        StatusCode::UNAUTHORIZED => ("unauthorized", false),
        StatusCode::FORBIDDEN => ("forbidden", false),
        StatusCode::NOT_FOUND => ("not_found", false),
        StatusCode::CONFLICT => ("conflict", false),
        StatusCode::TOO_MANY_REQUESTS => ("rate_limited", true),
        s if s.is_server_error() => ("upstream_error", true),
        _ => ("server_error", false),
    }
}

impl Sender for Client {
    type Request = reqwest::Request;
    type Response = reqwest::Response;
    type Error = reqwest::Error;

    fn send(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = reqwest::Result<reqwest::Response>> + Send {
        self.execute(request)
    }
}

pub fn build_client(cfg: &Config) -> reqwest::Result<Client> {
    let mut default_headers = HeaderMap::new();
    match HeaderValue::from_str(&cfg.user_agent) {
        Ok(ua) => {
            default_headers.insert(USER_AGENT, ua);
        }
        Err(_) => warn!("ignoring invalid user agent {:?}", cfg.user_agent),
    }
    Client::builder()
        .default_headers(default_headers)
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .use_rustls_tls()
        .build()
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    RateLimit(#[from] BuildError),
    #[error("invalid API URL: {0}")]
    ApiUrl(#[from] url::ParseError),
}

/// GitHub REST client whose every request goes through one
/// [`RateLimitTransport`]. Never retries.
#[derive(Debug)]
pub struct GitHubClient {
    cfg: Config,
    base: Url,
    transport: RateLimitTransport<Client>,
}

impl GitHubClient {
    /// Outside a Tokio runtime this fails with [`BuildError::NoRuntime`].
    pub fn new(cfg: Config) -> Result<Self, SetupError> {
        let client = build_client(&cfg)?;
        let transport = match cfg.rate_threshold {
            Some(threshold) => {
                RateLimitTransport::with_threshold(client, cfg.max_concurrent, threshold)?
            }
            None => RateLimitTransport::new(client, cfg.max_concurrent)?,
        };
        // A trailing slash makes `join` append paths instead of replacing the last segment.
        let base = Url::parse(&format!("{}/", cfg.api_url.trim_end_matches('/')))?;
        Ok(Self {
            cfg,
            base,
            transport,
        })
    }

    pub fn transport(&self) -> &RateLimitTransport<Client> {
        &self.transport
    }

    /// Resolve `path` under the API root. Absolute URLs and `..` segments that
    /// would leave the root are rejected, since the request carries the token.
    fn resolve(&self, path: &str) -> Result<Url, ApiError> {
        let url = self.base.join(path.trim_start_matches('/'))?;
        if url.origin() != self.base.origin() || !url.path().starts_with(self.base.path()) {
            return Err(ApiError::ForeignPath(path.to_string()));
        }
        Ok(url)
    }

    fn request(&self, path: &str, accept: &str) -> Result<reqwest::Request, ApiError> {
        let url = self.resolve(path)?;
        let mut builder = self
            .transport
            .sender()
            .get(url)
            .header("X-GitHub-Api-Version", &self.cfg.api_version)
            .header(ACCEPT, accept);
        if let Some(token) = &self.cfg.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.build().map_err(ApiError::Transport)
    }

    /// GET `path` (relative to the API root) with a caller-chosen `Accept` header.
    pub async fn get_text_with_accept(
        &self,
        path: &str,
        accept: &str,
        deadline: Option<Instant>,
    ) -> Result<RestResponse<String>, ApiError> {
        let req = self.request(path, accept)?;
        let res = self.transport.send(req, deadline).await?;
        let status = res.status();
        let rate = RateLimitInfo::from_headers(res.headers());
        debug!(
            "GET {} -> {} (remaining={}, reset={})",
            path, status, rate.remaining, rate.reset
        );
        let text = res.text().await.map_err(ApiError::Transport)?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                message: text,
                rate,
            });
        }
        Ok(RestResponse {
            value: text,
            status,
            rate,
        })
    }

    pub async fn get_text(
        &self,
        path: &str,
        deadline: Option<Instant>,
    ) -> Result<RestResponse<String>, ApiError> {
        self.get_text_with_accept(path, GITHUB_JSON, deadline).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        deadline: Option<Instant>,
    ) -> Result<RestResponse<T>, ApiError> {
        let res = self.get_text(path, deadline).await?;
        Ok(RestResponse {
            value: serde_json::from_str(&res.value)?,
            status: res.status,
            rate: res.rate,
        })
    }

    pub fn close(&self) {
        self.transport.close();
    }
}
