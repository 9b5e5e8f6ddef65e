use std::env;

/// GitHub's cap on concurrent requests per installation.
pub const DEFAULT_MAX_CONCURRENT: usize = 100;

/// Runtime configuration for the rate-limited GitHub client.
/// Values are sourced from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: Option<String>,
    pub api_url: String,
    pub api_version: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_concurrent: usize,
    /// Remaining-quota level at which all traffic pauses; `None` means `max_concurrent`.
    pub rate_threshold: Option<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
            api_version: "2022-11-28".to_string(),
            user_agent: format!("gh-ratelimit/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            rate_threshold: None,
        }
    }
}

impl Config {
    /// Load configuration from environment.
    ///
    /// Env vars:
    /// - GITHUB_TOKEN (or GH_TOKEN) [optional; unauthenticated otherwise]
    /// - GITHUB_API_URL (default: https://api.github.com)
    /// - GITHUB_API_VERSION (default: 2022-11-28)
    /// - GITHUB_HTTP_TIMEOUT_SECS (default: 30)
    /// - GITHUB_USER_AGENT (default: gh-ratelimit/<version>)
    /// - GITHUB_MAX_CONCURRENT (default: 100)
    /// - GITHUB_RATE_THRESHOLD (default: GITHUB_MAX_CONCURRENT)
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let token = var("GITHUB_TOKEN").or_else(|| var("GH_TOKEN"));
        let api_url = var("GITHUB_API_URL").unwrap_or(defaults.api_url);
        let api_version = var("GITHUB_API_VERSION").unwrap_or(defaults.api_version);
        let user_agent = var("GITHUB_USER_AGENT").unwrap_or(defaults.user_agent);
        let timeout_secs = var("GITHUB_HTTP_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(defaults.timeout_secs);

        let max_concurrent = match var("GITHUB_MAX_CONCURRENT") {
            Some(s) => match s.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(format!(
                        "GITHUB_MAX_CONCURRENT must be a positive integer, got {s:?}"
                    ))
                }
            },
            None => defaults.max_concurrent,
        };
        let rate_threshold = match var("GITHUB_RATE_THRESHOLD") {
            Some(s) => match s.trim().parse::<i64>() {
                Ok(n) if n >= 0 => Some(n),
                _ => {
                    return Err(format!(
                        "GITHUB_RATE_THRESHOLD must be a non-negative integer, got {s:?}"
                    ))
                }
            },
            None => None,
        };

        Ok(Self {
            token,
            api_url,
            api_version,
            user_agent,
            timeout_secs,
            max_concurrent,
            rate_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.token, None);
        assert_eq!(cfg.api_url, "https://api.github.com");
        assert_eq!(cfg.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(cfg.rate_threshold, None);
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn gh_token_is_a_fallback() {
        let cfg = load(&[("GH_TOKEN", "b")]).unwrap();
        assert_eq!(cfg.token.as_deref(), Some("b"));
        let cfg = load(&[("GITHUB_TOKEN", "a"), ("GH_TOKEN", "b")]).unwrap();
        assert_eq!(cfg.token.as_deref(), Some("a"));
    }

    #[test]
    fn limits_are_parsed_and_validated() {
        let cfg = load(&[("GITHUB_MAX_CONCURRENT", "8"), ("GITHUB_RATE_THRESHOLD", "0")]).unwrap();
        assert_eq!(cfg.max_concurrent, 8);
        assert_eq!(cfg.rate_threshold, Some(0));

        assert!(load(&[("GITHUB_MAX_CONCURRENT", "0")]).is_err());
        assert!(load(&[("GITHUB_MAX_CONCURRENT", "many")]).is_err());
        assert!(load(&[("GITHUB_RATE_THRESHOLD", "-1")]).is_err());
    }

    #[test]
    fn invalid_limits_name_the_variable() {
        let err = load(&[("GITHUB_MAX_CONCURRENT", " 0 ")]).unwrap_err();
        assert_eq!(
            err,
            "GITHUB_MAX_CONCURRENT must be a positive integer, got \" 0 \""
        );
        let err = load(&[("GITHUB_RATE_THRESHOLD", "-5")]).unwrap_err();
        assert_eq!(
            err,
            "GITHUB_RATE_THRESHOLD must be a non-negative integer, got \"-5\""
        );
    }

    #[test]
    fn malformed_timeout_falls_back() {
        let cfg = load(&[("GITHUB_HTTP_TIMEOUT_SECS", "soon")]).unwrap();
        assert_eq!(cfg.timeout_secs, 30);
    }
}
