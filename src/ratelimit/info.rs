use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::time::Duration;

pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_USED: &str = "x-ratelimit-used";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Primary rate-limit status reported by a single GitHub response.
///
/// A snapshot with every field zero means the response carried no rate-limit
/// headers; see [`RateLimitInfo::is_valid`].
///
/// <https://docs.github.com/en/rest/using-the-rest-api/rate-limits-for-the-rest-api#checking-the-status-of-your-rate-limit>
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Requests left in the current window.
    pub remaining: i64,
    /// Requests made in the current window.
    pub used: i64,
    /// When the window resets, in UTC epoch seconds.
    pub reset: i64,
}

impl RateLimitInfo {
    /// Parse the three rate-limit headers. Missing or malformed values read as 0.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: int_header(headers, HEADER_REMAINING),
            used: int_header(headers, HEADER_USED),
            reset: int_header(headers, HEADER_RESET),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.remaining != 0 || self.used != 0 || self.reset != 0
    }

    /// The reset instant, or `None` when `reset` is outside chrono's range.
    pub fn when(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.reset, 0)
    }

    /// Signed time left until the window resets. Non-positive once the reset has passed.
    pub fn time_to_reset(&self) -> chrono::Duration {
        self.time_to_reset_from(Utc::now())
    }

    fn time_to_reset_from(&self, now: DateTime<Utc>) -> chrono::Duration {
        match self.when() {
            Some(when) => when - now,
            None => chrono::Duration::zero(),
        }
    }

    /// How long admission should wait for this window; zero if the reset already passed.
    pub fn wait(&self) -> Duration {
        self.time_to_reset().to_std().unwrap_or(Duration::ZERO)
    }

    /// RFC 3339 rendering of the reset time, for logs and reports.
    pub fn reset_at(&self) -> Option<String> {
        self.when().map(|w| w.to_rfc3339())
    }
}

fn int_header(headers: &HeaderMap, name: &str) -> i64 {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Anything that may carry a rate-limit snapshot from a completed exchange.
///
/// Responses always do. Errors do only when a response was actually received
/// (e.g. an HTTP error status); pure transport failures return `None`.
pub trait RateLimitSource {
    fn rate_limit(&self) -> Option<RateLimitInfo>;
}

impl RateLimitSource for HeaderMap {
    fn rate_limit(&self) -> Option<RateLimitInfo> {
        Some(RateLimitInfo::from_headers(self))
    }
}

impl RateLimitSource for RateLimitInfo {
    fn rate_limit(&self) -> Option<RateLimitInfo> {
        Some(*self)
    }
}

impl<T: RateLimitSource> RateLimitSource for Option<T> {
    fn rate_limit(&self) -> Option<RateLimitInfo> {
        self.as_ref().and_then(RateLimitSource::rate_limit)
    }
}

impl RateLimitSource for reqwest::Response {
    fn rate_limit(&self) -> Option<RateLimitInfo> {
        Some(RateLimitInfo::from_headers(self.headers()))
    }
}

impl RateLimitSource for reqwest::Error {
    fn rate_limit(&self) -> Option<RateLimitInfo> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, v.parse().unwrap());
        }
        h
    }

    #[test]
    fn parses_rate_headers() {
        let h = headers(&[
            ("x-ratelimit-remaining", "4999"),
            ("x-ratelimit-used", "1"),
            ("x-ratelimit-reset", "1700000000"),
        ]);
        let info = RateLimitInfo::from_headers(&h);
        assert_eq!(
            info,
            RateLimitInfo {
                remaining: 4999,
                used: 1,
                reset: 1_700_000_000
            }
        );
        assert!(info.is_valid());
        assert_eq!(
            info.reset_at().as_deref(),
            Some("2023-11-14T22:13:20+00:00")
        );
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let mut h = HeaderMap::new();
        h.insert(
            reqwest::header::HeaderName::from_bytes(b"X-RateLimit-Remaining").unwrap(),
            "12".parse().unwrap(),
        );
        assert_eq!(RateLimitInfo::from_headers(&h).remaining, 12);
    }

    #[test]
    fn malformed_and_missing_headers_read_as_zero() {
        let h = headers(&[
            ("x-ratelimit-remaining", "lots"),
            ("x-ratelimit-used", ""),
        ]);
        let info = RateLimitInfo::from_headers(&h);
        assert_eq!(info, RateLimitInfo::default());
        assert!(!info.is_valid());
    }

    #[test]
    fn zero_remaining_with_reset_is_valid() {
        let info = RateLimitInfo {
            remaining: 0,
            used: 0,
            reset: 1,
        };
        assert!(info.is_valid());
    }

    #[test]
    fn past_reset_has_no_wait() {
        let info = RateLimitInfo {
            remaining: 0,
            used: 5000,
            reset: Utc::now().timestamp() - 60,
        };
        assert!(info.time_to_reset() <= chrono::Duration::zero());
        assert_eq!(info.wait(), Duration::ZERO);
    }

    #[test]
    fn future_reset_waits() {
        let now = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let info = RateLimitInfo {
            remaining: 0,
            used: 5000,
            reset: 1_030,
        };
        assert_eq!(info.time_to_reset_from(now), chrono::Duration::seconds(30));
    }

    #[test]
    fn out_of_range_reset_is_treated_as_now() {
        let info = RateLimitInfo {
            remaining: 1,
            used: 1,
            reset: i64::MAX,
        };
        assert!(info.when().is_none());
        assert_eq!(info.wait(), Duration::ZERO);
    }

    #[test]
    fn optional_source_delegates() {
        let none: Option<HeaderMap> = None;
        assert!(none.rate_limit().is_none());
        let some = Some(headers(&[("x-ratelimit-used", "3")]));
        assert_eq!(some.rate_limit().map(|i| i.used), Some(3));
    }
}
