use gh_ratelimit::http::map_status;
use gh_ratelimit::RateLimitInfo;
use reqwest::header::HeaderMap;

#[test]
fn status_error_mapping() {
    let (code, retriable) = map_status(reqwest::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(code, "rate_limited");
    assert!(retriable);
}

#[test]
fn rest_rate_headers() {
    let mut h = HeaderMap::new();
    h.insert("x-ratelimit-remaining", "4999".parse().unwrap());
    h.insert("x-ratelimit-used", "1".parse().unwrap());
    // Use a fixed epoch for deterministic test
    h.insert("x-ratelimit-reset", "0".parse().unwrap());
    let rate = RateLimitInfo::from_headers(&h);
    assert_eq!(rate.remaining, 4999);
    assert_eq!(rate.used, 1);
    assert!(rate.is_valid());
    assert_eq!(rate.reset_at().as_deref(), Some("1970-01-01T00:00:00+00:00"));
    assert!(rate.time_to_reset() < chrono::Duration::zero());
}

#[test]
fn absent_headers_are_not_a_snapshot() {
    let rate = RateLimitInfo::from_headers(&HeaderMap::new());
    assert!(!rate.is_valid());
    assert_eq!(rate.wait(), std::time::Duration::ZERO);
}
