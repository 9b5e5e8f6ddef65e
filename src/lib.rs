//! Dual-gate rate limiting for GitHub API clients.
//!
//! See [`ratelimit`] for the gates and [`http`] for a ready-made GitHub REST
//! client built on them.

pub mod config;
pub mod http;
pub mod ratelimit;

pub use ratelimit::{
    Admission, AdmissionError, RateLimitInfo, RateLimitSource, RateLimitTransport, SendError,
    Sender,
};
