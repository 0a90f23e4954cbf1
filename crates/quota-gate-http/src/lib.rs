//! HTTP mapping for quota-gate admission decisions
//!
//! Turns [`RateLimitOutcome`](quota_gate_throttling::RateLimitOutcome)s into
//! rate limit headers, 429 bodies and generic 500s, and provides
//! [`RateLimitGuard`] to run the whole check for a request.

pub mod guard;
pub mod headers;
pub mod response;

pub use guard::{GuardVerdict, RateLimitGuard, StoreFailureMode};
pub use headers::{
	X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET, apply_rate_limit_headers,
	reset_millis,
};
pub use response::{internal_error, too_many_requests};
