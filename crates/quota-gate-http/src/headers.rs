//! Rate limit response headers

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use quota_gate_throttling::RateLimitOutcome;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Reset timestamp as Unix epoch milliseconds, the format used in both the
/// `X-RateLimit-Reset` header and the 429 body.
pub fn reset_millis(outcome: &RateLimitOutcome) -> i64 {
	outcome.reset_at.timestamp_millis()
}

/// Writes `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use http::HeaderMap;
/// use quota_gate_http::apply_rate_limit_headers;
/// use quota_gate_throttling::{IdentityClass, RateLimitOutcome};
///
/// let outcome = RateLimitOutcome {
///     endpoint_id: "sources".to_string(),
///     identity_class: IdentityClass::Anonymous,
///     admitted: true,
///     count: 1,
///     limit: 10,
///     remaining: 9,
///     reset_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
/// };
/// let mut headers = HeaderMap::new();
/// apply_rate_limit_headers(&mut headers, &outcome);
/// assert_eq!(headers["x-ratelimit-remaining"], "9");
/// assert_eq!(headers["x-ratelimit-reset"], "1700000000000");
/// ```
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, outcome: &RateLimitOutcome) {
	headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(outcome.limit));
	headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(outcome.remaining));
	headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_millis(outcome)));
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};
	use quota_gate_throttling::IdentityClass;
	use rstest::rstest;

	#[rstest]
	fn test_headers_overwrite_previous_values() {
		// Arrange
		let outcome = RateLimitOutcome {
			endpoint_id: "chat".to_string(),
			identity_class: IdentityClass::Authenticated,
			admitted: false,
			count: 31,
			limit: 30,
			remaining: 0,
			reset_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
		};
		let mut headers = HeaderMap::new();
		headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("99"));

		// Act
		apply_rate_limit_headers(&mut headers, &outcome);

		// Assert
		assert_eq!(headers.get_all(X_RATELIMIT_REMAINING).iter().count(), 1);
		assert_eq!(headers[X_RATELIMIT_LIMIT], "30");
		assert_eq!(headers[X_RATELIMIT_REMAINING], "0");
		assert_eq!(headers[X_RATELIMIT_RESET], "1704067200000");
	}
}
