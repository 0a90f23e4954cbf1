//! Response shaping for rejected and failed admission checks

use super::headers::{apply_rate_limit_headers, reset_millis};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{CONTENT_TYPE, HeaderValue, RETRY_AFTER};
use http::{Response, StatusCode};
use quota_gate_throttling::{DegradationAdvice, RateLimitOutcome};
use serde_json::json;

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Bytes> {
	let mut response = Response::new(Bytes::from(body.to_string()));
	*response.status_mut() = status;
	response
		.headers_mut()
		.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	response
}

/// Builds the 429 response for a rejected request.
///
/// The body is `{"error": "Rate limit exceeded", "message": ..., "reset": ...}`
/// where `reset` is Unix epoch milliseconds. `Retry-After` is rounded up to
/// whole seconds.
pub fn too_many_requests(
	outcome: &RateLimitOutcome,
	advice: &DegradationAdvice,
	now: DateTime<Utc>,
) -> Response<Bytes> {
	let message = advice.advisory_message.clone().unwrap_or_else(|| {
		format!(
			"You have exceeded the limit of {} requests for this window.",
			outcome.limit
		)
	});
	let mut response = json_response(
		StatusCode::TOO_MANY_REQUESTS,
		json!({
			"error": "Rate limit exceeded",
			"message": message,
			"reset": reset_millis(outcome),
		}),
	);

	let retry_after = outcome.retry_after(now);
	let retry_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
	let headers = response.headers_mut();
	apply_rate_limit_headers(headers, outcome);
	headers.insert(RETRY_AFTER, HeaderValue::from(retry_secs));
	response
}

/// Generic 500 used for every internal failure. Store and policy details are
/// never included.
pub fn internal_error() -> Response<Bytes> {
	json_response(
		StatusCode::INTERNAL_SERVER_ERROR,
		json!({ "error": "Internal server error" }),
	)
}
