//! Admission guard for request handlers
//!
//! Runs the admission check for one request and turns the result into either
//! a go-ahead for the handler or a finished response.

use super::headers::apply_rate_limit_headers;
use super::response::{internal_error, too_many_requests};
use bytes::Bytes;
use http::Response;
use quota_gate_throttling::{
	AdmissionDecision, AdmissionPolicy, MemoryBackend, SystemTimeProvider, ThrottleError,
	TimeProvider, WindowCounterStore,
};
use std::sync::Arc;

/// What to do with a request when the counter store cannot be reached.
///
/// There is no default; every deployment chooses explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailureMode {
	/// Let the request through without a decision.
	FailOpen,
	/// Answer with a generic 500.
	FailClosed,
}

/// Result of [`RateLimitGuard::evaluate`].
#[derive(Debug)]
pub enum GuardVerdict {
	/// The handler should run.
	///
	/// `None` only when the store failed under [`StoreFailureMode::FailOpen`].
	Proceed(Option<AdmissionDecision>),
	/// The request is finished; send this response as is.
	Respond(Response<Bytes>),
}

impl GuardVerdict {
	pub fn is_proceed(&self) -> bool {
		matches!(self, Self::Proceed(_))
	}

	/// The admission decision, if one was made and the request may proceed.
	pub fn decision(&self) -> Option<&AdmissionDecision> {
		match self {
			Self::Proceed(decision) => decision.as_ref(),
			Self::Respond(_) => None,
		}
	}
}

/// Wraps an [`AdmissionPolicy`] with the HTTP mapping of its outcomes.
///
/// - admitted: [`GuardVerdict::Proceed`] with the decision, so the handler
///   can read the degradation advice
/// - rejected: 429 with rate limit headers and `Retry-After`
/// - unknown endpoint or bad identity: generic 500
/// - store failure: per [`StoreFailureMode`]
pub struct RateLimitGuard<S: WindowCounterStore + ?Sized = MemoryBackend, T: TimeProvider = SystemTimeProvider> {
	admission: Arc<AdmissionPolicy<S, T>>,
	failure_mode: StoreFailureMode,
}

impl<S: WindowCounterStore + ?Sized, T: TimeProvider> RateLimitGuard<S, T> {
	pub fn new(admission: Arc<AdmissionPolicy<S, T>>, failure_mode: StoreFailureMode) -> Self {
		Self {
			admission,
			failure_mode,
		}
	}

	pub fn admission(&self) -> &Arc<AdmissionPolicy<S, T>> {
		&self.admission
	}

	pub fn failure_mode(&self) -> StoreFailureMode {
		self.failure_mode
	}

	/// Checks one request against the endpoint's policy.
	pub async fn evaluate(
		&self,
		endpoint_id: &str,
		identity: &str,
		is_authenticated: bool,
	) -> GuardVerdict {
		let now = self.admission.now();
		match self
			.admission
			.decide(endpoint_id, identity, is_authenticated, now)
			.await
		{
			Ok(decision) if decision.admitted() => GuardVerdict::Proceed(Some(decision)),
			Ok(decision) => GuardVerdict::Respond(too_many_requests(
				&decision.outcome,
				&decision.advice,
				now,
			)),
			Err(err) if err.is_store_failure() => self.on_store_failure(&err),
			Err(err) => {
				tracing::error!(endpoint = %endpoint_id, error = %err, "rate limit check failed");
				GuardVerdict::Respond(internal_error())
			}
		}
	}

	fn on_store_failure(&self, err: &ThrottleError) -> GuardVerdict {
		match self.failure_mode {
			StoreFailureMode::FailOpen => {
				tracing::warn!(error = %err, "counter store unavailable, admitting request");
				GuardVerdict::Proceed(None)
			}
			StoreFailureMode::FailClosed => {
				tracing::error!(error = %err, "counter store unavailable, rejecting request");
				GuardVerdict::Respond(internal_error())
			}
		}
	}

	/// Adds rate limit headers to the handler's response for an admitted
	/// request. Does nothing when no decision was made.
	pub fn finish<B>(&self, decision: Option<&AdmissionDecision>, response: &mut Response<B>) {
		if let Some(decision) = decision {
			apply_rate_limit_headers(response.headers_mut(), &decision.outcome);
		}
	}
}

impl<S: WindowCounterStore + ?Sized, T: TimeProvider> Clone for RateLimitGuard<S, T> {
	fn clone(&self) -> Self {
		Self {
			admission: Arc::clone(&self.admission),
			failure_mode: self.failure_mode,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::StatusCode;
	use quota_gate_throttling::{EndpointPolicy, EndpointPolicyRegistry};
	use rstest::rstest;
	use std::time::Duration;

	fn guard(anonymous_limit: u64) -> RateLimitGuard {
		let registry = EndpointPolicyRegistry::from_policies([EndpointPolicy::new(
			"sources",
			anonymous_limit,
			30,
			Duration::from_secs(86_400),
		)])
		.unwrap();
		RateLimitGuard::new(
			Arc::new(AdmissionPolicy::in_memory(Arc::new(registry))),
			StoreFailureMode::FailClosed,
		)
	}

	#[rstest]
	#[tokio::test]
	async fn test_admitted_request_proceeds_with_decision() {
		// Arrange
		let guard = guard(10);

		// Act
		let verdict = guard.evaluate("sources", "203.0.113.7", false).await;

		// Assert
		let decision = verdict.decision().unwrap();
		assert_eq!(decision.outcome.remaining, 9);
		assert!(!decision.should_degrade());
	}

	#[rstest]
	#[tokio::test]
	async fn test_rejected_request_gets_429() {
		// Arrange
		let guard = guard(1);
		guard.evaluate("sources", "203.0.113.7", false).await;

		// Act
		let verdict = guard.evaluate("sources", "203.0.113.7", false).await;

		// Assert
		match verdict {
			GuardVerdict::Respond(response) => {
				assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
				assert!(response.headers().contains_key(http::header::RETRY_AFTER));
			}
			GuardVerdict::Proceed(_) => panic!("expected a 429 response"),
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_unknown_endpoint_is_internal_error() {
		// Arrange
		let guard = guard(10);

		// Act
		let verdict = guard.evaluate("nonexistent", "203.0.113.7", false).await;

		// Assert
		match verdict {
			GuardVerdict::Respond(response) => {
				assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
			}
			GuardVerdict::Proceed(_) => panic!("expected a 500 response"),
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_finish_adds_headers() {
		// Arrange
		let guard = guard(10);
		let verdict = guard.evaluate("sources", "user-1", true).await;
		let mut response = Response::new(Bytes::new());

		// Act
		guard.finish(verdict.decision(), &mut response);

		// Assert
		assert_eq!(response.headers()["x-ratelimit-limit"], "30");
		assert_eq!(response.headers()["x-ratelimit-remaining"], "29");
	}
}
