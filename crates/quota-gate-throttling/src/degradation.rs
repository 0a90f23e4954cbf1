//! Degradation advice
//!
//! Turns leftover quota into a hint that the caller should switch to a
//! cheaper execution path (e.g. a smaller model). Anonymous callers are
//! steered earlier than authenticated ones; the floors come from the
//! endpoint's [`DegradationThresholds`].

use super::admission::RateLimitOutcome;
use super::policy::{DegradationThresholds, IdentityClass};

/// Hint derived from a [`RateLimitOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradationAdvice {
	pub should_degrade: bool,
	pub advisory_message: Option<String>,
}

impl DegradationAdvice {
	fn none() -> Self {
		Self {
			should_degrade: false,
			advisory_message: None,
		}
	}
}

/// Stateless evaluator for [`DegradationAdvice`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DegradationAdvisor;

impl DegradationAdvisor {
	/// Evaluates an admission outcome against the given floors.
	///
	/// Rejected requests never degrade; they get a message explaining the
	/// rejection instead. Admitted requests degrade once `remaining` is at or
	/// below the floor of their identity class.
	///
	/// # Examples
	///
	/// ```
	/// use chrono::Utc;
	/// use quota_gate_throttling::{
	///     DegradationAdvisor, DegradationThresholds, IdentityClass, RateLimitOutcome,
	/// };
	///
	/// let outcome = RateLimitOutcome {
	///     endpoint_id: "chat".to_string(),
	///     identity_class: IdentityClass::Anonymous,
	///     admitted: true,
	///     count: 6,
	///     limit: 10,
	///     remaining: 4,
	///     reset_at: Utc::now(),
	/// };
	/// let advice = DegradationAdvisor::evaluate(&outcome, &DegradationThresholds::default());
	/// assert!(advice.should_degrade);
	/// ```
	pub fn evaluate(
		outcome: &RateLimitOutcome,
		thresholds: &DegradationThresholds,
	) -> DegradationAdvice {
		if !outcome.admitted {
			return DegradationAdvice {
				should_degrade: false,
				advisory_message: Some(rejection_message(outcome)),
			};
		}

		if outcome.remaining > thresholds.floor_for(outcome.identity_class) {
			return DegradationAdvice::none();
		}

		DegradationAdvice {
			should_degrade: true,
			advisory_message: Some(format!(
				"You have {} of {} requests left in this window. Switching to a faster model to conserve your quota.",
				outcome.remaining, outcome.limit
			)),
		}
	}
}

fn rejection_message(outcome: &RateLimitOutcome) -> String {
	let base = format!(
		"Rate limit exceeded: {} of {} requests remaining. Try again after {}.",
		outcome.remaining,
		outcome.limit,
		outcome.reset_at.to_rfc3339()
	);
	match outcome.identity_class {
		IdentityClass::Anonymous => format!("{} Sign in for a higher limit.", base),
		IdentityClass::Authenticated => base,
	}
}
