//! Endpoint policies
//!
//! An [`EndpointPolicy`] describes the request budget of one protected
//! endpoint for both identity classes, plus the remaining-quota floors used
//! by the [`DegradationAdvisor`](super::degradation::DegradationAdvisor).

use super::key::validate_key_component;
use super::{ThrottleError, ThrottleResult};
use std::fmt;
use std::time::Duration;

/// Caller category used to select a quota tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityClass {
	Anonymous,
	Authenticated,
}

impl IdentityClass {
	/// Selects the class from an authentication flag.
	pub fn from_authenticated(is_authenticated: bool) -> Self {
		if is_authenticated {
			Self::Authenticated
		} else {
			Self::Anonymous
		}
	}

	/// Short tag used inside counter keys.
	pub fn key_tag(&self) -> &'static str {
		match self {
			Self::Anonymous => "anon",
			Self::Authenticated => "auth",
		}
	}
}

impl fmt::Display for IdentityClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Anonymous => f.write_str("anonymous"),
			Self::Authenticated => f.write_str("authenticated"),
		}
	}
}

/// Requests allowed per window for one identity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaTier {
	pub limit: u64,
	pub window: Duration,
}

impl QuotaTier {
	/// Longest window a policy may use. Reset timestamps must stay inside
	/// the calendar range of `chrono::DateTime<Utc>`.
	pub const MAX_WINDOW: Duration = Duration::from_secs(100 * 365 * 86_400);

	pub fn new(limit: u64, window: Duration) -> Self {
		Self { limit, window }
	}
}

/// Remaining-quota floors at or below which degradation is advised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegradationThresholds {
	pub authenticated_floor: u64,
	pub anonymous_floor: u64,
}

impl DegradationThresholds {
	pub const DEFAULT_AUTHENTICATED_FLOOR: u64 = 10;
	pub const DEFAULT_ANONYMOUS_FLOOR: u64 = 5;

	pub fn new(authenticated_floor: u64, anonymous_floor: u64) -> Self {
		Self {
			authenticated_floor,
			anonymous_floor,
		}
	}

	/// Floor that applies to the given identity class.
	pub fn floor_for(&self, class: IdentityClass) -> u64 {
		match class {
			IdentityClass::Anonymous => self.anonymous_floor,
			IdentityClass::Authenticated => self.authenticated_floor,
		}
	}
}

impl Default for DegradationThresholds {
	fn default() -> Self {
		Self::new(
			Self::DEFAULT_AUTHENTICATED_FLOOR,
			Self::DEFAULT_ANONYMOUS_FLOOR,
		)
	}
}

/// Static rate limit configuration for one endpoint.
///
/// # Examples
///
/// ```
/// use quota_gate_throttling::{EndpointPolicy, IdentityClass};
/// use std::time::Duration;
///
/// let day = Duration::from_secs(86_400);
/// let policy = EndpointPolicy::new("sources", 10, 30, day);
/// assert_eq!(policy.tier(IdentityClass::Anonymous).limit, 10);
/// assert_eq!(policy.tier(IdentityClass::Authenticated).limit, 30);
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPolicy {
	pub endpoint_id: String,
	pub anonymous: QuotaTier,
	pub authenticated: QuotaTier,
	pub degradation: DegradationThresholds,
}

impl EndpointPolicy {
	/// Creates a policy using the same window for both identity classes and
	/// the default degradation floors.
	pub fn new(
		endpoint_id: impl Into<String>,
		anonymous_limit: u64,
		authenticated_limit: u64,
		window: Duration,
	) -> Self {
		Self {
			endpoint_id: endpoint_id.into(),
			anonymous: QuotaTier::new(anonymous_limit, window),
			authenticated: QuotaTier::new(authenticated_limit, window),
			degradation: DegradationThresholds::default(),
		}
	}

	/// Overrides the anonymous window.
	pub fn with_anonymous_window(mut self, window: Duration) -> Self {
		self.anonymous.window = window;
		self
	}

	/// Overrides the authenticated window.
	pub fn with_authenticated_window(mut self, window: Duration) -> Self {
		self.authenticated.window = window;
		self
	}

	/// Overrides the degradation floors.
	pub fn with_degradation(mut self, thresholds: DegradationThresholds) -> Self {
		self.degradation = thresholds;
		self
	}

	/// Quota tier for the given identity class.
	pub fn tier(&self, class: IdentityClass) -> QuotaTier {
		match class {
			IdentityClass::Anonymous => self.anonymous,
			IdentityClass::Authenticated => self.authenticated,
		}
	}

	/// Checks the invariants required for registration.
	///
	/// Cross-class ordering (`authenticated >= anonymous`) is left to the
	/// policy author and is not checked here.
	///
	/// # Errors
	///
	/// Returns [`ThrottleError::Configuration`] if the endpoint id is not a
	/// valid key component, a limit is zero, or a window is zero or too large
	/// to turn into a reset timestamp.
	pub fn validate(&self) -> ThrottleResult<()> {
		validate_key_component(&self.endpoint_id)
			.map_err(|e| ThrottleError::configuration(&self.endpoint_id, e.to_string()))?;

		for class in [IdentityClass::Anonymous, IdentityClass::Authenticated] {
			let tier = self.tier(class);
			if tier.limit == 0 {
				return Err(ThrottleError::configuration(
					&self.endpoint_id,
					format!("{} limit must be positive", class),
				));
			}
			if tier.window.is_zero() {
				return Err(ThrottleError::configuration(
					&self.endpoint_id,
					format!("{} window must be non-zero", class),
				));
			}
			if tier.window > QuotaTier::MAX_WINDOW {
				return Err(ThrottleError::configuration(
					&self.endpoint_id,
					format!(
						"{} window is out of range (maximum {} days)",
						class,
						QuotaTier::MAX_WINDOW.as_secs() / 86_400
					),
				));
			}
		}
		Ok(())
	}
}
