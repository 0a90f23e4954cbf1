//! # quota-gate
//!
//! Per-endpoint request admission with quota-aware degradation.
//!
//! Every guarded endpoint has an [`EndpointPolicy`]: a request budget per
//! fixed time window, with separate budgets for anonymous and authenticated
//! callers. [`AdmissionPolicy`] counts each request against that budget and
//! reports what is left; [`DegradationAdvisor`] turns the remainder into a
//! hint to switch to a cheaper execution path before the budget runs out.
//!
//! ## Feature Flags
//!
//! - `conf` (default) - load the policy table from TOML or JSON
//! - `http` (default) - rate limit headers, 429 responses and a request guard
//! - `redis-backend` - share counters across processes through Redis
//! - `full` - all of the above
//!
//! ## Quick Example
//!
//! ```rust
//! use quota_gate::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ThrottleError> {
//! let registry = Arc::new(EndpointPolicyRegistry::from_policies([
//!     EndpointPolicy::new("sources", 10, 30, Duration::from_secs(86_400)),
//! ])?);
//! let admission = AdmissionPolicy::in_memory(registry);
//!
//! let decision = admission.decide_now("sources", "203.0.113.7", false).await?;
//! assert!(decision.admitted());
//! assert_eq!(decision.outcome.remaining, 9);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "conf")]
pub mod conf;
#[cfg(feature = "http")]
pub mod http;
pub mod throttling;

pub use quota_gate_throttling::{
	AdmissionDecision, AdmissionPolicy, DegradationAdvice, DegradationAdvisor,
	DegradationThresholds, EndpointPolicy, EndpointPolicyRegistry, IdentityClass, MemoryBackend,
	QuotaTier, RateLimitOutcome, StoreError, ThrottleError, ThrottleResult, TimeProvider,
	WindowCounterStore,
};

#[cfg(feature = "redis-backend")]
pub use quota_gate_throttling::RedisBackend;

#[cfg(feature = "conf")]
pub use quota_gate_conf::{SettingsError, ThrottleSettings, load_from_env};

#[cfg(feature = "http")]
pub use quota_gate_http::{GuardVerdict, RateLimitGuard, StoreFailureMode};

pub mod prelude {
	pub use crate::{
		AdmissionDecision, AdmissionPolicy, DegradationAdvisor, EndpointPolicy,
		EndpointPolicyRegistry, IdentityClass, MemoryBackend, RateLimitOutcome, ThrottleError,
	};

	#[cfg(feature = "conf")]
	pub use crate::{SettingsError, ThrottleSettings};

	#[cfg(feature = "http")]
	pub use crate::{GuardVerdict, RateLimitGuard, StoreFailureMode};
}
