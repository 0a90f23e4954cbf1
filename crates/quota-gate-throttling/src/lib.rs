//! Request admission and degradation policy engine
//!
//! Tracks per-identity, per-endpoint request budgets over fixed windows,
//! separates anonymous from authenticated callers, and tells the caller
//! whether a request is admitted and whether it should take a cheaper path.
//!
//! ```text
//! caller -> AdmissionPolicy::check -> WindowCounterStore::increment_and_inspect
//!        <- RateLimitOutcome -> DegradationAdvisor::evaluate -> DegradationAdvice
//! ```
//!
//! Durable counter state lives in a [`WindowCounterStore`]: [`MemoryBackend`]
//! for a single process, `RedisBackend` (feature `redis-backend`) when
//! several processes share quotas.

pub mod admission;
pub mod backend;
pub mod degradation;
pub mod error;
pub mod key;
pub mod policy;
pub mod registry;
pub mod time_provider;

pub use admission::{AdmissionDecision, AdmissionPolicy, RateLimitOutcome};
#[cfg(feature = "redis-backend")]
pub use backend::RedisBackend;
pub use backend::{MemoryBackend, WindowCount, WindowCounterStore};
pub use degradation::{DegradationAdvice, DegradationAdvisor};
pub use error::{StoreError, ThrottleError, ThrottleResult};
pub use key::WindowCounterKey;
pub use policy::{DegradationThresholds, EndpointPolicy, IdentityClass, QuotaTier};
pub use registry::{EndpointPolicyRegistry, RegisteredPolicy};
pub use time_provider::{MockTimeProvider, SystemTimeProvider, TimeProvider};
