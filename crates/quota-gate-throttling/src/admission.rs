//! Admission policy
//!
//! Resolves the endpoint's policy, picks the quota tier for the caller's
//! identity class, and asks the counter store for one atomic
//! increment-and-inspect. The store call is the only suspension point; no
//! lock is held across it.

use super::backend::{MemoryBackend, WindowCount, WindowCounterStore};
use super::degradation::{DegradationAdvice, DegradationAdvisor};
use super::key::WindowCounterKey;
use super::policy::IdentityClass;
use super::registry::{EndpointPolicyRegistry, RegisteredPolicy};
use super::time_provider::{SystemTimeProvider, TimeProvider};
use super::{ThrottleError, ThrottleResult};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

/// Result of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitOutcome {
	pub endpoint_id: String,
	pub identity_class: IdentityClass,
	pub admitted: bool,
	/// Position of this request in the current window (1-based).
	pub count: u64,
	/// The ceiling that applied.
	pub limit: u64,
	/// Quota left after this request's accounting.
	pub remaining: u64,
	/// When the window's count returns to zero.
	pub reset_at: DateTime<Utc>,
}

impl RateLimitOutcome {
	fn from_count(
		endpoint_id: &str,
		identity_class: IdentityClass,
		limit: u64,
		observed: WindowCount,
	) -> Self {
		Self {
			endpoint_id: endpoint_id.to_string(),
			identity_class,
			admitted: observed.count <= limit,
			count: observed.count,
			limit,
			remaining: limit.saturating_sub(observed.count),
			reset_at: observed.reset_at,
		}
	}

	/// Time left until the window resets, as seen from `now`.
	pub fn retry_after(&self, now: DateTime<Utc>) -> std::time::Duration {
		(self.reset_at - now)
			.max(TimeDelta::zero())
			.to_std()
			.unwrap_or_default()
	}
}

/// An admission outcome paired with the degradation advice for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionDecision {
	pub outcome: RateLimitOutcome,
	pub advice: DegradationAdvice,
}

impl AdmissionDecision {
	pub fn admitted(&self) -> bool {
		self.outcome.admitted
	}

	pub fn should_degrade(&self) -> bool {
		self.advice.should_degrade
	}
}

/// Admission decisions against a shared [`EndpointPolicyRegistry`].
///
/// # Examples
///
/// ```
/// use quota_gate_throttling::{AdmissionPolicy, EndpointPolicy, EndpointPolicyRegistry};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let registry = Arc::new(EndpointPolicyRegistry::new());
/// registry
///     .register(EndpointPolicy::new("sources", 10, 30, Duration::from_secs(86_400)))
///     .unwrap();
///
/// let admission = AdmissionPolicy::in_memory(registry);
/// let outcome = admission.check_now("sources", "203.0.113.7", false).await.unwrap();
/// assert!(outcome.admitted);
/// assert_eq!(outcome.remaining, 9);
/// # });
/// ```
pub struct AdmissionPolicy<S: WindowCounterStore + ?Sized = MemoryBackend, T: TimeProvider = SystemTimeProvider> {
	registry: Arc<EndpointPolicyRegistry>,
	store: Arc<S>,
	time_provider: Arc<T>,
}

impl AdmissionPolicy<MemoryBackend, SystemTimeProvider> {
	/// Creates a policy backed by a fresh in-process store.
	pub fn in_memory(registry: Arc<EndpointPolicyRegistry>) -> Self {
		Self::new(registry, Arc::new(MemoryBackend::new()))
	}
}

impl<S: WindowCounterStore + ?Sized> AdmissionPolicy<S, SystemTimeProvider> {
	pub fn new(registry: Arc<EndpointPolicyRegistry>, store: Arc<S>) -> Self {
		Self::with_time_provider(registry, store, Arc::new(SystemTimeProvider::new()))
	}
}

impl<S: WindowCounterStore + ?Sized, T: TimeProvider> AdmissionPolicy<S, T> {
	/// Create a policy with a custom time provider
	pub fn with_time_provider(
		registry: Arc<EndpointPolicyRegistry>,
		store: Arc<S>,
		time_provider: Arc<T>,
	) -> Self {
		Self {
			registry,
			store,
			time_provider,
		}
	}

	pub fn registry(&self) -> &Arc<EndpointPolicyRegistry> {
		&self.registry
	}

	pub fn store(&self) -> &Arc<S> {
		&self.store
	}

	/// Current time according to the configured time provider.
	pub fn now(&self) -> DateTime<Utc> {
		self.time_provider.now()
	}

	fn resolve(&self, endpoint_id: &str) -> ThrottleResult<Arc<RegisteredPolicy>> {
		self.registry.resolve_entry(endpoint_id).inspect_err(|_| {
			tracing::warn!(endpoint = %endpoint_id, "rate limit check for unregistered endpoint");
		})
	}

	fn store_unavailable(
		endpoint_id: &str,
		identity_class: IdentityClass,
		source: super::StoreError,
	) -> ThrottleError {
		tracing::warn!(
			endpoint = %endpoint_id,
			identity_class = %identity_class,
			error = %source,
			"rate limit counter store unavailable"
		);
		ThrottleError::CounterStoreUnavailable {
			endpoint: endpoint_id.to_string(),
			identity_class,
			source,
		}
	}

	/// Records one request and decides whether it is admitted.
	///
	/// # Errors
	///
	/// - [`ThrottleError::UnknownEndpoint`] if no policy is registered; the
	///   store is not touched.
	/// - [`ThrottleError::InvalidKey`] if `identity` cannot be used in a key.
	/// - [`ThrottleError::CounterStoreUnavailable`] if the store fails. No
	///   retry is attempted.
	pub async fn check(
		&self,
		endpoint_id: &str,
		identity: &str,
		is_authenticated: bool,
		now: DateTime<Utc>,
	) -> ThrottleResult<RateLimitOutcome> {
		let entry = self.resolve(endpoint_id)?;
		self.check_entry(&entry, identity, is_authenticated, now)
			.await
	}

	/// Runs the check against one resolved policy snapshot.
	async fn check_entry(
		&self,
		entry: &RegisteredPolicy,
		identity: &str,
		is_authenticated: bool,
		now: DateTime<Utc>,
	) -> ThrottleResult<RateLimitOutcome> {
		let endpoint_id = entry.policy().endpoint_id.as_str();
		let identity_class = IdentityClass::from_authenticated(is_authenticated);
		let tier = entry.policy().tier(identity_class);
		let key = WindowCounterKey::with_prefix(entry.key_prefix(identity_class), identity)?;

		let observed = self
			.store
			.increment_and_inspect(key.as_str(), tier.window, now)
			.await
			.map_err(|e| Self::store_unavailable(endpoint_id, identity_class, e))?;

		let outcome = RateLimitOutcome::from_count(endpoint_id, identity_class, tier.limit, observed);
		tracing::debug!(
			endpoint = %endpoint_id,
			identity_class = %identity_class,
			admitted = outcome.admitted,
			count = outcome.count,
			limit = outcome.limit,
			remaining = outcome.remaining,
			"rate limit check"
		);
		Ok(outcome)
	}

	/// [`check`](Self::check) at the time provider's current time.
	pub async fn check_now(
		&self,
		endpoint_id: &str,
		identity: &str,
		is_authenticated: bool,
	) -> ThrottleResult<RateLimitOutcome> {
		self.check(endpoint_id, identity, is_authenticated, self.now())
			.await
	}

	/// Checks admission and evaluates degradation with the endpoint's own
	/// thresholds.
	///
	/// The limit and the floors come from the same policy snapshot, even if
	/// the registry is reloaded while the store call is in flight.
	pub async fn decide(
		&self,
		endpoint_id: &str,
		identity: &str,
		is_authenticated: bool,
		now: DateTime<Utc>,
	) -> ThrottleResult<AdmissionDecision> {
		let entry = self.resolve(endpoint_id)?;
		let outcome = self
			.check_entry(&entry, identity, is_authenticated, now)
			.await?;
		let advice = DegradationAdvisor::evaluate(&outcome, &entry.policy().degradation);
		Ok(AdmissionDecision { outcome, advice })
	}

	/// [`decide`](Self::decide) at the time provider's current time.
	pub async fn decide_now(
		&self,
		endpoint_id: &str,
		identity: &str,
		is_authenticated: bool,
	) -> ThrottleResult<AdmissionDecision> {
		self.decide(endpoint_id, identity, is_authenticated, self.now())
			.await
	}

	/// Reports the quota state without recording a request.
	///
	/// `count` is the number of requests already recorded and `admitted`
	/// tells whether the next request would still fit.
	pub async fn peek(
		&self,
		endpoint_id: &str,
		identity: &str,
		is_authenticated: bool,
		now: DateTime<Utc>,
	) -> ThrottleResult<RateLimitOutcome> {
		let entry = self.resolve(endpoint_id)?;
		let identity_class = IdentityClass::from_authenticated(is_authenticated);
		let tier = entry.policy().tier(identity_class);
		let key = WindowCounterKey::with_prefix(entry.key_prefix(identity_class), identity)?;

		let observed = self
			.store
			.get_count(key.as_str(), now)
			.await
			.map_err(|e| Self::store_unavailable(endpoint_id, identity_class, e))?;

		let (count, reset_at) = match observed {
			Some(observed) => (observed.count, observed.reset_at),
			None => {
				let window = TimeDelta::from_std(tier.window).unwrap_or(TimeDelta::MAX);
				(0, now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC))
			}
		};
		Ok(RateLimitOutcome {
			endpoint_id: endpoint_id.to_string(),
			identity_class,
			admitted: count < tier.limit,
			count,
			limit: tier.limit,
			remaining: tier.limit.saturating_sub(count),
			reset_at,
		})
	}

	/// Clears the counter of one identity.
	pub async fn reset(
		&self,
		endpoint_id: &str,
		identity: &str,
		is_authenticated: bool,
	) -> ThrottleResult<()> {
		let entry = self.resolve(endpoint_id)?;
		let identity_class = IdentityClass::from_authenticated(is_authenticated);
		let key = WindowCounterKey::with_prefix(entry.key_prefix(identity_class), identity)?;

		self.store
			.reset(key.as_str())
			.await
			.map_err(|e| Self::store_unavailable(endpoint_id, identity_class, e))?;
		tracing::info!(endpoint = %endpoint_id, identity_class = %identity_class, "rate limit counter reset");
		Ok(())
	}
}
