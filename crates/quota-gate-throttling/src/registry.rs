//! Endpoint policy registry
//!
//! Readers take a short read lock, clone the `Arc` of the current table and
//! release the lock. Writers validate first, build a new table, and swap it in
//! whole, so a reader sees either the old table or the new one and never a
//! mix of both.

use super::key::key_prefix;
use super::policy::{EndpointPolicy, IdentityClass};
use super::{ThrottleError, ThrottleResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A validated policy together with its precomputed counter key prefixes.
#[derive(Debug)]
pub struct RegisteredPolicy {
	policy: EndpointPolicy,
	anonymous_prefix: String,
	authenticated_prefix: String,
}

impl RegisteredPolicy {
	fn new(policy: EndpointPolicy) -> ThrottleResult<Self> {
		policy.validate()?;
		Ok(Self {
			anonymous_prefix: key_prefix(&policy.endpoint_id, IdentityClass::Anonymous),
			authenticated_prefix: key_prefix(&policy.endpoint_id, IdentityClass::Authenticated),
			policy,
		})
	}

	pub fn policy(&self) -> &EndpointPolicy {
		&self.policy
	}

	/// Counter key prefix for one identity class of this endpoint.
	pub fn key_prefix(&self, class: IdentityClass) -> &str {
		match class {
			IdentityClass::Anonymous => &self.anonymous_prefix,
			IdentityClass::Authenticated => &self.authenticated_prefix,
		}
	}
}

type PolicyTable = HashMap<String, Arc<RegisteredPolicy>>;

/// Mapping from endpoint id to its [`EndpointPolicy`].
///
/// # Examples
///
/// ```
/// use quota_gate_throttling::{EndpointPolicy, EndpointPolicyRegistry};
/// use std::time::Duration;
///
/// let registry = EndpointPolicyRegistry::new();
/// registry
///     .register(EndpointPolicy::new("sources", 10, 30, Duration::from_secs(86_400)))
///     .unwrap();
///
/// assert_eq!(registry.resolve("sources").unwrap().anonymous.limit, 10);
/// assert!(registry.resolve("nonexistent").is_err());
/// ```
#[derive(Debug, Default)]
pub struct EndpointPolicyRegistry {
	table: RwLock<Arc<PolicyTable>>,
}

impl EndpointPolicyRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a registry from a set of policies.
	///
	/// # Errors
	///
	/// Returns the first [`ThrottleError::Configuration`] encountered.
	pub fn from_policies(policies: impl IntoIterator<Item = EndpointPolicy>) -> ThrottleResult<Self> {
		let registry = Self::new();
		registry.replace_all(policies)?;
		Ok(registry)
	}

	/// Adds or overwrites the policy for `policy.endpoint_id`.
	///
	/// # Errors
	///
	/// Returns [`ThrottleError::Configuration`] if the policy is malformed; the
	/// registry is left unchanged in that case.
	pub fn register(&self, policy: EndpointPolicy) -> ThrottleResult<()> {
		let entry = Arc::new(RegisteredPolicy::new(policy)?);
		let endpoint = entry.policy.endpoint_id.clone();

		let mut table = self.table.write();
		let mut next = PolicyTable::clone(&table);
		let replaced = next.insert(endpoint.clone(), entry).is_some();
		*table = Arc::new(next);
		drop(table);

		tracing::debug!(endpoint = %endpoint, replaced, "registered rate limit policy");
		Ok(())
	}

	/// Replaces the whole table in one step.
	///
	/// Every policy is validated before anything is swapped; on error the
	/// current table stays in place.
	///
	/// # Errors
	///
	/// Returns the first [`ThrottleError::Configuration`] encountered.
	pub fn replace_all(&self, policies: impl IntoIterator<Item = EndpointPolicy>) -> ThrottleResult<()> {
		let next = policies
			.into_iter()
			.map(|policy| -> ThrottleResult<(String, Arc<RegisteredPolicy>)> {
				let entry = RegisteredPolicy::new(policy)?;
				Ok((entry.policy.endpoint_id.clone(), Arc::new(entry)))
			})
			.collect::<ThrottleResult<PolicyTable>>()?;
		let count = next.len();

		*self.table.write() = Arc::new(next);

		tracing::info!(endpoints = count, "loaded rate limit policies");
		Ok(())
	}

	/// Looks up a registered policy along with its key prefixes.
	///
	/// # Errors
	///
	/// Returns [`ThrottleError::UnknownEndpoint`] if nothing is registered under
	/// `endpoint_id`.
	pub fn resolve_entry(&self, endpoint_id: &str) -> ThrottleResult<Arc<RegisteredPolicy>> {
		let table = Arc::clone(&self.table.read());
		table
			.get(endpoint_id)
			.cloned()
			.ok_or_else(|| ThrottleError::UnknownEndpoint(endpoint_id.to_string()))
	}

	/// Looks up the policy for `endpoint_id`.
	///
	/// # Errors
	///
	/// Returns [`ThrottleError::UnknownEndpoint`] if nothing is registered under
	/// `endpoint_id`. This indicates a startup wiring mistake, not a user error.
	pub fn resolve(&self, endpoint_id: &str) -> ThrottleResult<EndpointPolicy> {
		self.resolve_entry(endpoint_id)
			.map(|entry| entry.policy.clone())
	}

	pub fn contains(&self, endpoint_id: &str) -> bool {
		self.table.read().contains_key(endpoint_id)
	}

	/// Registered endpoint ids, sorted.
	pub fn endpoints(&self) -> Vec<String> {
		let table = Arc::clone(&self.table.read());
		let mut endpoints: Vec<String> = table.keys().cloned().collect();
		endpoints.sort();
		endpoints
	}

	pub fn len(&self) -> usize {
		self.table.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.table.read().is_empty()
	}
}
