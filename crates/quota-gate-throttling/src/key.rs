//! Counter key construction and validation
//!
//! Keys have the shape `ratelimit:<endpoint>:<anon|auth>:<identity>`. The
//! endpoint id is a validated component without `:`, and the class tag is
//! fixed, so an identity can never forge another endpoint's or class's key
//! even when it contains `:` itself (IPv6 addresses do).

use super::policy::IdentityClass;
use super::{ThrottleError, ThrottleResult};
use std::fmt;

/// Maximum length in bytes of an endpoint id or identity.
pub const MAX_KEY_COMPONENT_LEN: usize = 256;

const KEY_NAMESPACE: &str = "ratelimit";

/// Validates a component that is embedded between `:` delimiters.
pub fn validate_key_component(component: &str) -> ThrottleResult<()> {
	if component.is_empty() {
		return Err(ThrottleError::InvalidKey(
			"key component must not be empty".to_string(),
		));
	}
	if component.len() > MAX_KEY_COMPONENT_LEN {
		return Err(ThrottleError::InvalidKey(format!(
			"key component exceeds maximum length of {} bytes",
			MAX_KEY_COMPONENT_LEN
		)));
	}
	if component.chars().any(char::is_control) {
		return Err(ThrottleError::InvalidKey(
			"key component must not contain control characters".to_string(),
		));
	}
	if component.contains(':') {
		return Err(ThrottleError::InvalidKey(
			"key component must not contain ':' delimiter".to_string(),
		));
	}
	Ok(())
}

/// Validates a caller identity (user id, IP address, ...).
pub fn validate_identity(identity: &str) -> ThrottleResult<()> {
	if identity.is_empty() {
		return Err(ThrottleError::InvalidKey(
			"identity must not be empty".to_string(),
		));
	}
	if identity.len() > MAX_KEY_COMPONENT_LEN {
		return Err(ThrottleError::InvalidKey(format!(
			"identity exceeds maximum length of {} bytes",
			MAX_KEY_COMPONENT_LEN
		)));
	}
	if identity.chars().any(char::is_control) {
		return Err(ThrottleError::InvalidKey(
			"identity must not contain control characters".to_string(),
		));
	}
	Ok(())
}

/// Prefix shared by every counter of one `(endpoint, identity class)` pair.
pub fn key_prefix(endpoint_id: &str, class: IdentityClass) -> String {
	format!("{}:{}:{}", KEY_NAMESPACE, endpoint_id, class.key_tag())
}

/// Address of one counter in the window counter store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowCounterKey(String);

impl WindowCounterKey {
	/// Builds a key from scratch, validating both components.
	///
	/// # Examples
	///
	/// ```
	/// use quota_gate_throttling::{IdentityClass, WindowCounterKey};
	///
	/// let key = WindowCounterKey::new("sources", IdentityClass::Anonymous, "203.0.113.7").unwrap();
	/// assert_eq!(key.as_str(), "ratelimit:sources:anon:203.0.113.7");
	/// ```
	pub fn new(endpoint_id: &str, class: IdentityClass, identity: &str) -> ThrottleResult<Self> {
		validate_key_component(endpoint_id)?;
		Self::with_prefix(&key_prefix(endpoint_id, class), identity)
	}

	/// Builds a key from a precomputed prefix (see [`key_prefix`]).
	pub fn with_prefix(prefix: &str, identity: &str) -> ThrottleResult<Self> {
		validate_identity(identity)?;
		Ok(Self(format!("{}:{}", prefix, identity)))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for WindowCounterKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for WindowCounterKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_key_is_segmented_by_identity_class() {
		// Arrange & Act
		let anon = WindowCounterKey::new("sources", IdentityClass::Anonymous, "user-1").unwrap();
		let auth = WindowCounterKey::new("sources", IdentityClass::Authenticated, "user-1").unwrap();

		// Assert
		assert_eq!(anon.as_str(), "ratelimit:sources:anon:user-1");
		assert_eq!(auth.as_str(), "ratelimit:sources:auth:user-1");
		assert_ne!(anon, auth);
	}

	#[rstest]
	fn test_identity_may_contain_colons() {
		// Arrange & Act
		let key = WindowCounterKey::new("chat", IdentityClass::Anonymous, "2001:db8::1").unwrap();

		// Assert
		assert_eq!(key.to_string(), "ratelimit:chat:anon:2001:db8::1");
	}

	#[rstest]
	fn test_prefix_matches_full_key() {
		// Arrange
		let prefix = key_prefix("sources", IdentityClass::Authenticated);

		// Act
		let from_prefix = WindowCounterKey::with_prefix(&prefix, "u").unwrap();
		let direct = WindowCounterKey::new("sources", IdentityClass::Authenticated, "u").unwrap();

		// Assert
		assert_eq!(from_prefix, direct);
	}

	#[rstest]
	#[case::empty("", "identity must not be empty")]
	#[case::null_byte("user\0id", "control characters")]
	#[case::newline("user\nid", "control characters")]
	fn test_reject_invalid_identity(#[case] identity: &str, #[case] expected: &str) {
		// Act
		let result = WindowCounterKey::new("api", IdentityClass::Anonymous, identity);

		// Assert
		let err = result.unwrap_err();
		assert!(matches!(err, ThrottleError::InvalidKey(_)));
		assert!(err.to_string().contains(expected));
	}

	#[rstest]
	fn test_reject_excessively_long_identity() {
		// Arrange
		let long_id = "a".repeat(MAX_KEY_COMPONENT_LEN + 1);

		// Act
		let result = validate_identity(&long_id);

		// Assert
		assert!(matches!(result, Err(ThrottleError::InvalidKey(_))));
	}

	#[rstest]
	#[case::empty("", "key component must not be empty")]
	#[case::delimiter("scope:name", "key component must not contain ':' delimiter")]
	#[case::control("api\0scope", "key component must not contain control characters")]
	fn test_reject_invalid_endpoint_component(#[case] component: &str, #[case] expected: &str) {
		// Act
		let result = validate_key_component(component);

		// Assert
		assert!(result.unwrap_err().to_string().contains(expected));
	}
}
