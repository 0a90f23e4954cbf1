//! Error types for admission checks and counter stores

use super::policy::IdentityClass;

/// Errors raised by the admission engine.
///
/// Every variant carries enough context (endpoint id, identity class) for the
/// caller to log it meaningfully. None of them are swallowed inside the engine.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
	/// A policy failed validation at registration time.
	#[error("invalid policy for endpoint '{endpoint}': {message}")]
	Configuration { endpoint: String, message: String },

	/// No policy was registered for the endpoint.
	#[error("no rate limit policy registered for endpoint '{0}'")]
	UnknownEndpoint(String),

	/// The window counter store could not be reached or returned an error.
	#[error("counter store unavailable for endpoint '{endpoint}' ({identity_class}): {source}")]
	CounterStoreUnavailable {
		endpoint: String,
		identity_class: IdentityClass,
		#[source]
		source: StoreError,
	},

	/// An identity or endpoint id cannot be used as part of a counter key.
	#[error("invalid key: {0}")]
	InvalidKey(String),
}

impl ThrottleError {
	pub(crate) fn configuration(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Configuration {
			endpoint: endpoint.into(),
			message: message.into(),
		}
	}

	/// Returns `true` for transient infrastructure failures.
	///
	/// These are the only errors for which a caller-level retry or a
	/// fail-open decision makes sense.
	pub fn is_store_failure(&self) -> bool {
		matches!(self, Self::CounterStoreUnavailable { .. })
	}
}

/// Errors returned by [`WindowCounterStore`](super::backend::WindowCounterStore)
/// implementations.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("store unavailable: {0}")]
	Unavailable(String),

	#[error("store returned an invalid reply: {0}")]
	InvalidReply(String),

	/// The window does not fit the timestamp range of the store.
	#[error("invalid window: {0}")]
	InvalidWindow(String),

	#[cfg(feature = "redis-backend")]
	#[error("redis error: {0}")]
	Redis(#[from] redis::RedisError),
}

pub type ThrottleResult<T> = Result<T, ThrottleError>;
