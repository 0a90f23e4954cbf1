//! Rate limit configuration
//!
//! Reads the static `endpoint -> {anonymous, authenticated}` table from TOML
//! or JSON, validates it, and turns it into an
//! [`EndpointPolicyRegistry`](quota_gate_throttling::EndpointPolicyRegistry).
//!
//! ```
//! use quota_gate_conf::ThrottleSettings;
//!
//! let registry = ThrottleSettings::from_toml_str(r#"
//!     [endpoints.sources]
//!     anonymous = { limit = 10, window = "1d" }
//!     authenticated = { limit = 30, window = "1d" }
//! "#)
//! .and_then(|settings| settings.build_registry())
//! .unwrap();
//! assert!(registry.contains("sources"));
//! ```

pub mod settings;
pub mod sources;
pub mod window;

pub use settings::{DegradationSettings, EndpointSettings, ThrottleSettings, TierSettings};
pub use sources::{CONFIG_PATH_ENV, load_file, load_from_env, load_or_default};
pub use window::{WindowDuration, format_window, parse_window};

use quota_gate_throttling::ThrottleError;

/// Error type for loading rate limit configuration
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("TOML serialization error: {0}")]
	TomlSerialize(#[from] toml::ser::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("invalid window duration '{input}': {reason}")]
	InvalidDuration { input: String, reason: String },

	#[error("unsupported configuration format: {0}")]
	UnsupportedFormat(String),

	#[error(transparent)]
	Policy(#[from] ThrottleError),
}
