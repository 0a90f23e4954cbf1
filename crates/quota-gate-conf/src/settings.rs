//! Declarative rate limit table
//!
//! ```toml
//! [endpoints.sources]
//! anonymous = { limit = 10, window = "1d" }
//! authenticated = { limit = 30, window = "1d" }
//!
//! [endpoints.chat]
//! anonymous = { limit = 20, window = "1d" }
//! authenticated = { limit = 100, window = "1d" }
//! degradation = { anonymous_floor = 5, authenticated_floor = 10 }
//! ```

use super::SettingsError;
use super::window::WindowDuration;
use indexmap::IndexMap;
use quota_gate_throttling::{
	DegradationThresholds, EndpointPolicy, EndpointPolicyRegistry, QuotaTier,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quota for one identity class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierSettings {
	pub limit: u64,
	pub window: WindowDuration,
}

impl TierSettings {
	pub fn new(limit: u64, window: Duration) -> Self {
		Self {
			limit,
			window: WindowDuration::new(window),
		}
	}
}

impl From<&TierSettings> for QuotaTier {
	fn from(settings: &TierSettings) -> Self {
		QuotaTier::new(settings.limit, settings.window.as_duration())
	}
}

fn default_authenticated_floor() -> u64 {
	DegradationThresholds::DEFAULT_AUTHENTICATED_FLOOR
}

fn default_anonymous_floor() -> u64 {
	DegradationThresholds::DEFAULT_ANONYMOUS_FLOOR
}

/// Remaining-quota floors that trigger degradation advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DegradationSettings {
	#[serde(default = "default_authenticated_floor")]
	pub authenticated_floor: u64,
	#[serde(default = "default_anonymous_floor")]
	pub anonymous_floor: u64,
}

impl Default for DegradationSettings {
	fn default() -> Self {
		Self {
			authenticated_floor: default_authenticated_floor(),
			anonymous_floor: default_anonymous_floor(),
		}
	}
}

impl From<DegradationSettings> for DegradationThresholds {
	fn from(settings: DegradationSettings) -> Self {
		DegradationThresholds::new(settings.authenticated_floor, settings.anonymous_floor)
	}
}

/// Limits for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSettings {
	pub anonymous: TierSettings,
	pub authenticated: TierSettings,
	/// Falls back to [`ThrottleSettings::degradation`] when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub degradation: Option<DegradationSettings>,
}

/// The whole rate limit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleSettings {
	/// Floors used by endpoints that do not set their own.
	#[serde(default)]
	pub degradation: DegradationSettings,
	#[serde(default)]
	pub endpoints: IndexMap<String, EndpointSettings>,
}

impl Default for ThrottleSettings {
	/// The built-in table: the `sources` endpoint with 10 anonymous and 30
	/// authenticated requests per day.
	fn default() -> Self {
		let day = Duration::from_secs(86_400);
		let mut endpoints = IndexMap::new();
		endpoints.insert(
			"sources".to_string(),
			EndpointSettings {
				anonymous: TierSettings::new(10, day),
				authenticated: TierSettings::new(30, day),
				degradation: None,
			},
		);
		Self {
			degradation: DegradationSettings::default(),
			endpoints,
		}
	}
}

impl ThrottleSettings {
	/// Parses a TOML table.
	///
	/// # Examples
	///
	/// ```
	/// use quota_gate_conf::ThrottleSettings;
	///
	/// let settings = ThrottleSettings::from_toml_str(r#"
	///     [endpoints.sources]
	///     anonymous = { limit = 10, window = "1d" }
	///     authenticated = { limit = 30, window = "1d" }
	/// "#).unwrap();
	/// assert_eq!(settings.endpoints["sources"].authenticated.limit, 30);
	/// ```
	pub fn from_toml_str(input: &str) -> Result<Self, SettingsError> {
		Ok(toml::from_str(input)?)
	}

	/// Parses a JSON table.
	pub fn from_json_str(input: &str) -> Result<Self, SettingsError> {
		Ok(serde_json::from_str(input)?)
	}

	pub fn to_toml_string(&self) -> Result<String, SettingsError> {
		Ok(toml::to_string_pretty(self)?)
	}

	/// Builds validated endpoint policies, in table order.
	///
	/// # Errors
	///
	/// Returns [`SettingsError::Policy`] for the first endpoint that fails
	/// validation.
	pub fn to_policies(&self) -> Result<Vec<EndpointPolicy>, SettingsError> {
		self.endpoints
			.iter()
			.map(|(endpoint_id, endpoint)| -> Result<EndpointPolicy, SettingsError> {
				let policy = EndpointPolicy {
					endpoint_id: endpoint_id.clone(),
					anonymous: QuotaTier::from(&endpoint.anonymous),
					authenticated: QuotaTier::from(&endpoint.authenticated),
					degradation: endpoint.degradation.unwrap_or(self.degradation).into(),
				};
				policy.validate()?;
				if policy.authenticated.limit < policy.anonymous.limit {
					tracing::warn!(
						endpoint = %endpoint_id,
						anonymous = policy.anonymous.limit,
						authenticated = policy.authenticated.limit,
						"authenticated limit is lower than anonymous limit"
					);
				}
				Ok(policy)
			})
			.collect()
	}

	/// Builds a fresh registry holding every endpoint of the table.
	pub fn build_registry(&self) -> Result<EndpointPolicyRegistry, SettingsError> {
		Ok(EndpointPolicyRegistry::from_policies(self.to_policies()?)?)
	}

	/// Swaps the table into an existing registry (hot reload).
	///
	/// Nothing changes in `registry` if any endpoint is invalid.
	pub fn apply_to(&self, registry: &EndpointPolicyRegistry) -> Result<(), SettingsError> {
		registry.replace_all(self.to_policies()?)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use quota_gate_throttling::{IdentityClass, ThrottleError};
	use rstest::rstest;

	const TABLE: &str = r#"
		[degradation]
		anonymous_floor = 3

		[endpoints.sources]
		anonymous = { limit = 10, window = "1d" }
		authenticated = { limit = 30, window = "1 d" }

		[endpoints.chat]
		anonymous = { limit = 20, window = "12h" }
		authenticated = { limit = 100, window = 86400 }
		degradation = { anonymous_floor = 8, authenticated_floor = 25 }
	"#;

	#[rstest]
	fn test_parse_toml_table() {
		// Act
		let settings = ThrottleSettings::from_toml_str(TABLE).unwrap();

		// Assert
		assert_eq!(
			settings.endpoints.keys().collect::<Vec<_>>(),
			vec!["sources", "chat"]
		);
		let chat = &settings.endpoints["chat"];
		assert_eq!(chat.anonymous.window.as_duration(), Duration::from_secs(43_200));
		assert_eq!(chat.authenticated.window.as_duration(), Duration::from_secs(86_400));
		assert_eq!(settings.degradation.anonymous_floor, 3);
		assert_eq!(settings.degradation.authenticated_floor, 10);
	}

	#[rstest]
	fn test_policies_inherit_global_floors() {
		// Arrange
		let settings = ThrottleSettings::from_toml_str(TABLE).unwrap();

		// Act
		let policies = settings.to_policies().unwrap();

		// Assert
		assert_eq!(policies[0].endpoint_id, "sources");
		assert_eq!(policies[0].degradation, DegradationThresholds::new(10, 3));
		assert_eq!(policies[1].degradation, DegradationThresholds::new(25, 8));
		assert_eq!(
			policies[1].tier(IdentityClass::Anonymous).window,
			Duration::from_secs(43_200)
		);
	}

	#[rstest]
	fn test_parse_json_table() {
		// Arrange
		let json = r#"{
			"endpoints": {
				"sources": {
					"anonymous": {"limit": 10, "window": "1d"},
					"authenticated": {"limit": 30, "window": "1d"}
				}
			}
		}"#;

		// Act
		let settings = ThrottleSettings::from_json_str(json).unwrap();

		// Assert
		assert_eq!(settings, ThrottleSettings::default());
	}

	#[rstest]
	fn test_default_table_has_sources_endpoint() {
		// Act
		let registry = ThrottleSettings::default().build_registry().unwrap();

		// Assert
		let policy = registry.resolve("sources").unwrap();
		assert_eq!(policy.anonymous, QuotaTier::new(10, Duration::from_secs(86_400)));
		assert_eq!(policy.authenticated, QuotaTier::new(30, Duration::from_secs(86_400)));
		assert_eq!(policy.degradation, DegradationThresholds::new(10, 5));
	}

	#[rstest]
	fn test_zero_limit_is_a_configuration_error() {
		// Arrange
		let settings = ThrottleSettings::from_toml_str(
			r#"
			[endpoints.sources]
			anonymous = { limit = 0, window = "1d" }
			authenticated = { limit = 30, window = "1d" }
			"#,
		)
		.unwrap();

		// Act
		let result = settings.to_policies();

		// Assert
		assert!(matches!(
			result,
			Err(SettingsError::Policy(ThrottleError::Configuration { .. }))
		));
	}

	#[rstest]
	fn test_window_past_calendar_is_a_configuration_error() {
		// Arrange
		let settings = ThrottleSettings::from_toml_str(
			r#"
			[endpoints.archive]
			anonymous = { limit = 10, window = "100000000d" }
			authenticated = { limit = 30, window = "1d" }
			"#,
		)
		.unwrap();

		// Act
		let result = settings.build_registry();

		// Assert
		match result {
			Err(SettingsError::Policy(ThrottleError::Configuration { endpoint, message })) => {
				assert_eq!(endpoint, "archive");
				assert!(message.contains("anonymous window is out of range"), "{}", message);
			}
			other => panic!("expected a configuration error, got {:?}", other.map(|r| r.len())),
		}
	}

	#[rstest]
	#[case::unknown_field("[endpoints.sources]\nanonymous = { limit = 1, window = \"1d\", burst = 2 }\nauthenticated = { limit = 1, window = \"1d\" }")]
	#[case::bad_window("[endpoints.sources]\nanonymous = { limit = 1, window = \"1 fortnight\" }\nauthenticated = { limit = 1, window = \"1d\" }")]
	#[case::missing_tier("[endpoints.sources]\nanonymous = { limit = 1, window = \"1d\" }")]
	#[case::negative_limit("[endpoints.sources]\nanonymous = { limit = -1, window = \"1d\" }\nauthenticated = { limit = 1, window = \"1d\" }")]
	fn test_malformed_toml_is_rejected(#[case] input: &str) {
		assert!(matches!(
			ThrottleSettings::from_toml_str(input),
			Err(SettingsError::Toml(_))
		));
	}

	#[rstest]
	fn test_apply_to_reloads_registry() {
		// Arrange
		let registry = ThrottleSettings::default().build_registry().unwrap();
		let settings = ThrottleSettings::from_toml_str(TABLE).unwrap();

		// Act
		settings.apply_to(&registry).unwrap();

		// Assert
		assert_eq!(registry.endpoints(), vec!["chat", "sources"]);
	}

	#[rstest]
	fn test_toml_round_trip_preserves_table() {
		// Arrange
		let settings = ThrottleSettings::from_toml_str(TABLE).unwrap();

		// Act
		let rendered = settings.to_toml_string().unwrap();

		// Assert
		assert_eq!(ThrottleSettings::from_toml_str(&rendered).unwrap(), settings);
	}
}
