//! Loading the rate limit table from disk

use super::SettingsError;
use super::settings::ThrottleSettings;
use std::fs;
use std::path::Path;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "QUOTA_GATE_CONFIG";

/// Reads a `.toml` or `.json` file.
///
/// # Errors
///
/// Returns [`SettingsError::UnsupportedFormat`] for other extensions, and the
/// underlying I/O or parse error otherwise.
pub fn load_file(path: impl AsRef<Path>) -> Result<ThrottleSettings, SettingsError> {
	let path = path.as_ref();
	let extension = path
		.extension()
		.and_then(|ext| ext.to_str())
		.map(str::to_ascii_lowercase);

	let settings = match extension.as_deref() {
		Some("toml") => ThrottleSettings::from_toml_str(&fs::read_to_string(path)?)?,
		Some("json") => ThrottleSettings::from_json_str(&fs::read_to_string(path)?)?,
		_ => return Err(SettingsError::UnsupportedFormat(path.display().to_string())),
	};
	tracing::info!(
		path = %path.display(),
		endpoints = settings.endpoints.len(),
		"loaded rate limit configuration"
	);
	Ok(settings)
}

/// Loads from `path` when given, otherwise returns the built-in table.
pub fn load_or_default(path: Option<&Path>) -> Result<ThrottleSettings, SettingsError> {
	match path {
		Some(path) => load_file(path),
		None => {
			tracing::debug!("no rate limit configuration file, using built-in defaults");
			Ok(ThrottleSettings::default())
		}
	}
}

/// Loads the file named by `QUOTA_GATE_CONFIG`, or the built-in table when the
/// variable is unset or empty.
pub fn load_from_env() -> Result<ThrottleSettings, SettingsError> {
	let path = std::env::var_os(CONFIG_PATH_ENV).filter(|value| !value.is_empty());
	load_or_default(path.as_deref().map(Path::new))
}
