//! Window durations
//!
//! Accepts the compact notation used in rate limit tables: an integer
//! followed by an optional space and a unit (`"500ms"`, `"10 s"`, `"30m"`,
//! `"12h"`, `"1d"`). A bare integer in the configuration means seconds.

use super::SettingsError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A rate limit window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowDuration(Duration);

impl WindowDuration {
	pub fn new(duration: Duration) -> Self {
		Self(duration)
	}

	pub fn as_duration(&self) -> Duration {
		self.0
	}
}

impl From<WindowDuration> for Duration {
	fn from(window: WindowDuration) -> Self {
		window.0
	}
}

const UNITS: &[(&str, u64)] = &[
	("ms", 1),
	("s", 1_000),
	("m", 60_000),
	("h", 3_600_000),
	("d", 86_400_000),
];

/// Parses a window such as `"1d"` or `"10 s"`.
///
/// # Errors
///
/// Returns [`SettingsError::InvalidDuration`] for an empty amount, an unknown
/// unit, or an amount that overflows.
///
/// # Examples
///
/// ```
/// use quota_gate_conf::parse_window;
/// use std::time::Duration;
///
/// assert_eq!(parse_window("1d").unwrap(), Duration::from_secs(86_400));
/// assert_eq!(parse_window("10 s").unwrap(), Duration::from_secs(10));
/// assert!(parse_window("soon").is_err());
/// ```
pub fn parse_window(input: &str) -> Result<Duration, SettingsError> {
	let invalid = |reason: &str| SettingsError::InvalidDuration {
		input: input.to_string(),
		reason: reason.to_string(),
	};

	let trimmed = input.trim();
	let split = trimmed
		.find(|c: char| !c.is_ascii_digit())
		.unwrap_or(trimmed.len());
	let (amount, unit) = trimmed.split_at(split);
	if amount.is_empty() {
		return Err(invalid("expected a leading integer amount"));
	}
	let amount: u64 = amount
		.parse()
		.map_err(|_| invalid("amount is too large"))?;

	let unit = unit.trim_start();
	let unit = if unit.is_empty() { "s" } else { unit };
	let millis_per_unit = UNITS
		.iter()
		.find(|(name, _)| *name == unit)
		.map(|(_, millis)| *millis)
		.ok_or_else(|| invalid("unit must be one of ms, s, m, h, d"))?;

	amount
		.checked_mul(millis_per_unit)
		.map(Duration::from_millis)
		.ok_or_else(|| invalid("amount is too large"))
}

/// Formats a duration in the largest unit that divides it exactly.
pub fn format_window(duration: Duration) -> String {
	let millis = duration.as_millis();
	UNITS
		.iter()
		.rev()
		.find(|(_, unit)| millis % u128::from(*unit) == 0)
		.map(|(name, unit)| format!("{}{}", millis / u128::from(*unit), name))
		.unwrap_or_else(|| format!("{}ms", millis))
}

impl FromStr for WindowDuration {
	type Err = SettingsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse_window(s).map(Self)
	}
}

impl fmt::Display for WindowDuration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&format_window(self.0))
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWindow {
	Seconds(u64),
	Text(String),
}

impl<'de> Deserialize<'de> for WindowDuration {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		match RawWindow::deserialize(deserializer)? {
			RawWindow::Seconds(secs) => Ok(Self(Duration::from_secs(secs))),
			RawWindow::Text(text) => text.parse().map_err(serde::de::Error::custom),
		}
	}
}

impl Serialize for WindowDuration {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}
