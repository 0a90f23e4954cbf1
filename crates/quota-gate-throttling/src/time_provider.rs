use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Source of wall-clock time for admission checks.
///
/// Counter windows reset at absolute timestamps that end up in response
/// headers, so this works on `DateTime<Utc>` rather than a monotonic clock.
/// Tests swap in [`MockTimeProvider`] to move across window boundaries.
pub trait TimeProvider: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// System time provider that uses the actual system clock.
#[derive(Debug, Clone, Default)]
pub struct SystemTimeProvider;

impl SystemTimeProvider {
	pub fn new() -> Self {
		Self
	}
}

impl TimeProvider for SystemTimeProvider {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Mock time provider for testing that allows manual time control.
#[derive(Debug, Clone)]
pub struct MockTimeProvider {
	current_time: Arc<RwLock<DateTime<Utc>>>,
}

impl MockTimeProvider {
	pub fn new(start_time: DateTime<Utc>) -> Self {
		Self {
			current_time: Arc::new(RwLock::new(start_time)),
		}
	}

	/// Moves the clock forward.
	///
	/// # Panics
	///
	/// Panics if `duration` does not fit in a `chrono::TimeDelta`.
	pub fn advance(&self, duration: std::time::Duration) {
		let delta =
			chrono::TimeDelta::from_std(duration).expect("duration out of range for mock clock");
		let mut time = self.current_time.write();
		*time += delta;
	}

	pub fn set_time(&self, time: DateTime<Utc>) {
		let mut current = self.current_time.write();
		*current = time;
	}
}

impl Default for MockTimeProvider {
	fn default() -> Self {
		Self::new(Utc::now())
	}
}

impl TimeProvider for MockTimeProvider {
	fn now(&self) -> DateTime<Utc> {
		*self.current_time.read()
	}
}
