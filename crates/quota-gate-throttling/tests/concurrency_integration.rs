//! Concurrent admission tests
//!
//! Many tasks hit the same identity at once. The counter stores here split
//! increment into read, wait, write so that concurrent callers land inside
//! that gap; every increment must still be counted exactly once.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use quota_gate_throttling::{
	AdmissionPolicy, EndpointPolicy, EndpointPolicyRegistry, MemoryBackend, RateLimitOutcome,
	StoreError, WindowCount, WindowCounterStore,
};
use rstest::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Counter store whose read-modify-write spans an await point.
///
/// With `atomic` set, the whole sequence runs under one lock. Without it,
/// the lock is released between the read and the write.
struct SplitCounterStore {
	counts: Mutex<HashMap<String, u64>>,
	race_window: Duration,
	atomic: bool,
}

impl SplitCounterStore {
	fn new(race_window: Duration, atomic: bool) -> Self {
		Self {
			counts: Mutex::new(HashMap::new()),
			race_window,
			atomic,
		}
	}

	async fn stall(&self) {
		tokio::task::yield_now().await;
		tokio::time::sleep(self.race_window).await;
	}
}

#[async_trait]
impl WindowCounterStore for SplitCounterStore {
	async fn increment_and_inspect(
		&self,
		key: &str,
		window: Duration,
		now: DateTime<Utc>,
	) -> Result<WindowCount, StoreError> {
		let count = if self.atomic {
			let mut counts = self.counts.lock().await;
			let current = counts.get(key).copied().unwrap_or(0);
			self.stall().await;
			counts.insert(key.to_string(), current + 1);
			current + 1
		} else {
			let current = self.counts.lock().await.get(key).copied().unwrap_or(0);
			self.stall().await;
			self.counts.lock().await.insert(key.to_string(), current + 1);
			current + 1
		};
		Ok(WindowCount {
			count,
			reset_at: now + TimeDelta::from_std(window).unwrap(),
		})
	}

	async fn get_count(
		&self,
		_key: &str,
		_now: DateTime<Utc>,
	) -> Result<Option<WindowCount>, StoreError> {
		Ok(None)
	}

	async fn reset(&self, key: &str) -> Result<(), StoreError> {
		self.counts.lock().await.remove(key);
		Ok(())
	}
}

async fn run_concurrent_checks<S>(store: S, requests: usize, limit: u64) -> Vec<RateLimitOutcome>
where
	S: WindowCounterStore + 'static,
{
	let registry = Arc::new(
		EndpointPolicyRegistry::from_policies([EndpointPolicy::new(
			"chat",
			limit,
			limit,
			Duration::from_secs(3600),
		)])
		.unwrap(),
	);
	let admission = Arc::new(AdmissionPolicy::new(registry, Arc::new(store)));
	let now = admission.now();

	let handles: Vec<_> = (0..requests)
		.map(|_| {
			let admission = Arc::clone(&admission);
			tokio::spawn(async move { admission.check("chat", "same-user", false, now).await })
		})
		.collect();
	let mut outcomes = Vec::with_capacity(requests);
	for handle in handles {
		outcomes.push(handle.await.unwrap().unwrap());
	}
	outcomes
}

fn assert_exactly_limit_admitted(outcomes: &[RateLimitOutcome], requests: usize, limit: u64) {
	let admitted = outcomes.iter().filter(|o| o.admitted).count();
	assert_eq!(admitted as u64, limit, "admitted count");
	assert_eq!(outcomes.len() - admitted, requests - limit as usize);

	let mut counts: Vec<u64> = outcomes.iter().map(|o| o.count).collect();
	counts.sort_unstable();
	assert_eq!(counts, (1..=requests as u64).collect::<Vec<_>>());
}

#[rstest]
#[case::no_delay(Duration::ZERO, 50, 7)]
#[case::short_delay(Duration::from_millis(1), 64, 10)]
#[case::wide_delay(Duration::from_millis(5), 40, 30)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_locked_read_modify_write_admits_exactly_limit(
	#[case] race_window: Duration,
	#[case] requests: usize,
	#[case] limit: u64,
) {
	// Act
	let outcomes = run_concurrent_checks(
		SplitCounterStore::new(race_window, true),
		requests,
		limit,
	)
	.await;

	// Assert
	assert_exactly_limit_admitted(&outcomes, requests, limit);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[should_panic(expected = "admitted count")]
async fn test_unlocked_read_modify_write_over_admits() {
	// Act - every task reads before any of them writes
	let outcomes = run_concurrent_checks(
		SplitCounterStore::new(Duration::from_millis(20), false),
		40,
		10,
	)
	.await;

	// Assert
	assert_exactly_limit_admitted(&outcomes, 40, 10);
}

#[rstest]
#[case::small(50, 7)]
#[case::large(500, 120)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_backend_admits_exactly_limit(#[case] requests: usize, #[case] limit: u64) {
	// Act
	let outcomes = run_concurrent_checks(MemoryBackend::new(), requests, limit).await;

	// Assert
	assert_exactly_limit_admitted(&outcomes, requests, limit);
}
