use super::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Counter state observed by a single store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
	/// Requests counted in the current window, including the one just recorded.
	pub count: u64,
	/// When the window's count returns to zero.
	pub reset_at: DateTime<Utc>,
}

/// Shared, time-windowed counter store.
///
/// `increment_and_inspect` must be atomic with respect to concurrent callers
/// using the same key: two simultaneous increments both get counted and each
/// observes the count after its own increment.
#[async_trait]
pub trait WindowCounterStore: Send + Sync {
	/// Increments the counter for `key`, starting a new window of length
	/// `window` at `now` if none is active, and returns the post-increment state.
	async fn increment_and_inspect(
		&self,
		key: &str,
		window: Duration,
		now: DateTime<Utc>,
	) -> Result<WindowCount, StoreError>;

	/// Reads the counter without incrementing it. Returns `None` when no
	/// window is active for `key`.
	async fn get_count(&self, key: &str, now: DateTime<Utc>)
	-> Result<Option<WindowCount>, StoreError>;

	/// Drops the counter for `key`.
	async fn reset(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: WindowCounterStore + ?Sized> WindowCounterStore for Arc<S> {
	async fn increment_and_inspect(
		&self,
		key: &str,
		window: Duration,
		now: DateTime<Utc>,
	) -> Result<WindowCount, StoreError> {
		(**self).increment_and_inspect(key, window, now).await
	}

	async fn get_count(
		&self,
		key: &str,
		now: DateTime<Utc>,
	) -> Result<Option<WindowCount>, StoreError> {
		(**self).get_count(key, now).await
	}

	async fn reset(&self, key: &str) -> Result<(), StoreError> {
		(**self).reset(key).await
	}
}

/// End of a window of length `window` starting at `now`.
fn window_end(now: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>, StoreError> {
	TimeDelta::from_std(window)
		.ok()
		.and_then(|window| now.checked_add_signed(window))
		.ok_or_else(|| {
			StoreError::InvalidWindow(format!("window {:?} starting at {} overflows", window, now))
		})
}

/// Entry stored per counter key in the memory backend
#[derive(Debug, Clone)]
struct WindowEntry {
	count: u64,
	reset_at: DateTime<Utc>,
}

impl WindowEntry {
	fn is_expired(&self, now: DateTime<Utc>) -> bool {
		now >= self.reset_at
	}
}

/// Probabilistic eviction runs roughly once per this many increment operations.
const EVICTION_INTERVAL: u64 = 100;

/// In-process fixed-window counter store.
///
/// Suitable for a single process and for tests. Every increment runs under
/// one write lock, which provides the atomicity the trait requires.
#[derive(Clone, Default)]
pub struct MemoryBackend {
	storage: Arc<RwLock<HashMap<String, WindowEntry>>>,
	/// Counter for probabilistic eviction scheduling
	ops_counter: Arc<AtomicU64>,
}

impl MemoryBackend {
	/// Creates an empty `MemoryBackend`.
	///
	/// # Examples
	///
	/// ```
	/// use quota_gate_throttling::MemoryBackend;
	///
	/// let backend = MemoryBackend::new();
	/// ```
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of keys currently held, expired or not.
	pub async fn len(&self) -> usize {
		self.storage.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.storage.read().await.is_empty()
	}

	/// Evict expired entries from the storage map.
	///
	/// Called probabilistically on each increment to bound memory growth
	/// without adding per-request overhead.
	async fn maybe_evict_expired(&self, now: DateTime<Utc>) {
		let count = self.ops_counter.fetch_add(1, Ordering::Relaxed);
		if count % EVICTION_INTERVAL != 0 {
			return;
		}
		let mut storage = self.storage.write().await;
		let before = storage.len();
		storage.retain(|_, entry| !entry.is_expired(now));
		let evicted = before - storage.len();
		if evicted > 0 {
			tracing::trace!(evicted, "evicted expired rate limit windows");
		}
	}
}

#[async_trait]
impl WindowCounterStore for MemoryBackend {
	async fn increment_and_inspect(
		&self,
		key: &str,
		window: Duration,
		now: DateTime<Utc>,
	) -> Result<WindowCount, StoreError> {
		let reset_at = window_end(now, window)?;
		self.maybe_evict_expired(now).await;

		let mut storage = self.storage.write().await;
		let entry = storage
			.entry(key.to_string())
			.or_insert(WindowEntry { count: 0, reset_at });
		if entry.is_expired(now) {
			*entry = WindowEntry { count: 0, reset_at };
		}
		entry.count = entry.count.saturating_add(1);
		Ok(WindowCount {
			count: entry.count,
			reset_at: entry.reset_at,
		})
	}

	async fn get_count(
		&self,
		key: &str,
		now: DateTime<Utc>,
	) -> Result<Option<WindowCount>, StoreError> {
		let storage = self.storage.read().await;
		Ok(storage
			.get(key)
			.filter(|entry| !entry.is_expired(now))
			.map(|entry| WindowCount {
				count: entry.count,
				reset_at: entry.reset_at,
			}))
	}

	async fn reset(&self, key: &str) -> Result<(), StoreError> {
		self.storage.write().await.remove(key);
		Ok(())
	}
}

/// Redis-backed counter store for deployments with several processes.
#[cfg(feature = "redis-backend")]
pub struct RedisBackend {
	client: redis::Client,
}

/// Lua script for atomic INCR + PEXPIRE + PTTL.
///
/// A key without a TTL is treated as an expired window: its count restarts
/// at 1 and it gets a fresh expiry, so it can never become permanent.
#[cfg(feature = "redis-backend")]
const INCREMENT_SCRIPT: &str = r#"
	local count = redis.call('INCR', KEYS[1])
	local ttl = redis.call('PTTL', KEYS[1])
	if ttl < 0 then
		if count > 1 then
			redis.call('SET', KEYS[1], 1)
			count = 1
		end
		redis.call('PEXPIRE', KEYS[1], ARGV[1])
		ttl = tonumber(ARGV[1])
	end
	return {count, ttl}
"#;

#[cfg(feature = "redis-backend")]
impl RedisBackend {
	/// Creates a new `RedisBackend` for the specified Redis URL.
	///
	/// # Examples
	///
	/// ```no_run
	/// use quota_gate_throttling::RedisBackend;
	///
	/// let backend = RedisBackend::new("redis://127.0.0.1:6379").unwrap();
	/// ```
	pub fn new(url: &str) -> Result<Self, StoreError> {
		let client = redis::Client::open(url)?;
		Ok(Self { client })
	}

	async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
		Ok(self.client.get_multiplexed_async_connection().await?)
	}
}

/// Maps a PTTL reply to a reset timestamp.
///
/// PTTL answers -1 for a key without expiry and -2 for a missing key;
/// neither describes an active window.
#[cfg(feature = "redis-backend")]
fn reset_at_from_ttl(now: DateTime<Utc>, ttl_ms: i64) -> Option<DateTime<Utc>> {
	if ttl_ms < 0 {
		return None;
	}
	TimeDelta::try_milliseconds(ttl_ms).and_then(|ttl| now.checked_add_signed(ttl))
}

/// Maps a `GET` + `PTTL` reply pair to the active window, if any.
#[cfg(feature = "redis-backend")]
fn window_from_reply(count: Option<u64>, ttl_ms: i64, now: DateTime<Utc>) -> Option<WindowCount> {
	let count = count?;
	reset_at_from_ttl(now, ttl_ms).map(|reset_at| WindowCount { count, reset_at })
}

#[cfg(feature = "redis-backend")]
#[async_trait]
impl WindowCounterStore for RedisBackend {
	async fn increment_and_inspect(
		&self,
		key: &str,
		window: Duration,
		now: DateTime<Utc>,
	) -> Result<WindowCount, StoreError> {
		window_end(now, window)?;
		let mut conn = self.connection().await?;

		// PEXPIRE takes a signed integer; clamp instead of overflowing.
		let expire_ms = i64::try_from(window.as_millis())
			.unwrap_or(i64::MAX)
			.max(1);

		let (count, ttl_ms): (i64, i64) = redis::Script::new(INCREMENT_SCRIPT)
			.key(key)
			.arg(expire_ms)
			.invoke_async(&mut conn)
			.await?;
		let count = u64::try_from(count)
			.map_err(|_| StoreError::InvalidReply(format!("negative counter value {}", count)))?;

		let reset_at = reset_at_from_ttl(now, ttl_ms)
			.ok_or_else(|| StoreError::InvalidReply(format!("unexpected TTL {} ms", ttl_ms)))?;

		Ok(WindowCount { count, reset_at })
	}

	async fn get_count(
		&self,
		key: &str,
		now: DateTime<Utc>,
	) -> Result<Option<WindowCount>, StoreError> {
		let mut conn = self.connection().await?;
		let (count, ttl_ms): (Option<u64>, i64) = redis::pipe()
			.atomic()
			.get(key)
			.pttl(key)
			.query_async(&mut conn)
			.await?;
		Ok(window_from_reply(count, ttl_ms, now))
	}

	async fn reset(&self, key: &str) -> Result<(), StoreError> {
		use redis::AsyncCommands;
		let mut conn = self.connection().await?;
		let _: () = conn.del(key).await?;
		Ok(())
	}
}
