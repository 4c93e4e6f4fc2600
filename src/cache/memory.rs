//! Thread-safe in-memory [`SessionCache`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	cache::{CacheError, CacheFuture, SessionCache},
};

#[derive(Clone, Debug)]
struct CacheEntry {
	value: String,
	expires_at: Option<OffsetDateTime>,
}
impl CacheEntry {
	fn is_live_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|expires_at| expires_at > now)
	}
}

type CacheMap = Arc<RwLock<HashMap<String, CacheEntry>>>;

/// In-process cache honoring per-entry TTLs; expired entries are dropped on read.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(CacheMap);
impl MemoryCache {
	/// Number of stored entries, including expired ones not yet read.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn add_now(map: CacheMap, key: String, value: String, ttl: Option<Duration>) {
		let expires_at = ttl.map(|ttl| OffsetDateTime::now_utc() + ttl);

		map.write().insert(key, CacheEntry { value, expires_at });
	}

	fn get_now(map: CacheMap, key: &str, now: OffsetDateTime) -> Option<String> {
		{
			let guard = map.read();

			match guard.get(key) {
				Some(entry) if entry.is_live_at(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		if guard.get(key).is_some_and(|entry| !entry.is_live_at(now)) {
			guard.remove(key);
		}

		None
	}
}
impl SessionCache for MemoryCache {
	fn add<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Option<Duration>,
	) -> CacheFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			Self::add_now(map, key, value, ttl);

			Ok::<_, CacheError>(())
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(map, key, OffsetDateTime::now_utc())) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn entries_round_trip_until_expiry() {
		let cache = MemoryCache::default();

		cache.add("a", "one".into(), None).await.expect("Add should succeed.");
		cache
			.add("b", "two".into(), Some(Duration::minutes(5)))
			.await
			.expect("Add should succeed.");

		assert_eq!(cache.get("a").await.expect("Get should succeed."), Some("one".into()));
		assert_eq!(cache.get("b").await.expect("Get should succeed."), Some("two".into()));
		assert_eq!(cache.get("missing").await.expect("Get should succeed."), None);
	}

	#[test]
	fn expired_entries_are_evicted_on_read() {
		let cache = MemoryCache::default();

		MemoryCache::add_now(cache.0.clone(), "k".into(), "v".into(), Some(Duration::seconds(1)));

		let later = OffsetDateTime::now_utc() + Duration::seconds(2);

		assert_eq!(MemoryCache::get_now(cache.0.clone(), "k", later), None);
		assert!(cache.is_empty());
	}

	#[tokio::test]
	async fn later_writes_replace_earlier_ones() {
		let cache = MemoryCache::default();

		cache.add("k", "first".into(), None).await.expect("Add should succeed.");
		cache.add("k", "second".into(), None).await.expect("Add should succeed.");

		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get("k").await.expect("Get should succeed."), Some("second".into()));
	}
}
