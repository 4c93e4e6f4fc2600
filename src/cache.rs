//! Session cache contracts and the adapter that stores discovery results under session ids.
//!
//! The host supplies a [`SessionCache`] (any key/value store with optional TTL). The
//! [`SessionCacheAdapter`] decides once, at construction, whether session caching is engaged:
//! the configuration must enable it and a cache must be present. The decision never changes for
//! the lifetime of the adapter.

pub mod memory;

pub use memory::MemoryCache;

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, discovery::DiscoveryResponse};

/// Boxed future returned by [`SessionCache`] implementations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Key/value storage contract injected by the host.
pub trait SessionCache
where
	Self: Send + Sync,
{
	/// Stores `value` under `key`, replacing any previous entry.
	///
	/// `ttl` is a hint; implementations without expiry support may ignore it.
	fn add<'a>(&'a self, key: &'a str, value: String, ttl: Option<Duration>)
	-> CacheFuture<'a, ()>;

	/// Fetches the value stored under `key`, or `None` when absent or expired.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;
}

/// Error type produced by [`SessionCache`] implementations and the adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// A cached value could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Source of opaque session identifiers.
pub trait SessionIdGenerator
where
	Self: Send + Sync,
{
	/// Returns a fresh identifier that must not collide with earlier ones.
	fn generate(&self) -> String;
}

/// Default generator: 128 random bits from the thread-local CSPRNG, as 32 lowercase hex chars.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSessionIds;
impl SessionIdGenerator for RandomSessionIds {
	fn generate(&self) -> String {
		format!("{:032x}", rand::rng().random::<u128>())
	}
}

/// Maps session identifiers to previously obtained discovery results.
#[derive(Clone)]
pub struct SessionCacheAdapter {
	cache: Option<Arc<dyn SessionCache>>,
	ids: Arc<dyn SessionIdGenerator>,
	ttl: Option<Duration>,
}
impl SessionCacheAdapter {
	/// Creates an adapter; caching is engaged only when `enabled` and `cache` is present.
	pub fn new(cache: Option<Arc<dyn SessionCache>>, enabled: bool, ttl: Option<Duration>) -> Self {
		Self { cache: cache.filter(|_| enabled), ids: Arc::new(RandomSessionIds), ttl }
	}

	/// An adapter that never caches.
	pub fn disabled() -> Self {
		Self::new(None, false, None)
	}

	/// Replaces the session id generator.
	pub fn with_id_generator(mut self, ids: Arc<dyn SessionIdGenerator>) -> Self {
		self.ids = ids;

		self
	}

	/// Returns `true` when session caching is engaged.
	pub fn is_enabled(&self) -> bool {
		self.cache.is_some()
	}

	/// Stores `discovery` under a fresh session id.
	///
	/// Returns `Ok(None)` without touching any store when caching is not engaged.
	pub async fn put(&self, discovery: &DiscoveryResponse) -> Result<Option<String>, CacheError> {
		let Some(cache) = &self.cache else {
			return Ok(None);
		};
		let value = serde_json::to_string(discovery)
			.map_err(|e| CacheError::Serialization { message: e.to_string() })?;
		let session_id = self.ids.generate();

		cache.add(&session_id, value, self.ttl).await?;

		Ok(Some(session_id))
	}

	/// Looks up the discovery result stored under `session_id`.
	///
	/// Returns `Ok(None)` when caching is not engaged, the id is empty, or no entry exists.
	pub async fn get(&self, session_id: &str) -> Result<Option<DiscoveryResponse>, CacheError> {
		let Some(cache) = &self.cache else {
			return Ok(None);
		};

		if session_id.is_empty() {
			return Ok(None);
		}

		let Some(raw) = cache.get(session_id).await? else {
			return Ok(None);
		};

		serde_json::from_str(&raw)
			.map(Some)
			.map_err(|e| CacheError::Serialization { message: e.to_string() })
	}
}
impl Debug for SessionCacheAdapter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionCacheAdapter")
			.field("enabled", &self.is_enabled())
			.field("ttl", &self.ttl)
			.finish()
	}
}
