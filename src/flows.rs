//! Flow orchestrator: discovery, authentication, token exchange, identity, and headless waits.
//!
//! Every operation on [`MobileConnect`] returns a [`MobileConnectStatus`]. Transport, provider,
//! and configuration failures are folded into [`MobileConnectStatus::Error`]; validation
//! failures are data on [`ValidatedTokens`] and never abort a flow.

pub mod authentication;
pub mod common;
pub mod headless;
pub mod identity;
pub mod status;

mod discover;
mod redirect;
mod token;

pub use authentication::*;
pub use headless::*;
pub use identity::*;
pub use status::*;

// self
use crate::{
	_prelude::*,
	cache::{SessionCache, SessionCacheAdapter, SessionIdGenerator},
	config::MobileConnectConfig,
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	validation::KeySetCache,
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Orchestrator specialized for the crate's default reqwest transport stack.
pub type ReqwestMobileConnect = MobileConnect<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Sequences Mobile Connect flows for one registered application.
///
/// The orchestrator owns the HTTP client, the session cache adapter, and the key set cache.
/// Whether session caching is engaged is decided once, at construction, from the
/// configuration flag and the presence of a cache.
#[derive(Clone)]
pub struct MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Application configuration.
	pub config: Arc<MobileConnectConfig>,
	sessions: SessionCacheAdapter,
	key_sets: Arc<KeySetCache>,
}
impl<C, M> MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an orchestrator that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: MobileConnectConfig,
		cache: Option<Arc<dyn SessionCache>>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let sessions = SessionCacheAdapter::new(
			cache,
			config.cache_responses_with_session_id,
			config.session_ttl(),
		);
		let key_sets = Arc::new(KeySetCache::new(config.key_set_ttl()));

		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			config: Arc::new(config),
			sessions,
			key_sets,
		}
	}

	/// Replaces the session id generator (deterministic ids are handy in tests).
	pub fn with_session_id_generator(mut self, ids: Arc<dyn SessionIdGenerator>) -> Self {
		self.sessions = self.sessions.with_id_generator(ids);

		self
	}

	/// Returns `true` when discovery results are cached under session ids.
	pub fn is_session_caching_enabled(&self) -> bool {
		self.sessions.is_enabled()
	}

	/// Key set cache shared by every token validation of this orchestrator.
	pub fn key_sets(&self) -> &KeySetCache {
		&self.key_sets
	}
}
#[cfg(feature = "reqwest")]
impl MobileConnect<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an orchestrator backed by a reqwest client that never follows redirects.
	///
	/// Fails when the client cannot be built; there is no fallback to a redirecting client.
	pub fn new(
		config: MobileConnectConfig,
		cache: Option<Arc<dyn SessionCache>>,
	) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::build()?;

		let mapper = Arc::new(ReqwestTransportErrorMapper);

		Ok(Self::with_http_client(config, cache, http_client, mapper))
	}
}
impl<C, M> Debug for MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MobileConnect")
			.field("client_id", &self.config.client_id)
			.field("discovery_url", &self.config.discovery_url.as_str())
			.field("sessions", &self.sessions)
			.finish()
	}
}
