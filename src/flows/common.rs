//! Shared helpers for flow implementations (random values, session lookup, status folding).

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	discovery::DiscoveryResponse,
	flows::{CACHE_DISABLED, MobileConnect, MobileConnectStatus, SESSION_NOT_FOUND},
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Length of generated `state` and `nonce` values.
pub const RANDOM_VALUE_LEN: usize = 32;

/// Generates an opaque alphanumeric value for `state` or `nonce`.
pub fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

/// Returns the first non-empty value of query parameter `name`.
pub fn query_param(url: &Url, name: &str) -> Option<String> {
	url.query_pairs()
		.filter(|(key, _)| key == name)
		.map(|(_, value)| value.into_owned())
		.find(|value| !value.is_empty())
}

/// Runs `flow` inside a flow span and records attempt + outcome metrics.
pub(crate) async fn observe<F>(kind: FlowKind, stage: &'static str, flow: F) -> MobileConnectStatus
where
	F: Future<Output = MobileConnectStatus>,
{
	let span = FlowSpan::new(kind, stage);

	obs::record_flow_outcome(kind, FlowOutcome::Attempt);

	let status = span.instrument(flow).await;

	if status.is_error() {
		obs::record_flow_outcome(kind, FlowOutcome::Failure);
	} else {
		obs::record_flow_outcome(kind, FlowOutcome::Success);
	}

	status
}

/// Folds a fallible step into a status.
pub(crate) fn fold(result: Result<MobileConnectStatus>) -> MobileConnectStatus {
	result.unwrap_or_else(MobileConnectStatus::from)
}

impl<C, M> MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Loads the discovery result cached under `session_id`.
	///
	/// Cache backend failures are logged and reported like a missing session.
	pub(crate) async fn resolve_session(
		&self,
		session_id: &str,
	) -> Result<Arc<DiscoveryResponse>, MobileConnectStatus> {
		if !self.sessions.is_enabled() {
			return Err(MobileConnectStatus::error(
				CACHE_DISABLED,
				"session caching is not enabled for this instance",
			));
		}

		let found = match self.sessions.get(session_id).await {
			Ok(found) => found,
			Err(e) => {
				obs::degraded("session_lookup_failed", &e);

				None
			},
		};

		found.map(Arc::new).ok_or_else(|| {
			MobileConnectStatus::error(SESSION_NOT_FOUND, "no discovery result for this session id")
		})
	}

	/// Client credentials for operator calls: operator-issued when present, else configured.
	pub(crate) fn client_credentials<'a>(
		&'a self,
		discovery: &'a DiscoveryResponse,
	) -> (&'a str, &'a str) {
		match discovery.client_id.as_deref() {
			Some(client_id) => (
				client_id,
				discovery.client_secret.as_ref().map(|secret| secret.expose()).unwrap_or_default(),
			),
			None => (self.config.client_id.as_str(), self.config.client_secret.expose()),
		}
	}
}
