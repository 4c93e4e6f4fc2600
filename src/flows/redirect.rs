//! Redirect classification.

// self
use crate::{
	_prelude::*,
	discovery::DiscoveryResponse,
	flows::{INVALID_REDIRECT, MobileConnect, MobileConnectStatus, RedirectExpectation, common},
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
};

/// What a redirect back to the application carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RedirectKind {
	/// `mcc_mnc` from the operator-selection page.
	OperatorSelection,
	/// `code` or `error` from the authorization endpoint.
	Authorization,
	/// Neither.
	Invalid,
}
impl RedirectKind {
	pub(crate) fn classify(url: &Url) -> Self {
		if common::query_param(url, "mcc_mnc").is_some() {
			Self::OperatorSelection
		} else if common::query_param(url, "code").is_some()
			|| common::query_param(url, "error").is_some()
		{
			Self::Authorization
		} else {
			Self::Invalid
		}
	}
}

impl<C, M> MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Single entry point for every redirect back to the application.
	///
	/// An operator selection (`mcc_mnc`) repeats discovery. An authorization result (`code` or
	/// `error`) is exchanged against `discovery`, which is required for that case. Anything else
	/// is an `invalid_redirect` error.
	pub async fn handle_url_redirect(
		&self,
		redirect_url: &Url,
		discovery: Option<Arc<DiscoveryResponse>>,
		expected: &RedirectExpectation,
	) -> MobileConnectStatus {
		match RedirectKind::classify(redirect_url) {
			RedirectKind::OperatorSelection =>
				self.attempt_discovery_after_operator_selection(redirect_url).await,
			RedirectKind::Authorization => match discovery {
				Some(discovery) => self.request_token(discovery, redirect_url, expected).await,
				None => MobileConnectStatus::error(
					INVALID_REDIRECT,
					"an authorization redirect needs the discovery result it was started with",
				),
			},
			RedirectKind::Invalid => invalid_redirect(),
		}
	}

	/// Same as [`Self::handle_url_redirect`], with the discovery result loaded from the session
	/// cache when the redirect carries an authorization result.
	pub async fn handle_url_redirect_with_session(
		&self,
		redirect_url: &Url,
		session_id: &str,
		expected: &RedirectExpectation,
	) -> MobileConnectStatus {
		match RedirectKind::classify(redirect_url) {
			RedirectKind::OperatorSelection =>
				self.attempt_discovery_after_operator_selection(redirect_url).await,
			RedirectKind::Authorization =>
				self.request_token_with_session(session_id, redirect_url, expected).await,
			RedirectKind::Invalid => invalid_redirect(),
		}
	}
}

fn invalid_redirect() -> MobileConnectStatus {
	MobileConnectStatus::error(
		INVALID_REDIRECT,
		"redirect URL carries neither an operator selection nor an authorization result",
	)
}
