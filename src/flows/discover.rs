//! Operator discovery and operator-selection follow-up.

// self
use crate::{
	_prelude::*,
	discovery::{
		DiscoveryCredentials, DiscoveryOptions, DiscoveryOutcome, DiscoveryResponse,
		DiscoveryService, OperatorSelection,
	},
	flows::{INVALID_REDIRECT, MobileConnect, MobileConnectStatus, common},
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind},
};

impl<C, M> MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Calls the discovery service.
	///
	/// Without an MSISDN or a valid country + network pair the service answers with an
	/// operator-selection page and the status is
	/// [`OperatorSelectionRequired`](MobileConnectStatus::OperatorSelectionRequired). A resolved
	/// operator yields [`StartAuthentication`](MobileConnectStatus::StartAuthentication), with a
	/// fresh session id when session caching is engaged.
	pub async fn attempt_discovery(&self, options: &DiscoveryOptions) -> MobileConnectStatus {
		const KIND: FlowKind = FlowKind::Discovery;

		common::observe(KIND, "attempt_discovery", async move {
			common::fold(self.discover_and_store(options, None).await)
		})
		.await
	}

	/// Repeats discovery with the operator chosen on the operator-selection page.
	///
	/// `redirect_url` must carry `mcc_mnc=MCC_MNC`; a `subscriber_id` parameter fills the
	/// result's subscriber id when the service omitted it.
	pub async fn attempt_discovery_after_operator_selection(
		&self,
		redirect_url: &Url,
	) -> MobileConnectStatus {
		const KIND: FlowKind = FlowKind::Discovery;

		common::observe(KIND, "attempt_discovery_after_operator_selection", async move {
			let Some(selection) = OperatorSelection::from_redirect(redirect_url) else {
				return MobileConnectStatus::error(
					INVALID_REDIRECT,
					"redirect URL carries no valid mcc_mnc parameter",
				);
			};
			let options = DiscoveryOptions::with_network(&selection.mcc, &selection.mnc);

			common::fold(self.discover_and_store(&options, selection.subscriber_id).await)
		})
		.await
	}

	async fn discover_and_store(
		&self,
		options: &DiscoveryOptions,
		subscriber_id: Option<String>,
	) -> Result<MobileConnectStatus> {
		let service =
			DiscoveryService::new(self.http_client.as_ref(), self.transport_mapper.as_ref());
		let credentials = DiscoveryCredentials {
			discovery_url: &self.config.discovery_url,
			client_id: &self.config.client_id,
			client_secret: self.config.client_secret.expose(),
			redirect_url: &self.config.redirect_url,
		};
		let mut discovery = match service.discover(credentials, options).await? {
			DiscoveryOutcome::OperatorSelection(url) =>
				return Ok(MobileConnectStatus::OperatorSelectionRequired { url }),
			DiscoveryOutcome::Resolved(discovery) => discovery,
		};

		if discovery.subscriber_id.is_none() {
			discovery.subscriber_id = subscriber_id;
		}

		self.load_provider_metadata(&service, &mut discovery).await;

		let session_id = match self.sessions.put(&discovery).await {
			Ok(session_id) => session_id,
			Err(e) => {
				obs::degraded("session_store_failed", &e);

				None
			},
		};

		Ok(MobileConnectStatus::StartAuthentication {
			discovery: Arc::new(discovery),
			session_id,
			authorization: None,
		})
	}

	async fn load_provider_metadata(
		&self,
		service: &DiscoveryService<'_, C, M>,
		discovery: &mut DiscoveryResponse,
	) {
		let Some(url) =
			discovery.operator_urls.as_ref().and_then(|urls| urls.provider_metadata_url.clone())
		else {
			return;
		};

		match service.fetch_provider_metadata(&url).await {
			Ok(metadata) => discovery.apply_provider_metadata(metadata),
			Err(e) => obs::degraded("provider_metadata_unavailable", &e),
		}
	}
}
