//! Headless authentication: the orchestrator drives the authorization redirect chain itself
//! and waits for the user to approve out of band (for example on the handset).

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	discovery::DiscoveryResponse,
	flows::{AuthenticationOptions, HEADLESS_TIMEOUT, MobileConnect, MobileConnectStatus},
	http::{self, ProviderEndpoint, ProviderHttpClient, RequestAuth},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const MAX_REDIRECT_HOPS: usize = 10;

/// Result of [`MobileConnect::request_headless_authentication`].
#[derive(Clone, Debug, PartialEq)]
pub enum HeadlessOutcome {
	/// The wait finished; the status is the token exchange result or an error.
	Completed(MobileConnectStatus),
	/// The caller cancelled the wait. No cache state was touched.
	Cancelled,
}

impl<C, M> MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Runs authentication without a browser.
	///
	/// The authorization URL is requested without following redirects. Redirects are followed
	/// by hand until one points at the configured redirect URL; while the operator answers
	/// without a redirect the request is repeated every poll interval. The code in the final
	/// redirect is exchanged like [`Self::request_token`]. Past the configured timeout the
	/// outcome is a `headless_timeout` error.
	pub async fn request_headless_authentication(
		&self,
		discovery: impl Into<Arc<DiscoveryResponse>>,
		options: &AuthenticationOptions,
		cancel: &CancellationToken,
	) -> HeadlessOutcome {
		const KIND: FlowKind = FlowKind::Headless;

		let span = FlowSpan::new(KIND, "request_headless_authentication");
		let discovery = discovery.into();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span
			.instrument(async move {
				let request = match self.authorization_request(&discovery, options) {
					Ok(request) => request,
					Err(e) =>
						return HeadlessOutcome::Completed(MobileConnectStatus::from_error(&e)),
				};
				let timeout = self.config.headless_timeout();
				let waiting =
					tokio::time::timeout(timeout, self.await_redirect(request.url.clone()));
				let polled = tokio::select! {
					biased;
					_ = cancel.cancelled() => return HeadlessOutcome::Cancelled,
					polled = waiting => polled,
				};
				let status = match polled {
					Ok(Ok(redirect_url)) => self
						.exchange_redirect(discovery, None, &redirect_url, &request.expectation())
						.await
						.unwrap_or_else(MobileConnectStatus::from),
					Ok(Err(e)) => MobileConnectStatus::from_error(&e),
					Err(_) => MobileConnectStatus::error(
						HEADLESS_TIMEOUT,
						format!(
							"no authorization redirect within {} seconds",
							timeout.as_secs()
						),
					),
				};

				HeadlessOutcome::Completed(status)
			})
			.await;

		match &outcome {
			HeadlessOutcome::Completed(status) if !status.is_error() =>
				obs::record_flow_outcome(KIND, FlowOutcome::Success),
			_ => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		outcome
	}

	/// Follows redirects from `start` until one targets the configured redirect URL.
	async fn await_redirect(&self, start: Url) -> Result<Url> {
		let interval = self.config.headless_poll_interval();
		let mut pending = start;

		loop {
			let mut target = pending.clone();
			let mut hops = 0;

			loop {
				let request = http::get_request(&target, RequestAuth::None)?;
				let response = http::send(
					self.http_client.as_ref(),
					self.transport_mapper.as_ref(),
					ProviderEndpoint::Authorization,
					request,
				)
				.await?;
				let Some(next) = http::redirect_location(&response, &target) else {
					let status = response.status();

					if status.is_client_error() || status.is_server_error() {
						http::read_json(ProviderEndpoint::Authorization, &response)?;
					}

					break;
				};

				if is_redirect_target(&next, &self.config.redirect_url) {
					return Ok(next);
				}

				hops += 1;

				if hops > MAX_REDIRECT_HOPS {
					return Err(Error::InvalidResponse {
						endpoint: ProviderEndpoint::Authorization,
						reason: format!("more than {MAX_REDIRECT_HOPS} consecutive redirects"),
					});
				}

				target = next;
			}

			pending = target;

			tokio::time::sleep(interval).await;
		}
	}
}

/// Same scheme, host, port, and path; the query is ignored.
fn is_redirect_target(candidate: &Url, redirect_url: &Url) -> bool {
	candidate.scheme() == redirect_url.scheme()
		&& candidate.host_str() == redirect_url.host_str()
		&& candidate.port_or_known_default() == redirect_url.port_or_known_default()
		&& candidate.path() == redirect_url.path()
}
