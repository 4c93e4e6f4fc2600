//! Code exchange, refresh, and revocation, with token validation.

// self
use crate::{
	_prelude::*,
	auth::RequestTokenResponse,
	discovery::DiscoveryResponse,
	error::ConfigError,
	flows::{
		FlowCompletion, INVALID_REDIRECT, INVALID_STATE, MobileConnect, MobileConnectStatus,
		RedirectExpectation, ValidatedTokens, common,
	},
	http::{self, ProviderEndpoint, ProviderHttpClient, RequestAuth},
	oauth::{TokenFacade, TransportErrorMapper},
	obs::{self, FlowKind},
	validation::{self, DecodedToken, IdTokenClaims, IdTokenExpectations, KeySet, ValidationOutcome},
};

impl<C, M> MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges the authorization code carried by `redirect_url`.
	///
	/// The redirect `state` must equal `expected.state`. Both tokens are validated and the
	/// outcomes attached; a failed ID token validation still yields
	/// [`Complete`](MobileConnectStatus::Complete).
	pub async fn request_token(
		&self,
		discovery: impl Into<Arc<DiscoveryResponse>>,
		redirect_url: &Url,
		expected: &RedirectExpectation,
	) -> MobileConnectStatus {
		const KIND: FlowKind = FlowKind::Token;

		let discovery = discovery.into();

		common::observe(KIND, "request_token", async move {
			common::fold(self.exchange_redirect(discovery, None, redirect_url, expected).await)
		})
		.await
	}

	/// Same as [`Self::request_token`], with the discovery result loaded from the session cache.
	pub async fn request_token_with_session(
		&self,
		session_id: &str,
		redirect_url: &Url,
		expected: &RedirectExpectation,
	) -> MobileConnectStatus {
		const KIND: FlowKind = FlowKind::Token;

		common::observe(KIND, "request_token_with_session", async move {
			match self.resolve_session(session_id).await {
				Ok(discovery) => {
					let session_id = Some(session_id.to_owned());

					common::fold(
						self.exchange_redirect(discovery, session_id, redirect_url, expected).await,
					)
				},
				Err(status) => status,
			}
		})
		.await
	}

	/// Redeems a refresh token at the operator's refresh endpoint.
	///
	/// The refreshed tokens are validated like a code exchange, without a nonce check. Operators
	/// usually omit the ID token on refresh, which shows up as
	/// [`IdTokenMissing`](ValidationOutcome::IdTokenMissing).
	pub async fn refresh_token(
		&self,
		discovery: impl Into<Arc<DiscoveryResponse>>,
		refresh_token: &str,
	) -> MobileConnectStatus {
		const KIND: FlowKind = FlowKind::Token;

		let discovery = discovery.into();

		common::observe(KIND, "refresh_token", async move {
			common::fold(self.refresh_inner(discovery, refresh_token).await)
		})
		.await
	}

	/// Revokes an access or refresh token.
	///
	/// Success is a [`Complete`](MobileConnectStatus::Complete) status without tokens.
	pub async fn revoke_token(
		&self,
		discovery: impl Into<Arc<DiscoveryResponse>>,
		token: &str,
		token_type_hint: Option<&str>,
	) -> MobileConnectStatus {
		const KIND: FlowKind = FlowKind::Token;

		let discovery = discovery.into();

		common::observe(KIND, "revoke_token", async move {
			common::fold(self.revoke_inner(discovery, token, token_type_hint).await)
		})
		.await
	}

	pub(crate) async fn exchange_redirect(
		&self,
		discovery: Arc<DiscoveryResponse>,
		session_id: Option<String>,
		redirect_url: &Url,
		expected: &RedirectExpectation,
	) -> Result<MobileConnectStatus> {
		if let Some(error) = common::query_param(redirect_url, "error") {
			return Err(Error::Provider {
				error,
				description: common::query_param(redirect_url, "error_description"),
			});
		}
		let state = common::query_param(redirect_url, "state");

		if expected.state.trim().is_empty() || state.as_deref() != Some(expected.state.as_str()) {
			return Ok(MobileConnectStatus::error(
				INVALID_STATE,
				"redirect state does not match the authorization request",
			));
		}

		let Some(code) = common::query_param(redirect_url, "code") else {
			return Ok(MobileConnectStatus::error(
				INVALID_REDIRECT,
				"redirect URL carries no authorization code",
			));
		};
		let token_url = discovery
			.operator_urls
			.as_ref()
			.and_then(|urls| urls.request_token_url.as_ref())
			.ok_or(ConfigError::MissingEndpoint { endpoint: ProviderEndpoint::Token })?;
		let (client_id, client_secret) = self.client_credentials(&discovery);
		let facade = TokenFacade::new(
			token_url,
			client_id,
			client_secret,
			Some(&self.config.redirect_url),
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
		);
		let response = facade.exchange_code(&code).await?;
		let nonce = expected.nonce.clone();
		let tokens = self.validate_tokens(&discovery, response, nonce, expected.max_age).await;

		Ok(MobileConnectStatus::Complete(Box::new(FlowCompletion {
			discovery: Some(discovery),
			session_id,
			tokens: Some(tokens),
			identity: None,
		})))
	}

	async fn refresh_inner(
		&self,
		discovery: Arc<DiscoveryResponse>,
		refresh_token: &str,
	) -> Result<MobileConnectStatus> {
		let urls = discovery.urls();
		let refresh_url = urls
			.refresh_token_url
			.as_ref()
			.or(urls.request_token_url.as_ref())
			.ok_or(ConfigError::MissingEndpoint { endpoint: ProviderEndpoint::Refresh })?;
		let (client_id, client_secret) = self.client_credentials(&discovery);
		let facade = TokenFacade::new(
			refresh_url,
			client_id,
			client_secret,
			None,
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
		);
		let response = facade.refresh(refresh_token, None).await?;
		let tokens = self.validate_tokens(&discovery, response, None, None).await;

		Ok(MobileConnectStatus::Complete(Box::new(FlowCompletion {
			discovery: Some(discovery),
			tokens: Some(tokens),
			..Default::default()
		})))
	}

	async fn revoke_inner(
		&self,
		discovery: Arc<DiscoveryResponse>,
		token: &str,
		token_type_hint: Option<&str>,
	) -> Result<MobileConnectStatus> {
		let revoke_url = discovery
			.operator_urls
			.as_ref()
			.and_then(|urls| urls.revoke_token_url.as_ref())
			.ok_or(ConfigError::MissingEndpoint { endpoint: ProviderEndpoint::Revoke })?;
		let (client_id, client_secret) = self.client_credentials(&discovery);
		let mut form = vec![("token", token)];

		if let Some(hint) = token_type_hint.filter(|hint| !hint.is_empty()) {
			form.push(("token_type_hint", hint));
		}

		let request =
			http::form_request(revoke_url, RequestAuth::Basic { client_id, client_secret }, &form)?;
		let response = http::send(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			ProviderEndpoint::Revoke,
			request,
		)
		.await?;

		// Revocation answers 200 with an empty body; only failures carry a payload.
		if !response.status().is_success() {
			http::read_json(ProviderEndpoint::Revoke, &response)?;
		}

		Ok(MobileConnectStatus::Complete(Box::new(FlowCompletion {
			discovery: Some(discovery),
			..Default::default()
		})))
	}

	async fn validate_tokens(
		&self,
		discovery: &DiscoveryResponse,
		response: RequestTokenResponse,
		nonce: Option<String>,
		max_age: Option<Duration>,
	) -> ValidatedTokens {
		let access_token_validation = validation::validate_access_token(&response);
		let Some(id_token) = response.id_token.as_ref().map(|token| token.expose().to_owned())
		else {
			return ValidatedTokens {
				response,
				id_token_validation: ValidationOutcome::IdTokenMissing,
				access_token_validation,
				id_token_claims: None,
			};
		};
		let (client_id, _) = self.client_credentials(discovery);
		let expectations = IdTokenExpectations {
			client_id: client_id.to_owned(),
			issuer: discovery.expected_issuer().unwrap_or_default(),
			nonce,
			max_age,
			version: discovery.provider_version,
		};
		let key_set = self.key_set_for(discovery).await;
		let id_token_validation =
			validation::validate_identity_token(&id_token, &expectations, key_set.as_deref());
		let claims = DecodedToken::parse(&id_token).claims;

		ValidatedTokens {
			response,
			id_token_validation,
			access_token_validation,
			id_token_claims: Some(claims).filter(|claims| *claims != IdTokenClaims::default()),
		}
	}

	/// Loads the operator's key set through the shared cache; failures degrade to `None`.
	async fn key_set_for(&self, discovery: &DiscoveryResponse) -> Option<Arc<KeySet>> {
		let jwks_url = discovery.operator_urls.as_ref().and_then(|urls| urls.jwks_url.as_ref());
		let Some(jwks_url) = jwks_url else {
			obs::degraded("key_set_unavailable", &"discovery result has no jwks endpoint");

			return None;
		};
		let fetched = self
			.key_sets
			.get_or_fetch(jwks_url, || {
				validation::fetch_key_set(
					self.http_client.as_ref(),
					self.transport_mapper.as_ref(),
					jwks_url,
				)
			})
			.await;

		match fetched {
			Ok(key_set) => Some(key_set),
			Err(e) => {
				obs::degraded("key_set_unavailable", &e);

				None
			},
		}
	}
}
