//! Authorization request construction.
//!
//! [`MobileConnect::start_authentication`] turns a discovery result into the operator's
//! authorization URL. The generated `state` and `nonce` must be kept by the caller (for example
//! in a signed cookie, via [`AuthorizationRequest::expectation`]) and handed back when the
//! redirect arrives.

// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	discovery::DiscoveryResponse,
	error::ConfigError,
	flows::{MobileConnect, MobileConnectStatus, common},
	http::{ProviderEndpoint, ProviderHttpClient},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Default authentication context class (LoA2).
pub const DEFAULT_ACR_VALUES: &str = "2";
/// Login hint prefix used with an encrypted subscriber id.
pub const ENCRYPTED_MSISDN_HINT_PREFIX: &str = "ENCR_MSISDN:";

/// Caller-supplied authorization parameters; everything is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthenticationOptions {
	/// Space-delimited scopes; `openid` is always added.
	pub scope: Option<String>,
	/// Opaque `state`; generated when absent.
	pub state: Option<String>,
	/// Opaque `nonce`; generated when absent.
	pub nonce: Option<String>,
	/// Authentication context class; defaults to [`DEFAULT_ACR_VALUES`].
	pub acr_values: Option<String>,
	/// Maximum authentication age.
	pub max_age: Option<Duration>,
	/// `prompt` parameter.
	pub prompt: Option<String>,
	/// `display` parameter.
	pub display: Option<String>,
	/// `ui_locales` parameter.
	pub ui_locales: Option<String>,
	/// `claims_locales` parameter.
	pub claims_locales: Option<String>,
	/// `login_hint`; defaults to the encrypted subscriber id when known.
	pub login_hint: Option<String>,
	/// `id_token_hint` parameter.
	pub id_token_hint: Option<String>,
	/// Transaction context shown to the user.
	pub context: Option<String>,
	/// Binding message shown to the user.
	pub binding_message: Option<String>,
	/// Application name shown to the user; defaults to the operator-registered name.
	pub client_name: Option<String>,
}
impl AuthenticationOptions {
	/// Sets the requested scopes.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Sets the `state` and `nonce` values instead of generating them.
	pub fn with_state_and_nonce(
		mut self,
		state: impl Into<String>,
		nonce: impl Into<String>,
	) -> Self {
		self.state = Some(state.into());
		self.nonce = Some(nonce.into());

		self
	}

	/// Sets the maximum authentication age.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = Some(max_age);

		self
	}

	/// Sets the transaction context and binding message.
	pub fn with_context(
		mut self,
		context: impl Into<String>,
		binding_message: impl Into<String>,
	) -> Self {
		self.context = Some(context.into());
		self.binding_message = Some(binding_message.into());

		self
	}
}

/// A built authorization request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
	/// Operator authorization URL to send the user to.
	pub url: Url,
	/// `state` carried by the URL.
	pub state: String,
	/// `nonce` carried by the URL.
	pub nonce: String,
	/// Requested maximum authentication age.
	pub max_age: Option<Duration>,
}
impl AuthorizationRequest {
	/// Values the redirect and the ID token are checked against.
	pub fn expectation(&self) -> RedirectExpectation {
		RedirectExpectation {
			state: self.state.clone(),
			nonce: Some(self.nonce.clone()),
			max_age: self.max_age,
		}
	}
}

/// What the caller expects when the authorization redirect comes back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectExpectation {
	/// Expected `state` query parameter.
	pub state: String,
	/// Expected `nonce` claim.
	pub nonce: Option<String>,
	/// Maximum authentication age to enforce on `auth_time`.
	pub max_age: Option<Duration>,
}
impl RedirectExpectation {
	/// Expects `state` and `nonce`, with no max-age check.
	pub fn new(state: impl Into<String>, nonce: impl Into<String>) -> Self {
		Self { state: state.into(), nonce: Some(nonce.into()), max_age: None }
	}
}

impl<C, M> MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the authorization request for a discovery result.
	///
	/// The status is [`StartAuthentication`](MobileConnectStatus::StartAuthentication) with
	/// `authorization` populated, or an error when the operator exposes no authorization URL.
	pub fn start_authentication(
		&self,
		discovery: impl Into<Arc<DiscoveryResponse>>,
		options: &AuthenticationOptions,
	) -> MobileConnectStatus {
		const KIND: FlowKind = FlowKind::Authentication;

		let _span = FlowSpan::new(KIND, "start_authentication").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let status = self.start_authentication_inner(discovery.into(), None, options);

		if status.is_error() {
			obs::record_flow_outcome(KIND, FlowOutcome::Failure);
		} else {
			obs::record_flow_outcome(KIND, FlowOutcome::Success);
		}

		status
	}

	/// Builds the authorization request for the discovery result cached under `session_id`.
	///
	/// The session is not re-cached; the returned status carries the same session id.
	pub async fn start_authentication_with_session(
		&self,
		session_id: &str,
		options: &AuthenticationOptions,
	) -> MobileConnectStatus {
		const KIND: FlowKind = FlowKind::Authentication;

		common::observe(KIND, "start_authentication_with_session", async move {
			match self.resolve_session(session_id).await {
				Ok(discovery) => {
					let session_id = Some(session_id.to_owned());

					self.start_authentication_inner(discovery, session_id, options)
				},
				Err(status) => status,
			}
		})
		.await
	}

	fn start_authentication_inner(
		&self,
		discovery: Arc<DiscoveryResponse>,
		session_id: Option<String>,
		options: &AuthenticationOptions,
	) -> MobileConnectStatus {
		match self.authorization_request(&discovery, options) {
			Ok(request) => MobileConnectStatus::StartAuthentication {
				discovery,
				session_id,
				authorization: Some(request),
			},
			Err(e) => MobileConnectStatus::from_error(&e),
		}
	}

	/// Builds the authorization URL with generated `state`/`nonce` where none were supplied.
	pub(crate) fn authorization_request(
		&self,
		discovery: &DiscoveryResponse,
		options: &AuthenticationOptions,
	) -> Result<AuthorizationRequest> {
		let authorization_url = discovery
			.operator_urls
			.as_ref()
			.and_then(|urls| urls.authorization_url.as_ref())
			.ok_or(ConfigError::MissingEndpoint { endpoint: ProviderEndpoint::Authorization })?;
		let (client_id, _) = self.client_credentials(discovery);
		let state = non_blank(options.state.as_deref())
			.unwrap_or_else(|| common::random_string(common::RANDOM_VALUE_LEN));
		let nonce = non_blank(options.nonce.as_deref())
			.unwrap_or_else(|| common::random_string(common::RANDOM_VALUE_LEN));
		let scope = ScopeSet::parse(options.scope.as_deref().unwrap_or_default()).with_openid();
		let acr_values =
			non_blank(options.acr_values.as_deref()).unwrap_or_else(|| DEFAULT_ACR_VALUES.into());
		let login_hint = non_blank(options.login_hint.as_deref()).or_else(|| {
			discovery
				.subscriber_id
				.as_deref()
				.map(|subscriber_id| format!("{ENCRYPTED_MSISDN_HINT_PREFIX}{subscriber_id}"))
		});
		let client_name = non_blank(options.client_name.as_deref())
			.or_else(|| discovery.client_name.clone());
		let mut url = authorization_url.clone();
		let mut pairs = url.query_pairs_mut();

		pairs
			.append_pair("response_type", "code")
			.append_pair("client_id", client_id)
			.append_pair("redirect_uri", self.config.redirect_url.as_str())
			.append_pair("scope", &scope.normalized())
			.append_pair("state", &state)
			.append_pair("nonce", &nonce)
			.append_pair("acr_values", &acr_values);

		if let Some(max_age) = options.max_age {
			pairs.append_pair("max_age", &max_age.whole_seconds().max(0).to_string());
		}

		let optional = [
			("prompt", options.prompt.clone()),
			("display", options.display.clone()),
			("ui_locales", options.ui_locales.clone()),
			("claims_locales", options.claims_locales.clone()),
			("login_hint", login_hint),
			("id_token_hint", options.id_token_hint.clone()),
			("context", options.context.clone()),
			("binding_message", options.binding_message.clone()),
			("client_name", client_name),
		];

		for (key, value) in optional {
			if let Some(value) = non_blank(value.as_deref()) {
				pairs.append_pair(key, &value);
			}
		}

		drop(pairs);

		Ok(AuthorizationRequest { url, state, nonce, max_age: options.max_age })
	}
}

fn non_blank(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
}
