//! OAuth client facade for the token endpoint (code exchange and refresh).

pub use oauth2;

// crates.io
use oauth2::{
	AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet, ExtraTokenFields,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, StandardRevocableToken,
	StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::RequestTokenResponse,
	error::{ConfigError, TransientError, TransportError},
	http::{ProviderEndpoint, ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

/// Extra token endpoint fields returned by OpenID Connect providers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Signed identity token, when the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

type OAuthTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type OAuthTokenClient = oauth2::Client<
	BasicErrorResponse,
	OAuthTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type OAuthRequestError<E> = RequestTokenError<HttpClientError<E>, BasicErrorResponse>;

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		endpoint: ProviderEndpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: ProviderEndpoint,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(endpoint, meta, message),
			_ => map_generic_transport_error(endpoint, meta, "unknown transport failure"),
		}
	}
}

/// Token endpoint client bound to one discovery result.
pub(crate) struct TokenFacade<'a, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: OAuthTokenClient,
	http_client: &'a C,
	error_mapper: &'a M,
}
impl<'a, C, M> TokenFacade<'a, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		token_url: &Url,
		client_id: &str,
		client_secret: &str,
		redirect_uri: Option<&Url>,
		http_client: &'a C,
		error_mapper: &'a M,
	) -> Self {
		let mut oauth_client = oauth2::Client::new(ClientId::new(client_id.to_owned()))
			.set_token_uri(TokenUrl::from_url(token_url.clone()));

		if !client_secret.is_empty() {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(client_secret.to_owned()));
		}
		if let Some(redirect) = redirect_uri {
			oauth_client = oauth_client.set_redirect_uri(RedirectUrl::from_url(redirect.clone()));
		}

		Self { oauth_client, http_client, error_mapper }
	}

	/// Exchanges an authorization code at the token endpoint.
	pub(crate) async fn exchange_code(&self, code: &str) -> Result<RequestTokenResponse> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|err| {
				map_request_error(ProviderEndpoint::Token, meta.take(), err, self.error_mapper)
			})?;

		map_token_response(response)
	}

	/// Redeems a refresh token, optionally narrowing the scope.
	pub(crate) async fn refresh(
		&self,
		refresh_token: &str,
		scope: Option<&str>,
	) -> Result<RequestTokenResponse> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

		if let Some(scope) = scope.filter(|value| !value.is_empty()) {
			request = request.add_extra_param("scope", scope);
		}

		let response = request.request_async(&instrumented).await.map_err(|err| {
			map_request_error(ProviderEndpoint::Refresh, meta.take(), err, self.error_mapper)
		})?;

		map_token_response(response)
	}
}

fn map_token_response(response: OAuthTokenResponse) -> Result<RequestTokenResponse> {
	let issued_at = OffsetDateTime::now_utc();
	let expires_at = match response.expires_in() {
		Some(expires_in) => {
			let secs = i64::try_from(expires_in.as_secs())
				.map_err(|_| ConfigError::ExpiresInOutOfRange)?;

			Some(issued_at + Duration::seconds(secs))
		},
		None => None,
	};
	let scope = response.scopes().map(|scopes| {
		scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ")
	});

	Ok(RequestTokenResponse::new(response.access_token().secret().to_owned(), issued_at)
		.with_id_token(response.extra_fields().id_token.clone())
		.with_refresh_token(response.refresh_token().map(|token| token.secret().to_owned()))
		.with_token_type(response.token_type().as_ref())
		.with_scope(scope)
		.with_expires_at(expires_at))
}

fn map_request_error<E, M>(
	endpoint: ProviderEndpoint,
	meta: Option<ResponseMetadata>,
	err: OAuthRequestError<E>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => Error::Provider {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
		},
		RequestTokenError::Request(error) => mapper.map_transport_error(endpoint, meta_ref, error),
		RequestTokenError::Parse(error, _body) =>
			TransientError::TokenResponseParse { source: error, status: meta_status(meta_ref) }
				.into(),
		RequestTokenError::Other(message) => TransientError::Endpoint {
			endpoint,
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	endpoint: ProviderEndpoint,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Endpoint {
			endpoint,
			message: "request timed out".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::network(endpoint, err).into()
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(
	endpoint: ProviderEndpoint,
	meta: Option<&ResponseMetadata>,
	message: impl Display,
) -> Error {
	TransientError::Endpoint {
		endpoint,
		message: format!("HTTP client error: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
