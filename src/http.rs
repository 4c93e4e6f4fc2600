//! Transport primitives for every provider call (discovery, metadata, token, key set, identity).
//!
//! The module exposes [`ProviderHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can plug in custom HTTP clients without losing
//! the status/Retry-After capture used for error classification. Implementations call
//! [`ResponseMetadataSlot::take`] before dispatching a request and
//! [`ResponseMetadataSlot::store`] once an HTTP status is known.
//!
//! Handles must never follow redirects on their own: the headless flow inspects `Location`
//! headers itself, and token endpoints are expected to answer directly.

// std
use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		HeaderValue, Method,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError},
	oauth::TransportErrorMapper,
};

/// Provider endpoints reached by the crate, used to label errors, spans, and transport mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderEndpoint {
	/// Discovery service.
	Discovery,
	/// OpenID provider metadata document.
	ProviderMetadata,
	/// Authorization endpoint (headless polling only).
	Authorization,
	/// Token endpoint.
	Token,
	/// Token refresh endpoint.
	Refresh,
	/// Token revocation endpoint.
	Revoke,
	/// JSON Web Key Set endpoint.
	Jwks,
	/// UserInfo endpoint.
	UserInfo,
	/// PremiumInfo (identity) endpoint.
	PremiumInfo,
}
impl ProviderEndpoint {
	/// Returns a stable label suitable for errors and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Discovery => "discovery",
			Self::ProviderMetadata => "provider_metadata",
			Self::Authorization => "authorization",
			Self::Token => "token",
			Self::Refresh => "refresh",
			Self::Revoke => "revoke",
			Self::Jwks => "jwks",
			Self::UserInfo => "userinfo",
			Self::PremiumInfo => "premiuminfo",
		}
	}
}
impl Display for ProviderEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Abstraction over HTTP transports used for every provider request.
///
/// The trait is the crate's only dependency on an HTTP stack. Callers provide an
/// implementation (typically behind `Arc<T>`) and the orchestrator requests short-lived
/// [`AsyncHttpClient`] handles that each carry a clone of a [`ResponseMetadataSlot`]. The same
/// handles drive the `oauth2` token requests and the plain GET/POST calls made for discovery,
/// key sets, and identity data.
pub trait ProviderHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	///
	/// The request future returned by [`AsyncHttpClient::call`] must be `Send` so orchestrator
	/// futures can hop executors.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request.
	/// - Once a response provides status headers, save them with [`ResponseMetadataSlot::store`].
	/// - Do not follow redirects; return 3xx responses as-is.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the provider, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] configured to never follow redirects.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// The client must be built with `redirect(Policy::none())`.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds the default non-redirecting client.
	pub fn build() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ProviderHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`ProviderHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return Some(Duration::seconds(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

/// Client authentication attached to plain provider requests.
#[derive(Clone, Copy, Debug)]
pub(crate) enum RequestAuth<'a> {
	None,
	Basic { client_id: &'a str, client_secret: &'a str },
	Bearer(&'a str),
}

/// Builds a GET request with a JSON `Accept` header.
pub(crate) fn get_request(url: &Url, auth: RequestAuth<'_>) -> Result<HttpRequest, ConfigError> {
	build_request(Method::GET, url, auth, None)
}

/// Builds a form-encoded POST request.
pub(crate) fn form_request(
	url: &Url,
	auth: RequestAuth<'_>,
	form: &[(&str, &str)],
) -> Result<HttpRequest, ConfigError> {
	let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish();

	build_request(Method::POST, url, auth, Some(body.into_bytes()))
}

fn build_request(
	method: Method,
	url: &Url,
	auth: RequestAuth<'_>,
	form_body: Option<Vec<u8>>,
) -> Result<HttpRequest, ConfigError> {
	let mut builder = oauth2::http::Request::builder()
		.method(method)
		.uri(url.as_str())
		.header(ACCEPT, HeaderValue::from_static("application/json"));

	match auth {
		RequestAuth::None => {},
		RequestAuth::Basic { client_id, client_secret } => {
			builder = builder.header(AUTHORIZATION, basic_auth_value(client_id, client_secret));
		},
		RequestAuth::Bearer(token) => {
			builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
		},
	}

	let request = match form_body {
		Some(body) => builder
			.header(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"))
			.body(body)?,
		None => builder.body(Vec::new())?,
	};

	Ok(request)
}

fn basic_auth_value(client_id: &str, client_secret: &str) -> String {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::STANDARD};

	format!("Basic {}", STANDARD.encode(format!("{client_id}:{client_secret}")))
}

/// Dispatches `request` through a fresh handle, mapping transport failures via `mapper`.
///
/// Non-2xx responses are returned as-is; callers decide how to interpret the body.
pub(crate) async fn send<C, M>(
	http_client: &C,
	mapper: &M,
	endpoint: ProviderEndpoint,
	request: HttpRequest,
) -> Result<HttpResponse>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let slot = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(slot.clone());

	handle.call(request).await.map_err(|err| {
		let meta = slot.take();

		mapper.map_transport_error(endpoint, meta.as_ref(), err)
	})
}

/// Reads `Location` from a redirect response, resolved against `base`.
pub(crate) fn redirect_location(response: &HttpResponse, base: &Url) -> Option<Url> {
	if !response.status().is_redirection() {
		return None;
	}

	let raw = response.headers().get(oauth2::http::header::LOCATION)?.to_str().ok()?;

	base.join(raw).ok()
}

/// Builds the payload used when a response body has an unrecognized format.
pub(crate) fn invalid_format_payload(description: impl Display) -> JsonValue {
	serde_json::json!({ "error": "invalid_format", "error_description": description.to_string() })
}

/// Parses a JSON object body, folding anything else into [`invalid_format_payload`].
pub(crate) fn json_body(body: &[u8]) -> JsonValue {
	match serde_json::from_slice::<JsonValue>(body) {
		Ok(value) if value.is_object() => value,
		Ok(_) => invalid_format_payload("response body is not a JSON object"),
		Err(e) => invalid_format_payload(format!("response body is not valid JSON: {e}")),
	}
}

/// Extracts a provider error from a payload carrying an `error` member.
pub(crate) fn payload_error(payload: &JsonValue) -> Option<Error> {
	let error = payload.get("error")?.as_str()?;
	let description = payload
		.get("error_description")
		.or_else(|| payload.get("description"))
		.and_then(JsonValue::as_str)
		.map(str::to_owned);

	Some(Error::Provider { error: error.to_owned(), description })
}

/// Reads a JSON response, turning error payloads and non-2xx statuses into errors.
pub(crate) fn read_json(endpoint: ProviderEndpoint, response: &HttpResponse) -> Result<JsonValue> {
	let payload = json_body(response.body());

	if let Some(err) = payload_error(&payload) {
		return Err(err);
	}

	let status = response.status();

	if !status.is_success() {
		return Err(TransientError::Endpoint {
			endpoint,
			message: format!("unexpected HTTP status {status}"),
			status: Some(status.as_u16()),
			retry_after: None,
		}
		.into());
	}

	Ok(payload)
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::StatusCode;
	// self
	use super::*;

	fn response_with(status: StatusCode, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() = status;

		response
	}

	#[test]
	fn form_requests_carry_basic_auth_and_encoded_body() {
		let url = Url::parse("https://discovery.example.com/v2/discovery")
			.expect("Discovery URL fixture should parse.");
		let request = form_request(
			&url,
			RequestAuth::Basic { client_id: "client", client_secret: "secret" },
			&[("MSISDN", "+447700900000"), ("Redirect_URL", "https://app.example.com/cb")],
		)
		.expect("Form request should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(
			request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
			Some("Basic Y2xpZW50OnNlY3JldA==")
		);

		let body = String::from_utf8(request.body().clone()).expect("Form body should be UTF-8.");

		assert_eq!(body, "MSISDN=%2B447700900000&Redirect_URL=https%3A%2F%2Fapp.example.com%2Fcb");
	}

	#[test]
	fn bearer_requests_use_get() {
		let url = Url::parse("https://operator.example.com/userinfo")
			.expect("UserInfo URL fixture should parse.");
		let request =
			get_request(&url, RequestAuth::Bearer("access")).expect("GET request should build.");

		assert_eq!(request.method(), Method::GET);
		assert_eq!(
			request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
			Some("Bearer access")
		);
		assert!(request.body().is_empty());
	}

	#[test]
	fn redirect_location_resolves_relative_targets() {
		let base = Url::parse("https://operator.example.com/authorize?x=1")
			.expect("Base URL fixture should parse.");
		let mut response = HttpResponse::new(Vec::new());

		*response.status_mut() = StatusCode::FOUND;
		response.headers_mut().insert(
			oauth2::http::header::LOCATION,
			HeaderValue::from_static("/consent?step=2"),
		);

		assert_eq!(
			redirect_location(&response, &base).map(|url| url.to_string()),
			Some("https://operator.example.com/consent?step=2".into())
		);

		*response.status_mut() = StatusCode::OK;

		assert!(redirect_location(&response, &base).is_none());
	}

	#[test]
	fn unreadable_bodies_become_invalid_format_errors() {
		let err = read_json(ProviderEndpoint::Discovery, &response_with(StatusCode::OK, "<html>"))
			.expect_err("HTML bodies should not parse.");

		assert_eq!(err.code(), "invalid_format");
		assert!(err.description().starts_with("response body is not valid JSON"));
	}

	#[test]
	fn error_members_win_over_status() {
		let err = read_json(
			ProviderEndpoint::Discovery,
			&response_with(
				StatusCode::BAD_REQUEST,
				r#"{"error":"invalid_request","description":"MSISDN is malformed"}"#,
			),
		)
		.expect_err("Error payloads should surface.");

		assert_eq!(err.code(), "invalid_request");
		assert_eq!(err.description(), "MSISDN is malformed");

		let err = read_json(ProviderEndpoint::Jwks, &response_with(StatusCode::BAD_GATEWAY, "{}"))
			.expect_err("Non-2xx statuses should fail.");

		assert_eq!(err.code(), "temporarily_unavailable");
	}
}
