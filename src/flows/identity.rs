//! UserInfo and PremiumInfo retrieval.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	discovery::DiscoveryResponse,
	error::{ConfigError, TransientError},
	flows::{FlowCompletion, MobileConnect, MobileConnectStatus, common},
	http::{self, ProviderEndpoint, ProviderHttpClient, RequestAuth},
	oauth::TransportErrorMapper,
	obs::FlowKind,
	validation,
};

/// Claims returned by the UserInfo or PremiumInfo endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityResponse {
	/// Raw JSON object.
	pub payload: JsonValue,
}
impl IdentityResponse {
	/// Returns a single claim.
	pub fn claim(&self, name: &str) -> Option<&JsonValue> {
		self.payload.get(name)
	}

	/// Returns a single string claim.
	pub fn claim_str(&self, name: &str) -> Option<&str> {
		self.claim(name).and_then(JsonValue::as_str)
	}

	/// Deserializes the payload into a caller-defined shape.
	pub fn deserialize<T>(&self) -> Result<T, serde_json::Error>
	where
		T: DeserializeOwned,
	{
		T::deserialize(&self.payload)
	}
}

impl<C, M> MobileConnect<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Fetches UserInfo claims with the given access token.
	pub async fn request_user_info(
		&self,
		discovery: impl Into<Arc<DiscoveryResponse>>,
		access_token: &str,
	) -> MobileConnectStatus {
		let discovery = discovery.into();

		common::observe(FlowKind::Identity, "request_user_info", async move {
			self.identity_status(ProviderEndpoint::UserInfo, discovery, None, access_token).await
		})
		.await
	}

	/// Fetches UserInfo claims for the discovery result cached under `session_id`.
	pub async fn request_user_info_with_session(
		&self,
		session_id: &str,
		access_token: &str,
	) -> MobileConnectStatus {
		common::observe(FlowKind::Identity, "request_user_info_with_session", async move {
			match self.resolve_session(session_id).await {
				Ok(discovery) =>
					self.identity_status(
						ProviderEndpoint::UserInfo,
						discovery,
						Some(session_id.to_owned()),
						access_token,
					)
					.await,
				Err(status) => status,
			}
		})
		.await
	}

	/// Fetches PremiumInfo (identity) claims with the given access token.
	pub async fn request_identity(
		&self,
		discovery: impl Into<Arc<DiscoveryResponse>>,
		access_token: &str,
	) -> MobileConnectStatus {
		let discovery = discovery.into();

		common::observe(FlowKind::Identity, "request_identity", async move {
			self.identity_status(ProviderEndpoint::PremiumInfo, discovery, None, access_token).await
		})
		.await
	}

	/// Fetches PremiumInfo claims for the discovery result cached under `session_id`.
	pub async fn request_identity_with_session(
		&self,
		session_id: &str,
		access_token: &str,
	) -> MobileConnectStatus {
		common::observe(FlowKind::Identity, "request_identity_with_session", async move {
			match self.resolve_session(session_id).await {
				Ok(discovery) =>
					self.identity_status(
						ProviderEndpoint::PremiumInfo,
						discovery,
						Some(session_id.to_owned()),
						access_token,
					)
					.await,
				Err(status) => status,
			}
		})
		.await
	}

	async fn identity_status(
		&self,
		endpoint: ProviderEndpoint,
		discovery: Arc<DiscoveryResponse>,
		session_id: Option<String>,
		access_token: &str,
	) -> MobileConnectStatus {
		match self.fetch_identity(endpoint, &discovery, access_token).await {
			Ok(identity) => MobileConnectStatus::Complete(Box::new(FlowCompletion {
				discovery: Some(discovery),
				session_id,
				tokens: None,
				identity: Some(identity),
			})),
			Err(e) => MobileConnectStatus::from_error(&e),
		}
	}

	async fn fetch_identity(
		&self,
		endpoint: ProviderEndpoint,
		discovery: &DiscoveryResponse,
		access_token: &str,
	) -> Result<IdentityResponse> {
		let urls = discovery.urls();
		let url = match endpoint {
			ProviderEndpoint::PremiumInfo => urls.premium_info_url,
			_ => urls.user_info_url,
		}
		.ok_or(ConfigError::MissingEndpoint { endpoint })?;
		let request = http::get_request(&url, RequestAuth::Bearer(access_token))?;
		let response =
			http::send(self.http_client.as_ref(), self.transport_mapper.as_ref(), endpoint, request)
				.await?;
		let payload = identity_payload(response.body());

		if let Some(err) = http::payload_error(&payload) {
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

		Ok(IdentityResponse { payload })
	}
}

/// Reads a JSON object body or the payload of a compact JWT.
///
/// Anything else becomes the `invalid_format` error payload.
fn identity_payload(body: &[u8]) -> JsonValue {
	if let Ok(value) = serde_json::from_slice::<JsonValue>(body) {
		if value.is_object() {
			return value;
		}

		return http::invalid_format_payload("response body is not a JSON object");
	}

	let text = String::from_utf8_lossy(body);
	let mut parts = text.trim().split('.');

	if let (Some(_), Some(payload), Some(_), None) =
		(parts.next(), parts.next(), parts.next(), parts.next())
	{
		if let Some(claims) = validation::decode_segment(payload) {
			return claims;
		}
	}

	http::invalid_format_payload("response body is neither JSON nor a JWT")
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use super::*;

	#[test]
	fn json_bodies_pass_through() {
		let payload = identity_payload(br#"{"sub":"abc","email":"a@example.com"}"#);

		assert_eq!(payload["sub"], "abc");
	}

	#[test]
	fn jwt_bodies_yield_their_payload() {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
		let claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"abc","phone_number":"+447700900000"}"#);
		let body = format!("{header}.{claims}.c2ln\n");
		let payload = identity_payload(body.as_bytes());

		assert_eq!(payload["phone_number"], "+447700900000");
	}

	#[test]
	fn other_bodies_become_invalid_format() {
		for body in [&b"<html>nope</html>"[..], b"[1,2]", b"a.b.c"] {
			let payload = identity_payload(body);
			let err =
				http::payload_error(&payload).expect("Unreadable bodies should carry an error.");

			assert_eq!(err.code(), "invalid_format");
		}
	}

	#[test]
	fn typed_access_to_claims() {
		#[derive(Deserialize)]
		struct Phone {
			phone_number: String,
		}

		let identity = IdentityResponse { payload: serde_json::json!({ "phone_number": "+1" }) };
		let phone: Phone = identity.deserialize().expect("Claims should deserialize.");

		assert_eq!(phone.phone_number, "+1");
		assert_eq!(identity.claim_str("phone_number"), Some("+1"));
		assert!(identity.claim("email").is_none());
	}
}
