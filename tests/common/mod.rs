#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::{Mock, prelude::*};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
// self
use mobile_connect::{
	cache::{MemoryCache, SessionCache, SessionIdGenerator},
	config::MobileConnectConfig,
	flows::ReqwestMobileConnect,
	url::Url,
};

pub const CLIENT_ID: &str = "app-client";
pub const CLIENT_SECRET: &str = "app-secret";
pub const OPERATOR_CLIENT_ID: &str = "operator-client";
pub const OPERATOR_CLIENT_SECRET: &str = "operator-secret";
pub const SUBSCRIBER_ID: &str = "enc-subscriber-1";
pub const REDIRECT_URL: &str = "https://app.example.com/callback";
pub const KEY_ID: &str = "k1";

const SIGNING_SECRET: &[u8] = b"operator-signing-secret-000001";

/// Deterministic ids: `session-0`, `session-1`, ...
#[derive(Debug, Default)]
pub struct SequentialIds(AtomicUsize);
impl SessionIdGenerator for SequentialIds {
	fn generate(&self) -> String {
		format!("session-{}", self.0.fetch_add(1, Ordering::SeqCst))
	}
}

pub fn url(raw: &str) -> Url {
	Url::parse(raw).expect("URL fixture should parse.")
}

pub fn config(server: &MockServer) -> MobileConnectConfig {
	MobileConnectConfig::builder(
		CLIENT_ID,
		CLIENT_SECRET,
		url(&server.url("/v2/discovery")),
		url(REDIRECT_URL),
	)
	.headless_timing(std::time::Duration::from_millis(50), std::time::Duration::from_secs(1))
	.build()
	.expect("Test configuration should build.")
}

pub fn memory_cache() -> Arc<dyn SessionCache> {
	Arc::new(MemoryCache::default())
}

pub fn orchestrator(
	server: &MockServer,
	cache: Option<Arc<dyn SessionCache>>,
) -> ReqwestMobileConnect {
	ReqwestMobileConnect::new(config(server), cache)
		.expect("Test orchestrator should build.")
		.with_session_id_generator(Arc::new(SequentialIds::default()))
}

/// Discovery payload whose operator endpoints all live on `server`.
pub fn discovery_payload(server: &MockServer, with_metadata: bool) -> Value {
	let mut links = vec![
		json!({ "rel": "authorization", "href": server.url("/authorize") }),
		json!({ "rel": "token", "href": server.url("/token") }),
		json!({ "rel": "userinfo", "href": server.url("/userinfo") }),
		json!({ "rel": "premiuminfo", "href": server.url("/premiuminfo") }),
		json!({ "rel": "jwks", "href": server.url("/jwks") }),
		json!({ "rel": "tokenrevoke", "href": server.url("/revoke") }),
	];

	if with_metadata {
		links.push(json!({
			"rel": "openid-configuration",
			"href": server.url("/.well-known/openid-configuration")
		}));
	}

	json!({
		"ttl": 1_900_000_000,
		"subscriber_id": SUBSCRIBER_ID,
		"response": {
			"serving_operator": "Example Operator",
			"country": "GB",
			"currency": "GBP",
			"client_id": OPERATOR_CLIENT_ID,
			"client_secret": OPERATOR_CLIENT_SECRET,
			"apis": { "operatorid": { "link": links } }
		}
	})
}

pub async fn mock_msisdn_discovery<'a>(server: &'a MockServer, with_metadata: bool) -> Mock<'a> {
	let payload = discovery_payload(server, with_metadata);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/v2/discovery").header_exists("authorization");
			then.status(200).header("content-type", "application/json").json_body(payload);
		})
		.await
}

pub async fn mock_jwks(server: &MockServer) -> Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/jwks");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"keys": [{
					"kty": "oct",
					"kid": KEY_ID,
					"alg": "HS256",
					"k": STANDARD.encode(SIGNING_SECRET)
				}]
			}));
		})
		.await
}

pub async fn mock_token<'a>(server: &'a MockServer, id_token: &str) -> Mock<'a> {
	let body = json!({
		"access_token": "access-1",
		"token_type": "Bearer",
		"expires_in": 3600,
		"refresh_token": "refresh-1",
		"id_token": id_token,
	});

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").json_body(body);
		})
		.await
}

/// HS256 ID token accepted for `OPERATOR_CLIENT_ID` on `server` with the given nonce.
pub fn id_token(server: &MockServer, nonce: &str) -> String {
	let now = OffsetDateTime::now_utc();

	sign(&json!({
		"iss": server.base_url(),
		"sub": "pcr-1",
		"aud": [OPERATOR_CLIENT_ID],
		"azp": OPERATOR_CLIENT_ID,
		"nonce": nonce,
		"iat": now.unix_timestamp(),
		"auth_time": now.unix_timestamp(),
		"exp": (now + Duration::minutes(10)).unix_timestamp(),
	}))
}

pub fn sign(claims: &Value) -> String {
	let mut header = Header::new(Algorithm::HS256);

	header.kid = Some(KEY_ID.into());

	jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(SIGNING_SECRET))
		.expect("Test token should sign.")
}
