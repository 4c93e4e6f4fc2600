mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use common::*;
use mobile_connect::{
	discovery::DiscoveryOptions,
	flows::{IdentityResponse, MobileConnectStatus},
};

fn identity(status: MobileConnectStatus) -> IdentityResponse {
	let MobileConnectStatus::Complete(completion) = status else {
		panic!("Expected Complete, got {status:?}.");
	};

	completion.identity.expect("Completion should carry identity data.")
}

#[tokio::test]
async fn user_info_uses_bearer_auth_and_session_lookup() {
	let server = MockServer::start_async().await;
	let mc = orchestrator(&server, Some(memory_cache()));
	let _discovery = mock_msisdn_discovery(&server, false).await;
	let user_info = server
		.mock_async(|when, then| {
			when.method(GET).path("/userinfo").header("authorization", "Bearer access-1");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "sub": "pcr-1", "email": "user@example.com" }));
		})
		.await;

	mc.attempt_discovery(&DiscoveryOptions::with_msisdn("+447700900000")).await;

	let status = mc.request_user_info_with_session("session-0", "access-1").await;

	assert_eq!(status.session_id(), Some("session-0"));
	assert_eq!(identity(status).claim_str("email"), Some("user@example.com"));

	user_info.assert_calls_async(1).await;
}

#[tokio::test]
async fn premium_info_accepts_jwt_bodies() {
	let server = MockServer::start_async().await;
	let mc = orchestrator(&server, None);
	let _discovery = mock_msisdn_discovery(&server, false).await;
	let body = sign(&json!({ "sub": "pcr-1", "phone_number": "+447700900000" }));
	let _premium = server
		.mock_async(|when, then| {
			when.method(GET).path("/premiuminfo");
			then.status(200).header("content-type", "application/jwt").body(body);
		})
		.await;
	let status = mc.attempt_discovery(&DiscoveryOptions::with_msisdn("+447700900000")).await;
	let discovery = status.discovery().cloned().expect("Discovery should succeed.");
	let status = mc.request_identity(discovery, "access-1").await;

	assert_eq!(identity(status).claim_str("phone_number"), Some("+447700900000"));
}

#[tokio::test]
async fn identity_error_payloads_become_error_statuses() {
	let server = MockServer::start_async().await;
	let mc = orchestrator(&server, None);
	let _discovery = mock_msisdn_discovery(&server, false).await;
	let _user_info = server
		.mock_async(|when, then| {
			when.method(GET).path("/userinfo");
			then.status(401)
				.header("content-type", "application/json")
				.json_body(json!({
					"error": "invalid_token",
					"error_description": "Token revoked"
				}));
		})
		.await;
	let status = mc.attempt_discovery(&DiscoveryOptions::with_msisdn("+447700900000")).await;
	let discovery = status.discovery().cloned().expect("Discovery should succeed.");

	assert_eq!(
		mc.request_user_info(discovery, "stale").await,
		MobileConnectStatus::error("invalid_token", "Token revoked")
	);
}

#[tokio::test]
async fn unreadable_identity_bodies_become_invalid_format() {
	let server = MockServer::start_async().await;
	let mc = orchestrator(&server, None);
	let _discovery = mock_msisdn_discovery(&server, false).await;
	let _user_info = server
		.mock_async(|when, then| {
			when.method(GET).path("/userinfo");
			then.status(200).header("content-type", "text/html").body("<html>maintenance</html>");
		})
		.await;
	let status = mc.attempt_discovery(&DiscoveryOptions::with_msisdn("+447700900000")).await;
	let discovery = status.discovery().cloned().expect("Discovery should succeed.");

	let status = mc.request_user_info(discovery, "access-1").await;

	assert_eq!(status.error_code(), Some("invalid_format"));
}
