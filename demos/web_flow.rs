//! Walks a web application through discovery, the authorization redirect, and the session-based
//! token exchange.
//!
//! Set `MC_DISCOVERY_URL`, `MC_CLIENT_ID`, `MC_CLIENT_SECRET`, and `MC_MSISDN` to run against a
//! real discovery service. Paste the redirect URL the operator sends back when prompted.

// std
use std::{env, io, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use mobile_connect::{
	cache::{MemoryCache, SessionCache},
	config::MobileConnectConfig,
	discovery::DiscoveryOptions,
	flows::{AuthenticationOptions, MobileConnect, MobileConnectStatus},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = MobileConnectConfig::builder(
		env::var("MC_CLIENT_ID")?,
		env::var("MC_CLIENT_SECRET")?,
		Url::parse(&env::var("MC_DISCOVERY_URL")?)?,
		Url::parse("http://localhost:8001/callback")?,
	)
	.build()?;
	let cache: Arc<dyn SessionCache> = Arc::new(MemoryCache::default());
	let mc = MobileConnect::new(config, Some(cache))?;
	let options = DiscoveryOptions::with_msisdn(env::var("MC_MSISDN").unwrap_or_default());
	let status = mc.attempt_discovery(&options).await;
	let session_id = match &status {
		MobileConnectStatus::OperatorSelectionRequired { url } => {
			println!("Send your user to the operator selection page: {url}.");

			return Ok(());
		},
		MobileConnectStatus::StartAuthentication { session_id: Some(session_id), .. } =>
			session_id.clone(),
		other => return Err(eyre!("Discovery did not start authentication: {other:?}.")),
	};
	let started = mc
		.start_authentication_with_session(&session_id, &AuthenticationOptions::default())
		.await;
	let MobileConnectStatus::StartAuthentication { authorization: Some(request), .. } = started
	else {
		return Err(eyre!("Authorization request failed: {started:?}."));
	};

	println!("Send your user to {}.", request.url);
	println!("Paste the redirect URL:");

	let mut line = String::new();

	io::stdin().read_line(&mut line)?;

	let redirect = Url::parse(line.trim())?;
	let finished =
		mc.handle_url_redirect_with_session(&redirect, &session_id, &request.expectation()).await;

	match finished {
		MobileConnectStatus::Complete(completion) => {
			if let Some(tokens) = completion.tokens {
				println!("ID token: {}.", tokens.id_token_validation);
				println!("Access token: {}.", tokens.access_token_validation);
			}
		},
		other => eprintln!("Flow ended with {other:?}."),
	}

	Ok(())
}
