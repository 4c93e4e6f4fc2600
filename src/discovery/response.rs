//! Discovery results and operator endpoint resolution.

// self
use crate::{_prelude::*, auth::TokenSecret, discovery::ProviderMetadata};

/// `mc_version` value marking the first-generation protocol.
pub const LEGACY_MC_VERSION: &str = "mc_v1.1";

/// Provider protocol generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderVersion {
	/// First generation (`mc_v1.1` only).
	///
	/// ID token claim and signature failures from these providers are reported as
	/// [`ValidationSkipped`](crate::validation::ValidationOutcome::ValidationSkipped).
	R1,
	/// Current generation; validation failures are reported as-is.
	#[default]
	R2,
}
impl ProviderVersion {
	/// Derives the generation from an `mc_version` list: only `mc_v1.1` means [`Self::R1`].
	pub fn from_supported_versions<S>(versions: &[S]) -> Self
	where
		S: AsRef<str>,
	{
		let legacy_only =
			versions.iter().all(|version| version.as_ref() == LEGACY_MC_VERSION);

		if !versions.is_empty() && legacy_only {
			Self::R1
		} else {
			Self::R2
		}
	}

	/// Returns `true` for the first-generation protocol.
	pub fn is_legacy(self) -> bool {
		matches!(self, Self::R1)
	}
}

/// Named operator endpoints resolved from a discovery payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorUrls {
	/// `authorization` link.
	pub authorization_url: Option<Url>,
	/// `token` link.
	pub request_token_url: Option<Url>,
	/// `userinfo` link.
	pub user_info_url: Option<Url>,
	/// `premiuminfo` link.
	pub premium_info_url: Option<Url>,
	/// `jwks` link.
	pub jwks_url: Option<Url>,
	/// `tokenrefresh` link.
	pub refresh_token_url: Option<Url>,
	/// `tokenrevoke` link.
	pub revoke_token_url: Option<Url>,
	/// `openid-configuration` link.
	pub provider_metadata_url: Option<Url>,
	/// `scope` link.
	pub scope_url: Option<Url>,
}
impl OperatorUrls {
	/// Extracts endpoints from `response.apis.operatorid.link`.
	///
	/// Returns `None` when the payload carries no link collection. For each relation the first
	/// link with a valid absolute URL wins.
	pub fn resolve(payload: &JsonValue) -> Option<Self> {
		let links = payload.pointer("/response/apis/operatorid/link")?.as_array()?;
		let mut urls = Self::default();

		for link in links {
			let rel = link.get("rel").and_then(JsonValue::as_str);
			let href = link.get("href").and_then(JsonValue::as_str);
			let (Some(rel), Some(href)) = (rel, href) else {
				continue;
			};
			let Ok(url) = Url::parse(href.trim()) else {
				continue;
			};
			let slot = match rel {
				"authorization" => &mut urls.authorization_url,
				"token" => &mut urls.request_token_url,
				"userinfo" => &mut urls.user_info_url,
				"premiuminfo" => &mut urls.premium_info_url,
				"jwks" => &mut urls.jwks_url,
				"tokenrefresh" => &mut urls.refresh_token_url,
				"tokenrevoke" => &mut urls.revoke_token_url,
				"openid-configuration" => &mut urls.provider_metadata_url,
				"scope" => &mut urls.scope_url,
				_ => continue,
			};

			if slot.is_none() {
				*slot = Some(url);
			}
		}

		Some(urls)
	}

	/// Replaces endpoints for which `metadata` supplies a non-empty, valid URL.
	///
	/// Refresh traffic follows `token_endpoint`.
	pub fn apply_overrides(&mut self, metadata: &ProviderMetadata) {
		override_with(&mut self.authorization_url, metadata.authorization_endpoint.as_deref());
		override_with(&mut self.request_token_url, metadata.token_endpoint.as_deref());
		override_with(&mut self.user_info_url, metadata.userinfo_endpoint.as_deref());
		override_with(&mut self.premium_info_url, metadata.premiuminfo_endpoint.as_deref());
		override_with(&mut self.jwks_url, metadata.jwks_uri.as_deref());
		override_with(&mut self.revoke_token_url, metadata.revocation_endpoint.as_deref());
		override_with(&mut self.refresh_token_url, metadata.token_endpoint.as_deref());
	}
}

fn override_with(slot: &mut Option<Url>, value: Option<&str>) {
	let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
		return;
	};

	if let Ok(url) = Url::parse(value) {
		*slot = Some(url);
	}
}

/// Immutable snapshot of an operator's capabilities for one subscriber.
///
/// Only endpoint URLs change after creation, through provider metadata overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
	/// Encrypted subscriber identifier issued by the discovery service.
	pub subscriber_id: Option<String>,
	/// Operator-issued client id (preferred over the configured one).
	pub client_id: Option<String>,
	/// Operator-issued client secret.
	pub client_secret: Option<TokenSecret>,
	/// Application name registered with the operator.
	pub client_name: Option<String>,
	/// Serving operator name.
	pub serving_operator: Option<String>,
	/// Operator country.
	pub country: Option<String>,
	/// Operator currency.
	pub currency: Option<String>,
	/// Resolved operator endpoints; `None` when the payload carried no links.
	pub operator_urls: Option<OperatorUrls>,
	/// Provider metadata, once fetched.
	pub provider_metadata: Option<ProviderMetadata>,
	/// Protocol generation derived from provider metadata.
	#[serde(default)]
	pub provider_version: ProviderVersion,
}
impl DiscoveryResponse {
	/// Builds a result from a discovery payload carrying a `response` object.
	pub fn from_payload(payload: &JsonValue) -> Self {
		let text = |pointer: &str| {
			payload
				.pointer(pointer)
				.and_then(JsonValue::as_str)
				.map(str::trim)
				.filter(|value| !value.is_empty())
				.map(str::to_owned)
		};

		Self {
			subscriber_id: text("/subscriber_id"),
			client_id: text("/response/client_id"),
			client_secret: text("/response/client_secret").map(TokenSecret::new),
			client_name: text("/response/client_name"),
			serving_operator: text("/response/serving_operator"),
			country: text("/response/country"),
			currency: text("/response/currency"),
			operator_urls: OperatorUrls::resolve(payload),
			provider_metadata: None,
			provider_version: ProviderVersion::default(),
		}
	}

	/// Stores provider metadata, applies its endpoint overrides, and derives the version.
	pub fn apply_provider_metadata(&mut self, metadata: ProviderMetadata) {
		self.operator_urls.get_or_insert_with(OperatorUrls::default).apply_overrides(&metadata);
		self.provider_version =
			ProviderVersion::from_supported_versions(metadata.mc_version.as_slice());
		self.provider_metadata = Some(metadata);
	}

	/// Resolved endpoints, or an empty set when none are known.
	pub fn urls(&self) -> OperatorUrls {
		self.operator_urls.clone().unwrap_or_default()
	}

	/// Expected `iss` claim: the metadata issuer when known, else the authorization origin.
	pub fn expected_issuer(&self) -> Option<String> {
		if let Some(issuer) = self
			.provider_metadata
			.as_ref()
			.and_then(|metadata| metadata.issuer.as_deref())
			.filter(|issuer| !issuer.is_empty())
		{
			return Some(issuer.to_owned());
		}

		self.operator_urls
			.as_ref()
			.and_then(|urls| urls.authorization_url.as_ref())
			.map(|url| url.origin().ascii_serialization())
			.filter(|origin| origin != "null")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn payload() -> JsonValue {
		serde_json::json!({
			"ttl": 1_700_000_000,
			"subscriber_id": "e53a7d2c",
			"response": {
				"serving_operator": "Example Operator",
				"country": "GB",
				"currency": "GBP",
				"client_id": "operator-client",
				"client_secret": "operator-secret",
				"apis": {
					"operatorid": {
						"link": [
							{ "rel": "authorization", "href": "https://operator.example.com/authorize" },
							{ "rel": "authorization", "href": "https://ignored.example.com/authorize" },
							{ "rel": "token", "href": "https://operator.example.com/token" },
							{ "rel": "userinfo", "href": "not a url" },
							{ "rel": "jwks", "href": "https://operator.example.com/jwks" },
							{
								"rel": "openid-configuration",
								"href": "https://operator.example.com/.well-known/openid-configuration"
							},
							{ "rel": "unknown", "href": "https://operator.example.com/unknown" }
						]
					}
				}
			}
		})
	}

	#[test]
	fn resolve_takes_first_valid_link_per_relation() {
		let urls = OperatorUrls::resolve(&payload()).expect("Links should resolve.");

		assert_eq!(
			urls.authorization_url.as_ref().map(Url::as_str),
			Some("https://operator.example.com/authorize")
		);
		assert_eq!(
			urls.request_token_url.as_ref().map(Url::as_str),
			Some("https://operator.example.com/token")
		);
		assert!(urls.user_info_url.is_none(), "Invalid targets count as unmatched.");
		assert!(urls.refresh_token_url.is_none());
		assert!(urls.provider_metadata_url.is_some());
	}

	#[test]
	fn resolve_without_links_is_none() {
		assert_eq!(OperatorUrls::resolve(&serde_json::json!({ "response": {} })), None);
	}

	#[test]
	fn overrides_replace_only_non_empty_values() {
		let mut urls = OperatorUrls::resolve(&payload()).expect("Links should resolve.");
		let metadata = ProviderMetadata {
			token_endpoint: Some("https://backup.example.com/token".into()),
			authorization_endpoint: Some("   ".into()),
			jwks_uri: None,
			..Default::default()
		};

		urls.apply_overrides(&metadata);

		assert_eq!(
			urls.request_token_url.as_ref().map(Url::as_str),
			Some("https://backup.example.com/token")
		);
		assert_eq!(
			urls.refresh_token_url.as_ref().map(Url::as_str),
			Some("https://backup.example.com/token")
		);
		assert_eq!(
			urls.authorization_url.as_ref().map(Url::as_str),
			Some("https://operator.example.com/authorize")
		);
		assert_eq!(
			urls.jwks_url.as_ref().map(Url::as_str),
			Some("https://operator.example.com/jwks")
		);
	}

	#[test]
	fn version_is_legacy_only_for_exclusive_v1_1() {
		assert_eq!(ProviderVersion::from_supported_versions(&["mc_v1.1"]), ProviderVersion::R1);
		assert_eq!(
			ProviderVersion::from_supported_versions(&["mc_v1.1", "mc_v2.0"]),
			ProviderVersion::R2
		);
		assert_eq!(ProviderVersion::from_supported_versions::<&str>(&[]), ProviderVersion::R2);
	}

	#[test]
	fn payload_fields_and_issuer_fallback() {
		let mut discovery = DiscoveryResponse::from_payload(&payload());

		assert_eq!(discovery.subscriber_id.as_deref(), Some("e53a7d2c"));
		assert_eq!(
			discovery.client_secret.as_ref().map(TokenSecret::expose),
			Some("operator-secret")
		);
		assert_eq!(discovery.expected_issuer().as_deref(), Some("https://operator.example.com"));

		discovery.apply_provider_metadata(ProviderMetadata {
			issuer: Some("https://issuer.example.com".into()),
			mc_version: vec!["mc_v1.1".into()],
			..Default::default()
		});

		assert_eq!(discovery.expected_issuer().as_deref(), Some("https://issuer.example.com"));
		assert!(discovery.provider_version.is_legacy());
	}
}
