//! OpenID provider metadata published by operators.

// crates.io
use serde::{Deserializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Provider metadata document (`openid-configuration`).
///
/// Every field is optional so a sparse document still parses. Endpoint values are kept as raw
/// strings; blank or unparseable values never override known endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// Issuer identifier expected in ID tokens.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issuer: Option<String>,
	/// Authorization endpoint override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authorization_endpoint: Option<String>,
	/// Token endpoint override (also used for refresh).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint: Option<String>,
	/// UserInfo endpoint override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub userinfo_endpoint: Option<String>,
	/// PremiumInfo endpoint override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub premiuminfo_endpoint: Option<String>,
	/// JWKS endpoint override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jwks_uri: Option<String>,
	/// Revocation endpoint override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub revocation_endpoint: Option<String>,
	/// Scopes the provider supports.
	#[serde(default, deserialize_with = "one_or_many")]
	pub scopes_supported: Vec<String>,
	/// Response types the provider supports.
	#[serde(default, deserialize_with = "one_or_many")]
	pub response_types_supported: Vec<String>,
	/// ID token signing algorithms the provider supports.
	#[serde(default, deserialize_with = "one_or_many")]
	pub id_token_signing_alg_values_supported: Vec<String>,
	/// Claims the provider can return.
	#[serde(default, deserialize_with = "one_or_many")]
	pub claims_supported: Vec<String>,
	/// `login_hint` formats the provider accepts.
	#[serde(default, deserialize_with = "one_or_many")]
	pub login_hint_methods_supported: Vec<String>,
	/// Mobile Connect protocol generations the provider implements.
	#[serde(default, deserialize_with = "one_or_many")]
	pub mc_version: Vec<String>,
}
impl ProviderMetadata {
	/// Parses a metadata document, reporting the failing field path on error.
	pub fn from_json_slice(
		body: &[u8],
	) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
		let mut deserializer = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut deserializer)
	}

	/// Returns `true` when the provider advertises `scope` (case-insensitive).
	pub fn supports_scope(&self, scope: &str) -> bool {
		self.scopes_supported.iter().any(|known| known.eq_ignore_ascii_case(scope))
	}
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	match JsonValue::deserialize(deserializer)? {
		JsonValue::Null => Ok(Vec::new()),
		JsonValue::String(value) => Ok(vec![value]),
		JsonValue::Array(values) => values
			.into_iter()
			.map(|value| match value {
				JsonValue::String(value) => Ok(value),
				other => Err(DeError::custom(format!("expected a string, found {other}"))),
			})
			.collect(),
		other => Err(DeError::custom(format!("expected a string or a list, found {other}"))),
	}
}
