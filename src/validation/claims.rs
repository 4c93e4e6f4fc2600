//! ID token claims and the ordered claim checks.

// crates.io
use serde::{Deserializer, de::Error as DeError};
// self
use crate::{
	_prelude::*,
	validation::{IdTokenExpectations, ValidationOutcome},
};

/// `aud` claim: a single audience or a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
	/// Scalar audience; must equal the client id exactly.
	Single(String),
	/// Audience list; must contain the client id.
	Many(Vec<String>),
}
impl Audience {
	/// Returns `true` when the audience admits `client_id`.
	pub fn admits(&self, client_id: &str) -> bool {
		match self {
			Self::Single(audience) => audience == client_id,
			Self::Many(audiences) => audiences.iter().any(|audience| audience == client_id),
		}
	}
}

/// Registered ID token claims used by validation.
///
/// Unknown claims are kept in [`IdTokenClaims::extra`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Issuer.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub iss: Option<String>,
	/// Subject (pseudonymous customer reference).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sub: Option<String>,
	/// Audience.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aud: Option<Audience>,
	/// Authorized party.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub azp: Option<String>,
	/// Expiry, seconds since the epoch.
	#[serde(default, deserialize_with = "numeric_date", skip_serializing_if = "Option::is_none")]
	pub exp: Option<i64>,
	/// Issue time, seconds since the epoch.
	#[serde(default, deserialize_with = "numeric_date", skip_serializing_if = "Option::is_none")]
	pub iat: Option<i64>,
	/// Time of end-user authentication, seconds since the epoch.
	#[serde(default, deserialize_with = "numeric_date", skip_serializing_if = "Option::is_none")]
	pub auth_time: Option<i64>,
	/// Nonce echoed from the authorization request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// Authentication context class reference.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub acr: Option<String>,
	/// Remaining claims.
	#[serde(flatten)]
	pub extra: BTreeMap<String, JsonValue>,
}

/// Runs the claim checks in order and returns the first failure.
///
/// Order: nonce, audience/authorized party, expiry, max age, issuer.
pub(crate) fn check_claims(
	claims: &IdTokenClaims,
	expected: &IdTokenExpectations,
	now: OffsetDateTime,
) -> ValidationOutcome {
	let now = now.unix_timestamp();

	let expected_nonce = expected.nonce.as_deref().filter(|nonce| !nonce.is_empty());

	if expected_nonce.is_some_and(|nonce| claims.nonce.as_deref() != Some(nonce)) {
		return ValidationOutcome::InvalidNonce;
	}
	if !audience_matches(claims, &expected.client_id) {
		return ValidationOutcome::InvalidAudienceOrAuthorizedParty;
	}
	if claims.exp.is_none_or(|exp| exp <= now) {
		return ValidationOutcome::IdTokenExpired;
	}
	if let Some(max_age) = expected.max_age {
		let fresh = claims
			.auth_time
			.is_some_and(|auth_time| auth_time.saturating_add(max_age.whole_seconds()) >= now);

		if !fresh {
			return ValidationOutcome::MaxAgeExceeded;
		}
	}
	if claims.iss.as_deref() != Some(expected.issuer.as_str()) {
		return ValidationOutcome::InvalidIssuer;
	}

	ValidationOutcome::Valid
}

/// Audience must admit the client; a present, non-empty `azp` must equal it. An absent
/// `azp` passes.
pub(crate) fn audience_matches(claims: &IdTokenClaims, client_id: &str) -> bool {
	let Some(audience) = &claims.aud else {
		return false;
	};

	if !audience.admits(client_id) {
		return false;
	}

	match claims.azp.as_deref() {
		Some(azp) if !azp.is_empty() => azp == client_id,
		_ => true,
	}
}

fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<JsonValue>::deserialize(deserializer)? {
		None | Some(JsonValue::Null) => Ok(None),
		Some(JsonValue::Number(number)) => number
			.as_i64()
			.or_else(|| number.as_f64().map(|value| value as i64))
			.map(Some)
			.ok_or_else(|| DeError::custom("numeric date out of range")),
		Some(JsonValue::String(text)) => text
			.trim()
			.parse::<i64>()
			.map(Some)
			.map_err(|_| DeError::custom(format!("`{text}` is not a numeric date"))),
		Some(other) => Err(DeError::custom(format!("`{other}` is not a numeric date"))),
	}
}
