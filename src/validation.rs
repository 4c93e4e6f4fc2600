//! Identity and access token validation.
//!
//! Validation never fails with an error: every check yields exactly one [`ValidationOutcome`].
//! ID tokens are checked in a fixed order (presence, nonce, audience/authorized party, expiry,
//! max age, issuer, then signature) and the first failing check wins.
//!
//! # Legacy providers
//!
//! For [`ProviderVersion::R1`] providers, any claim or signature failure is reported as
//! [`ValidationOutcome::ValidationSkipped`]. Signature verification still runs after a claim
//! failure so a fully valid legacy token is reported as [`ValidationOutcome::Valid`]. Treat
//! `ValidationSkipped` as unverified.

pub mod claims;
pub mod keyset;

pub use claims::{Audience, IdTokenClaims};
pub use keyset::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::RequestTokenResponse, discovery::ProviderVersion};

/// Result of a token validation. Exactly one reason, never combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
	/// Every check passed.
	Valid,
	/// A legacy provider's token failed a check; the failure is not reported.
	ValidationSkipped,
	/// No ID token was supplied.
	IdTokenMissing,
	/// No access token was supplied.
	AccessTokenMissing,
	/// The access token expiry has passed.
	AccessTokenExpired,
	/// The ID token `exp` is missing or has passed.
	IdTokenExpired,
	/// The `nonce` claim differs from the expected nonce.
	InvalidNonce,
	/// The audience or authorized party does not match the client id.
	InvalidAudienceOrAuthorizedParty,
	/// The `iss` claim differs from the expected issuer.
	InvalidIssuer,
	/// `auth_time` is missing or older than the requested max age.
	MaxAgeExceeded,
	/// No key matches the token's `kid` and `alg`.
	NoMatchingKey,
	/// The matching key cannot verify the token's algorithm.
	UnsupportedAlgorithm,
	/// The matching key is unusable.
	MalformedKey,
	/// The signature does not verify.
	InvalidSignature,
	/// No key set was available.
	KeySetUnavailable,
}
impl ValidationOutcome {
	/// Returns `true` only for [`Self::Valid`].
	pub fn is_valid(self) -> bool {
		matches!(self, Self::Valid)
	}

	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Valid => "valid",
			Self::ValidationSkipped => "validation_skipped",
			Self::IdTokenMissing => "id_token_missing",
			Self::AccessTokenMissing => "access_token_missing",
			Self::AccessTokenExpired => "access_token_expired",
			Self::IdTokenExpired => "id_token_expired",
			Self::InvalidNonce => "invalid_nonce",
			Self::InvalidAudienceOrAuthorizedParty => "invalid_audience_or_authorized_party",
			Self::InvalidIssuer => "invalid_issuer",
			Self::MaxAgeExceeded => "max_age_exceeded",
			Self::NoMatchingKey => "no_matching_key",
			Self::UnsupportedAlgorithm => "unsupported_algorithm",
			Self::MalformedKey => "malformed_key",
			Self::InvalidSignature => "invalid_signature",
			Self::KeySetUnavailable => "key_set_unavailable",
		}
	}
}
impl Display for ValidationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Values an ID token must match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdTokenExpectations {
	/// Client id the token must be issued to.
	pub client_id: String,
	/// Expected issuer.
	pub issuer: String,
	/// Nonce sent with the authorization request.
	pub nonce: Option<String>,
	/// Max age sent with the authorization request.
	pub max_age: Option<Duration>,
	/// Provider protocol generation.
	pub version: ProviderVersion,
}

/// Decoded JOSE header fields used for key lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenHeader {
	/// Key id.
	pub kid: Option<String>,
	/// Signing algorithm.
	pub alg: Option<String>,
}

/// A compact JWS split into its parts.
///
/// Undecodable headers or payloads degrade to empty values rather than errors.
#[derive(Clone, Debug, Default)]
pub struct DecodedToken {
	/// JOSE header.
	pub header: TokenHeader,
	/// Payload claims.
	pub claims: IdTokenClaims,
	signing_input: String,
	signature: String,
}
impl DecodedToken {
	/// Splits and decodes `token`.
	pub fn parse(token: &str) -> Self {
		let mut parts = token.trim().split('.');
		let (Some(header), Some(payload), Some(signature), None) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			return Self::default();
		};
		let header_json = decode_segment(header);
		let text = |name: &str| {
			header_json
				.as_ref()
				.and_then(|json| json.get(name))
				.and_then(JsonValue::as_str)
				.map(str::to_owned)
		};

		Self {
			header: TokenHeader { kid: text("kid"), alg: text("alg") },
			claims: decode_segment(payload)
				.and_then(|json| serde_json::from_value(json).ok())
				.unwrap_or_default(),
			signing_input: format!("{header}.{payload}"),
			signature: signature.to_owned(),
		}
	}
}

/// Decodes a base64url JSON object segment.
pub(crate) fn decode_segment(segment: &str) -> Option<JsonValue> {
	let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;

	serde_json::from_slice::<JsonValue>(&bytes).ok().filter(JsonValue::is_object)
}

/// Validates an ID token against `expected` and `key_set` at the current time.
pub fn validate_identity_token(
	token: &str,
	expected: &IdTokenExpectations,
	key_set: Option<&KeySet>,
) -> ValidationOutcome {
	validate_identity_token_at(token, expected, key_set, OffsetDateTime::now_utc())
}

/// Validates an ID token at the given instant.
pub fn validate_identity_token_at(
	token: &str,
	expected: &IdTokenExpectations,
	key_set: Option<&KeySet>,
	now: OffsetDateTime,
) -> ValidationOutcome {
	if token.trim().is_empty() {
		return ValidationOutcome::IdTokenMissing;
	}

	let decoded = DecodedToken::parse(token);
	let claims_outcome = claims::check_claims(&decoded.claims, expected, now);
	let legacy = expected.version.is_legacy();

	if !claims_outcome.is_valid() && !legacy {
		return claims_outcome;
	}

	let signature_outcome = verify_signature(&decoded, key_set);

	if legacy && !(claims_outcome.is_valid() && signature_outcome.is_valid()) {
		return ValidationOutcome::ValidationSkipped;
	}

	signature_outcome
}

fn verify_signature(decoded: &DecodedToken, key_set: Option<&KeySet>) -> ValidationOutcome {
	let Some(key_set) = key_set else {
		return ValidationOutcome::KeySetUnavailable;
	};
	let Some(key) = key_set.find(decoded.header.kid.as_deref(), decoded.header.alg.as_deref())
	else {
		return ValidationOutcome::NoMatchingKey;
	};
	// A header without `alg` only matches keys that declare none.
	let Some(algorithm) = decoded.header.alg.as_deref() else {
		return ValidationOutcome::UnsupportedAlgorithm;
	};

	match key.verify(algorithm, decoded.signing_input.as_bytes(), &decoded.signature) {
		Ok(true) => ValidationOutcome::Valid,
		Ok(false) => ValidationOutcome::InvalidSignature,
		Err(VerifyError::UnsupportedAlgorithm) => ValidationOutcome::UnsupportedAlgorithm,
		Err(VerifyError::MalformedKey) => ValidationOutcome::MalformedKey,
	}
}

/// Validates the access token of a token response at the current time.
pub fn validate_access_token(response: &RequestTokenResponse) -> ValidationOutcome {
	validate_access_token_at(response, OffsetDateTime::now_utc())
}

/// Validates the access token of a token response at the given instant.
pub fn validate_access_token_at(
	response: &RequestTokenResponse,
	now: OffsetDateTime,
) -> ValidationOutcome {
	if response.access_token.is_empty() {
		return ValidationOutcome::AccessTokenMissing;
	}
	if response.is_expired_at(now) {
		return ValidationOutcome::AccessTokenExpired;
	}

	ValidationOutcome::Valid
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{Algorithm, EncodingKey, Header};
	// self
	use super::*;

	const SECRET: &[u8] = b"operator-signing-secret-000001";
	const CLIENT_ID: &str = "client";
	const ISSUER: &str = "https://operator.example.com";

	fn key_set() -> KeySet {
		// crates.io
		use base64::engine::general_purpose::STANDARD;

		KeySet::from_jwks(&serde_json::json!({
			"keys": [{ "kty": "oct", "kid": "k1", "alg": "HS256", "k": STANDARD.encode(SECRET) }]
		}))
		.expect("JWKS fixture should parse.")
	}

	fn expectations(version: ProviderVersion) -> IdTokenExpectations {
		IdTokenExpectations {
			client_id: CLIENT_ID.into(),
			issuer: ISSUER.into(),
			nonce: Some("nonce-1".into()),
			max_age: None,
			version,
		}
	}

	fn token(kid: &str, claims: JsonValue) -> String {
		let mut header = Header::new(Algorithm::HS256);

		header.kid = Some(kid.into());

		jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(SECRET))
			.expect("Token should sign.")
	}

	/// Compact token with an arbitrary header and signature segment.
	fn raw_token(header: JsonValue, claims: &JsonValue, signature: &str) -> String {
		let encode = |value: &JsonValue| URL_SAFE_NO_PAD.encode(value.to_string());

		format!("{}.{}.{signature}", encode(&header), encode(claims))
	}

	fn claims(now: OffsetDateTime) -> JsonValue {
		serde_json::json!({
			"iss": ISSUER,
			"aud": [CLIENT_ID],
			"sub": "pcr-1",
			"nonce": "nonce-1",
			"exp": (now + Duration::minutes(5)).unix_timestamp(),
			"iat": now.unix_timestamp(),
		})
	}

	#[test]
	fn signed_token_with_matching_claims_is_valid() {
		let now = OffsetDateTime::now_utc();
		let keys = key_set();
		let token = token("k1", claims(now));

		assert_eq!(
			validate_identity_token_at(
				&token,
				&expectations(ProviderVersion::R2),
				Some(&keys),
				now
			),
			ValidationOutcome::Valid
		);

		let other_nonce = IdTokenExpectations {
			nonce: Some("nonce-2".into()),
			..expectations(ProviderVersion::R2)
		};

		assert_eq!(
			validate_identity_token_at(&token, &other_nonce, Some(&keys), now),
			ValidationOutcome::InvalidNonce
		);
	}

	#[test]
	fn signature_failures_follow_claims() {
		let now = OffsetDateTime::now_utc();
		let keys = key_set();
		let expected = expectations(ProviderVersion::R2);
		let token = token("k1", claims(now));

		assert_eq!(
			validate_identity_token_at(&token, &expected, None, now),
			ValidationOutcome::KeySetUnavailable
		);

		let unknown_kid = self::token("k9", claims(now));

		assert_eq!(
			validate_identity_token_at(&unknown_kid, &expected, Some(&keys), now),
			ValidationOutcome::NoMatchingKey
		);

		let tampered = format!("{}x", token.trim_end_matches(|c| c != '.'));

		assert_eq!(
			validate_identity_token_at(&tampered, &expected, Some(&keys), now),
			ValidationOutcome::InvalidSignature
		);
	}

	#[test]
	fn issuer_is_checked_after_every_other_claim() {
		let now = OffsetDateTime::now_utc();
		let keys = key_set();
		let mut foreign = claims(now);

		foreign["iss"] = JsonValue::from("https://elsewhere.example.com");

		assert_eq!(
			validate_identity_token_at(
				&token("k1", foreign),
				&expectations(ProviderVersion::R2),
				Some(&keys),
				now
			),
			ValidationOutcome::InvalidIssuer
		);
	}

	#[test]
	fn verifier_errors_become_outcomes() {
		let now = OffsetDateTime::now_utc();
		let expected = expectations(ProviderVersion::R2);
		let claims = claims(now);
		let keys = KeySet::from_jwks(&serde_json::json!({
			"keys": [
				{ "kty": "oct", "kid": "any-alg", "k": "c2VjcmV0" },
				{ "kty": "RSA", "kid": "broken", "n": 5 }
			]
		}))
		.expect("JWKS fixture should parse.");
		let family_mismatch =
			raw_token(serde_json::json!({ "alg": "RS256", "kid": "any-alg" }), &claims, "sig");
		let malformed =
			raw_token(serde_json::json!({ "alg": "RS256", "kid": "broken" }), &claims, "sig");

		assert_eq!(
			validate_identity_token_at(&family_mismatch, &expected, Some(&keys), now),
			ValidationOutcome::UnsupportedAlgorithm
		);
		assert_eq!(
			validate_identity_token_at(&malformed, &expected, Some(&keys), now),
			ValidationOutcome::MalformedKey
		);
	}

	#[test]
	fn headers_without_alg_never_verify() {
		let now = OffsetDateTime::now_utc();
		let expected = expectations(ProviderVersion::R2);
		let claims = claims(now);
		let keys = KeySet::from_jwks(&serde_json::json!({
			"keys": [{ "kty": "oct", "kid": "any-alg", "k": "c2VjcmV0" }]
		}))
		.expect("JWKS fixture should parse.");

		assert_eq!(
			validate_identity_token_at(
				&raw_token(serde_json::json!({ "kid": "any-alg" }), &claims, "sig"),
				&expected,
				Some(&keys),
				now
			),
			ValidationOutcome::UnsupportedAlgorithm
		);
		assert_eq!(
			validate_identity_token_at(
				&raw_token(serde_json::json!({ "kid": "k1" }), &claims, "sig"),
				&expected,
				Some(&key_set()),
				now
			),
			ValidationOutcome::NoMatchingKey,
			"Keys declaring an algorithm need a matching header `alg`."
		);
	}

	#[test]
	fn legacy_providers_downgrade_every_failure() {
		let now = OffsetDateTime::now_utc();
		let keys = key_set();
		let expected = expectations(ProviderVersion::R1);
		let mut expired = claims(now);

		expired["exp"] = JsonValue::from((now - Duration::minutes(1)).unix_timestamp());

		assert_eq!(
			validate_identity_token_at(&token("k1", expired), &expected, Some(&keys), now),
			ValidationOutcome::ValidationSkipped
		);
		assert_eq!(
			validate_identity_token_at(&token("k1", claims(now)), &expected, None, now),
			ValidationOutcome::ValidationSkipped
		);
		assert_eq!(
			validate_identity_token_at(&token("k9", claims(now)), &expected, Some(&keys), now),
			ValidationOutcome::ValidationSkipped,
			"An unknown key id is downgraded."
		);

		let signed = token("k1", claims(now));
		let tampered = format!("{}x", signed.trim_end_matches(|c| c != '.'));

		assert_eq!(
			validate_identity_token_at(&tampered, &expected, Some(&keys), now),
			ValidationOutcome::ValidationSkipped,
			"A bad signature is downgraded."
		);
		assert_eq!(
			validate_identity_token_at(&token("k1", claims(now)), &expected, Some(&keys), now),
			ValidationOutcome::Valid
		);
		assert_eq!(
			validate_identity_token_at("", &expected, Some(&keys), now),
			ValidationOutcome::IdTokenMissing
		);
	}

	#[test]
	fn undecodable_tokens_fail_claims_in_order() {
		let now = OffsetDateTime::now_utc();
		let without_nonce =
			IdTokenExpectations { nonce: None, ..expectations(ProviderVersion::R2) };

		assert_eq!(
			validate_identity_token_at("garbage", &expectations(ProviderVersion::R2), None, now),
			ValidationOutcome::InvalidNonce
		);
		assert_eq!(
			validate_identity_token_at("a.b.c", &without_nonce, None, now),
			ValidationOutcome::InvalidAudienceOrAuthorizedParty
		);
	}

	#[test]
	fn access_token_checks() {
		let now = OffsetDateTime::now_utc();

		assert_eq!(
			validate_access_token_at(&RequestTokenResponse::new("", now), now),
			ValidationOutcome::AccessTokenMissing
		);
		assert_eq!(
			validate_access_token_at(
				&RequestTokenResponse::new("at", now)
					.with_expires_at(Some(now - Duration::seconds(1))),
				now
			),
			ValidationOutcome::AccessTokenExpired
		);
		assert_eq!(
			validate_access_token_at(&RequestTokenResponse::new("at", now), now),
			ValidationOutcome::Valid
		);
	}
}
