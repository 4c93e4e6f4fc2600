//! Token endpoint result as seen by callers.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Tokens returned by a token or refresh exchange.
///
/// `expires_at` is derived from `expires_in` at receipt time. A response without `expires_in`
/// carries no expiry and never counts as expired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTokenResponse {
	/// Access token issued by the provider.
	pub access_token: TokenSecret,
	/// Signed identity token, when issued.
	pub id_token: Option<TokenSecret>,
	/// Refresh token, when issued.
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the provider (normally `bearer`).
	pub token_type: String,
	/// Space-delimited scope granted by the provider, when reported.
	pub scope: Option<String>,
	/// Receipt timestamp.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Absolute expiry of the access token.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
}
impl RequestTokenResponse {
	/// Creates a response carrying only an access token.
	pub fn new(access_token: impl Into<String>, issued_at: OffsetDateTime) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			id_token: None,
			refresh_token: None,
			token_type: "bearer".into(),
			scope: None,
			issued_at,
			expires_at: None,
		}
	}

	/// Attaches an identity token; empty strings count as absent.
	pub fn with_id_token(mut self, id_token: Option<String>) -> Self {
		self.id_token = id_token.filter(|value| !value.is_empty()).map(TokenSecret::new);

		self
	}

	/// Attaches a refresh token; empty strings count as absent.
	pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
		self.refresh_token = refresh_token.filter(|value| !value.is_empty()).map(TokenSecret::new);

		self
	}

	/// Overrides the token type.
	pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = token_type.into();

		self
	}

	/// Sets the granted scope.
	pub fn with_scope(mut self, scope: Option<String>) -> Self {
		self.scope = scope;

		self
	}

	/// Sets the absolute access token expiry.
	pub fn with_expires_at(mut self, expires_at: Option<OffsetDateTime>) -> Self {
		self.expires_at = expires_at;

		self
	}

	/// Returns `true` when an expiry is known and not after `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at <= now)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn expiry_only_applies_when_known() {
		let now = OffsetDateTime::now_utc();
		let open = RequestTokenResponse::new("at", now);

		assert!(!open.is_expired_at(now + Duration::days(365)));

		let bounded = open.with_expires_at(Some(now + Duration::minutes(5)));

		assert!(!bounded.is_expired_at(now));
		assert!(bounded.is_expired_at(now + Duration::minutes(5)));
	}

	#[test]
	fn empty_optional_tokens_are_dropped() {
		let response = RequestTokenResponse::new("at", OffsetDateTime::now_utc())
			.with_id_token(Some(String::new()))
			.with_refresh_token(Some("rt".into()));

		assert!(response.id_token.is_none());
		assert_eq!(response.refresh_token.as_ref().map(TokenSecret::expose), Some("rt"));
	}
}
