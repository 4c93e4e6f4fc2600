//! Uniform status values returned by every orchestrator operation.

// self
use crate::{
	_prelude::*,
	auth::RequestTokenResponse,
	discovery::DiscoveryResponse,
	flows::{AuthorizationRequest, IdentityResponse},
	validation::{IdTokenClaims, ValidationOutcome},
};

/// Error code used when a session id has no cached discovery result.
pub const SESSION_NOT_FOUND: &str = "sdksession_not_found";
/// Error code used when a session id is supplied but session caching is not engaged.
pub const CACHE_DISABLED: &str = "cache_disabled";
/// Error code used when the redirect `state` differs from the expected one.
pub const INVALID_STATE: &str = "invalid_state";
/// Error code used when a redirect URL carries neither a selection nor an authorization result.
pub const INVALID_REDIRECT: &str = "invalid_redirect";
/// Error code used when headless authentication runs past its deadline.
pub const HEADLESS_TIMEOUT: &str = "headless_timeout";

/// Tagged result of an orchestrator operation.
#[derive(Clone, Debug, PartialEq)]
pub enum MobileConnectStatus {
	/// The discovery service could not identify the operator; send the user to `url`.
	OperatorSelectionRequired {
		/// Operator-selection page.
		url: Url,
	},
	/// The operator is known and authentication can begin.
	StartAuthentication {
		/// Resolved discovery result.
		discovery: Arc<DiscoveryResponse>,
		/// Session id the result is cached under, when session caching is engaged.
		session_id: Option<String>,
		/// Authorization request, once built.
		authorization: Option<AuthorizationRequest>,
	},
	/// Terminal success.
	Complete(Box<FlowCompletion>),
	/// Terminal failure.
	Error {
		/// Machine-readable code.
		code: String,
		/// Human-readable description.
		description: String,
	},
}
impl MobileConnectStatus {
	/// Builds an [`Self::Error`] status.
	pub fn error(code: impl Into<String>, description: impl Into<String>) -> Self {
		Self::Error { code: code.into(), description: description.into() }
	}

	/// Folds a crate error into an [`Self::Error`] status.
	pub fn from_error(error: &Error) -> Self {
		Self::error(error.code(), error.description())
	}

	/// Returns `true` for [`Self::Error`].
	pub fn is_error(&self) -> bool {
		matches!(self, Self::Error { .. })
	}

	/// Error code, for [`Self::Error`] statuses.
	pub fn error_code(&self) -> Option<&str> {
		match self {
			Self::Error { code, .. } => Some(code),
			_ => None,
		}
	}

	/// Session id attached to the status, if any.
	pub fn session_id(&self) -> Option<&str> {
		match self {
			Self::StartAuthentication { session_id, .. } => session_id.as_deref(),
			Self::Complete(completion) => completion.session_id.as_deref(),
			_ => None,
		}
	}

	/// Discovery result attached to the status, if any.
	pub fn discovery(&self) -> Option<&DiscoveryResponse> {
		match self {
			Self::StartAuthentication { discovery, .. } => Some(discovery),
			Self::Complete(completion) => completion.discovery.as_deref(),
			_ => None,
		}
	}
}
impl From<Error> for MobileConnectStatus {
	fn from(error: Error) -> Self {
		Self::from_error(&error)
	}
}

/// Payload of a [`MobileConnectStatus::Complete`] status.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowCompletion {
	/// Discovery result the flow ran against.
	pub discovery: Option<Arc<DiscoveryResponse>>,
	/// Session id the discovery result was resolved from.
	pub session_id: Option<String>,
	/// Tokens from a code exchange or refresh, with their validation outcomes.
	pub tokens: Option<ValidatedTokens>,
	/// UserInfo or PremiumInfo data.
	pub identity: Option<IdentityResponse>,
}

/// Token response together with its validation outcomes.
///
/// A non-[`Valid`](ValidationOutcome::Valid) outcome does not abort the flow; callers decide
/// what to accept.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedTokens {
	/// Token endpoint response.
	pub response: RequestTokenResponse,
	/// Outcome of ID token validation.
	pub id_token_validation: ValidationOutcome,
	/// Outcome of access token validation.
	pub access_token_validation: ValidationOutcome,
	/// Decoded ID token claims, when the token was decodable.
	pub id_token_claims: Option<IdTokenClaims>,
}
impl ValidatedTokens {
	/// Returns `true` when both tokens validated cleanly.
	pub fn is_fully_valid(&self) -> bool {
		self.id_token_validation.is_valid() && self.access_token_validation.is_valid()
	}
}
