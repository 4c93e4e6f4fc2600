//! Crate-level error types shared across discovery, token exchange, caching, and identity calls.

// self
use crate::{_prelude::*, cache::CacheError, http::ProviderEndpoint};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Orchestrator operations never return this type directly; they fold it into
/// [`MobileConnectStatus::Error`](crate::flows::MobileConnectStatus::Error) through
/// [`Error::code`] and [`Error::description`].
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session cache failure.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		CacheError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the caller may retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Provider answered with an OAuth/Mobile Connect error payload.
	#[error("Provider returned `{error}`: {}.", description.as_deref().unwrap_or("no description"))]
	Provider {
		/// Provider-supplied `error` code.
		error: String,
		/// Provider-supplied `error_description`/`description`, when present.
		description: Option<String>,
	},
	/// Provider answered with a payload the crate cannot interpret.
	#[error("The {endpoint} endpoint returned an unusable response: {reason}.")]
	InvalidResponse {
		/// Endpoint that produced the response.
		endpoint: ProviderEndpoint,
		/// Human-readable explanation.
		reason: String,
	},
}
impl Error {
	/// Short machine-readable code used in error statuses.
	pub fn code(&self) -> &str {
		match self {
			Self::Cache(_) => "cache_failure",
			Self::Config(_) => "invalid_config",
			Self::Transient(_) => "temporarily_unavailable",
			Self::Transport(_) => "http_failure",
			Self::Provider { error, .. } => error,
			Self::InvalidResponse { .. } => "invalid_response",
		}
	}

	/// Human-readable description used in error statuses.
	pub fn description(&self) -> String {
		match self {
			Self::Provider { description: Some(description), .. } => description.clone(),
			other => other.to_string(),
		}
	}
}

/// Configuration and request construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// The discovery result does not expose the endpoint an operation needs.
	#[error("The discovery result does not include a {endpoint} endpoint.")]
	MissingEndpoint {
		/// Endpoint that is missing.
		endpoint: ProviderEndpoint,
	},
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("The {endpoint} endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Endpoint that produced the response.
		endpoint: ProviderEndpoint,
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint being called.
		endpoint: ProviderEndpoint,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling a provider endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: ProviderEndpoint,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}
