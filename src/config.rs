//! Host configuration for the Mobile Connect orchestrator.

// self
use crate::{_prelude::*, auth::TokenSecret};

const DEFAULT_HEADLESS_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_HEADLESS_TIMEOUT_SECS: u64 = 300;
const DEFAULT_KEY_SET_TTL_SECS: u64 = 3_600;

/// Errors raised while building, parsing, or validating a configuration.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ConfigValidationError {
	/// The configuration document does not match the expected shape.
	#[error("Configuration is malformed at `{path}`: {message}.")]
	Malformed {
		/// Path of the offending field.
		path: String,
		/// Parser message.
		message: String,
	},
	/// The client id is blank.
	#[error("The client id cannot be empty.")]
	MissingClientId,
	/// A configured URL uses a scheme other than HTTP(S).
	#[error("The {field} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which field failed validation.
		field: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// Headless polling needs a positive interval and timeout.
	#[error("Headless poll interval and timeout must be positive.")]
	InvalidHeadlessTiming,
}

/// Orchestrator configuration.
///
/// ```
/// let config = mobile_connect::config::MobileConnectConfig::from_json_str(
/// 	r#"{
/// 		"client_id": "client",
/// 		"client_secret": "secret",
/// 		"discovery_url": "https://discovery.example.com/v2/discovery",
/// 		"redirect_url": "https://app.example.com/callback"
/// 	}"#,
/// )
/// .expect("Configuration should parse.");
///
/// assert!(config.cache_responses_with_session_id);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileConnectConfig {
	/// Client id registered with the discovery service.
	pub client_id: String,
	/// Client secret registered with the discovery service.
	pub client_secret: TokenSecret,
	/// Discovery service endpoint.
	pub discovery_url: Url,
	/// Redirect URL registered for the application.
	pub redirect_url: Url,
	/// Store discovery results under session ids when a cache is supplied.
	#[serde(default = "default_true")]
	pub cache_responses_with_session_id: bool,
	/// TTL hint passed to the session cache.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_ttl_secs: Option<u64>,
	/// Delay between headless polls.
	#[serde(default = "default_headless_poll_interval_ms")]
	pub headless_poll_interval_ms: u64,
	/// Overall headless authentication deadline.
	#[serde(default = "default_headless_timeout_secs")]
	pub headless_timeout_secs: u64,
	/// Lifetime of cached key sets.
	#[serde(default = "default_key_set_ttl_secs")]
	pub key_set_ttl_secs: u64,
}
impl MobileConnectConfig {
	/// Starts a builder seeded with the mandatory values.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		discovery_url: Url,
		redirect_url: Url,
	) -> MobileConnectConfigBuilder {
		MobileConnectConfigBuilder::new(client_id, client_secret, discovery_url, redirect_url)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigValidationError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			ConfigValidationError::Malformed {
				path: e.path().to_string(),
				message: e.inner().to_string(),
			}
		})?;

		config.validate()?;

		Ok(config)
	}

	/// Checks invariants the builder enforces.
	pub fn validate(&self) -> Result<(), ConfigValidationError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigValidationError::MissingClientId);
		}

		for (field, url) in [("discovery", &self.discovery_url), ("redirect", &self.redirect_url)] {
			if !matches!(url.scheme(), "http" | "https") {
				return Err(ConfigValidationError::UnsupportedScheme {
					field,
					url: url.to_string(),
				});
			}
		}

		if self.headless_poll_interval_ms == 0 || self.headless_timeout_secs == 0 {
			return Err(ConfigValidationError::InvalidHeadlessTiming);
		}

		Ok(())
	}

	/// Session cache TTL hint.
	pub fn session_ttl(&self) -> Option<Duration> {
		self.session_ttl_secs.map(|secs| Duration::seconds(saturating_i64(secs)))
	}

	/// Delay between headless polls.
	pub fn headless_poll_interval(&self) -> std::time::Duration {
		std::time::Duration::from_millis(self.headless_poll_interval_ms)
	}

	/// Overall headless deadline.
	pub fn headless_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.headless_timeout_secs)
	}

	/// Lifetime of cached key sets.
	pub fn key_set_ttl(&self) -> Duration {
		Duration::seconds(saturating_i64(self.key_set_ttl_secs))
	}
}

/// Builder for [`MobileConnectConfig`].
#[derive(Debug)]
pub struct MobileConnectConfigBuilder {
	config: MobileConnectConfig,
}
impl MobileConnectConfigBuilder {
	fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		discovery_url: Url,
		redirect_url: Url,
	) -> Self {
		Self {
			config: MobileConnectConfig {
				client_id: client_id.into(),
				client_secret: TokenSecret::new(client_secret),
				discovery_url,
				redirect_url,
				cache_responses_with_session_id: true,
				session_ttl_secs: None,
				headless_poll_interval_ms: DEFAULT_HEADLESS_POLL_INTERVAL_MS,
				headless_timeout_secs: DEFAULT_HEADLESS_TIMEOUT_SECS,
				key_set_ttl_secs: DEFAULT_KEY_SET_TTL_SECS,
			},
		}
	}

	/// Enables or disables session-id caching.
	pub fn cache_responses_with_session_id(mut self, enabled: bool) -> Self {
		self.config.cache_responses_with_session_id = enabled;

		self
	}

	/// Sets the session cache TTL hint.
	pub fn session_ttl(mut self, ttl: std::time::Duration) -> Self {
		self.config.session_ttl_secs = Some(ttl.as_secs());

		self
	}

	/// Sets the headless poll interval and overall timeout.
	pub fn headless_timing(
		mut self,
		poll_interval: std::time::Duration,
		timeout: std::time::Duration,
	) -> Self {
		self.config.headless_poll_interval_ms =
			u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX);
		self.config.headless_timeout_secs = timeout.as_secs();

		self
	}

	/// Sets the key set cache lifetime.
	pub fn key_set_ttl(mut self, ttl: std::time::Duration) -> Self {
		self.config.key_set_ttl_secs = ttl.as_secs();

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<MobileConnectConfig, ConfigValidationError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

fn saturating_i64(value: u64) -> i64 {
	i64::try_from(value).unwrap_or(i64::MAX)
}

fn default_true() -> bool {
	true
}

fn default_headless_poll_interval_ms() -> u64 {
	DEFAULT_HEADLESS_POLL_INTERVAL_MS
}

fn default_headless_timeout_secs() -> u64 {
	DEFAULT_HEADLESS_TIMEOUT_SECS
}

fn default_key_set_ttl_secs() -> u64 {
	DEFAULT_KEY_SET_TTL_SECS
}
