//! Mobile Connect client engine: operator discovery, OpenID Connect code exchange, strict ID token
//! validation, and session-resumable flows for stateless web handlers.
//!
//! # Legacy providers
//!
//! Providers that only advertise the `mc_v1.1` protocol generation are tagged
//! [`ProviderVersion::R1`](discovery::ProviderVersion::R1). For those providers every ID token
//! claim or signature failure is reported as
//! [`ValidationOutcome::ValidationSkipped`](validation::ValidationOutcome::ValidationSkipped)
//! instead of the specific failure. This keeps integrations with deployed legacy operators
//! working, but the token then carries a weaker guarantee. Callers must treat `ValidationSkipped`
//! as "unverified" and apply their own risk policy.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod validation;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value as JsonValue;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
