//! Optional observability helpers for Mobile Connect flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `mobile_connect.flow` with the `flow` and
//!   `stage` (call site) fields, plus `warn` events for degraded steps.
//! - Enable `metrics` to increment the `mobile_connect_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the
//!   `mobile_connect_degraded_total` counter, labeled by `reason`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Orchestrator flow kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Operator discovery and operator-selection handling.
	Discovery,
	/// Authorization URL construction and redirect classification.
	Authentication,
	/// Token exchange, refresh, and revocation.
	Token,
	/// UserInfo and PremiumInfo retrieval.
	Identity,
	/// Headless authentication polling.
	Headless,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Discovery => "discovery",
			FlowKind::Authentication => "authentication",
			FlowKind::Token => "token",
			FlowKind::Identity => "identity",
			FlowKind::Headless => "headless",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reports a step that failed without aborting the flow.
///
/// `reason` is a stable snake_case label shared by the `warn` event and the degraded counter;
/// `detail` is free text and must not carry secrets.
pub fn degraded(reason: &'static str, detail: &dyn Display) {
	warn_degraded(reason, detail);
	record_degraded(reason);
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an orchestrator operation.
	Attempt,
	/// The operation produced a non-error status.
	Success,
	/// The operation produced an error status.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
