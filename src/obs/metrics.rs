// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"mobile_connect_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Counts a degraded step under its stable `reason` label (when enabled).
pub(crate) fn record_degraded(reason: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("mobile_connect_degraded_total", "reason" => reason).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = reason;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_flow_outcome_without_recorder() {
		record_flow_outcome(FlowKind::Discovery, FlowOutcome::Failure);
		record_flow_outcome(FlowKind::Headless, FlowOutcome::Attempt);
		record_degraded("key_set_unavailable");
	}
}
