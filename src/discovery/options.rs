//! Identifying parameters sent to the discovery service.

// self
use crate::{_prelude::*, obs};

/// Parameters identifying the subscriber or network for a discovery call.
///
/// A subscriber id (MSISDN) or a valid country + network code pair is enough for the discovery
/// service to resolve an operator. Anything less makes it answer with an operator-selection URL.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
	/// Subscriber phone number, sent as `MSISDN`.
	pub msisdn: Option<String>,
	/// Mobile country code; must be three digits.
	pub mcc: Option<String>,
	/// Mobile network code; must be two or three digits.
	pub mnc: Option<String>,
	/// End-user IP address, sent as `Local-Client-IP`.
	pub client_ip: Option<String>,
	/// Redirect URL overriding the configured one for this call.
	pub redirect_url: Option<Url>,
}
impl DiscoveryOptions {
	/// Options identifying a subscriber by phone number.
	pub fn with_msisdn(msisdn: impl Into<String>) -> Self {
		Self { msisdn: Some(msisdn.into()), ..Default::default() }
	}

	/// Options identifying a network by country and network code.
	pub fn with_network(mcc: impl Into<String>, mnc: impl Into<String>) -> Self {
		Self { mcc: Some(mcc.into()), mnc: Some(mnc.into()), ..Default::default() }
	}

	/// Sets the end-user IP address.
	pub fn client_ip(mut self, client_ip: impl Into<String>) -> Self {
		self.client_ip = Some(client_ip.into());

		self
	}

	/// Returns a copy with blank values removed and invalid network codes dropped.
	///
	/// Codes are only meaningful as a pair, so an invalid code drops both.
	pub fn sanitized(&self) -> Self {
		let msisdn = non_blank(self.msisdn.as_deref());
		let mcc = non_blank(self.mcc.as_deref());
		let mnc = non_blank(self.mnc.as_deref());
		let (mcc, mnc) = match (mcc, mnc) {
			(Some(mcc), Some(mnc)) if is_valid_mcc(&mcc) && is_valid_mnc(&mnc) =>
				(Some(mcc), Some(mnc)),
			(None, None) => (None, None),
			(mcc, mnc) => {
				obs::degraded(
					"network_codes_dropped",
					&format_args!(
						"mcc={} mnc={}",
						mcc.as_deref().unwrap_or_default(),
						mnc.as_deref().unwrap_or_default()
					),
				);

				(None, None)
			},
		};

		Self {
			msisdn,
			mcc,
			mnc,
			client_ip: non_blank(self.client_ip.as_deref()),
			redirect_url: self.redirect_url.clone(),
		}
	}
}

/// Returns `true` for three-digit mobile country codes.
pub fn is_valid_mcc(mcc: &str) -> bool {
	mcc.len() == 3 && mcc.bytes().all(|b| b.is_ascii_digit())
}

/// Returns `true` for two- or three-digit mobile network codes.
pub fn is_valid_mnc(mnc: &str) -> bool {
	(2..=3).contains(&mnc.len()) && mnc.bytes().all(|b| b.is_ascii_digit())
}

fn non_blank(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
}
