//! Discovery service and provider metadata client.

// self
use crate::{
	_prelude::*,
	discovery::{DiscoveryOptions, DiscoveryResponse, ProviderMetadata},
	http::{self, ProviderEndpoint, ProviderHttpClient, RequestAuth},
	oauth::TransportErrorMapper,
};

/// Result of a discovery call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryOutcome {
	/// The service could not identify the operator; send the user to this URL.
	OperatorSelection(Url),
	/// The service resolved the operator.
	Resolved(DiscoveryResponse),
}

/// Operator chosen on the operator-selection page, parsed from the redirect URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorSelection {
	/// Selected mobile country code.
	pub mcc: String,
	/// Selected mobile network code.
	pub mnc: String,
	/// Encrypted subscriber id, when the selection page supplied one.
	pub subscriber_id: Option<String>,
}
impl OperatorSelection {
	/// Parses `mcc_mnc=MCC_MNC` (and optional `subscriber_id`) from a redirect URL.
	pub fn from_redirect(url: &Url) -> Option<Self> {
		let mut mcc_mnc = None;
		let mut subscriber_id = None;

		for (key, value) in url.query_pairs() {
			match key.as_ref() {
				"mcc_mnc" if mcc_mnc.is_none() => mcc_mnc = Some(value.into_owned()),
				"subscriber_id" if !value.is_empty() => subscriber_id = Some(value.into_owned()),
				_ => {},
			}
		}

		let mcc_mnc = mcc_mnc?;
		let (mcc, mnc) = mcc_mnc.split_once('_')?;

		if mcc.is_empty() || mnc.is_empty() {
			return None;
		}

		Some(Self { mcc: mcc.to_owned(), mnc: mnc.to_owned(), subscriber_id })
	}
}

/// Client credentials and callback used for discovery calls.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DiscoveryCredentials<'a> {
	pub(crate) discovery_url: &'a Url,
	pub(crate) client_id: &'a str,
	pub(crate) client_secret: &'a str,
	pub(crate) redirect_url: &'a Url,
}

/// Discovery and metadata calls over a [`ProviderHttpClient`].
pub(crate) struct DiscoveryService<'a, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: &'a C,
	error_mapper: &'a M,
}
impl<'a, C, M> DiscoveryService<'a, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(http_client: &'a C, error_mapper: &'a M) -> Self {
		Self { http_client, error_mapper }
	}

	/// Calls the discovery service.
	///
	/// A subscriber id is POSTed as `MSISDN`; otherwise network codes (if valid) travel as
	/// `Selected-MCC`/`Selected-MNC` query parameters on a GET.
	pub(crate) async fn discover(
		&self,
		credentials: DiscoveryCredentials<'_>,
		options: &DiscoveryOptions,
	) -> Result<DiscoveryOutcome> {
		let options = options.sanitized();
		let redirect_url = options.redirect_url.as_ref().unwrap_or(credentials.redirect_url);
		let auth = RequestAuth::Basic {
			client_id: credentials.client_id,
			client_secret: credentials.client_secret,
		};
		let request = match options.msisdn.as_deref() {
			Some(msisdn) => {
				let mut form = vec![("MSISDN", msisdn), ("Redirect_URL", redirect_url.as_str())];

				if let Some(client_ip) = options.client_ip.as_deref() {
					form.push(("Local-Client-IP", client_ip));
				}

				http::form_request(credentials.discovery_url, auth, &form)?
			},
			None => {
				let mut url = credentials.discovery_url.clone();

				{
					let mut query = url.query_pairs_mut();

					query.append_pair("Redirect_URL", redirect_url.as_str());

					if let (Some(mcc), Some(mnc)) = (options.mcc.as_deref(), options.mnc.as_deref())
					{
						query.append_pair("Selected-MCC", mcc).append_pair("Selected-MNC", mnc);
					}
					if let Some(client_ip) = options.client_ip.as_deref() {
						query.append_pair("Local-Client-IP", client_ip);
					}
				}

				http::get_request(&url, auth)?
			},
		};
		let response =
			http::send(self.http_client, self.error_mapper, ProviderEndpoint::Discovery, request)
				.await?;
		let payload = http::read_json(ProviderEndpoint::Discovery, &response)?;

		parse_discovery_payload(&payload)
	}

	/// Fetches and parses the provider metadata document.
	pub(crate) async fn fetch_provider_metadata(&self, url: &Url) -> Result<ProviderMetadata> {
		let request = http::get_request(url, RequestAuth::None)?;
		let response = http::send(
			self.http_client,
			self.error_mapper,
			ProviderEndpoint::ProviderMetadata,
			request,
		)
		.await?;

		if !response.status().is_success() {
			return Err(Error::InvalidResponse {
				endpoint: ProviderEndpoint::ProviderMetadata,
				reason: format!("unexpected HTTP status {}", response.status()),
			});
		}

		ProviderMetadata::from_json_slice(response.body()).map_err(|e| Error::InvalidResponse {
			endpoint: ProviderEndpoint::ProviderMetadata,
			reason: format!("{} at `{}`", e.inner(), e.path()),
		})
	}
}

/// Interprets a discovery payload that carries no `error` member.
pub(crate) fn parse_discovery_payload(payload: &JsonValue) -> Result<DiscoveryOutcome> {
	if let Some(links) = payload.get("links").and_then(JsonValue::as_array) {
		let selection = links
			.iter()
			.filter(|link| link.get("rel").and_then(JsonValue::as_str) == Some("operatorSelection"))
			.find_map(|link| link.get("href").and_then(JsonValue::as_str))
			.and_then(|href| Url::parse(href).ok());

		return match selection {
			Some(url) => Ok(DiscoveryOutcome::OperatorSelection(url)),
			None => Err(Error::InvalidResponse {
				endpoint: ProviderEndpoint::Discovery,
				reason: "links carry no valid operatorSelection target".into(),
			}),
		};
	}
	if payload.get("response").is_none_or(|response| !response.is_object()) {
		return Err(Error::InvalidResponse {
			endpoint: ProviderEndpoint::Discovery,
			reason: "payload has neither links nor a response object".into(),
		});
	}

	Ok(DiscoveryOutcome::Resolved(DiscoveryResponse::from_payload(payload)))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn operator_selection_links_are_recognized() {
		let outcome = parse_discovery_payload(&serde_json::json!({
			"links": [{
				"rel": "operatorSelection",
				"href": "https://discovery.example.com/select?session=1"
			}]
		}))
		.expect("Selection payload should parse.");

		assert_eq!(
			outcome,
			DiscoveryOutcome::OperatorSelection(
				Url::parse("https://discovery.example.com/select?session=1")
					.expect("Selection URL fixture should parse.")
			)
		);
	}

	#[test]
	fn payloads_without_links_or_response_are_invalid() {
		let err = parse_discovery_payload(&serde_json::json!({ "ttl": 1 }))
			.expect_err("Empty payloads should be rejected.");

		assert_eq!(err.code(), "invalid_response");
	}

	#[test]
	fn selection_redirects_split_mcc_mnc() {
		let url = Url::parse("https://app.example.com/cb?mcc_mnc=901_01&subscriber_id=abc")
			.expect("Redirect fixture should parse.");

		assert_eq!(
			OperatorSelection::from_redirect(&url),
			Some(OperatorSelection {
				mcc: "901".into(),
				mnc: "01".into(),
				subscriber_id: Some("abc".into())
			})
		);

		let bad = Url::parse("https://app.example.com/cb?mcc_mnc=90101")
			.expect("Redirect fixture should parse.");

		assert_eq!(OperatorSelection::from_redirect(&bad), None);
	}
}
