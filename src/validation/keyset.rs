//! Verification key sets: JWKS parsing, signature verification, and a TTL cache.

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey,
	errors::ErrorKind,
	jwk::{AlgorithmParameters, Jwk},
};
// self
use crate::{
	_prelude::*,
	http::{self, ProviderEndpoint, ProviderHttpClient, RequestAuth},
	oauth::TransportErrorMapper,
};

/// Reasons a verifier cannot produce a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum VerifyError {
	/// The algorithm is unknown or does not fit the key type.
	#[error("The signing algorithm is not supported by this key.")]
	UnsupportedAlgorithm,
	/// The key material cannot be used.
	#[error("The verification key is malformed.")]
	MalformedKey,
}

/// Signature verification capability attached to a key.
pub trait SignatureVerifier
where
	Self: Send + Sync,
{
	/// Verifies `signature` (base64url, unpadded) over `message` using `algorithm` (JWS name).
	fn verify(&self, algorithm: &str, message: &[u8], signature: &str) -> Result<bool, VerifyError>;
}

/// One key of a [`KeySet`].
#[derive(Clone)]
pub struct VerificationKey {
	/// Key identifier (`kid`).
	pub kid: Option<String>,
	/// Declared algorithm (`alg`); `None` matches any algorithm.
	pub algorithm: Option<String>,
	verifier: Arc<dyn SignatureVerifier>,
}
impl VerificationKey {
	/// Creates a key from its identifier, declared algorithm, and verifier.
	pub fn new(
		kid: Option<String>,
		algorithm: Option<String>,
		verifier: Arc<dyn SignatureVerifier>,
	) -> Self {
		Self { kid, algorithm, verifier }
	}

	/// Builds a key from a JWK object. Keys that fail to parse are kept and report
	/// [`VerifyError::MalformedKey`].
	pub fn from_jwk_value(value: &JsonValue) -> Self {
		let text = |name: &str| value.get(name).and_then(JsonValue::as_str).map(str::to_owned);

		Self {
			kid: text("kid"),
			algorithm: text("alg"),
			verifier: Arc::new(JwkVerifier::from_value(value)),
		}
	}

	/// Runs the verifier.
	pub fn verify(
		&self,
		algorithm: &str,
		message: &[u8],
		signature: &str,
	) -> Result<bool, VerifyError> {
		self.verifier.verify(algorithm, message, signature)
	}
}
impl Debug for VerificationKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VerificationKey")
			.field("kid", &self.kid)
			.field("algorithm", &self.algorithm)
			.finish_non_exhaustive()
	}
}

/// Ordered collection of verification keys.
#[derive(Clone, Debug, Default)]
pub struct KeySet {
	keys: Vec<VerificationKey>,
}
impl KeySet {
	/// Creates a key set from keys in lookup order.
	pub fn new(keys: Vec<VerificationKey>) -> Self {
		Self { keys }
	}

	/// Parses a JWKS document (`{"keys":[...]}`).
	pub fn from_jwks(document: &JsonValue) -> Option<Self> {
		let keys = document.get("keys")?.as_array()?;

		Some(Self::new(keys.iter().map(VerificationKey::from_jwk_value).collect()))
	}

	/// First key whose id equals `kid` and whose declared algorithm, if any, equals `alg`.
	pub fn find(&self, kid: Option<&str>, alg: Option<&str>) -> Option<&VerificationKey> {
		self.keys.iter().find(|key| {
			key.kid.as_deref() == kid
				&& key.algorithm.as_deref().is_none_or(|declared| Some(declared) == alg)
		})
	}

	/// Number of keys.
	pub fn len(&self) -> usize {
		self.keys.len()
	}

	/// Returns `true` when the set holds no keys.
	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}
}

/// [`SignatureVerifier`] backed by a JSON Web Key.
pub struct JwkVerifier {
	key: Option<(DecodingKey, KeyFamily)>,
}
impl JwkVerifier {
	/// Parses a JWK; malformed keys produce a verifier that always reports
	/// [`VerifyError::MalformedKey`].
	pub fn from_value(value: &JsonValue) -> Self {
		let key = serde_json::from_value::<Jwk>(value.clone()).ok().and_then(|jwk| {
			let family = KeyFamily::of(&jwk.algorithm);

			DecodingKey::from_jwk(&jwk).ok().map(|key| (key, family))
		});

		Self { key }
	}
}
impl SignatureVerifier for JwkVerifier {
	fn verify(
		&self,
		algorithm: &str,
		message: &[u8],
		signature: &str,
	) -> Result<bool, VerifyError> {
		let Some((key, family)) = &self.key else {
			return Err(VerifyError::MalformedKey);
		};
		let algorithm =
			Algorithm::from_str(algorithm).map_err(|_| VerifyError::UnsupportedAlgorithm)?;

		// The decoding key only holds bytes for its own family.
		if KeyFamily::for_algorithm(algorithm) != *family {
			return Err(VerifyError::UnsupportedAlgorithm);
		}

		match jsonwebtoken::crypto::verify(signature, message, key, algorithm) {
			Ok(valid) => Ok(valid),
			Err(e) => match e.kind() {
				ErrorKind::InvalidEcdsaKey
				| ErrorKind::InvalidRsaKey(_)
				| ErrorKind::InvalidKeyFormat => Err(VerifyError::MalformedKey),
				ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName =>
					Err(VerifyError::UnsupportedAlgorithm),
				_ => Ok(false),
			},
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyFamily {
	Hmac,
	Rsa,
	EllipticCurve,
	Edwards,
}
impl KeyFamily {
	fn of(parameters: &AlgorithmParameters) -> Self {
		match parameters {
			AlgorithmParameters::OctetKey(_) => Self::Hmac,
			AlgorithmParameters::RSA(_) => Self::Rsa,
			AlgorithmParameters::EllipticCurve(_) => Self::EllipticCurve,
			_ => Self::Edwards,
		}
	}

	fn for_algorithm(algorithm: Algorithm) -> Self {
		match algorithm {
			Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Self::Hmac,
			Algorithm::ES256 | Algorithm::ES384 => Self::EllipticCurve,
			Algorithm::EdDSA => Self::Edwards,
			_ => Self::Rsa,
		}
	}
}

/// Fetches and parses the key set published at `url`.
pub(crate) async fn fetch_key_set<C, M>(http_client: &C, mapper: &M, url: &Url) -> Result<KeySet>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let request = http::get_request(url, RequestAuth::None)?;
	let response = http::send(http_client, mapper, ProviderEndpoint::Jwks, request).await?;
	let document = http::read_json(ProviderEndpoint::Jwks, &response)?;

	KeySet::from_jwks(&document).ok_or_else(|| Error::InvalidResponse {
		endpoint: ProviderEndpoint::Jwks,
		reason: "document has no `keys` array".into(),
	})
}

#[derive(Clone, Debug)]
struct CachedKeySet {
	keys: Arc<KeySet>,
	fetched_at: OffsetDateTime,
}

/// Key sets cached per JWKS URL with a TTL.
///
/// Concurrent misses for one URL share a single fetch.
#[derive(Debug)]
pub struct KeySetCache {
	ttl: Duration,
	entries: Mutex<HashMap<Url, CachedKeySet>>,
	guards: Mutex<HashMap<Url, Arc<AsyncMutex<()>>>>,
}
impl KeySetCache {
	/// Creates a cache whose entries live for `ttl`.
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, entries: Default::default(), guards: Default::default() }
	}

	/// Returns the cached key set for `url` or runs `fetch` once to fill it.
	pub async fn get_or_fetch<F, Fut>(&self, url: &Url, fetch: F) -> Result<Arc<KeySet>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<KeySet>>,
	{
		if let Some(keys) = self.fresh(url, OffsetDateTime::now_utc()) {
			return Ok(keys);
		}

		let guard = self.guard(url);
		let _singleflight = guard.lock().await;

		if let Some(keys) = self.fresh(url, OffsetDateTime::now_utc()) {
			return Ok(keys);
		}

		let keys = Arc::new(fetch().await?);

		self.entries.lock().insert(
			url.clone(),
			CachedKeySet { keys: keys.clone(), fetched_at: OffsetDateTime::now_utc() },
		);

		Ok(keys)
	}

	/// Drops the cached entry for `url`.
	pub fn invalidate(&self, url: &Url) {
		self.entries.lock().remove(url);
	}

	fn fresh(&self, url: &Url, now: OffsetDateTime) -> Option<Arc<KeySet>> {
		self.entries
			.lock()
			.get(url)
			.filter(|entry| entry.fetched_at + self.ttl > now)
			.map(|entry| entry.keys.clone())
	}

	fn guard(&self, url: &Url) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(url.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use base64::{Engine as _, engine::general_purpose::STANDARD};
	use jsonwebtoken::{EncodingKey, Header};
	// self
	use super::*;

	const SECRET: &[u8] = b"mobile-connect-signing-key-001";

	fn oct_jwk(kid: &str) -> JsonValue {
		serde_json::json!({
			"kty": "oct",
			"kid": kid,
			"alg": "HS256",
			"k": STANDARD.encode(SECRET),
		})
	}

	fn signed(header: &Header) -> (String, String) {
		let token = jsonwebtoken::encode(
			header,
			&serde_json::json!({ "sub": "abc" }),
			&EncodingKey::from_secret(SECRET),
		)
		.expect("Token should sign.");
		let (signing_input, signature) =
			token.rsplit_once('.').expect("Compact tokens have three segments.");

		(signing_input.to_owned(), signature.to_owned())
	}

	#[test]
	fn lookup_matches_kid_and_declared_algorithm() {
		let jwks = serde_json::json!({ "keys": [oct_jwk("k1"), { "kid": "k2", "kty": "RSA" }] });
		let set = KeySet::from_jwks(&jwks).expect("JWKS fixture should parse.");

		assert_eq!(set.len(), 2);
		assert!(set.find(Some("k1"), Some("HS256")).is_some());
		assert!(set.find(Some("k1"), Some("RS256")).is_none());
		assert!(set.find(Some("k2"), Some("RS256")).is_some(), "Keys without alg match any.");
		assert!(set.find(Some("k3"), Some("HS256")).is_none());
	}

	#[test]
	fn hmac_jwk_verifies_and_rejects() {
		let key = VerificationKey::from_jwk_value(&oct_jwk("k1"));
		let (input, signature) = signed(&Header::new(Algorithm::HS256));

		assert_eq!(key.verify("HS256", input.as_bytes(), &signature), Ok(true));
		assert_eq!(key.verify("HS256", b"tampered.input", &signature), Ok(false));
		assert_eq!(
			key.verify("RS256", input.as_bytes(), &signature),
			Err(VerifyError::UnsupportedAlgorithm)
		);
		assert_eq!(
			key.verify("none", input.as_bytes(), &signature),
			Err(VerifyError::UnsupportedAlgorithm)
		);
	}

	#[test]
	fn malformed_keys_report_malformed() {
		let key = VerificationKey::from_jwk_value(
			&serde_json::json!({ "kid": "bad", "kty": "RSA", "n": 5 }),
		);

		assert_eq!(key.kid.as_deref(), Some("bad"));
		assert_eq!(key.verify("RS256", b"a.b", "c"), Err(VerifyError::MalformedKey));
	}

	#[tokio::test]
	async fn cache_fetches_once_within_ttl() {
		let cache = KeySetCache::new(Duration::minutes(10));
		let url = Url::parse("https://operator.example.com/jwks")
			.expect("JWKS URL fixture should parse.");
		let calls = AtomicUsize::new(0);

		for _ in 0..3 {
			let keys = cache
				.get_or_fetch(&url, || async {
					calls.fetch_add(1, Ordering::SeqCst);

					Ok(KeySet::new(vec![VerificationKey::from_jwk_value(&oct_jwk("k1"))]))
				})
				.await
				.expect("Fetch should succeed.");

			assert_eq!(keys.len(), 1);
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);

		cache.invalidate(&url);

		let failed = cache
			.get_or_fetch(&url, || async {
				Err(Error::InvalidResponse {
					endpoint: ProviderEndpoint::Jwks,
					reason: "down".into(),
				})
			})
			.await;

		assert!(failed.is_err());
	}
}
