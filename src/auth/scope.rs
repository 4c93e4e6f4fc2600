//! Scope handling for authorization requests.

// std
use std::slice::Iter;
// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::_prelude::*;

/// Scope value every OpenID Connect authorization request must carry.
pub const OPENID_SCOPE: &str = "openid";

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Deduplicated scope list that keeps the caller's order.
///
/// Providers compare the `scope` parameter loosely, but some log it verbatim, so the first
/// occurrence of each value keeps its position. [`ScopeSet::with_openid`] guarantees the
/// `openid` value is present without reordering the rest.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet {
	scopes: Arc<[String]>,
}
impl ScopeSet {
	/// Creates a scope list from individual values.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut normalized = Vec::<String>::new();

		for scope in scopes {
			let owned: String = scope.into();

			if owned.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if owned.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
			}
			if !normalized.contains(&owned) {
				normalized.push(owned);
			}
		}

		Ok(Self { scopes: Arc::from(normalized) })
	}

	/// Parses a space-delimited scope string. Blank input yields an empty list.
	pub fn parse(raw: &str) -> Self {
		let mut normalized = Vec::<String>::new();

		for scope in raw.split_whitespace() {
			if !normalized.iter().any(|known| known == scope) {
				normalized.push(scope.to_owned());
			}
		}

		Self { scopes: Arc::from(normalized) }
	}

	/// Returns a copy guaranteed to contain `openid`, prepended when missing.
	pub fn with_openid(&self) -> Self {
		if self.contains(OPENID_SCOPE) {
			return self.clone();
		}

		let scopes = std::iter::once(OPENID_SCOPE.to_owned())
			.chain(self.scopes.iter().cloned())
			.collect::<Vec<_>>();

		Self { scopes: Arc::from(scopes) }
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.scopes.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.scopes.is_empty()
	}

	/// Returns true if the list contains the provided scope (case-insensitive).
	pub fn contains(&self, scope: &str) -> bool {
		self.scopes.iter().any(|candidate| candidate.eq_ignore_ascii_case(scope))
	}

	/// Iterator over scopes in request order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.scopes.iter().map(|s| s.as_str())
	}

	/// Returns the space-delimited representation.
	pub fn normalized(&self) -> String {
		self.scopes.join(" ")
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.scopes).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self::parse(s))
	}
}

/// Iterator over scope strings.
pub struct ScopeIter<'a> {
	inner: Iter<'a, String>,
}
impl<'a> Iterator for ScopeIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|s| s.as_str())
	}
}
impl<'a> IntoIterator for &'a ScopeSet {
	type IntoIter = ScopeIter<'a>;
	type Item = &'a str;

	fn into_iter(self) -> Self::IntoIter {
		ScopeIter { inner: self.scopes.iter() }
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.normalized())
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Ok(Self::parse(&raw))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parse_keeps_first_occurrence_order() {
		let scopes = ScopeSet::parse("  mc_authn profile  mc_authn openid ");

		assert_eq!(scopes.iter().collect::<Vec<_>>(), vec!["mc_authn", "profile", "openid"]);
		assert_eq!(scopes.normalized(), "mc_authn profile openid");
	}

	#[test]
	fn openid_is_added_once() {
		let scopes = ScopeSet::parse("mc_identity_phonenumber").with_openid();

		assert_eq!(scopes.normalized(), "openid mc_identity_phonenumber");
		assert_eq!(scopes.with_openid(), scopes);
		assert_eq!(ScopeSet::parse("OpenID").with_openid().normalized(), "OpenID");
		assert_eq!(ScopeSet::default().with_openid().normalized(), "openid");
	}

	#[test]
	fn invalid_scope_entries_error() {
		assert_eq!(ScopeSet::new([""]), Err(ScopeValidationError::Empty));
		assert!(matches!(
			ScopeSet::new(["contains space"]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
	}

	#[test]
	fn serde_uses_space_delimited_string() {
		let scopes = ScopeSet::new(["openid", "profile"]).expect("Scope list should be valid.");
		let json = serde_json::to_string(&scopes).expect("Scope list should serialize.");

		assert_eq!(json, "\"openid profile\"");

		let back: ScopeSet = serde_json::from_str(&json).expect("Scope list should deserialize.");

		assert_eq!(back, scopes);
	}
}
