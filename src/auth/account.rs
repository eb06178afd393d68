//! Account context (organization/subaccount) attached to API requests as headers.

// self
use crate::_prelude::*;

/// Header carrying the active organization id.
pub const HEADER_ORGANIZATION: &str = "X-Organization";
/// Header carrying the active subaccount id.
pub const HEADER_SUBACCOUNT: &str = "X-Subaccount";
/// Marker header that suppresses [`HEADER_ORGANIZATION`] and [`HEADER_SUBACCOUNT`].
pub const HEADER_DISABLE_ACCOUNT_HEADERS: &str = "X-Disable-Metry-Headers";

/// Organization and subaccount the session acts on behalf of.
///
/// These are not credentials, but they live in the same store and share its lifecycle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContext {
	/// Organization id sent as `X-Organization`.
	pub organization: Option<String>,
	/// Subaccount id sent as `X-Subaccount`.
	pub subaccount: Option<String>,
}
impl AccountContext {
	/// Returns `true` if neither header would be sent.
	pub fn is_empty(&self) -> bool {
		self.header_pairs().next().is_none()
	}

	/// Header name/value pairs for every non-empty field, subaccount first.
	pub fn header_pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
		[
			(HEADER_SUBACCOUNT, self.subaccount.as_deref()),
			(HEADER_ORGANIZATION, self.organization.as_deref()),
		]
		.into_iter()
		.filter_map(|(name, value)| value.filter(|v| !v.is_empty()).map(|v| (name, v)))
	}
}
