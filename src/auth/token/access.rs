//! Short-lived access tokens, their validity predicate, and the token-endpoint payload.

// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Access token minted by a refresh or authorization-code exchange.
///
/// The expiry is always absolute: it is computed once, at receipt time, from the
/// endpoint's relative `expires_in`. The serialized form keeps the field names the
/// API returns (`access_token`, `scope`, `token_type`) and stores `expires_at` as
/// Unix milliseconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
	/// Bearer credential attached to API requests.
	#[serde(rename = "access_token")]
	pub value: TokenSecret,
	/// Instant after which the token must no longer be used.
	#[serde(with = "unix_millis")]
	pub expires_at: OffsetDateTime,
	/// Scope string granted by the token endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Token type reported by the token endpoint (usually `Bearer`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
}
impl AccessToken {
	/// Creates a token that expires at the provided instant.
	pub fn new(value: impl Into<TokenSecret>, expires_at: OffsetDateTime) -> Self {
		Self { value: value.into(), expires_at, scope: None, token_type: None }
	}

	/// Converts a token-endpoint payload into an access token received at `received_at`.
	pub fn from_response(response: &TokenResponse, received_at: OffsetDateTime) -> Result<Self> {
		if response.access_token.is_empty() {
			return Err(ConfigError::EmptyTokenResponse.into());
		}

		let expires_in = response.expires_in.ok_or(ConfigError::MissingExpiresIn)?;

		if expires_in <= 0 {
			return Err(ConfigError::NonPositiveExpiresIn.into());
		}

		let expires_at = received_at
			.checked_add(Duration::seconds(expires_in))
			.ok_or(ConfigError::ExpiresInOutOfRange)?;
		// Stored expiries carry millisecond precision; match it so a token reads back equal.
		let expires_at = expires_at
			.replace_millisecond(expires_at.millisecond())
			.map_err(|_| ConfigError::ExpiresInOutOfRange)?;

		Ok(Self {
			value: response.access_token.clone(),
			expires_at,
			scope: response.scope.clone(),
			token_type: response.token_type.clone(),
		})
	}

	/// Returns `true` if the token carries a value and has not expired at `now`.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		!self.value.is_empty() && self.expires_at > now
	}

	/// Returns `true` if the token is usable relative to the current UTC clock.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("value", &self.value)
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Returns `true` iff a token is present and has not passed its expiry at `now`.
///
/// Absent and expired tokens are indistinguishable here; both mean "refresh".
pub fn is_valid_token_at(token: Option<&AccessToken>, now: OffsetDateTime) -> bool {
	token.is_some_and(|token| token.is_valid_at(now))
}

/// [`is_valid_token_at`] evaluated against the current UTC clock.
pub fn is_valid_token(token: Option<&AccessToken>) -> bool {
	is_valid_token_at(token, OffsetDateTime::now_utc())
}

/// Payload returned by `POST oauth/token`.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Newly minted access token.
	pub access_token: TokenSecret,
	/// Lifetime in seconds relative to receipt.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Refresh token; present on authorization-code exchanges and optional on refreshes.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
	/// Granted scope string.
	#[serde(default)]
	pub scope: Option<String>,
	/// Token type (usually `Bearer`).
	#[serde(default)]
	pub token_type: Option<String>,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &self.access_token)
			.field("expires_in", &self.expires_in)
			.field("refresh_token", &self.refresh_token)
			.field("scope", &self.scope)
			.field("token_type", &self.token_type)
			.finish()
	}
}

mod unix_millis {
	// crates.io
	use serde::{de::Error as _, ser::Error as _};
	// self
	use super::*;

	pub fn serialize<S>(instant: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let millis = i64::try_from(instant.unix_timestamp_nanos() / 1_000_000)
			.map_err(S::Error::custom)?;

		serializer.serialize_i64(millis)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let millis = i64::deserialize(deserializer)?;

		OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
			.map_err(D::Error::custom)
	}
}
