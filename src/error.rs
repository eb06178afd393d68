//! Client-level error types shared across authorization, storage, and API calls.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Authorization is enabled but neither a private nor a refresh token is stored.
	#[error("Request authorization is enabled, but no private or refresh token was found.")]
	NoCredential,
	/// The refresh-token exchange failed; every caller waiting on it receives the same reason.
	#[error("Fetching an access token failed: {reason}.")]
	RefreshFailed {
		/// Human-readable failure summary shared by all waiters.
		reason: String,
	},
	/// The API answered 401; the stored private token has been cleared.
	#[error("The API rejected the request credentials.")]
	AuthenticationRejected {
		/// Raw response body, when the API sent one.
		body: Option<JsonValue>,
	},
	/// Any other non-2xx API response.
	#[error("The API responded with status {status}.")]
	Upstream {
		/// HTTP status code.
		status: u16,
		/// Structured `data.errors` payload when present, otherwise the raw body.
		body: Option<JsonValue>,
	},
}
impl Error {
	/// Builds a [`Error::RefreshFailed`] from any displayable reason.
	pub fn refresh_failed(reason: impl Display) -> Self {
		Self::RefreshFailed { reason: reason.to_string() }
	}

	/// Returns the HTTP status attached to API failures.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AuthenticationRejected { .. } => Some(401),
			Self::Upstream { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Returns the error payload attached to API failures.
	pub fn body(&self) -> Option<&JsonValue> {
		match self {
			Self::AuthenticationRejected { body } | Self::Upstream { body, .. } => body.as_ref(),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A header value contains characters HTTP does not allow.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeaderValue {
		/// Offending header name.
		name: String,
	},
	/// Base URL cannot carry path segments (e.g. `mailto:`).
	#[error("Base URL `{url}` cannot be used as an API root.")]
	InvalidBaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// Token exchanges require a client identifier.
	#[error("A client_id is required for token exchanges.")]
	MissingClientId,
	/// Request body could not be encoded as JSON.
	#[error("Request body could not be encoded as JSON.")]
	RequestBody(#[source] serde_json::Error),

	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint responded with JSON that does not match the token contract.
	#[error("Token endpoint returned a malformed token response.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint returned an empty body or an empty access token.
	#[error("Token endpoint returned an empty token response.")]
	EmptyTokenResponse,
	/// Period strings must start with a four-digit year followed by two-digit components.
	#[error("Period `{period}` is invalid.")]
	InvalidPeriod {
		/// Period that failed to parse.
		period: String,
	},
	/// Timestamp is neither RFC 3339 nor ISO 8601 with a compact `+HHMM` offset.
	#[error("Timestamp `{timestamp}` is invalid.")]
	InvalidTimestamp {
		/// Timestamp that failed to parse.
		timestamp: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, undecodable bodies).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
	/// Response body was not valid JSON.
	#[error("Response body with status {status} is not valid JSON.")]
	InvalidBody {
		/// HTTP status of the undecodable response.
		status: u16,
		/// Decoder failure.
		#[source]
		source: serde_json::Error,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn api_errors_expose_status_and_body() {
		let body = serde_json::json!({ "code": 404 });
		let err = Error::Upstream { status: 404, body: Some(body.clone()) };

		assert_eq!(err.status(), Some(404));
		assert_eq!(err.body(), Some(&body));
		assert_eq!(Error::AuthenticationRejected { body: None }.status(), Some(401));
		assert_eq!(Error::NoCredential.status(), None);
	}

	#[test]
	fn refresh_failed_keeps_reason_in_message() {
		let err = Error::refresh_failed("token endpoint returned 500");

		assert_eq!(err.to_string(), "Fetching an access token failed: token endpoint returned 500.");
	}
}
