//! Client and OAuth configuration.

// self
use crate::{_prelude::*, error::ConfigError};

/// Scope requested when [`AuthConfig::scope`] is unset.
pub const DEFAULT_SCOPE: &str = "basic";
/// API path prefix used when [`ClientConfig::api_path`] is not overridden.
pub const DEFAULT_API_PATH: &str = "api/v2";

/// OAuth client settings used by token exchanges and the authorization URL.
///
/// Deserializes from camelCase JSON (`clientId`, `redirectUri`, ...) so configuration
/// files shared with other Metry SDKs load unchanged.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
	/// Skip request authorization entirely; the host manages auth (e.g. session cookies).
	pub disabled: bool,
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<String>,
	/// Redirect URI registered for the authorization-code flow.
	pub redirect_uri: Option<String>,
	/// Requested scope; defaults to [`DEFAULT_SCOPE`].
	pub scope: Option<String>,
}
impl AuthConfig {
	/// Creates an enabled configuration for `client_id`.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self { client_id: Some(client_id.into()), ..Default::default() }
	}

	/// Creates a configuration with request authorization turned off.
	pub fn disabled() -> Self {
		Self { disabled: true, ..Default::default() }
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the redirect URI.
	pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
		self.redirect_uri = Some(redirect_uri.into());

		self
	}

	/// Overrides the requested scope.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Toggles request authorization.
	pub fn with_disabled(mut self, disabled: bool) -> Self {
		self.disabled = disabled;

		self
	}

	/// Scope sent to the token endpoint, falling back to [`DEFAULT_SCOPE`].
	pub fn scope_or_default(&self) -> &str {
		self.scope.as_deref().filter(|scope| !scope.is_empty()).unwrap_or(DEFAULT_SCOPE)
	}

	/// Client id required by token exchanges.
	pub fn require_client_id(&self) -> Result<&str, ConfigError> {
		self.client_id.as_deref().filter(|id| !id.is_empty()).ok_or(ConfigError::MissingClientId)
	}
}
impl Debug for AuthConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthConfig")
			.field("disabled", &self.disabled)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri)
			.field("scope", &self.scope)
			.finish()
	}
}

/// Where the API lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
	/// Root URL; the token endpoint is `{base_url}/oauth/token`.
	pub base_url: Url,
	/// Path prefix for resource calls.
	#[serde(default = "default_api_path")]
	pub api_path: String,
}
impl ClientConfig {
	/// Creates a configuration rooted at `base_url` with the default API path.
	pub fn new(base_url: Url) -> Self {
		Self { base_url, api_path: default_api_path() }
	}

	/// Overrides the API path prefix.
	pub fn with_api_path(mut self, api_path: impl Into<String>) -> Self {
		self.api_path = api_path.into();

		self
	}

	/// Ensures the base URL can carry path segments.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.base_url.cannot_be_a_base() {
			Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() })
		} else {
			Ok(())
		}
	}
}

fn default_api_path() -> String {
	DEFAULT_API_PATH.into()
}
