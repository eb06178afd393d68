//! Request authorization and the credential lifecycle around it.

pub mod refresh;

pub use refresh::*;

// crates.io
use oauth2::http::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AccountContext, HEADER_DISABLE_ACCOUNT_HEADERS, TokenSecret},
	config::{AuthConfig, ClientConfig},
	error::ConfigError,
	http::HttpTransport,
	oauth::{TokenEndpoint, TokenExchange},
	store::TokenStore,
};

/// Authorization scheme used for private API tokens.
pub const SCHEME_PRIVATE: &str = "OAuth";
/// Authorization scheme used for OAuth access tokens.
pub const SCHEME_BEARER: &str = "Bearer";

/// Decides how each outgoing request is authorized and owns the session's credentials.
///
/// The authorizer, the refresh coordinator, and the response interpreter all share one
/// [`TokenStore`]; cloning a `MetryAuth` shares that store and the in-flight refresh state.
pub struct MetryAuth<T>
where
	T: ?Sized + HttpTransport,
{
	config: AuthConfig,
	store: TokenStore,
	endpoint: Arc<TokenEndpoint<T>>,
	refresh: Arc<RefreshCoordinator>,
}
impl<T> MetryAuth<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an authorizer that exchanges tokens at `client.base_url` through `http_client`.
	pub fn new(
		client: &ClientConfig,
		config: AuthConfig,
		store: TokenStore,
		http_client: impl Into<Arc<T>>,
	) -> Self {
		let endpoint = Arc::new(TokenEndpoint::new(client, config.clone(), http_client));
		let exchange: Arc<dyn TokenExchange> = endpoint.clone();
		let refresh = Arc::new(RefreshCoordinator::new(store.clone(), exchange));

		Self { config, store, endpoint, refresh }
	}

	/// OAuth configuration in effect.
	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	/// Credential store shared with the refresh coordinator and the API client.
	pub fn store(&self) -> &TokenStore {
		&self.store
	}

	/// Coordinator that serializes access-token refreshes.
	pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
		&self.refresh
	}

	/// URL to send the user to for an authorization code.
	pub fn authorize_url(&self) -> Result<Url> {
		self.endpoint.authorize_url()
	}

	/// Exchanges an authorization code and stores the resulting session.
	///
	/// The refresh token is written first (which clears any cached access token), then the
	/// freshly minted access token with its absolute expiry.
	pub async fn handle_auth_code(&self, code: &str) -> Result<AccessToken> {
		let response = self.endpoint.exchange_authorization_code(code).await?;
		let token = AccessToken::from_response(&response, OffsetDateTime::now_utc())?;

		self.store
			.set_session(response.refresh_token.as_ref().map(TokenSecret::expose), Some(&token))
			.await?;

		Ok(token)
	}

	/// Current private API token.
	pub async fn private_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.store.private_token().await?)
	}

	/// Sets or clears the private API token.
	pub async fn set_private_token(&self, token: Option<&str>) -> Result<()> {
		Ok(self.store.set_private_token(token).await?)
	}

	/// Current refresh token.
	pub async fn refresh_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.store.refresh_token().await?)
	}

	/// Sets or clears the refresh token; the cached access token is always cleared.
	pub async fn set_refresh_token(&self, token: Option<&str>) -> Result<()> {
		Ok(self.store.set_refresh_token(token).await?)
	}

	/// Cached access token, valid or not.
	pub async fn access_token(&self) -> Result<Option<AccessToken>> {
		Ok(self.store.access_token().await?)
	}

	/// Replaces or clears the cached access token.
	pub async fn set_access_token(&self, token: Option<&AccessToken>) -> Result<()> {
		Ok(self.store.set_access_token(token).await?)
	}

	/// Current organization id.
	pub async fn organization(&self) -> Result<Option<String>> {
		Ok(self.store.organization().await?)
	}

	/// Sets or clears the organization id sent as `X-Organization`.
	pub async fn set_organization(&self, organization: Option<&str>) -> Result<()> {
		Ok(self.store.set_organization(organization).await?)
	}

	/// Current subaccount id.
	pub async fn subaccount(&self) -> Result<Option<String>> {
		Ok(self.store.subaccount().await?)
	}

	/// Sets or clears the subaccount id sent as `X-Subaccount`.
	pub async fn set_subaccount(&self, subaccount: Option<&str>) -> Result<()> {
		Ok(self.store.set_subaccount(subaccount).await?)
	}

	/// Organization and subaccount read together.
	pub async fn account_context(&self) -> Result<AccountContext> {
		Ok(self.store.account_context().await?)
	}

	/// Returns `true` when a private or refresh token is stored.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.store.private_token().await?.is_some() || self.store.refresh_token().await?.is_some())
	}

	/// Returns a valid access token, refreshing with the stored refresh token when needed.
	pub async fn ensure_access_token(&self) -> Result<AccessToken> {
		let refresh_token = self.store.refresh_token().await?.ok_or(Error::NoCredential)?;

		self.refresh.ensure_access_token(refresh_token.expose()).await
	}

	/// Merges the account-context headers into `headers`.
	///
	/// Nothing is added when `X-Disable-Metry-Headers` is present, and a header the caller
	/// already set is never overwritten.
	pub async fn apply_account_headers(&self, headers: &mut HeaderMap) -> Result<()> {
		if headers.contains_key(HEADER_DISABLE_ACCOUNT_HEADERS) {
			return Ok(());
		}

		let context = self.store.account_context().await?;

		for (name, value) in context.header_pairs() {
			if headers.contains_key(name) {
				continue;
			}

			headers.insert(header_name(name)?, header_value(name, value)?);
		}

		Ok(())
	}

	/// Attaches account headers and credentials to `request`.
	///
	/// A private token always wins and skips the refresh machinery. With authorization
	/// disabled the request passes through with only the account headers. Otherwise the
	/// request waits for a valid access token, failing with [`Error::NoCredential`] when no
	/// refresh token is stored or [`Error::RefreshFailed`] when the exchange fails.
	pub async fn authorize(&self, mut request: HttpRequest) -> Result<HttpRequest> {
		self.apply_account_headers(request.headers_mut()).await?;

		if let Some(token) = self.store.private_token().await? {
			set_authorization(request.headers_mut(), SCHEME_PRIVATE, &token)?;

			return Ok(request);
		}
		if self.config.disabled {
			return Ok(request);
		}

		let token = self.ensure_access_token().await?;

		set_authorization(request.headers_mut(), SCHEME_BEARER, &token.value)?;

		Ok(request)
	}
}
impl<T> Clone for MetryAuth<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			store: self.store.clone(),
			endpoint: self.endpoint.clone(),
			refresh: self.refresh.clone(),
		}
	}
}
impl<T> Debug for MetryAuth<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MetryAuth")
			.field("config", &self.config)
			.field("endpoint", &self.endpoint)
			.field("refresh", &self.refresh)
			.finish()
	}
}

fn set_authorization(headers: &mut HeaderMap, scheme: &str, token: &TokenSecret) -> Result<()> {
	let mut value = header_value(AUTHORIZATION.as_str(), &format!("{scheme} {}", token.expose()))?;

	value.set_sensitive(true);
	headers.insert(AUTHORIZATION, value);

	Ok(())
}

fn header_name(name: &str) -> Result<HeaderName, ConfigError> {
	HeaderName::from_bytes(name.as_bytes())
		.map_err(|_| ConfigError::InvalidHeaderValue { name: name.to_owned() })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
	HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeaderValue { name: name.to_owned() })
}
