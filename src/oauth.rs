//! Token endpoint wire contract (`POST oauth/token`) and the authorization URL.
//!
//! Request bodies are JSON objects; fields the configuration leaves unset are omitted
//! rather than sent as `null`.

// self
use crate::{
	_prelude::*,
	auth::TokenResponse,
	config::{AuthConfig, ClientConfig},
	error::{ConfigError, TransportError},
	http::{self, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Token endpoint path relative to the base URL.
pub const PATH_TOKEN: &str = "oauth/token";
/// Authorization endpoint path relative to the base URL.
pub const PATH_AUTHORIZE: &str = "oauth/authorize";
/// Fixed `state` value sent with authorization-code requests.
pub const AUTH_STATE: &str = "mryAuth";

/// Boxed future returned by [`TokenExchange`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenResponse>> + 'a + Send>>;

/// Grant types the client sends to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// Authorization code exchange.
	AuthorizationCode,
	/// Refresh token exchange.
	RefreshToken,
}
impl GrantType {
	/// Wire value of the `grant_type` field.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Mints access tokens from refresh tokens.
///
/// [`TokenEndpoint`] is the production implementation; the seam exists so the refresh
/// coordinator can be driven by any exchange (tests substitute gated fakes).
pub trait TokenExchange
where
	Self: Send + Sync,
{
	/// Performs one `grant_type=refresh_token` exchange.
	fn exchange_refresh_token<'a>(&'a self, refresh_token: &'a str) -> ExchangeFuture<'a>;
}

/// Client for the API's OAuth token endpoint.
pub struct TokenEndpoint<T>
where
	T: ?Sized + HttpTransport,
{
	http_client: Arc<T>,
	base_url: Url,
	config: AuthConfig,
}
impl<T> TokenEndpoint<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an endpoint client rooted at `client.base_url`.
	pub fn new(client: &ClientConfig, config: AuthConfig, http_client: impl Into<Arc<T>>) -> Self {
		Self { http_client: http_client.into(), base_url: client.base_url.clone(), config }
	}

	/// OAuth configuration used for exchanges.
	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	/// URL the application should send the user to in order to obtain an authorization code.
	pub fn authorize_url(&self) -> Result<Url> {
		authorize_url(&self.base_url, &self.config)
	}

	/// Exchanges an authorization code for a refresh/access token pair.
	pub async fn exchange_authorization_code(&self, code: &str) -> Result<TokenResponse> {
		let mut body = self.client_fields(GrantType::AuthorizationCode)?;

		body.insert("code".into(), code.into());
		body.insert("state".into(), AUTH_STATE.into());

		if let Some(redirect_uri) = self.config.redirect_uri.as_deref() {
			body.insert("redirect_uri".into(), redirect_uri.into());
		}

		self.post_token_request(FlowKind::AuthorizationCode, body).await
	}

	/// Exchanges a refresh token for a fresh access token.
	pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
		let mut body = self.client_fields(GrantType::RefreshToken)?;

		body.insert("refresh_token".into(), refresh_token.into());

		self.post_token_request(FlowKind::Refresh, body).await
	}

	fn client_fields(&self, grant: GrantType) -> Result<JsonMap<String, JsonValue>> {
		let mut body = JsonMap::new();

		body.insert("grant_type".into(), grant.as_str().into());
		body.insert("client_id".into(), self.config.require_client_id()?.into());

		if let Some(secret) = self.config.client_secret.as_deref() {
			body.insert("client_secret".into(), secret.into());
		}

		body.insert("scope".into(), self.config.scope_or_default().into());

		Ok(body)
	}

	async fn post_token_request(
		&self,
		kind: FlowKind,
		body: JsonMap<String, JsonValue>,
	) -> Result<TokenResponse> {
		let span = FlowSpan::new(kind, "token_endpoint");

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = http::make_url(&self.base_url, [PATH_TOKEN], http::no_params())?;
				let request = http::json_request(
					Method::POST,
					&url,
					&HeaderMap::new(),
					Some(&JsonValue::Object(body)),
				)?;
				let response =
					self.http_client.send(request).await.map_err(TransportError::network)?;

				parse_token_response(&response)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
		}

		result
	}
}
impl<T> TokenExchange for TokenEndpoint<T>
where
	T: ?Sized + HttpTransport,
{
	fn exchange_refresh_token<'a>(&'a self, refresh_token: &'a str) -> ExchangeFuture<'a> {
		Box::pin(self.refresh(refresh_token))
	}
}
impl<T> Debug for TokenEndpoint<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint")
			.field("base_url", &self.base_url.as_str())
			.field("config", &self.config)
			.finish()
	}
}

/// Builds `{base_url}/oauth/authorize?...` with the parameters the API expects.
pub fn authorize_url(base_url: &Url, config: &AuthConfig) -> Result<Url> {
	let mut params = Vec::with_capacity(7);

	if let Some(secret) = config.client_secret.as_deref() {
		params.push(("client_secret", secret));
	}
	if let Some(client_id) = config.client_id.as_deref() {
		params.push(("client_id", client_id));
	}
	if let Some(redirect_uri) = config.redirect_uri.as_deref() {
		params.push(("redirect_uri", redirect_uri));
	}

	params.push(("grant_type", GrantType::AuthorizationCode.as_str()));
	params.push(("response_type", "code"));
	params.push(("state", AUTH_STATE));
	params.push(("scope", config.scope_or_default()));

	http::make_url(base_url, [PATH_AUTHORIZE], params)
}

/// Decodes a token endpoint response, rejecting non-2xx statuses and empty payloads.
pub fn parse_token_response(response: &HttpResponse) -> Result<TokenResponse> {
	let status = response.status();

	if !status.is_success() {
		return Err(Error::Upstream { status: status.as_u16(), body: http::json_body(response)? });
	}

	let body = response.body();

	if body.iter().all(u8::is_ascii_whitespace) || body == b"null" {
		return Err(ConfigError::EmptyTokenResponse.into());
	}

	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let token: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ConfigError::TokenResponseParse { source })?;

	if token.access_token.is_empty() {
		return Err(ConfigError::EmptyTokenResponse.into());
	}

	Ok(token)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Fixture status should be valid.");

		response
	}

	#[test]
	fn authorize_url_carries_every_parameter() {
		let base = Url::parse("http://dummy.local").expect("Fixture base URL should parse.");
		let config = AuthConfig::new("testClientID")
			.with_client_secret("testClientSecret")
			.with_redirect_uri("http://dummier.local/path");
		let url = authorize_url(&base, &config).expect("Authorization URL should build.");
		let pairs = url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();

		assert_eq!(url.path(), "/oauth/authorize");
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("testClientID"));
		assert_eq!(pairs.get("client_secret").map(String::as_str), Some("testClientSecret"));
		assert_eq!(pairs.get("redirect_uri").map(String::as_str), Some("http://dummier.local/path"));
		assert_eq!(pairs.get("grant_type").map(String::as_str), Some("authorization_code"));
		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(pairs.get("state").map(String::as_str), Some("mryAuth"));
		assert_eq!(pairs.get("scope").map(String::as_str), Some("basic"));
	}

	#[test]
	fn token_response_parses_standard_payload() {
		let token = parse_token_response(&response(
			200,
			r#"{"access_token":"abc","expires_in":3600,"refresh_token":"r","scope":"basic","token_type":"Bearer"}"#,
		))
		.expect("Standard token payload should parse.");

		assert_eq!(token.access_token.expose(), "abc");
		assert_eq!(token.expires_in, Some(3600));
		assert_eq!(token.refresh_token.as_ref().map(|t| t.expose()), Some("r"));
	}

	#[test]
	fn empty_and_null_payloads_are_rejected() {
		for body in ["", "null", r#"{"access_token":""}"#] {
			let err = parse_token_response(&response(200, body))
				.expect_err("Empty token payloads must be rejected.");

			assert!(matches!(err, Error::Config(ConfigError::EmptyTokenResponse)), "{body}: {err}");
		}
	}

	#[test]
	fn malformed_payload_reports_the_failing_path() {
		let err = parse_token_response(&response(200, r#"{"access_token":"a","expires_in":"soon"}"#))
			.expect_err("String expires_in must be rejected.");

		match err {
			Error::Config(ConfigError::TokenResponseParse { source }) =>
				assert_eq!(source.path().to_string(), "expires_in"),
			other => panic!("Unexpected error: {other}."),
		}
	}

	#[test]
	fn non_success_status_surfaces_upstream_error() {
		let err = parse_token_response(&response(400, r#"{"error":"invalid_grant"}"#))
			.expect_err("400 must be rejected.");

		assert_eq!(err.status(), Some(400));
	}
}
