//! Metry API client: authorizes, sends, and normalizes resource calls.

// self
use crate::{
	_prelude::*,
	config::{AuthConfig, ClientConfig},
	error::{ConfigError, TransportError},
	flows::MetryAuth,
	http::{self, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	resource::Resource,
	response::{Normalized, ResponseInterpreter},
	store::TokenStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestMetry = Metry<ReqwestHttpClient>;

/// One call against the API, relative to `{base_url}/{api_path}/`.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path below the API root; leading and trailing slashes are ignored.
	pub path: String,
	/// Query parameters in send order.
	pub query: Vec<(String, String)>,
	/// JSON body, sent with `Content-Type: application/json;charset=UTF-8`.
	pub body: Option<JsonValue>,
	/// Extra request headers; these win over account-context headers.
	pub headers: HeaderMap,
}
impl ApiRequest {
	/// Creates a request with no query, body, or headers.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			body: None,
			headers: HeaderMap::new(),
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: JsonValue) -> Self {
		self.body = Some(body);

		self
	}

	/// Applies per-call overrides.
	pub fn with_options(mut self, options: &RequestOptions) -> Self {
		if let Some(method) = &options.method {
			self.method = method.clone();
		}
		for (name, value) in &options.headers {
			self.headers.insert(name, value.clone());
		}

		self
	}
}

/// Per-call overrides accepted by the resource helpers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOptions {
	/// Replaces the helper's default method; also decides whether data goes in the body.
	pub method: Option<Method>,
	/// Headers added to the request.
	pub headers: HeaderMap,
}
impl RequestOptions {
	/// Overrides the HTTP method.
	pub fn with_method(mut self, method: Method) -> Self {
		self.method = Some(method);

		self
	}

	/// Adds a header.
	pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
		let header = HeaderName::from_bytes(name.as_bytes())
			.map_err(|_| ConfigError::InvalidHeaderValue { name: name.to_owned() })?;
		let value = HeaderValue::from_str(value)
			.map_err(|_| ConfigError::InvalidHeaderValue { name: name.to_owned() })?;

		self.headers.insert(header, value);

		Ok(self)
	}

	/// Suppresses the `X-Organization`/`X-Subaccount` headers for this call.
	pub fn without_account_headers(mut self) -> Self {
		self.headers.insert(
			HeaderName::from_static("x-disable-metry-headers"),
			HeaderValue::from_static("true"),
		);

		self
	}
}

/// Metry API client.
///
/// Every call is authorized by [`MetryAuth`], sent through the shared transport, and
/// normalized by [`ResponseInterpreter`]. Cloning is cheap and clones share credentials
/// and refresh state.
pub struct Metry<T>
where
	T: ?Sized + HttpTransport,
{
	config: ClientConfig,
	api_root: Url,
	http_client: Arc<T>,
	auth: MetryAuth<T>,
	interpreter: ResponseInterpreter,
}
impl<T> Metry<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client that reuses the caller-provided transport for token exchanges and
	/// API calls alike.
	pub fn with_http_client(
		config: ClientConfig,
		auth: AuthConfig,
		store: TokenStore,
		http_client: impl Into<Arc<T>>,
	) -> Result<Self> {
		config.validate()?;

		let http_client = http_client.into();
		let api_root =
			http::make_url(&config.base_url, [config.api_path.as_str()], http::no_params())?;
		let auth = MetryAuth::new(&config, auth, store.clone(), http_client.clone());
		let interpreter = ResponseInterpreter::new(store);

		Ok(Self { config, api_root, http_client, auth, interpreter })
	}

	/// Client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Authorizer owning the session's credentials.
	pub fn auth(&self) -> &MetryAuth<T> {
		&self.auth
	}

	/// Credential store shared by every component of this client.
	pub fn store(&self) -> &TokenStore {
		self.auth.store()
	}

	/// Resource helper rooted at `name` (e.g. `"meters"`).
	pub fn resource(&self, name: impl Into<String>) -> Resource<'_, T> {
		Resource::new(self, name)
	}

	/// Sends `request` below the API root and normalizes the response.
	pub async fn request(&self, request: ApiRequest) -> Result<Normalized> {
		const KIND: FlowKind = FlowKind::ApiRequest;

		let span = FlowSpan::new(KIND, "request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn send(&self, request: ApiRequest) -> Result<Normalized> {
		let ApiRequest { method, path, query, body, headers } = request;
		let url = http::make_url(
			&self.api_root,
			[path.as_str()],
			query.iter().map(|(key, value)| (key.as_str(), value.as_str())),
		)?;
		let request = http::json_request(method, &url, &headers, body.as_ref())?;
		let request = self.auth.authorize(request).await?;
		let response = self.http_client.send(request).await.map_err(TransportError::network)?;

		self.interpreter.interpret(&response).await
	}
}
#[cfg(feature = "reqwest")]
impl Metry<ReqwestHttpClient> {
	/// Creates a client backed by a default reqwest transport.
	pub fn new(config: ClientConfig, auth: AuthConfig, store: TokenStore) -> Result<Self> {
		Self::with_http_client(config, auth, store, ReqwestHttpClient::default())
	}
}
impl<T> Clone for Metry<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			api_root: self.api_root.clone(),
			http_client: self.http_client.clone(),
			auth: self.auth.clone(),
			interpreter: self.interpreter.clone(),
		}
	}
}
impl<T> Debug for Metry<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Metry")
			.field("api_root", &self.api_root.as_str())
			.field("auth", &self.auth)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::HEADER_DISABLE_ACCOUNT_HEADERS;

	#[test]
	fn options_override_method_and_add_headers() {
		let options = RequestOptions::default()
			.with_method(Method::PATCH)
			.with_header("X-Trace", "abc")
			.expect("Header should be valid.")
			.without_account_headers();
		let request = ApiRequest::get("meters").with_options(&options);

		assert_eq!(request.method, Method::PATCH);
		assert_eq!(request.headers.get("x-trace").and_then(|v| v.to_str().ok()), Some("abc"));
		assert!(request.headers.contains_key(HEADER_DISABLE_ACCOUNT_HEADERS));
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn requests_are_rooted_at_the_api_path() {
		// crates.io
		use httpmock::prelude::*;
		// self
		use crate::{_preludet::*, store::StoreKey};

		let server = MockServer::start_async().await;
		let (client, storage) = build_reqwest_test_client(&server.base_url(), test_auth_config());
		let mock = server
			.mock_async(|when, then| {
				when.method(GET).path("/api/v2/accounts/me").header("authorization", "OAuth pt");
				then.status(200).body(r#"{"data":{"_id":"me"}}"#);
			})
			.await;

		client.auth().set_private_token(Some("pt")).await.expect("Private token should store.");

		let me = client
			.request(ApiRequest::get("/accounts/me/"))
			.await
			.expect("Request should succeed.");

		assert_eq!(me.into_data(), serde_json::json!({ "_id": "me" }));
		assert_eq!(storage.get_now(StoreKey::PrivateToken.as_str()).as_deref(), Some("pt"));

		mock.assert_calls_async(1).await;
	}

	#[test]
	fn invalid_header_values_are_rejected() {
		let err = RequestOptions::default()
			.with_header("X-Trace", "line\nbreak")
			.expect_err("Newlines must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidHeaderValue { .. })));
	}
}
