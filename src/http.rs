//! Transport primitives shared by the token endpoint and the API client.
//!
//! The crate depends on an HTTP stack only through [`HttpTransport`]: requests and
//! responses are the `http`-crate types re-exported by `oauth2`, so any client that can
//! execute an [`HttpRequest`] plugs in. Non-2xx statuses are returned as ordinary
//! responses; classifying them is the caller's job.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::http::header::{ACCEPT, CONTENT_TYPE};
// self
use crate::{_prelude::*, error::ConfigError};

/// Content type sent with JSON request bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP clients able to execute a fully built request.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// the token endpoint and the API client behind an [`Arc`].
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes `request` and resolves with the response, whatever its status.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	type TransportError = T::TransportError;

	fn send(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
		(**self).send(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Timeouts for token exchanges and API calls are whatever the wrapped client is
/// configured with; build one with [`ReqwestClient::builder`] to bound them.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn send(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Joins `components` under `base` and appends `params` as an encoded query string.
///
/// Components are split on `/` and empty segments are dropped, so leading or trailing
/// slashes (`"/query"`, `"api/v2/"`) never produce `//` in the result.
pub fn make_url<'a, I, P, K, V>(base: &Url, components: I, params: P) -> Result<Url>
where
	I: IntoIterator<Item = &'a str>,
	P: IntoIterator<Item = (K, V)>,
	K: AsRef<str>,
	V: AsRef<str>,
{
	let mut url = base.clone();

	{
		let mut segments = url
			.path_segments_mut()
			.map_err(|_| ConfigError::InvalidBaseUrl { url: base.to_string() })?;

		segments.pop_if_empty();

		for component in components {
			segments.extend(component.split('/').filter(|segment| !segment.is_empty()));
		}
	}

	let mut params = params.into_iter().peekable();

	if params.peek().is_some() {
		url.query_pairs_mut().extend_pairs(params);
	}

	Ok(url)
}

/// Empty parameter list for [`make_url`].
pub(crate) fn no_params() -> [(&'static str, &'static str); 0] {
	[]
}

/// Builds an [`HttpRequest`] carrying `body` as JSON (or no body).
pub fn json_request(
	method: Method,
	url: &Url,
	headers: &HeaderMap,
	body: Option<&JsonValue>,
) -> Result<HttpRequest> {
	let mut builder = oauth2::http::Request::builder()
		.method(method)
		.uri(url.as_str())
		.header(ACCEPT, "application/json");

	if let Some(target) = builder.headers_mut() {
		for (name, value) in headers {
			target.insert(name, value.clone());
		}
	}

	let payload = match body {
		Some(body) => {
			builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);

			serde_json::to_vec(body).map_err(ConfigError::RequestBody)?
		},
		None => Vec::new(),
	};

	Ok(builder.body(payload).map_err(ConfigError::from)?)
}

/// Parses a response body as JSON; an empty body reads as `None`.
pub fn json_body(response: &HttpResponse) -> Result<Option<JsonValue>> {
	let body = response.body();

	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(None);
	}

	serde_json::from_slice(body).map(Some).map_err(|source| {
		crate::error::TransportError::InvalidBody { status: response.status().as_u16(), source }
			.into()
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("http://dummy.local").expect("Fixture base URL should parse.")
	}

	#[test]
	fn make_url_trims_slashes_and_skips_empty_components() {
		let url = make_url(&base(), ["api/v2/", "/tests", "", "abc"], Vec::<(&str, &str)>::new())
			.expect("URL should build.");

		assert_eq!(url.as_str(), "http://dummy.local/api/v2/tests/abc");
	}

	#[test]
	fn make_url_appends_encoded_params() {
		let url = make_url(&base(), ["oauth/authorize"], [
			("redirect_uri", "http://dummier.local/path"),
			("scope", "basic"),
		])
		.expect("URL should build.");

		assert_eq!(
			url.as_str(),
			"http://dummy.local/oauth/authorize?redirect_uri=http%3A%2F%2Fdummier.local%2Fpath&scope=basic"
		);
	}

	#[test]
	fn make_url_rejects_opaque_bases() {
		let opaque = Url::parse("mailto:api@example.com").expect("Fixture URL should parse.");

		assert!(make_url(&opaque, ["x"], Vec::<(&str, &str)>::new()).is_err());
	}

	#[test]
	fn json_request_sets_body_and_content_type() {
		let body = serde_json::json!({ "name": "meter" });
		let request = json_request(Method::POST, &base(), &HeaderMap::new(), Some(&body))
			.expect("Request should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(
			request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some(JSON_CONTENT_TYPE)
		);
		assert_eq!(request.body(), br#"{"name":"meter"}"#);
	}

	#[test]
	fn empty_response_body_reads_as_none() {
		let response = HttpResponse::new(Vec::new());

		assert_eq!(json_body(&response).expect("Empty body should parse."), None);
	}
}
