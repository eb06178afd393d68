//! Async Metry API client: OAuth 2.0 credential lifecycle, single-flight access-token refresh,
//! durable token storage, and a resource layer for CRUD, query, and time-series calls.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod period;
pub mod resource;
pub mod response;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::Metry,
		config::{AuthConfig, ClientConfig},
		http::ReqwestHttpClient,
		store::{KeyValueStorage, MemoryStorage, TokenStore},
	};

	/// Client id used by integration fixtures.
	pub const TEST_CLIENT_ID: &str = "testClientID";
	/// Client secret used by integration fixtures.
	pub const TEST_CLIENT_SECRET: &str = "testClientSecret";
	/// Redirect URI used by integration fixtures.
	pub const TEST_REDIRECT_URI: &str = "http://dummier.local/path";

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = Metry<ReqwestHttpClient>;

	/// Auth configuration shared by integration tests.
	pub fn test_auth_config() -> AuthConfig {
		AuthConfig::new(TEST_CLIENT_ID)
			.with_client_secret(TEST_CLIENT_SECRET)
			.with_redirect_uri(TEST_REDIRECT_URI)
	}

	/// Builds a [`Metry`] client pointed at `base_url` with an in-memory storage backend.
	///
	/// The storage handle is returned so tests can inspect raw persisted values.
	pub fn build_reqwest_test_client(
		base_url: &str,
		auth: AuthConfig,
	) -> (ReqwestTestClient, Arc<MemoryStorage>) {
		let backend = Arc::new(MemoryStorage::default());
		let storage: Arc<dyn KeyValueStorage> = backend.clone();
		let base_url =
			Url::parse(base_url).expect("Mock server URL should parse as a client base URL.");
		let client = Metry::with_http_client(
			ClientConfig::new(base_url),
			auth,
			TokenStore::new(storage),
			ReqwestHttpClient::default(),
		)
		.expect("Test client configuration should be valid.");

		(client, backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use oauth2::{
		HttpRequest, HttpResponse,
		http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
	};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
