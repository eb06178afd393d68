//! Key/value storage contracts, built-in backends, and the typed [`TokenStore`].

pub mod file;
pub mod memory;
pub mod token_store;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use token_store::*;

// self
use crate::_prelude::*;

/// Boxed future returned by [`KeyValueStorage`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable string key/value backend holding session credentials.
///
/// Missing keys read as `None`; they are never an error.
pub trait KeyValueStorage
where
	Self: Send + Sync,
{
	/// Reads the raw value stored under `key`.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Writes or replaces the raw value stored under `key`.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Deletes the value stored under `key`; deleting a missing key succeeds.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`KeyValueStorage`] implementations and [`TokenStore`] decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced while encoding or decoding a stored value.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Storage keys used for session credentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
	/// Long-lived private API token.
	PrivateToken,
	/// OAuth refresh token.
	RefreshToken,
	/// JSON-encoded [`AccessToken`](crate::auth::AccessToken).
	AccessToken,
	/// Active subaccount id.
	Subaccount,
	/// Active organization id.
	Organization,
}
impl StoreKey {
	/// Every key managed by [`TokenStore`].
	pub const ALL: [StoreKey; 5] = [
		StoreKey::PrivateToken,
		StoreKey::RefreshToken,
		StoreKey::AccessToken,
		StoreKey::Subaccount,
		StoreKey::Organization,
	];

	/// Returns the raw key written to the storage backend.
	pub const fn as_str(self) -> &'static str {
		match self {
			StoreKey::PrivateToken => "mryPrivateToken",
			StoreKey::RefreshToken => "mryRefreshToken",
			StoreKey::AccessToken => "mryAccessToken",
			StoreKey::Subaccount => "mrySubaccount",
			StoreKey::Organization => "mryOrganization",
		}
	}
}
impl Display for StoreKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
