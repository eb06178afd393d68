//! Typed credential accessors layered over a [`KeyValueStorage`] backend.
//!
//! Every credential write in the crate goes through [`TokenStore`]; nothing else touches
//! the backend directly. Compound writes (a new refresh token clearing the cached access
//! token, or a completed refresh storing its result) are serialized behind one async write
//! lock so a slow refresh cannot persist a token minted for a refresh token that has since
//! been replaced.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AccountContext, TokenSecret},
	store::{KeyValueStorage, MemoryStorage, StoreError, StoreKey},
};

/// Outcome of [`TokenStore::store_refreshed_access_token`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshStoreOutcome {
	/// The refresh token used for the exchange is still current; the access token was stored.
	Stored,
	/// A different refresh token was written while the exchange was in flight.
	RefreshTokenReplaced,
}

/// Session credential store shared by the authorizer, refresh coordinator, and response
/// interpreter.
#[derive(Clone)]
pub struct TokenStore {
	storage: Arc<dyn KeyValueStorage>,
	writes: Arc<AsyncMutex<()>>,
}
impl TokenStore {
	/// Wraps a storage backend.
	pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
		Self { storage, writes: Default::default() }
	}

	/// Creates a store backed by a fresh [`MemoryStorage`].
	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryStorage::default()))
	}

	/// Reads a value, parsing it as JSON when it starts with `{` or `[`.
	pub async fn get(&self, key: StoreKey) -> Result<Option<JsonValue>, StoreError> {
		self.storage.get(key.as_str()).await?.map(decode_value).transpose()
	}

	/// Writes a value; strings and numbers are stored verbatim, structures as JSON text.
	///
	/// Falsy values (`null`, `false`, `0`, `""`) remove the key instead.
	pub async fn set(&self, key: StoreKey, value: &JsonValue) -> Result<(), StoreError> {
		let _writes = self.writes.lock().await;

		self.write_locked(key, value).await
	}

	/// Removes the value stored under `key`.
	pub async fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
		let _writes = self.writes.lock().await;

		self.storage.remove(key.as_str()).await
	}

	/// Current private API token.
	pub async fn private_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		self.get_text(StoreKey::PrivateToken).await.map(|value| value.map(TokenSecret::from))
	}

	/// Sets or clears (`None`/empty) the private API token.
	pub async fn set_private_token(&self, token: Option<&str>) -> Result<(), StoreError> {
		self.set_text(StoreKey::PrivateToken, token).await
	}

	/// Current refresh token.
	pub async fn refresh_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		self.get_text(StoreKey::RefreshToken).await.map(|value| value.map(TokenSecret::from))
	}

	/// Sets or clears the refresh token and unconditionally clears the cached access token.
	pub async fn set_refresh_token(&self, token: Option<&str>) -> Result<(), StoreError> {
		self.set_session(token, None).await
	}

	/// Cached access token, if one is stored and decodable.
	///
	/// An undecodable value reads as absent, which routes callers through a refresh that
	/// overwrites it.
	pub async fn access_token(&self) -> Result<Option<AccessToken>, StoreError> {
		let Some(value) = self.get(StoreKey::AccessToken).await? else {
			return Ok(None);
		};

		Ok(serde_json::from_value(value).ok())
	}

	/// Replaces or clears the cached access token.
	pub async fn set_access_token(&self, token: Option<&AccessToken>) -> Result<(), StoreError> {
		let _writes = self.writes.lock().await;

		self.write_access_locked(token).await
	}

	/// Writes a refresh token and then its access token as one step.
	///
	/// The access token is always cleared first, matching [`TokenStore::set_refresh_token`].
	pub async fn set_session(
		&self,
		refresh_token: Option<&str>,
		access_token: Option<&AccessToken>,
	) -> Result<(), StoreError> {
		let _writes = self.writes.lock().await;

		self.write_text_locked(StoreKey::RefreshToken, refresh_token).await?;
		self.storage.remove(StoreKey::AccessToken.as_str()).await?;

		if access_token.is_some() {
			self.write_access_locked(access_token).await?;
		}

		Ok(())
	}

	/// Stores the result of a refresh exchange performed with `used_refresh_token`.
	///
	/// When `rotated_refresh_token` is set the endpoint issued a replacement refresh token,
	/// which is persisted alongside the access token.
	pub async fn store_refreshed_access_token(
		&self,
		used_refresh_token: &str,
		rotated_refresh_token: Option<&str>,
		token: Option<&AccessToken>,
	) -> Result<RefreshStoreOutcome, StoreError> {
		let _writes = self.writes.lock().await;
		let current = self.get_text(StoreKey::RefreshToken).await?;

		if current.as_deref().is_some_and(|current| current != used_refresh_token) {
			return Ok(RefreshStoreOutcome::RefreshTokenReplaced);
		}
		if let Some(rotated) = rotated_refresh_token.filter(|rotated| *rotated != used_refresh_token)
		{
			self.write_text_locked(StoreKey::RefreshToken, Some(rotated)).await?;
		}

		self.write_access_locked(token).await?;

		Ok(RefreshStoreOutcome::Stored)
	}

	/// Current organization id.
	pub async fn organization(&self) -> Result<Option<String>, StoreError> {
		self.get_text(StoreKey::Organization).await
	}

	/// Sets or clears the organization id.
	pub async fn set_organization(&self, organization: Option<&str>) -> Result<(), StoreError> {
		self.set_text(StoreKey::Organization, organization).await
	}

	/// Current subaccount id.
	pub async fn subaccount(&self) -> Result<Option<String>, StoreError> {
		self.get_text(StoreKey::Subaccount).await
	}

	/// Sets or clears the subaccount id.
	pub async fn set_subaccount(&self, subaccount: Option<&str>) -> Result<(), StoreError> {
		self.set_text(StoreKey::Subaccount, subaccount).await
	}

	/// Organization and subaccount read together.
	pub async fn account_context(&self) -> Result<AccountContext, StoreError> {
		Ok(AccountContext {
			organization: self.organization().await?,
			subaccount: self.subaccount().await?,
		})
	}

	/// Removes every credential and the account context.
	pub async fn clear(&self) -> Result<(), StoreError> {
		let _writes = self.writes.lock().await;

		for key in StoreKey::ALL {
			self.storage.remove(key.as_str()).await?;
		}

		Ok(())
	}

	async fn get_text(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
		Ok(self.get(key).await?.and_then(|value| match value {
			JsonValue::String(text) => Some(text),
			JsonValue::Null => None,
			other => Some(other.to_string()),
		}))
	}

	async fn set_text(&self, key: StoreKey, value: Option<&str>) -> Result<(), StoreError> {
		let _writes = self.writes.lock().await;

		self.write_text_locked(key, value).await
	}

	async fn write_text_locked(&self, key: StoreKey, value: Option<&str>) -> Result<(), StoreError> {
		match value.filter(|value| !value.is_empty()) {
			Some(value) => self.storage.set(key.as_str(), value.to_owned()).await,
			None => self.storage.remove(key.as_str()).await,
		}
	}

	async fn write_access_locked(&self, token: Option<&AccessToken>) -> Result<(), StoreError> {
		let value = serde_json::to_value(token).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode access token: {e}"),
		})?;

		self.write_locked(StoreKey::AccessToken, &value).await
	}

	async fn write_locked(&self, key: StoreKey, value: &JsonValue) -> Result<(), StoreError> {
		match encode_value(value) {
			Some(raw) => self.storage.set(key.as_str(), raw).await,
			None => self.storage.remove(key.as_str()).await,
		}
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenStore(..)")
	}
}

fn encode_value(value: &JsonValue) -> Option<String> {
	match value {
		JsonValue::Null | JsonValue::Bool(false) => None,
		JsonValue::String(text) if text.is_empty() => None,
		JsonValue::String(text) => Some(text.clone()),
		JsonValue::Number(number) if number.as_f64() == Some(0.) => None,
		JsonValue::Number(number) => Some(number.to_string()),
		other => Some(other.to_string()),
	}
}

fn decode_value(raw: String) -> Result<JsonValue, StoreError> {
	if raw.starts_with('{') || raw.starts_with('[') {
		serde_json::from_str(&raw).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse stored JSON: {e}"),
		})
	} else {
		Ok(JsonValue::String(raw))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn store() -> (TokenStore, MemoryStorage) {
		let backend = MemoryStorage::default();

		(TokenStore::new(Arc::new(backend.clone())), backend)
	}

	fn live_token(value: &str) -> AccessToken {
		AccessToken::new(value, OffsetDateTime::now_utc() + Duration::hours(1))
	}

	#[tokio::test]
	async fn structured_values_round_trip_as_json_text() {
		let (store, backend) = store();

		store
			.set(StoreKey::AccessToken, &json!({ "access_token": "a", "expires_at": 1 }))
			.await
			.expect("Structured value should be stored.");

		assert!(backend.get_now("mryAccessToken").is_some_and(|raw| raw.starts_with('{')));
		assert_eq!(
			store.get(StoreKey::AccessToken).await.expect("Structured value should be read."),
			Some(json!({ "access_token": "a", "expires_at": 1 }))
		);
	}

	#[tokio::test]
	async fn primitives_are_stored_verbatim_and_falsy_values_remove() {
		let (store, backend) = store();

		store.set(StoreKey::Subaccount, &json!(42)).await.expect("Number should be stored.");
		assert_eq!(backend.get_now("mrySubaccount").as_deref(), Some("42"));

		store.set(StoreKey::Subaccount, &json!("")).await.expect("Empty string should remove.");
		assert_eq!(backend.get_now("mrySubaccount"), None);
		assert_eq!(store.get(StoreKey::Subaccount).await.expect("Read should succeed."), None);
	}

	#[tokio::test]
	async fn setting_refresh_token_clears_access_token() {
		let (store, _) = store();

		store.set_access_token(Some(&live_token("a1"))).await.expect("Access token should store.");
		store.set_refresh_token(Some("r1")).await.expect("Refresh token should store.");

		assert!(store.access_token().await.expect("Read should succeed.").is_none());
		assert_eq!(
			store.refresh_token().await.expect("Read should succeed.").map(|t| t.expose().to_owned()),
			Some("r1".into())
		);
	}

	#[tokio::test]
	async fn refreshed_token_is_discarded_after_refresh_token_replacement() {
		let (store, _) = store();

		store.set_refresh_token(Some("r2")).await.expect("Refresh token should store.");

		let outcome = store
			.store_refreshed_access_token("r1", None, Some(&live_token("stale")))
			.await
			.expect("Store call should succeed.");

		assert_eq!(outcome, RefreshStoreOutcome::RefreshTokenReplaced);
		assert!(store.access_token().await.expect("Read should succeed.").is_none());
	}

	#[tokio::test]
	async fn rotated_refresh_token_is_persisted() {
		let (store, _) = store();

		store.set_refresh_token(Some("r1")).await.expect("Refresh token should store.");
		store
			.store_refreshed_access_token("r1", Some("r2"), Some(&live_token("fresh")))
			.await
			.expect("Store call should succeed.");

		assert_eq!(
			store.refresh_token().await.expect("Read should succeed.").map(|t| t.expose().to_owned()),
			Some("r2".into())
		);
		assert_eq!(
			store
				.access_token()
				.await
				.expect("Read should succeed.")
				.map(|t| t.value.expose().to_owned()),
			Some("fresh".into())
		);
	}

	#[tokio::test]
	async fn undecodable_access_token_reads_as_absent() {
		let (store, backend) = store();

		backend.set_now("mryAccessToken", "{\"unexpected\":true}");

		assert!(store.access_token().await.expect("Read should succeed.").is_none());
	}

	#[tokio::test]
	async fn clear_removes_everything() {
		let (store, backend) = store();

		store.set_private_token(Some("p")).await.expect("Private token should store.");
		store.set_organization(Some("org")).await.expect("Organization should store.");
		store.clear().await.expect("Clear should succeed.");

		assert!(backend.is_empty());
	}
}
