// std
use std::{env, fs, path::PathBuf, process, sync::Arc};
// crates.io
use time::{Duration, OffsetDateTime};
// self
use metry_sdk::{
	auth::{AccessToken, TokenSecret},
	store::{
		FileStorage, KeyValueStorage, MemoryStorage, RefreshStoreOutcome, StoreKey, TokenStore,
	},
};

fn temp_path(label: &str) -> PathBuf {
	let unique = format!(
		"metry_sdk_store_it_{label}_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	);

	env::temp_dir().join(unique)
}

fn access_token(value: &str) -> AccessToken {
	let expires_at = OffsetDateTime::from_unix_timestamp(4_102_444_800)
		.expect("Fixture timestamp should be in range.");

	AccessToken::new(value, expires_at)
}

#[tokio::test]
async fn setting_refresh_token_clears_access_token() {
	let store = TokenStore::in_memory();

	store.set_access_token(Some(&access_token("a1"))).await.expect("Access token should store.");
	store.set_refresh_token(Some("r1")).await.expect("Refresh token should store.");

	assert!(store.access_token().await.expect("Store read should succeed.").is_none());
	assert_eq!(
		store.refresh_token().await.expect("Store read should succeed."),
		Some(TokenSecret::new("r1"))
	);
}

#[tokio::test]
async fn access_token_is_stored_as_json() {
	let backend = Arc::new(MemoryStorage::default());
	let storage: Arc<dyn KeyValueStorage> = backend.clone();
	let store = TokenStore::new(storage);

	store.set_access_token(Some(&access_token("a1"))).await.expect("Access token should store.");

	let raw = backend
		.get_now(StoreKey::AccessToken.as_str())
		.expect("Access token should be persisted under its key.");

	assert_eq!(raw, r#"{"access_token":"a1","expires_at":4102444800000}"#);
	assert_eq!(
		store.access_token().await.expect("Store read should succeed."),
		Some(access_token("a1"))
	);
}

#[tokio::test]
async fn refresh_results_for_replaced_tokens_are_discarded() {
	let store = TokenStore::in_memory();

	store.set_refresh_token(Some("r1")).await.expect("Refresh token should store.");
	store.set_refresh_token(Some("r2")).await.expect("Refresh token should store.");

	let outcome = store
		.store_refreshed_access_token("r1", None, Some(&access_token("stale")))
		.await
		.expect("CAS write should succeed.");

	assert_eq!(outcome, RefreshStoreOutcome::RefreshTokenReplaced);
	assert!(store.access_token().await.expect("Store read should succeed.").is_none());
}

#[tokio::test]
async fn file_backed_session_survives_restart() {
	let path = temp_path("session");

	{
		let storage: Arc<dyn KeyValueStorage> =
			Arc::new(FileStorage::open(&path).expect("File storage should open."));
		let store = TokenStore::new(storage);

		store
			.set_session(Some("r1"), Some(&access_token("a1")))
			.await
			.expect("Session should store.");
		store.set_organization(Some("org-1")).await.expect("Organization should store.");
	}

	let storage: Arc<dyn KeyValueStorage> =
		Arc::new(FileStorage::open(&path).expect("File storage should reopen."));
	let store = TokenStore::new(storage);

	assert_eq!(
		store.refresh_token().await.expect("Store read should succeed."),
		Some(TokenSecret::new("r1"))
	);
	assert_eq!(
		store.access_token().await.expect("Store read should succeed."),
		Some(access_token("a1"))
	);
	assert_eq!(
		store.account_context().await.expect("Store read should succeed.").organization.as_deref(),
		Some("org-1")
	);

	store.clear().await.expect("Clearing should succeed.");

	assert!(store.refresh_token().await.expect("Store read should succeed.").is_none());

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary storage file {}: {e}", path.display())
	});
}

#[tokio::test]
async fn expired_tokens_read_back_but_are_not_valid() {
	let store = TokenStore::in_memory();
	let expired = AccessToken::new("old", OffsetDateTime::now_utc() - Duration::minutes(1));

	store.set_access_token(Some(&expired)).await.expect("Access token should store.");

	let stored = store
		.access_token()
		.await
		.expect("Store read should succeed.")
		.expect("Expired tokens are still stored.");

	assert!(!stored.is_valid());
	assert!(!metry_sdk::auth::is_valid_token(Some(&stored)));
}
