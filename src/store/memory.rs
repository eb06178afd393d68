//! Thread-safe in-memory [`KeyValueStorage`] for tests, demos, and ephemeral sessions.

// self
use crate::{
	_prelude::*,
	store::{KeyValueStorage, StoreError, StoreFuture},
};

type StorageMap = Arc<RwLock<HashMap<String, String>>>;

/// Process-local storage; values vanish when the last clone is dropped.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(StorageMap);
impl MemoryStorage {
	/// Reads a raw value without going through the async contract.
	pub fn get_now(&self, key: &str) -> Option<String> {
		self.0.read().get(key).cloned()
	}

	/// Writes a raw value without going through the async contract.
	pub fn set_now(&self, key: impl Into<String>, value: impl Into<String>) {
		self.0.write().insert(key.into(), value.into());
	}

	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl KeyValueStorage for MemoryStorage {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value);

			Ok::<_, StoreError>(())
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok::<_, StoreError>(())
		})
	}
}
