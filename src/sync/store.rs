use crate::error::StoreResult;
use async_trait::async_trait;

/// Opaque GET/PUT key-value store holding one JSON document per pipeline
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `Ok(None)` when the key does not exist; `Err` when the store could not answer
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Write `value` only if `key` does not exist yet; `Ok(false)` when it already did.
    ///
    /// The default reads then writes and is not atomic across peers; stores
    /// with a native create-only write override it.
    async fn put_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        if self.get(key).await?.is_some() {
            return Ok(false);
        }
        self.put(key, value).await?;
        Ok(true)
    }

    /// Every key directly or indirectly below `prefix`
    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}
