use async_trait::async_trait;

use crate::CacheResult;

/// Key/value cache with expiry. No transactional guarantee is expected.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()>;

    async fn del(&self, keys: &[String]) -> CacheResult<()>;

    async fn ping(&self) -> CacheResult<()>;
}
