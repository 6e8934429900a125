use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Failures surfaced by a `KeyValueStore` backend, tagged with the operation
/// and key so callers never lose the context.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("read of height {height} failed: {source}")]
    Read {
        height: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("write of height {height} failed: {source}")]
    Write {
        height: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("key iteration failed: {source}")]
    Scan {
        #[source]
        source: anyhow::Error,
    },
}

/// Ordered persistence, keyed by block height, values opaque record bytes.
/// The ledger depends on this contract alone; any ordered KV engine can sit
/// behind it.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, height: u64) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, height: u64, value: &[u8]) -> Result<(), StoreError>;

    /// All stored heights, in ascending store order.
    async fn heights(&self) -> Result<Vec<u64>, StoreError>;

    /// Highest stored height, `None` when the store is empty. The default is
    /// the naive full key scan; adapters that keep a counter should override
    /// this and fall back to `heights` for recovery.
    async fn tip_height(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.heights().await?.into_iter().max())
    }
}

/// In-memory store for tests and examples.
#[derive(Default)]
pub struct MemoryKv {
    inner: RwLock<BTreeMap<u64, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, height: u64) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().await.get(&height).cloned())
    }

    async fn put(&self, height: u64, value: &[u8]) -> Result<(), StoreError> {
        self.inner.write().await.insert(height, value.to_vec());
        Ok(())
    }

    async fn heights(&self) -> Result<Vec<u64>, StoreError> {
        Ok(self.inner.read().await.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_kv_round_trip() {
        let store = MemoryKv::new();
        assert!(store.get(0).await.unwrap().is_none());
        store.put(0, b"zero").await.unwrap();
        store.put(2, b"two").await.unwrap();
        store.put(1, b"one").await.unwrap();
        assert_eq!(store.get(1).await.unwrap().unwrap(), b"one");
        assert_eq!(store.heights().await.unwrap(), vec![0, 1, 2]);
        assert_eq!(store.tip_height().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn tip_height_empty_store() {
        let store = MemoryKv::new();
        assert_eq!(store.tip_height().await.unwrap(), None);
    }
}
