use anyhow::Result;
use async_trait::async_trait;
use chain_core::store::{KeyValueStore, StoreError};
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional};
use std::path::Path;
use tracing::info;

const TREE_BLOCKS: &str = "blocks";
const TREE_META: &str = "meta";
const KEY_TIP_HEIGHT: &[u8] = b"tip_height";

/// Sled-backed `KeyValueStore`. Heights are stored big-endian so sled's key
/// order is ascending numeric height.
#[derive(Clone)]
pub struct SledKv {
    db: Db,
}

impl SledKv {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        info!("sled store opened");
        Ok(Self { db })
    }

    fn blocks(&self) -> sled::Tree {
        self.db.open_tree(TREE_BLOCKS).expect("open tree")
    }

    fn meta(&self) -> sled::Tree {
        self.db.open_tree(TREE_META).expect("open tree")
    }

    pub fn clear(&self) -> Result<()> {
        self.blocks().clear()?;
        self.meta().clear()?;
        self.db.flush()?;
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_height(bytes: &[u8]) -> anyhow::Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("malformed height bytes ({} bytes)", bytes.len()))?;
    Ok(u64::from_be_bytes(arr))
}

#[async_trait]
impl KeyValueStore for SledKv {
    async fn get(&self, height: u64) -> Result<Option<Vec<u8>>, StoreError> {
        let opt = self
            .blocks()
            .get(height.to_be_bytes())
            .map_err(|e| StoreError::Read {
                height,
                source: e.into(),
            })?;
        Ok(opt.map(|v| v.to_vec()))
    }

    async fn put(&self, height: u64, value: &[u8]) -> Result<(), StoreError> {
        let key = height.to_be_bytes();
        let blocks = self.blocks();
        let meta = self.meta();
        // The record write and the tip counter advance commit together. The
        // counter never regresses when an existing height is overwritten.
        (&blocks, &meta)
            .transaction(
                |(blocks, meta)| -> ConflictableTransactionResult<(), ()> {
                    blocks.insert(&key[..], value)?;
                    let tip = match meta.get(KEY_TIP_HEIGHT)? {
                        Some(v) if v.len() == 8 => {
                            let mut arr = [0u8; 8];
                            arr.copy_from_slice(&v);
                            Some(u64::from_be_bytes(arr))
                        }
                        _ => None,
                    };
                    if tip.map_or(true, |t| height > t) {
                        meta.insert(KEY_TIP_HEIGHT, &key[..])?;
                    }
                    Ok(())
                },
            )
            .map_err(|e| match e {
                TransactionError::Storage(err) => StoreError::Write {
                    height,
                    source: err.into(),
                },
                TransactionError::Abort(()) => StoreError::Write {
                    height,
                    source: anyhow::anyhow!("transaction aborted"),
                },
            })?;
        self.db
            .flush_async()
            .await
            .map_err(|e| StoreError::Write {
                height,
                source: e.into(),
            })?;
        Ok(())
    }

    async fn heights(&self) -> Result<Vec<u64>, StoreError> {
        let mut out = Vec::new();
        for entry in self.blocks().iter() {
            let (key, _value) = entry.map_err(|e| StoreError::Scan { source: e.into() })?;
            let height = decode_height(&key).map_err(|source| StoreError::Scan { source })?;
            out.push(height);
        }
        Ok(out)
    }

    async fn tip_height(&self) -> Result<Option<u64>, StoreError> {
        let counter = self
            .meta()
            .get(KEY_TIP_HEIGHT)
            .map_err(|e| StoreError::Scan { source: e.into() })?;
        if let Some(v) = counter {
            let height = decode_height(&v).map_err(|source| StoreError::Scan { source })?;
            return Ok(Some(height));
        }
        // Counter missing (fresh store, or metadata wiped): recover by scan.
        Ok(self.heights().await?.into_iter().max())
    }
}
