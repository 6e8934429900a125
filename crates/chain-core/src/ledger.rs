use crate::constants::{GENESIS_BODY, GENESIS_HEIGHT};
use crate::store::{KeyValueStore, StoreError};
use crate::{block_digest, record_bytes, unix_now, Block, Draft};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ChainError {
    /// Genesis could not be created; the ledger is unusable until it can be.
    #[error("genesis bootstrap failed: {source}")]
    Bootstrap {
        #[source]
        source: StoreError,
    },
    /// One append could not complete. The chain is untouched and a retry is
    /// safe.
    #[error("append failed: {source}")]
    Append {
        #[source]
        source: Box<ChainError>,
    },
    #[error("no block stored at height {0}")]
    NotFound(u64),
    /// Stored bytes do not decode to a block: storage fault or tampering.
    #[error("block at height {height} is corrupt: {source}")]
    Corrupt {
        height: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn append_cause(source: ChainError) -> ChainError {
    ChainError::Append {
        source: Box::new(source),
    }
}

/// Chain facade over a `KeyValueStore`. Owns sealing and persistence;
/// height and tip are re-derived from the store on every call, so a
/// restarted process picks up exactly where the store left off.
#[derive(Clone)]
pub struct Ledger<S: KeyValueStore> {
    store: Arc<S>,
    // Serializes append and bootstrap so two writers can never observe the
    // same tip and seal at the same height.
    append_guard: Arc<Mutex<()>>,
}

impl<S: KeyValueStore> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            append_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Ensure a genesis block exists. Idempotent.
    pub async fn bootstrap_genesis(&self) -> Result<(), ChainError> {
        let _guard = self.append_guard.lock().await;
        self.ensure_genesis().await
    }

    async fn ensure_genesis(&self) -> Result<(), ChainError> {
        let present = self
            .store
            .get(GENESIS_HEIGHT)
            .await
            .map_err(|source| ChainError::Bootstrap { source })?
            .is_some();
        if present {
            return Ok(());
        }
        let genesis = Draft::new(GENESIS_BODY).seal(GENESIS_HEIGHT, String::new(), unix_now());
        self.store
            .put(genesis.height, &record_bytes(&genesis))
            .await
            .map_err(|source| ChainError::Bootstrap { source })?;
        info!("genesis block created ({})", genesis.hash);
        Ok(())
    }

    /// Highest stored height; `None` for an empty store.
    pub async fn current_height(&self) -> Result<Option<u64>, ChainError> {
        Ok(self.store.tip_height().await?)
    }

    /// Fetch and decode the block at `height`.
    pub async fn get_block(&self, height: u64) -> Result<Block, ChainError> {
        let bytes = self
            .store
            .get(height)
            .await?
            .ok_or(ChainError::NotFound(height))?;
        serde_json::from_slice(&bytes).map_err(|source| ChainError::Corrupt { height, source })
    }

    /// Seal `draft` on top of the current tip and persist it. Creates
    /// genesis first if the store is empty.
    pub async fn append(&self, draft: Draft) -> Result<Block, ChainError> {
        let _guard = self.append_guard.lock().await;

        let tip_height = match self.current_height().await.map_err(append_cause)? {
            Some(height) => height,
            None => {
                self.ensure_genesis().await?;
                GENESIS_HEIGHT
            }
        };
        let tip = self.get_block(tip_height).await.map_err(append_cause)?;

        let sealed = draft.seal(tip.height + 1, tip.hash, unix_now());
        self.store
            .put(sealed.height, &record_bytes(&sealed))
            .await
            .map_err(|source| append_cause(ChainError::Store(source)))?;

        info!("appended block {} ({})", sealed.height, sealed.hash);
        Ok(sealed)
    }

    /// Recompute the stored block's digest with its hash cleared and compare
    /// to the stored hash. Read-only; a mismatch is a finding, not an error.
    pub async fn validate_block(&self, height: u64) -> Result<bool, ChainError> {
        let block = self.get_block(height).await?;
        let computed = block_digest(&block);
        if block.hash == computed {
            Ok(true)
        } else {
            warn!(
                "block {} invalid hash: {} <> {}",
                height, block.hash, computed
            );
            Ok(false)
        }
    }

    /// Walk the whole stored range once, checking per-block hash integrity
    /// and inter-block linkage. Returns every offending height, deduplicated
    /// and ascending, without short-circuiting; a broken link reports the
    /// lower of the two heights involved. Records that are missing or do not
    /// decode are reported rather than raised. The tip height is snapshotted
    /// up front, so an append racing this scan is not misreported.
    pub async fn validate_chain(&self) -> Result<Vec<u64>, ChainError> {
        let Some(tip_height) = self.current_height().await? else {
            return Ok(Vec::new());
        };

        let mut report = BTreeSet::new();
        let mut previous: Option<Block> = None;
        for height in 0..=tip_height {
            let block = match self.get_block(height).await {
                Ok(block) => block,
                Err(ChainError::NotFound(_)) | Err(ChainError::Corrupt { .. }) => {
                    report.insert(height);
                    previous = None;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let computed = block_digest(&block);
            if block.hash != computed {
                warn!(
                    "block {} invalid hash: {} <> {}",
                    height, block.hash, computed
                );
                report.insert(height);
            }

            if let Some(previous) = &previous {
                if block.previous_block_hash != previous.hash {
                    warn!("block {} does not link back to block {}", height, height - 1);
                    report.insert(height - 1);
                }
            }
            previous = Some(block);
        }

        if report.is_empty() {
            info!("chain valid up to height {}", tip_height);
        } else {
            warn!("{} invalid height(s): {:?}", report.len(), report);
        }
        Ok(report.into_iter().collect())
    }
}
