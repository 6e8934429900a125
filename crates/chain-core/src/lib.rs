use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod constants;
pub mod ledger;
pub mod store;

pub use constants::{GENESIS_BODY, GENESIS_HEIGHT};
pub use ledger::{ChainError, Ledger};
pub use store::{KeyValueStore, MemoryKv, StoreError};

/// A block awaiting sealing. Carries only the caller-supplied payload;
/// height, timestamp, link and hash are assigned by the ledger at seal time.
#[derive(Clone, Debug)]
pub struct Draft {
    body: String,
}

impl Draft {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Assign every sealed field in one step. Crate-internal: callers go
    /// through `Ledger::append`.
    pub(crate) fn seal(self, height: u64, previous_block_hash: String, time: u64) -> Block {
        let mut block = Block {
            height,
            body: self.body,
            time,
            previous_block_hash,
            hash: String::new(),
        };
        block.hash = block_digest(&block);
        block
    }
}

/// A sealed ledger record. Field declaration order is the canonical
/// serialization order; do not reorder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub body: String,
    pub time: u64,
    pub previous_block_hash: String,
    pub hash: String,
}

/// Canonical bytes of a block: compact JSON with the hash field cleared.
/// The exact digest input, for sealing and validation alike.
pub fn canonical_bytes(block: &Block) -> Vec<u8> {
    let mut unsealed = block.clone();
    unsealed.hash = String::new();
    serde_json::to_vec(&unsealed).expect("block serialization is infallible")
}

/// Hex-encoded SHA-256 over `canonical_bytes`.
pub fn block_digest(block: &Block) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(block));
    hex::encode(hasher.finalize())
}

/// Stored record bytes of a sealed block, hash included. Decoding a record
/// and re-running `canonical_bytes` reproduces the digest input exactly.
pub fn record_bytes(block: &Block) -> Vec<u8> {
    serde_json::to_vec(block).expect("block serialization is infallible")
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;

    fn sample_block() -> Block {
        Block {
            height: 7,
            body: "hello".to_string(),
            time: 1_600_000_000,
            previous_block_hash: "aa".to_string(),
            hash: String::new(),
        }
    }

    #[test]
    fn canonical_bytes_example() {
        let bytes = canonical_bytes(&sample_block());
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"height":7,"body":"hello","time":1600000000,"previous_block_hash":"aa","hash":""}"#
        );
    }

    #[test]
    fn canonical_bytes_ignore_stored_hash() {
        let mut block = sample_block();
        let before = canonical_bytes(&block);
        block.hash = "deadbeef".to_string();
        assert_eq!(before, canonical_bytes(&block));
    }

    #[test]
    fn block_digest_example() {
        assert_eq!(
            block_digest(&sample_block()),
            "00398d154d615fc7b29975ac7e1fe3da796e773851fc34cb480304c3901bba72"
        );
    }

    #[test]
    fn genesis_digest_example() {
        let genesis = Draft::new(GENESIS_BODY).seal(GENESIS_HEIGHT, String::new(), 1_600_000_000);
        assert_eq!(
            genesis.hash,
            "5e2fd802e9d2e2accb619eeaf8d82b8e471a7a750d4feb87803a6622fb4fd4a9"
        );
        assert_eq!(genesis.previous_block_hash, "");
        assert_eq!(genesis.body, GENESIS_BODY);
    }

    #[test]
    fn digest_is_deterministic() {
        let block = sample_block();
        assert_eq!(block_digest(&block), block_digest(&block));
    }

    #[test]
    fn digest_changes_with_every_field() {
        let base = block_digest(&sample_block());

        let mut block = sample_block();
        block.height += 1;
        assert_ne!(block_digest(&block), base);

        let mut block = sample_block();
        block.body = "hellO".to_string();
        assert_ne!(block_digest(&block), base);

        let mut block = sample_block();
        block.time += 1;
        assert_ne!(block_digest(&block), base);

        let mut block = sample_block();
        block.previous_block_hash = "ab".to_string();
        assert_ne!(block_digest(&block), base);
    }

    #[test]
    fn digest_length_is_fixed() {
        assert_eq!(block_digest(&sample_block()).len(), HASH_HEX_SIZE);
    }

    #[test]
    fn seal_assigns_all_fields_at_once() {
        let block = Draft::new("payload").seal(3, "prev".to_string(), 1_600_000_123);
        assert_eq!(block.height, 3);
        assert_eq!(block.body, "payload");
        assert_eq!(block.time, 1_600_000_123);
        assert_eq!(block.previous_block_hash, "prev");
        assert!(!block.hash.is_empty());
        assert_eq!(block.hash, block_digest(&block));
    }

    #[test]
    fn sealed_chain_links_verify() {
        let genesis = Draft::new(GENESIS_BODY).seal(GENESIS_HEIGHT, String::new(), 1_600_000_000);
        let next = Draft::new("A").seal(1, genesis.hash.clone(), 1_600_000_001);
        assert_eq!(next.previous_block_hash, genesis.hash);
        assert_eq!(
            next.hash,
            "9a8de945b0a371f62bac2b74c3fd190e372fd70ea3a5090a3f7fa9b2566c16f0"
        );
    }

    #[test]
    fn record_round_trip() {
        let block = Draft::new("payload").seal(2, "prev".to_string(), 1_600_000_000);
        let bytes = record_bytes(&block);
        let decoded: Block = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(canonical_bytes(&decoded), canonical_bytes(&block));
    }
}
