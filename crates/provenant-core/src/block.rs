use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::transaction::Transaction;

/// A sealed unit of the chain.
///
/// `hash` is the hex SHA-256 of the block's canonical JSON *excluding* the
/// `hash` field itself; see [`Block::hash_payload`]. Blocks are append-only
/// and never mutated after seal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Position in the chain: 0, 1, 2, …
    pub index: u64,

    /// ISO-8601 UTC timestamp, set when the block is sealed.
    pub timestamp: String,

    /// Transactions in mempool insertion order. Empty for genesis.
    pub transactions: Vec<Transaction>,

    /// Hex hash of the prior block; `"0"` for genesis.
    pub previous_hash: String,

    /// Found by the nonce search during mining.
    pub nonce: u64,

    /// Hex SHA-256 over the canonical JSON of the other five fields.
    pub hash: String,
}

impl Block {
    /// The JSON value that gets hashed: every field except `hash`.
    pub fn hash_payload(&self) -> Value {
        json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
        })
    }
}

/// A block is mined iff its hex hash starts with `difficulty` zero
/// characters. Difficulty 0 accepts any hash.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let d = difficulty as usize;
    hash.len() >= d && hash.bytes().take(d).all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_counts_leading_zero_chars() {
        assert!(meets_difficulty("00ab3f", 2));
        assert!(meets_difficulty("000000", 2));
        assert!(!meets_difficulty("0a0b3f", 2));
        assert!(meets_difficulty("anything", 0));
        assert!(!meets_difficulty("0", 2));
    }

    #[test]
    fn hash_payload_omits_hash() {
        let block = Block {
            index: 3,
            timestamp: "2026-03-01T09:00:00.000000Z".into(),
            transactions: vec![],
            previous_hash: "00abc".into(),
            nonce: 42,
            hash: "00def".into(),
        };
        let payload = block.hash_payload();
        assert!(payload.get("hash").is_none());
        assert_eq!(payload["index"], 3);
        assert_eq!(payload["nonce"], 42);
    }
}
