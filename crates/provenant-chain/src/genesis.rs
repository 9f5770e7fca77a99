//! The founding block.
//!
//! Every node derives the same genesis from fixed constants, so the whole
//! network agrees on `chain[0]` without any exchange. Genesis carries no
//! transactions and is exempt from the difficulty rule; its hash is still
//! computed the normal way so the link to block 1 verifies.

use provenant_core::{Block, LedgerError, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP};
use provenant_crypto::block_hash;

/// Build the deterministic genesis block.
pub fn genesis_block() -> Result<Block, LedgerError> {
    let mut block = Block {
        index: 0,
        timestamp: GENESIS_TIMESTAMP.to_string(),
        transactions: Vec::new(),
        previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        nonce: 0,
        hash: String::new(),
    };
    block.hash = block_hash(&block)?;
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_deterministic() {
        let a = genesis_block().unwrap();
        let b = genesis_block().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.index, 0);
        assert_eq!(a.previous_hash, "0");
        assert!(a.transactions.is_empty());
        assert_eq!(a.hash, block_hash(&a).unwrap());
    }
}
