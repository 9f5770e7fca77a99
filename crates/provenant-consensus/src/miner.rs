//! The nonce search.
//!
//! Single-threaded and CPU-bound; callers run it on a blocking thread. The
//! search polls a cancellation flag so an arriving peer block that extends
//! the same head can abandon the attempt promptly.

use std::sync::atomic::{AtomicBool, Ordering};

use provenant_core::{meets_difficulty, Block, LedgerError, MINE_CANCEL_CHECK_INTERVAL};
use provenant_crypto::block_hash;

/// Increment `nonce` until the candidate's hash meets `difficulty`, filling
/// in the winning hash. Returns `None` when cancelled mid-search.
pub fn seal(mut block: Block, difficulty: u32, cancel: &AtomicBool) -> Result<Option<Block>, LedgerError> {
    loop {
        let hash = block_hash(&block)?;
        if meets_difficulty(&hash, difficulty) {
            block.hash = hash;
            return Ok(Some(block));
        }
        block.nonce += 1;
        if block.nonce % MINE_CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Block {
        Block {
            index: 1,
            timestamp: "2026-03-01T09:00:00.000000Z".into(),
            transactions: vec![],
            previous_hash: "00abcd".into(),
            nonce: 0,
            hash: String::new(),
        }
    }

    #[test]
    fn sealed_block_meets_difficulty() {
        let cancel = AtomicBool::new(false);
        let sealed = seal(candidate(), 2, &cancel).unwrap().unwrap();
        assert!(sealed.hash.starts_with("00"));
        assert_eq!(sealed.hash, block_hash(&sealed).unwrap());
    }

    #[test]
    fn cancellation_abandons_the_search() {
        // 64 leading zeros is unreachable; the pre-set flag must stop the
        // search at the first poll.
        let cancel = AtomicBool::new(true);
        let result = seal(candidate(), 64, &cancel).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn difficulty_zero_seals_immediately() {
        let cancel = AtomicBool::new(false);
        let sealed = seal(candidate(), 0, &cancel).unwrap().unwrap();
        assert_eq!(sealed.nonce, 0);
    }
}
