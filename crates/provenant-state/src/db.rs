use std::path::Path;

use tracing::debug;

use provenant_core::{Block, LedgerError};
use provenant_crypto::canonical_json_of;

/// Durable node state backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   chain — u64 big-endian index → canonical block JSON bytes
///   peers — normalized peer URL bytes → [] (membership set)
///
/// Big-endian keys keep sled's iteration order equal to chain order. Block
/// values use the canonical JSON encoding, so on-disk bytes re-hash to the
/// stored block hash.
pub struct ChainDb {
    db: sled::Db,
    chain: sled::Tree,
    peers: sled::Tree,
}

impl ChainDb {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let db = sled::open(path).map_err(storage_err)?;
        let chain = db.open_tree("chain").map_err(storage_err)?;
        let peers = db.open_tree("peers").map_err(storage_err)?;
        Ok(Self { db, chain, peers })
    }

    // ── Chain ────────────────────────────────────────────────────────────────

    /// Persist one sealed block and flush. One insert per seal keeps the
    /// write atomic at the block granularity.
    pub fn put_block(&self, block: &Block) -> Result<(), LedgerError> {
        let bytes = canonical_json_of(block)?;
        self.chain
            .insert(block.index.to_be_bytes(), bytes.into_bytes())
            .map_err(storage_err)?;
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    /// Load every persisted block in index order. A decode failure is
    /// surfaced as corruption for the caller to heal.
    pub fn load_blocks(&self) -> Result<Vec<Block>, LedgerError> {
        let mut blocks = Vec::with_capacity(self.chain.len());
        for item in self.chain.iter() {
            let (key, bytes) = item.map_err(storage_err)?;
            let block: Block = serde_json::from_slice(&bytes).map_err(|e| {
                LedgerError::Persistence(format!("corrupt block record {:?}: {e}", key))
            })?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Replace the whole persisted chain in one batch (chain adoption after
    /// longest-valid-chain resolution or auto-heal).
    pub fn replace_chain(&self, blocks: &[Block]) -> Result<(), LedgerError> {
        let mut batch = sled::Batch::default();
        for item in self.chain.iter() {
            let (key, _) = item.map_err(storage_err)?;
            batch.remove(key);
        }
        for block in blocks {
            let bytes = canonical_json_of(block)?;
            batch.insert(&block.index.to_be_bytes(), bytes.into_bytes());
        }
        self.chain.apply_batch(batch).map_err(storage_err)?;
        self.db.flush().map_err(storage_err)?;
        debug!(blocks = blocks.len(), "persisted chain replaced");
        Ok(())
    }

    pub fn block_count(&self) -> usize {
        self.chain.len()
    }

    // ── Peers ────────────────────────────────────────────────────────────────

    /// Remember an explicitly registered peer URL across restarts.
    pub fn add_peer(&self, url: &str) -> Result<(), LedgerError> {
        self.peers
            .insert(url.as_bytes(), b"".as_ref())
            .map_err(storage_err)?;
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    pub fn load_peers(&self) -> Result<Vec<String>, LedgerError> {
        let mut urls = Vec::new();
        for item in self.peers.iter() {
            let (key, _) = item.map_err(storage_err)?;
            let url = String::from_utf8(key.to_vec())
                .map_err(|_| LedgerError::Persistence("corrupt peer record".into()))?;
            urls.push(url);
        }
        Ok(urls)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}

fn storage_err(e: sled::Error) -> LedgerError {
    LedgerError::Persistence(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_db(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("provenant_db_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&path);
        path
    }

    fn block(index: u64, previous_hash: &str) -> Block {
        Block {
            index,
            timestamp: "2026-03-01T09:00:00.000000Z".into(),
            transactions: vec![],
            previous_hash: previous_hash.into(),
            nonce: index * 17,
            hash: format!("00hash{index}"),
        }
    }

    #[test]
    fn blocks_round_trip_in_index_order() {
        let path = temp_db("roundtrip");
        let db = ChainDb::open(&path).unwrap();
        // Insert out of order; big-endian keys must restore chain order.
        db.put_block(&block(2, "00hash1")).unwrap();
        db.put_block(&block(0, "0")).unwrap();
        db.put_block(&block(1, "00hash0")).unwrap();

        let loaded = db.load_blocks().unwrap();
        let indices: Vec<u64> = loaded.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(loaded[1], block(1, "00hash0"));

        drop(db);
        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn replace_chain_drops_stale_tail() {
        let path = temp_db("replace");
        let db = ChainDb::open(&path).unwrap();
        for i in 0..5 {
            db.put_block(&block(i, "x")).unwrap();
        }
        db.replace_chain(&[block(0, "0"), block(1, "00hash0")]).unwrap();
        assert_eq!(db.block_count(), 2);
        assert_eq!(db.load_blocks().unwrap().len(), 2);

        drop(db);
        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn corrupt_record_is_reported_as_persistence_error() {
        let path = temp_db("corrupt");
        {
            let db = ChainDb::open(&path).unwrap();
            db.put_block(&block(0, "0")).unwrap();
            // Overwrite the record with bytes that are not a block.
            db.chain.insert(0u64.to_be_bytes(), b"not json".as_ref()).unwrap();
            db.flush().unwrap();
            assert!(matches!(
                db.load_blocks(),
                Err(LedgerError::Persistence(_))
            ));
        }
        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn peers_survive_reopen() {
        let path = temp_db("peers");
        {
            let db = ChainDb::open(&path).unwrap();
            db.add_peer("http://127.0.0.1:9001").unwrap();
            db.add_peer("http://127.0.0.1:9002").unwrap();
        }
        {
            let db = ChainDb::open(&path).unwrap();
            let mut peers = db.load_peers().unwrap();
            peers.sort();
            assert_eq!(
                peers,
                vec!["http://127.0.0.1:9001".to_string(), "http://127.0.0.1:9002".to_string()]
            );
        }
        let _ = std::fs::remove_dir_all(&path);
    }
}
