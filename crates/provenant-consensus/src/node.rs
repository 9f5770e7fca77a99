use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info, warn};

use provenant_chain::{batch_history, verify_batch, BatchEvent, BatchVerification, Chain};
use provenant_core::{time, Block, LedgerError, Transaction};
use provenant_crypto::{tx_identity, KeyStore};
use provenant_mempool::{AdmissionContext, Mempool};
use provenant_p2p::{normalize_url, PeerClient, PeerRegistry};
use provenant_state::ChainDb;

use crate::config::NodeConfig;
use crate::miner;

/// The chain and the set of sealed transaction identities, updated together
/// under one lock so admission always sees a consistent pair.
pub(crate) struct ChainState {
    pub chain: Chain,
    pub sealed_ids: HashSet<String>,
}

/// What happened to a gossiped block.
#[derive(Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The block extended the local head and was appended.
    Appended,
    /// The block is well-formed but does not extend the head; the caller
    /// should trigger a full longest-valid-chain resolution.
    Fork,
}

/// One ledger node: a full replica plus the shared state every HTTP handler
/// and background task works against.
///
/// Lock discipline: the chain head has a single exclusive lock (mining
/// commit, gossip append, and chain replacement take it for writing;
/// readers snapshot), the mempool and peer registry each have their own.
/// Always acquire chain before mempool.
pub struct LedgerNode {
    pub(crate) cfg: NodeConfig,
    pub(crate) db: ChainDb,
    pub(crate) keystore: KeyStore,

    pub(crate) state: RwLock<ChainState>,
    pub(crate) mempool: Mutex<Mempool>,
    pub(crate) peers: PeerRegistry,
    pub(crate) client: PeerClient,

    pub(crate) chain_valid: AtomicBool,
    pub(crate) validation_message: StdMutex<String>,

    /// Mutual exclusion for mining attempts.
    pub(crate) mining: Mutex<()>,
    /// Set when a gossip append or chain adoption makes the running nonce
    /// search stale.
    pub(crate) cancel_mining: AtomicBool,
    /// Woken when the mempool crosses the mining threshold.
    mine_signal: Notify,
}

impl LedgerNode {
    /// Open the durable store, load and validate the chain, and assemble
    /// the node. A fresh database starts at genesis; a corrupt or invalid
    /// one comes up with `chain_valid = false`, refusing writes until
    /// auto-heal replaces it.
    pub fn open(cfg: NodeConfig) -> Result<Arc<Self>, LedgerError> {
        let keystore = KeyStore::open(&cfg.keys_dir)?;
        if cfg.require_signatures && keystore.actor_count() == 0 {
            warn!(dir = %cfg.keys_dir.display(), "no actor keys found; every signed submission will be rejected");
        }

        let db = ChainDb::open(&cfg.db_path)?;
        let (chain, load_error) = match db.load_blocks() {
            Ok(blocks) if blocks.is_empty() => {
                let chain = Chain::genesis()?;
                db.put_block(chain.head())?;
                info!("fresh database — genesis sealed");
                (chain, None)
            }
            Ok(blocks) => (Chain::from_blocks(blocks), None),
            Err(e) => {
                warn!(error = %e, "persisted chain unreadable; starting from genesis pending auto-heal");
                (Chain::genesis()?, Some(e.to_string()))
            }
        };

        let sealed_ids = collect_sealed_ids(&chain)?;

        let (valid, message) = match load_error {
            Some(e) => (false, format!("persisted chain corrupt: {e}")),
            None => match chain.validate(cfg.difficulty, cfg.require_signatures) {
                Ok(()) => (true, "chain is valid".to_string()),
                Err(fault) => (false, fault.to_string()),
            },
        };
        if valid {
            info!(length = chain.len(), "chain loaded and validated");
        } else {
            warn!(length = chain.len(), message = %message, "chain failed validation at startup");
        }

        let peers = PeerRegistry::new(&cfg.self_url())?;
        for url in db.load_peers()? {
            if let Err(e) = peers.add(&url) {
                warn!(url = %url, error = %e, "ignoring unusable persisted peer");
            }
        }

        Ok(Arc::new(Self {
            client: PeerClient::new()?,
            keystore,
            db,
            state: RwLock::new(ChainState { chain, sealed_ids }),
            mempool: Mutex::new(Mempool::new()),
            peers,
            chain_valid: AtomicBool::new(valid),
            validation_message: StdMutex::new(message),
            mining: Mutex::new(()),
            cancel_mining: AtomicBool::new(false),
            mine_signal: Notify::new(),
            cfg,
        }))
    }

    // ── Admission ────────────────────────────────────────────────────────────

    /// Run the full admission pipeline and enqueue the transaction. Wakes
    /// the miner when the pool crosses the configured threshold.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<(), LedgerError> {
        if !self.is_chain_valid() {
            return Err(LedgerError::ChainInvalid(self.validation_message()));
        }

        let state = self.state.read().await;
        let mut pool = self.mempool.lock().await;
        let ctx = AdmissionContext {
            chain: &state.chain,
            sealed_ids: &state.sealed_ids,
            keystore: &self.keystore,
            require_signatures: self.cfg.require_signatures,
            hard_cap: self.cfg.mempool_hard_cap,
        };
        pool.admit(tx, &ctx)?;
        let size = pool.len();
        drop(pool);
        drop(state);

        if size >= self.cfg.mempool_threshold {
            debug!(size, "mempool crossed mining threshold");
            self.mine_signal.notify_one();
        }
        Ok(())
    }

    // ── Mining ───────────────────────────────────────────────────────────────

    /// One mining attempt: snapshot the mempool, search for a nonce, append
    /// atomically, gossip. Returns the new block index, or `None` when the
    /// mempool was empty. At most one attempt runs at a time; a stale head
    /// (someone else extended it mid-search) surfaces as `MiningCancelled`
    /// and the transactions stay pooled.
    pub async fn mine_once(self: Arc<Self>) -> Result<Option<u64>, LedgerError> {
        if !self.is_chain_valid() {
            return Err(LedgerError::ChainInvalid(self.validation_message()));
        }
        let _mining = self.mining.lock().await;

        // Snapshot under shared locks, then search without holding any.
        let (head_index, head_hash, txs) = {
            let state = self.state.read().await;
            let pool = self.mempool.lock().await;
            let txs = pool.snapshot(self.cfg.max_block_txs);
            (state.chain.head().index, state.chain.head().hash.clone(), txs)
        };
        if txs.is_empty() {
            return Ok(None);
        }

        let candidate = Block {
            index: head_index + 1,
            timestamp: time::now(),
            transactions: txs,
            previous_hash: head_hash,
            nonce: 0,
            hash: String::new(),
        };

        self.cancel_mining.store(false, Ordering::SeqCst);
        let difficulty = self.cfg.difficulty;
        let worker = Arc::clone(&self);
        let sealed = tokio::task::spawn_blocking(move || {
            miner::seal(candidate, difficulty, &worker.cancel_mining)
        })
        .await
        .map_err(|e| LedgerError::Persistence(format!("mining task failed: {e}")))??;

        let Some(sealed) = sealed else {
            info!("mining attempt cancelled by head change");
            return Err(LedgerError::MiningCancelled);
        };

        // Commit: validate against the (possibly moved) head, persist,
        // update memory, drain the pool.
        {
            let mut state = self.state.write().await;
            if state.chain.head().hash != sealed.previous_hash {
                info!("sealed block is stale; discarding attempt");
                return Err(LedgerError::MiningCancelled);
            }
            state
                .chain
                .append(sealed.clone(), difficulty, self.cfg.require_signatures)?;
            if let Err(e) = self.db.put_block(&sealed) {
                state.chain.pop();
                return Err(e);
            }
            for tx in &sealed.transactions {
                state.sealed_ids.insert(tx_identity(tx)?);
            }
            let mut pool = self.mempool.lock().await;
            pool.remove_sealed(&sealed.transactions);
        }

        info!(
            index = sealed.index,
            txs = sealed.transactions.len(),
            nonce = sealed.nonce,
            "block sealed"
        );
        broadcast_block(&self, &sealed);
        Ok(Some(sealed.index))
    }

    // ── Gossip intake ────────────────────────────────────────────────────────

    /// Handle a block received from a peer. Appends iff it extends the
    /// local head exactly; a well-formed non-extending block is a fork for
    /// the caller to resolve. Invalid blocks error out (HTTP 400).
    pub async fn receive_block(&self, block: Block) -> Result<ReceiveOutcome, LedgerError> {
        if !self.is_chain_valid() {
            // Local replica is untrusted; let resolution sort it out.
            return Ok(ReceiveOutcome::Fork);
        }

        let mut state = self.state.write().await;
        let head = state.chain.head();
        if block.index != head.index + 1 || block.previous_hash != head.hash {
            debug!(
                got = block.index,
                head = head.index,
                "received block does not extend head"
            );
            return Ok(ReceiveOutcome::Fork);
        }

        state
            .chain
            .append(block.clone(), self.cfg.difficulty, self.cfg.require_signatures)?;
        if let Err(e) = self.db.put_block(&block) {
            state.chain.pop();
            return Err(e);
        }
        for tx in &block.transactions {
            state.sealed_ids.insert(tx_identity(tx)?);
        }

        // Our own nonce search, if any, now extends a stale head.
        self.cancel_mining.store(true, Ordering::SeqCst);

        let mut pool = self.mempool.lock().await;
        pool.remove_sealed(&block.transactions);
        let dropped = pool.retain_sealable(&state.chain, &state.sealed_ids);
        for entry in dropped {
            warn!(
                batch_id = %entry.tx.batch_id,
                action = %entry.tx.action,
                "pending transaction invalidated by received block; dropped"
            );
        }

        info!(index = block.index, "appended block from peer");
        Ok(ReceiveOutcome::Appended)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub async fn chain_snapshot(&self) -> Vec<Block> {
        self.state.read().await.chain.blocks().to_vec()
    }

    pub async fn chain_length(&self) -> usize {
        self.state.read().await.chain.len()
    }

    pub async fn history(&self, batch_id: &str) -> Vec<BatchEvent> {
        let state = self.state.read().await;
        batch_history(&state.chain, batch_id)
    }

    pub async fn verify(&self, batch_id: &str) -> BatchVerification {
        let state = self.state.read().await;
        verify_batch(&state.chain, batch_id, self.cfg.require_signatures)
    }

    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.mempool.lock().await.transactions().cloned().collect()
    }

    pub async fn mempool_size(&self) -> usize {
        self.mempool.lock().await.len()
    }

    pub fn is_chain_valid(&self) -> bool {
        self.chain_valid.load(Ordering::SeqCst)
    }

    pub fn validation_message(&self) -> String {
        self.validation_message
            .lock()
            .expect("validation message lock poisoned")
            .clone()
    }

    pub(crate) fn set_validity(&self, valid: bool, message: impl Into<String>) {
        self.chain_valid.store(valid, Ordering::SeqCst);
        *self
            .validation_message
            .lock()
            .expect("validation message lock poisoned") = message.into();
    }

    pub fn config(&self) -> &NodeConfig {
        &self.cfg
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn client(&self) -> &PeerClient {
        &self.client
    }

    // ── Peer registration ────────────────────────────────────────────────────

    /// Explicit registration: add to the registry and persist so the peer
    /// survives restarts.
    pub fn register_peer(&self, url: &str) -> Result<bool, LedgerError> {
        let normalized = normalize_url(url)?;
        if normalized == self.peers.self_url() {
            return Ok(false);
        }
        let added = self.peers.add(&normalized)?;
        self.db.add_peer(&normalized)?;
        if added {
            info!(url = %normalized, "peer registered");
        }
        Ok(added)
    }

    // ── Mining signal & housekeeping ─────────────────────────────────────────

    /// Wait until admission signals a threshold crossing.
    pub async fn wait_mine_signal(&self) {
        self.mine_signal.notified().await;
    }

    /// Drop pooled transactions past their TTL, logging every eviction so
    /// no accepted transaction vanishes silently.
    pub async fn evict_expired_pending(&self) {
        let mut pool = self.mempool.lock().await;
        for entry in pool.evict_expired(Utc::now(), self.cfg.tx_ttl_secs) {
            warn!(
                batch_id = %entry.tx.batch_id,
                action = %entry.tx.action,
                admitted_at = %entry.admitted_at,
                "pending transaction expired before inclusion; evicted"
            );
        }
    }
}

/// Gossip a sealed block to every healthy peer. Sends are initiated by the
/// miner while it still holds the mining mutex and complete asynchronously;
/// a 409 from a peer means we may be the ones behind, so it triggers a
/// resolution.
fn broadcast_block(node: &Arc<LedgerNode>, block: &Block) {
    for peer in node.peers.healthy_urls() {
        let node = Arc::clone(node);
        let block = block.clone();
        tokio::spawn(async move {
            match node.client.send_block(&peer, &block).await {
                Ok(409) => {
                    warn!(peer = %peer, "peer reported a fork; resolving");
                    if let Err(e) = node.resolve_conflicts().await {
                        warn!(error = %e, "fork resolution after gossip failed");
                    }
                }
                Ok(status) if status >= 400 => {
                    debug!(peer = %peer, status, "peer rejected gossiped block");
                }
                Ok(_) => {}
                Err(e) => debug!(peer = %peer, error = %e, "block gossip failed"),
            }
        });
    }
}

pub(crate) fn collect_sealed_ids(chain: &Chain) -> Result<HashSet<String>, LedgerError> {
    chain.transactions().map(|(_, tx)| tx_identity(tx)).collect()
}

// Node and transaction fixtures shared with the sync tests.
#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU16;

    use once_cell::sync::Lazy;

    use provenant_core::Action;
    use provenant_crypto::{sign_transaction, KeyPair};

    static KEYS_DIR: Lazy<PathBuf> = Lazy::new(|| {
        let dir = std::env::temp_dir().join(format!("provenant_node_keys_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        KeyPair::generate("Supplier_A").unwrap().write_to_dir(&dir).unwrap();
        dir
    });
    static SIGNER: Lazy<KeyPair> = Lazy::new(|| {
        KeyStore::open(&*KEYS_DIR).unwrap().load_keypair("Supplier_A").unwrap()
    });
    static NEXT_PORT: AtomicU16 = AtomicU16::new(19_000);

    /// A fully assembled node at difficulty 1 over a fresh temp database.
    pub fn test_node(tag: &str) -> Arc<LedgerNode> {
        let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
        let db_path = std::env::temp_dir().join(format!(
            "provenant_node_db_{tag}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&db_path);
        let mut cfg = NodeConfig::for_port(port);
        cfg.difficulty = 1;
        cfg.db_path = db_path;
        cfg.keys_dir = KEYS_DIR.clone();
        LedgerNode::open(cfg).unwrap()
    }

    pub fn signed(batch: &str, action: Action, micros: u64) -> Transaction {
        let mut tx = Transaction {
            batch_id: batch.into(),
            action,
            actor: "Supplier_A".into(),
            timestamp: format!("2026-03-01T08:30:00.{micros:06}Z"),
            metadata: BTreeMap::new(),
            signature: None,
            public_key: None,
        };
        sign_transaction(&SIGNER, &mut tx).unwrap();
        tx
    }
}
