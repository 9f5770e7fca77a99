use std::path::PathBuf;

use provenant_core::{
    AUTO_MINE_INTERVAL_SECS, DEFAULT_DIFFICULTY, HEALTH_INTERVAL_SECS, MAX_BLOCK_TXS,
    MEMPOOL_HARD_CAP, MEMPOOL_MINE_THRESHOLD, REVALIDATE_INTERVAL_SECS, SYNC_INTERVAL_SECS,
    TX_TTL_SECS,
};

/// Everything a ledger node needs to run. Built by the binary from CLI
/// arguments and environment overrides, then threaded through the crates.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// HTTP listen port; also names the default database path.
    pub port: u16,

    /// Leading hex zeros required of every block hash.
    pub difficulty: u32,

    /// sled database location, `blockchain_<port>.db` by default.
    pub db_path: PathBuf,

    /// Directory of `<actor>_{private,public}.pem` files.
    pub keys_dir: PathBuf,

    /// Peer to join on startup, if any.
    pub bootstrap: Option<String>,

    /// When true (the default), unsigned transactions are rejected at
    /// admission and in sealed blocks.
    pub require_signatures: bool,

    pub mempool_threshold: usize,
    pub mempool_hard_cap: usize,
    pub max_block_txs: usize,
    pub tx_ttl_secs: i64,

    pub auto_mine_interval_secs: u64,
    pub health_interval_secs: u64,
    pub sync_interval_secs: u64,
    pub revalidate_interval_secs: u64,
}

impl NodeConfig {
    /// Defaults for a node listening on `port`.
    pub fn for_port(port: u16) -> Self {
        Self {
            port,
            difficulty: DEFAULT_DIFFICULTY,
            db_path: PathBuf::from(format!("blockchain_{port}.db")),
            keys_dir: PathBuf::from("keys"),
            bootstrap: None,
            require_signatures: true,
            mempool_threshold: MEMPOOL_MINE_THRESHOLD,
            mempool_hard_cap: MEMPOOL_HARD_CAP,
            max_block_txs: MAX_BLOCK_TXS,
            tx_ttl_secs: TX_TTL_SECS,
            auto_mine_interval_secs: AUTO_MINE_INTERVAL_SECS,
            health_interval_secs: HEALTH_INTERVAL_SECS,
            sync_interval_secs: SYNC_INTERVAL_SECS,
            revalidate_interval_secs: REVALIDATE_INTERVAL_SECS,
        }
    }

    /// The base URL peers use to reach this node.
    pub fn self_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}
