//! ─── Provenant Protocol Constants ───────────────────────────────────────────
//!
//! A replicated append-only ledger for multi-party supply-chain tracking.
//! Every node holds a full replica; agreement is longest-valid-chain.

// ── Genesis ──────────────────────────────────────────────────────────────────

/// Timestamp baked into the genesis block. Fixed so that every node derives
/// a byte-identical genesis and therefore an identical genesis hash.
pub const GENESIS_TIMESTAMP: &str = "2024-01-01T00:00:00.000000Z";

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

// ── Proof-of-Work ────────────────────────────────────────────────────────────

/// Default difficulty: leading hexadecimal zero characters required in a
/// block hash. Small networks on commodity hardware seal in well under a
/// second at this setting.
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// The nonce search polls its cancellation flag at least this often.
pub const MINE_CANCEL_CHECK_INTERVAL: u64 = 10_000;

// ── Mempool ──────────────────────────────────────────────────────────────────

/// Pending-transaction count at which a mining attempt is triggered
/// immediately, without waiting for the periodic timer.
pub const MEMPOOL_MINE_THRESHOLD: usize = 10;

/// Hard cap on mempool size. Beyond this, the oldest unsigned entries are
/// evicted; signed valid entries are never dropped silently.
pub const MEMPOOL_HARD_CAP: usize = 1_000;

/// Maximum transactions sealed into a single block.
pub const MAX_BLOCK_TXS: usize = 100;

/// Pending transactions older than this are evicted with a logged reason.
pub const TX_TTL_SECS: i64 = 3_600;

// ── Background task intervals (seconds) ──────────────────────────────────────

/// Periodic mining trigger when the mempool is non-empty.
pub const AUTO_MINE_INTERVAL_SECS: u64 = 60;

/// Peer health probe interval.
pub const HEALTH_INTERVAL_SECS: u64 = 30;

/// Periodic longest-valid-chain resolution interval.
pub const SYNC_INTERVAL_SECS: u64 = 30;

/// Periodic local chain re-validation (and auto-heal) interval.
pub const REVALIDATE_INTERVAL_SECS: u64 = 60;

// ── Networking ───────────────────────────────────────────────────────────────

/// Recursive peer discovery walks `/nodes` of newly learned peers up to
/// this many hops from the bootstrap node.
pub const PEER_DISCOVERY_DEPTH: u32 = 2;

/// Timeout for peer chain fetches and gossip posts.
pub const PEER_FETCH_TIMEOUT_SECS: u64 = 10;

/// Timeout for the lightweight `/status` health probe.
pub const PEER_PROBE_TIMEOUT_SECS: u64 = 5;
