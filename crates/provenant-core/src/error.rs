use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    // ── Admission errors (client's fault, 4xx) ───────────────────────────────
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("unknown actor: {0}")]
    UnknownActor(String),

    #[error("{0}")]
    InvalidOrder(String),

    #[error("duplicate transaction: {action} for batch {batch_id} by {actor}")]
    DuplicateTransaction {
        batch_id: String,
        action: String,
        actor: String,
    },

    // ── Consensus / validation errors ────────────────────────────────────────
    #[error("chain invalid: {0}")]
    ChainInvalid(String),

    #[error("no healthy peers available")]
    NoHealthyPeers,

    // ── Mining ───────────────────────────────────────────────────────────────
    #[error("mining attempt cancelled")]
    MiningCancelled,

    // ── Crypto ───────────────────────────────────────────────────────────────
    #[error("no key material for actor: {0}")]
    KeyNotFound(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    // ── Infrastructure (5xx) ─────────────────────────────────────────────────
    #[error("mempool is full and no entry is evictable")]
    MempoolFull,

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("peer request failed: {0}")]
    Peer(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
