//! Per-batch projections over the chain: replayed lifecycle state, ordered
//! event history, and provenance verification.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use provenant_core::{Action, BatchState, LedgerError, Transaction};
use provenant_crypto::verify_transaction;

use crate::chain::Chain;

/// Replay a transaction stream into the final state of every batch seen.
/// Fails on the first ordering violation, which cannot happen for streams
/// drawn from a validated chain.
pub fn batch_states<'a>(
    txs: impl Iterator<Item = &'a Transaction>,
) -> Result<HashMap<String, BatchState>, LedgerError> {
    let mut states: HashMap<String, BatchState> = HashMap::new();
    for tx in txs {
        let state = states
            .get(&tx.batch_id)
            .copied()
            .unwrap_or(BatchState::Absent);
        let next = state.apply(tx)?;
        states.insert(tx.batch_id.clone(), next);
    }
    Ok(states)
}

/// The current state of one batch given a transaction stream (sealed blocks
/// first, then mempool entries, in order). Ordering violations inside the
/// stream surface as errors.
pub fn batch_state_of<'a>(
    txs: impl Iterator<Item = &'a Transaction>,
    batch_id: &str,
) -> Result<BatchState, LedgerError> {
    let mut state = BatchState::Absent;
    for tx in txs.filter(|tx| tx.batch_id == batch_id) {
        state = state.apply(tx)?;
    }
    Ok(state)
}

/// One recorded event of a batch's history, as served by `/history` and
/// `/verify`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchEvent {
    pub action: Action,
    pub actor: String,
    pub timestamp: String,
    pub metadata: BTreeMap<String, String>,
    pub block_index: u64,
}

/// All sealed events for `batch_id`, in chain order.
pub fn batch_history(chain: &Chain, batch_id: &str) -> Vec<BatchEvent> {
    chain
        .transactions()
        .filter(|(_, tx)| tx.batch_id == batch_id)
        .map(|(block_index, tx)| BatchEvent {
            action: tx.action,
            actor: tx.actor.clone(),
            timestamp: tx.timestamp.clone(),
            metadata: tx.metadata.clone(),
            block_index,
        })
        .collect()
}

/// Outcome of a provenance check for one batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchVerification {
    pub verified: bool,
    pub message: String,
    pub events: Vec<BatchEvent>,
}

/// Provenance check: every sealed event for the batch carries a verifying
/// signature (when required) and the projected action sequence is a valid
/// lifecycle path.
pub fn verify_batch(chain: &Chain, batch_id: &str, require_signatures: bool) -> BatchVerification {
    let events = batch_history(chain, batch_id);
    if events.is_empty() {
        return BatchVerification {
            verified: false,
            message: format!("no transactions recorded for batch {batch_id}"),
            events,
        };
    }

    let mut state = BatchState::Absent;
    for (_, tx) in chain
        .transactions()
        .filter(|(_, tx)| tx.batch_id == batch_id)
    {
        if tx.is_signed() {
            if let Err(e) = verify_transaction(tx) {
                return BatchVerification {
                    verified: false,
                    message: format!("signature check failed: {e}"),
                    events,
                };
            }
        } else if require_signatures {
            return BatchVerification {
                verified: false,
                message: format!("unsigned event '{}' in history", tx.action),
                events,
            };
        }
        state = match state.apply(tx) {
            Ok(next) => next,
            Err(e) => {
                return BatchVerification {
                    verified: false,
                    message: e.to_string(),
                    events,
                };
            }
        };
    }

    BatchVerification {
        verified: true,
        message: format!(
            "provenance verified: {} events, current state '{state}'",
            events.len()
        ),
        events,
    }
}

// ── Test fixtures shared across the crate ─────────────────────────────────────

#[cfg(test)]
pub(crate) mod testchain {
    use std::sync::atomic::{AtomicU64, Ordering};

    use once_cell::sync::Lazy;

    use provenant_core::{meets_difficulty, Action, Block, Transaction};
    use provenant_crypto::{block_hash, sign_transaction, KeyPair};

    use crate::chain::Chain;

    static SIGNER: Lazy<KeyPair> = Lazy::new(|| KeyPair::generate("Supplier_A").unwrap());
    static SEQ: AtomicU64 = AtomicU64::new(0);

    /// A signed transaction with a unique timestamp. Chain-level validation
    /// checks the embedded key only, so one signer serves every actor name.
    pub fn signed_tx(
        batch: &str,
        action: Action,
        actor: &str,
        metadata: &[(&str, &str)],
    ) -> Transaction {
        let n = SEQ.fetch_add(1, Ordering::Relaxed);
        let mut tx = Transaction {
            batch_id: batch.into(),
            action,
            actor: actor.into(),
            timestamp: format!("2026-03-01T08:30:00.{:06}Z", n),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            signature: None,
            public_key: None,
        };
        sign_transaction(&SIGNER, &mut tx).unwrap();
        tx
    }

    /// Seal a block over `txs` by brute-forcing the nonce at `difficulty`.
    pub fn mine(index: u64, previous_hash: String, txs: Vec<Transaction>, difficulty: u32) -> Block {
        let mut block = Block {
            index,
            timestamp: "2026-03-01T09:00:00.000000Z".into(),
            transactions: txs,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        loop {
            let hash = block_hash(&block).unwrap();
            if meets_difficulty(&hash, difficulty) {
                block.hash = hash;
                return block;
            }
            block.nonce += 1;
        }
    }

    /// Genesis plus two sealed blocks carrying the first four lifecycle
    /// events of batch `LOT_7`.
    pub fn test_chain_with_lifecycle(difficulty: u32) -> Chain {
        let mut chain = Chain::genesis().unwrap();
        let b1 = mine(
            1,
            chain.head().hash.clone(),
            vec![
                signed_tx("LOT_7", Action::Registered, "Supplier_A", &[("product", "olive oil")]),
                signed_tx("LOT_7", Action::QualityChecked, "Supplier_A", &[("result", "passed")]),
            ],
            difficulty,
        );
        chain.append(b1, difficulty, true).unwrap();
        let b2 = mine(
            2,
            chain.head().hash.clone(),
            vec![
                signed_tx("LOT_7", Action::Shipped, "Supplier_A", &[("from", "Supplier_A"), ("to", "Distributor_B")]),
                signed_tx("LOT_7", Action::Received, "Distributor_B", &[]),
            ],
            difficulty,
        );
        chain.append(b2, difficulty, true).unwrap();
        chain
    }
}
