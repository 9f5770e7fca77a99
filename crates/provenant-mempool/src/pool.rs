//! The mempool: admitted-but-unmined transactions in insertion order.
//!
//! Admission runs the full pipeline — shape, signature, identity binding,
//! duplicate, semantic order — so everything in the pool is sealable as-is.
//! The pool itself is not thread-safe; the node wraps it in its own lock.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use provenant_chain::{batch_state_of, batch_states, Chain};
use provenant_core::{BatchState, LedgerError, Transaction};
use provenant_crypto::{bind_identity, tx_identity, verify_transaction, KeyStore};

/// One pending transaction with its admission bookkeeping.
#[derive(Clone, Debug)]
pub struct PendingEntry {
    pub tx: Transaction,
    /// Signed-fields identity (see `tx_identity`), the at-most-once key.
    pub identity: String,
    pub admitted_at: DateTime<Utc>,
}

/// Everything admission needs from the rest of the node.
pub struct AdmissionContext<'a> {
    pub chain: &'a Chain,
    /// Identities of every transaction already sealed in a block.
    pub sealed_ids: &'a HashSet<String>,
    pub keystore: &'a KeyStore,
    /// When true, unsigned submissions are rejected outright.
    pub require_signatures: bool,
    pub hard_cap: usize,
}

#[derive(Default)]
pub struct Mempool {
    entries: Vec<PendingEntry>,
    ids: HashSet<String>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the admission pipeline and enqueue the transaction.
    ///
    /// Checks run in a fixed order so the client sees the most specific
    /// failure: shape → signature → identity → duplicate → semantic order.
    pub fn admit(&mut self, tx: Transaction, ctx: &AdmissionContext<'_>) -> Result<(), LedgerError> {
        tx.check_shape()?;

        if tx.is_signed() {
            let key = verify_transaction(&tx)?;
            bind_identity(ctx.keystore, &tx, &key)?;
        } else if ctx.require_signatures {
            return Err(LedgerError::InvalidSignature(
                "unsigned transactions are not accepted by this node".into(),
            ));
        }

        let identity = tx_identity(&tx)?;
        if self.ids.contains(&identity) || ctx.sealed_ids.contains(&identity) {
            return Err(LedgerError::DuplicateTransaction {
                batch_id: tx.batch_id.clone(),
                action: tx.action.to_string(),
                actor: tx.actor.clone(),
            });
        }

        // Semantic order: replay the batch across sealed blocks, then the
        // pool, then the candidate.
        let sealed_then_pending = ctx
            .chain
            .transactions()
            .map(|(_, sealed)| sealed)
            .chain(self.entries.iter().map(|e| &e.tx));
        let state = batch_state_of(sealed_then_pending, &tx.batch_id)?;
        state.apply(&tx)?;

        if self.entries.len() >= ctx.hard_cap {
            self.evict_one_unsigned()?;
        }

        self.ids.insert(identity.clone());
        self.entries.push(PendingEntry {
            tx,
            identity,
            admitted_at: Utc::now(),
        });
        Ok(())
    }

    /// Drop the oldest unsigned entry to make room. Signed valid entries are
    /// never dropped silently, so a pool full of them refuses new work.
    fn evict_one_unsigned(&mut self) -> Result<(), LedgerError> {
        let Some(pos) = self.entries.iter().position(|e| !e.tx.is_signed()) else {
            return Err(LedgerError::MempoolFull);
        };
        let evicted = self.entries.remove(pos);
        self.ids.remove(&evicted.identity);
        warn!(
            batch_id = %evicted.tx.batch_id,
            action = %evicted.tx.action,
            "mempool over capacity; evicted oldest unsigned entry"
        );
        Ok(())
    }

    /// Up to `max` transactions in insertion order, for block assembly.
    pub fn snapshot(&self, max: usize) -> Vec<Transaction> {
        self.entries.iter().take(max).map(|e| e.tx.clone()).collect()
    }

    /// Remove entries whose identities appear in `sealed` (transactions just
    /// included in a block, locally mined or received by gossip).
    pub fn remove_sealed(&mut self, sealed: &[Transaction]) -> usize {
        let mut gone: HashSet<String> = HashSet::new();
        for tx in sealed {
            if let Ok(id) = tx_identity(tx) {
                gone.insert(id);
            }
        }
        let before = self.entries.len();
        self.entries.retain(|e| !gone.contains(&e.identity));
        for id in &gone {
            self.ids.remove(id);
        }
        before - self.entries.len()
    }

    /// Drop entries older than `ttl_secs`, returning them so the caller can
    /// log each eviction — accepted transactions never vanish silently.
    pub fn evict_expired(&mut self, now: DateTime<Utc>, ttl_secs: i64) -> Vec<PendingEntry> {
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|e| (now - e.admitted_at).num_seconds() > ttl_secs);
        self.entries = kept;
        for e in &expired {
            self.ids.remove(&e.identity);
        }
        expired
    }

    /// After the chain changed under the pool (gossip append or chain
    /// adoption), drop entries that are now sealed or no longer replay.
    /// Returns what was dropped so the caller can log each removal.
    pub fn retain_sealable(
        &mut self,
        chain: &Chain,
        sealed_ids: &HashSet<String>,
    ) -> Vec<PendingEntry> {
        let mut states = match batch_states(chain.transactions().map(|(_, tx)| tx)) {
            Ok(states) => states,
            // An invalid local chain is handled by auto-heal; leave the pool
            // untouched until it is.
            Err(_) => return Vec::new(),
        };
        let mut dropped = Vec::new();
        let mut kept = Vec::new();
        for entry in self.entries.drain(..) {
            if sealed_ids.contains(&entry.identity) {
                dropped.push(entry);
                continue;
            }
            let state = states
                .get(&entry.tx.batch_id)
                .copied()
                .unwrap_or(BatchState::Absent);
            match state.apply(&entry.tx) {
                Ok(next) => {
                    states.insert(entry.tx.batch_id.clone(), next);
                    kept.push(entry);
                }
                Err(_) => dropped.push(entry),
            }
        }
        self.entries = kept;
        for e in &dropped {
            self.ids.remove(&e.identity);
        }
        dropped
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().map(|e| &e.tx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
