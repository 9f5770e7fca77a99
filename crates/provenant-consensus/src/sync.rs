//! Longest-valid-chain resolution and auto-heal.
//!
//! A candidate chain is adopted only when it is strictly longer than the
//! local one AND passes full validation — ties keep the local chain. The
//! one exception is healing: when the local replica is already known
//! invalid, the longest valid peer chain wins regardless of local length,
//! because local length counts for nothing once its contents are untrusted.

use std::sync::atomic::Ordering;

use tracing::{debug, info, warn};

use provenant_chain::Chain;
use provenant_core::LedgerError;

use crate::node::{collect_sealed_ids, LedgerNode};

/// Result of one resolution pass, as reported by `POST /sync`.
#[derive(Debug, Clone, Copy)]
pub struct SyncOutcome {
    pub adopted: bool,
    pub new_length: usize,
}

impl LedgerNode {
    /// Ask every healthy peer for its chain and adopt the best strict
    /// improvement, replacing durable and in-memory state together.
    pub async fn resolve_conflicts(&self) -> Result<SyncOutcome, LedgerError> {
        let healing = !self.is_chain_valid();
        let local_len = self.chain_length().await;
        let peers = self.peers.healthy_urls();
        if peers.is_empty() {
            debug!("no healthy peers; nothing to resolve against");
            return Ok(SyncOutcome {
                adopted: false,
                new_length: local_len,
            });
        }

        let mut best: Option<Chain> = None;
        for peer in peers {
            let blocks = match self.client.fetch_chain(&peer).await {
                Ok(blocks) => blocks,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "chain fetch failed");
                    self.peers.mark(&peer, false);
                    continue;
                }
            };
            let candidate = Chain::from_blocks(blocks);
            let bar = match &best {
                Some(b) => b.len(),
                None if healing => 0,
                None => local_len,
            };
            if candidate.len() <= bar {
                continue;
            }
            if let Err(fault) = candidate.validate(self.cfg.difficulty, self.cfg.require_signatures)
            {
                warn!(peer = %peer, fault = %fault, "peer offered an invalid chain; ignoring");
                continue;
            }
            best = Some(candidate);
        }

        let Some(best) = best else {
            debug!(healing, local_len, "no peer chain improves on local");
            return Ok(SyncOutcome {
                adopted: false,
                new_length: local_len,
            });
        };

        let sealed_ids = collect_sealed_ids(&best)?;
        let mut state = self.state.write().await;
        // The head may have moved while we were fetching; re-check the
        // strict-improvement rule against the current length.
        if !healing && best.len() <= state.chain.len() {
            let new_length = state.chain.len();
            return Ok(SyncOutcome {
                adopted: false,
                new_length,
            });
        }

        self.db.replace_chain(best.blocks())?;
        state.chain = best;
        state.sealed_ids = sealed_ids;
        self.cancel_mining.store(true, Ordering::SeqCst);

        // Entries now sealed in the adopted chain, or no longer replayable
        // on top of it, leave the pool with a logged reason.
        let mut pool = self.mempool.lock().await;
        for entry in pool.retain_sealable(&state.chain, &state.sealed_ids) {
            warn!(
                batch_id = %entry.tx.batch_id,
                action = %entry.tx.action,
                "pending transaction superseded by adopted chain; dropped"
            );
        }

        let new_length = state.chain.len();
        self.set_validity(true, "chain is valid");
        info!(new_length, healing, "adopted chain from peers");
        Ok(SyncOutcome {
            adopted: true,
            new_length,
        })
    }

    /// Re-validate the local chain; on failure mark the node invalid (it
    /// refuses writes) and attempt to heal from peers. Covers the
    /// corrupted-replica recovery path: a node whose stored blocks were
    /// tampered with comes back once a healthy peer offers a valid chain.
    pub async fn revalidate_and_heal(&self) {
        let fault = {
            let state = self.state.read().await;
            state
                .chain
                .validate(self.cfg.difficulty, self.cfg.require_signatures)
                .err()
        };

        match fault {
            None => {
                if !self.is_chain_valid() {
                    info!("local chain validates again");
                    self.set_validity(true, "chain is valid");
                }
            }
            Some(fault) => {
                warn!(fault = %fault, "local chain failed validation; attempting auto-heal");
                self.set_validity(false, fault.to_string());
                match self.resolve_conflicts().await {
                    Ok(outcome) if outcome.adopted => {
                        info!(length = outcome.new_length, "auto-heal replaced local chain");
                    }
                    Ok(_) => {
                        warn!("no peer offered a valid replacement; node stays read-only");
                    }
                    Err(e) => warn!(error = %e, "auto-heal attempt failed"),
                }
            }
        }
    }
}
