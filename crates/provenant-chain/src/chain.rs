use std::collections::HashMap;
use std::fmt;

use provenant_core::{meets_difficulty, BatchState, Block, LedgerError, Transaction};
use provenant_crypto::{block_hash, verify_transaction};

use crate::genesis::genesis_block;

// ── Validation faults ─────────────────────────────────────────────────────────

/// What kind of invariant a block violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    HashMismatch,
    LinkBreak,
    BadPow,
    BadSignature,
    SemanticViolation,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::HashMismatch => "hash-mismatch",
            FaultKind::LinkBreak => "link-break",
            FaultKind::BadPow => "bad-pow",
            FaultKind::BadSignature => "bad-signature",
            FaultKind::SemanticViolation => "semantic-violation",
        };
        f.write_str(s)
    }
}

/// The first offence found by a full-chain validation walk.
#[derive(Clone, Debug)]
pub struct ChainFault {
    pub index: u64,
    pub kind: FaultKind,
    pub detail: String,
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}: {} ({})", self.index, self.kind, self.detail)
    }
}

impl ChainFault {
    fn new(index: u64, kind: FaultKind, detail: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            detail: detail.into(),
        }
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// The ordered sequence of blocks, genesis first. Append-only: blocks are
/// never mutated once present.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// A fresh chain holding only the deterministic genesis.
    pub fn genesis() -> Result<Self, LedgerError> {
        Ok(Self {
            blocks: vec![genesis_block()?],
        })
    }

    /// Wrap blocks loaded from disk or fetched from a peer. Callers must
    /// run [`Chain::validate`] before trusting the result.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The latest sealed block. Panics only on an empty chain, which no
    /// constructor in this crate produces.
    pub fn head(&self) -> &Block {
        self.blocks.last().expect("chain always holds genesis")
    }

    /// Every sealed transaction with the index of its containing block, in
    /// chain order.
    pub fn transactions(&self) -> impl Iterator<Item = (u64, &Transaction)> {
        self.blocks
            .iter()
            .flat_map(|b| b.transactions.iter().map(move |tx| (b.index, tx)))
    }

    // ── Validation ───────────────────────────────────────────────────────────

    /// Walk the chain in index order and check every invariant: genesis
    /// identity, index monotonicity, hash links, recomputed hashes, the
    /// difficulty rule, transaction signatures, and per-batch action
    /// ordering. Reports the first offence.
    pub fn validate(&self, difficulty: u32, require_signatures: bool) -> Result<(), ChainFault> {
        let expected_genesis = genesis_block()
            .map_err(|e| ChainFault::new(0, FaultKind::HashMismatch, e.to_string()))?;

        let Some(first) = self.blocks.first() else {
            return Err(ChainFault::new(
                0,
                FaultKind::LinkBreak,
                "chain has no genesis block",
            ));
        };
        if *first != expected_genesis {
            return Err(ChainFault::new(
                0,
                FaultKind::HashMismatch,
                "genesis does not match the agreed founding block",
            ));
        }

        let mut states: HashMap<String, BatchState> = HashMap::new();
        for (i, block) in self.blocks.iter().enumerate().skip(1) {
            let i = i as u64;
            if block.index != i {
                return Err(ChainFault::new(
                    i,
                    FaultKind::LinkBreak,
                    format!("index {} at position {}", block.index, i),
                ));
            }
            if block.previous_hash != self.blocks[i as usize - 1].hash {
                return Err(ChainFault::new(
                    i,
                    FaultKind::LinkBreak,
                    "previous_hash does not match prior block",
                ));
            }
            let recomputed = block_hash(block)
                .map_err(|e| ChainFault::new(i, FaultKind::HashMismatch, e.to_string()))?;
            if recomputed != block.hash {
                return Err(ChainFault::new(
                    i,
                    FaultKind::HashMismatch,
                    "stored hash does not match block contents",
                ));
            }
            if !meets_difficulty(&block.hash, difficulty) {
                return Err(ChainFault::new(
                    i,
                    FaultKind::BadPow,
                    format!("hash lacks {difficulty} leading zeros"),
                ));
            }
            for tx in &block.transactions {
                validate_sealed_tx(tx, require_signatures)
                    .map_err(|e| ChainFault::new(i, FaultKind::BadSignature, e.to_string()))?;
                let state = states
                    .get(&tx.batch_id)
                    .copied()
                    .unwrap_or(BatchState::Absent);
                let next = state
                    .apply(tx)
                    .map_err(|e| ChainFault::new(i, FaultKind::SemanticViolation, e.to_string()))?;
                states.insert(tx.batch_id.clone(), next);
            }
        }
        Ok(())
    }

    /// Validate a block that claims to extend the current head exactly, and
    /// append it. Checks linkage, recomputed hash, difficulty, signatures,
    /// and batch ordering replayed on top of the existing chain.
    pub fn append(
        &mut self,
        block: Block,
        difficulty: u32,
        require_signatures: bool,
    ) -> Result<(), LedgerError> {
        let head = self.head();
        if block.index != head.index + 1 || block.previous_hash != head.hash {
            return Err(LedgerError::ChainInvalid(format!(
                "block {} does not extend head {}",
                block.index, head.index
            )));
        }
        let recomputed = block_hash(&block)?;
        if recomputed != block.hash {
            return Err(LedgerError::BadRequest(
                "block hash does not match its contents".into(),
            ));
        }
        if !meets_difficulty(&block.hash, difficulty) {
            return Err(LedgerError::BadRequest(format!(
                "block hash lacks {difficulty} leading zeros"
            )));
        }

        let mut states = crate::batches::batch_states(self.transactions().map(|(_, tx)| tx))?;
        for tx in &block.transactions {
            tx.check_shape()?;
            validate_sealed_tx(tx, require_signatures)?;
            let state = states
                .get(&tx.batch_id)
                .copied()
                .unwrap_or(BatchState::Absent);
            let next = state.apply(tx)?;
            states.insert(tx.batch_id.clone(), next);
        }

        self.blocks.push(block);
        Ok(())
    }

    /// Undo the most recent append. Only used to roll back the in-memory
    /// head when persisting the same block failed; genesis stays put.
    pub fn pop(&mut self) -> Option<Block> {
        if self.blocks.len() > 1 {
            self.blocks.pop()
        } else {
            None
        }
    }
}

fn validate_sealed_tx(tx: &Transaction, require_signatures: bool) -> Result<(), LedgerError> {
    if tx.is_signed() {
        verify_transaction(tx)?;
    } else if require_signatures {
        return Err(LedgerError::InvalidSignature(format!(
            "unsigned transaction for batch {} in sealed block",
            tx.batch_id
        )));
    }
    Ok(())
}
