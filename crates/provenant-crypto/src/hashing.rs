use sha2::{Digest, Sha256};

use provenant_core::{Block, LedgerError, Transaction};

use crate::canonical::canonical_json;

/// Hex-encoded SHA-256 of arbitrary bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `H(block)`: SHA-256 hex over the canonical JSON of the block without its
/// `hash` field.
pub fn block_hash(block: &Block) -> Result<String, LedgerError> {
    let payload = canonical_json(&block.hash_payload())?;
    Ok(sha256_hex(payload.as_bytes()))
}

/// The exact bytes covered by a transaction's signature: the canonical JSON
/// of its signed fields.
pub fn signing_bytes(tx: &Transaction) -> Result<Vec<u8>, LedgerError> {
    Ok(canonical_json(&tx.signed_fields())?.into_bytes())
}

/// Stable identity of a transaction by signed-fields equality; used for
/// at-most-once admission and sealed-block duplicate checks.
pub fn tx_identity(tx: &Transaction) -> Result<String, LedgerError> {
    Ok(sha256_hex(&signing_bytes(tx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use provenant_core::Action;

    fn sample_tx() -> Transaction {
        Transaction {
            batch_id: "B1".into(),
            action: Action::Registered,
            actor: "Supplier_A".into(),
            timestamp: "2026-03-01T08:30:00.000000Z".into(),
            metadata: BTreeMap::new(),
            signature: None,
            public_key: None,
        }
    }

    #[test]
    fn sha256_hex_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn block_hash_ignores_stored_hash_field() {
        let mut block = Block {
            index: 1,
            timestamp: "2026-03-01T09:00:00.000000Z".into(),
            transactions: vec![sample_tx()],
            previous_hash: "00aa".into(),
            nonce: 7,
            hash: String::new(),
        };
        let h1 = block_hash(&block).unwrap();
        block.hash = "something else entirely".into();
        assert_eq!(block_hash(&block).unwrap(), h1);
        block.nonce = 8;
        assert_ne!(block_hash(&block).unwrap(), h1);
    }

    #[test]
    fn identity_ignores_signature_attachment() {
        let mut tx = sample_tx();
        let id1 = tx_identity(&tx).unwrap();
        tx.signature = Some("sig".into());
        tx.public_key = Some("key".into());
        assert_eq!(tx_identity(&tx).unwrap(), id1);
        tx.timestamp = "2026-03-01T08:30:00.000001Z".into();
        assert_ne!(tx_identity(&tx).unwrap(), id1);
    }
}
