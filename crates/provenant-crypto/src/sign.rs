//! Transaction signing and verification.
//!
//! RSA-2048 / PKCS#1 v1.5 / SHA-256 over the canonical JSON of the signed
//! fields. The public key travels with the transaction as base64-encoded
//! PEM; verifiers additionally bind it to the registered identity of the
//! claimed actor.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::RsaPublicKey;

use provenant_core::{LedgerError, Transaction};

use crate::hashing::signing_bytes;
use crate::keys::{parse_public_key_pem, KeyPair, KeyStore};

/// Sign `tx` in place: sets `signature` and `public_key`.
pub fn sign_transaction(keypair: &KeyPair, tx: &mut Transaction) -> Result<(), LedgerError> {
    let bytes = signing_bytes(tx)?;
    let signing_key = SigningKey::<Sha256>::new(keypair.private_key().clone());
    let signature = signing_key.sign(&bytes);
    tx.signature = Some(BASE64.encode(signature.to_bytes()));
    tx.public_key = Some(BASE64.encode(keypair.public_key_pem()?.as_bytes()));
    Ok(())
}

/// Decode the PEM public key embedded in a transaction.
pub fn embedded_public_key(tx: &Transaction) -> Result<RsaPublicKey, LedgerError> {
    let b64 = tx
        .public_key
        .as_ref()
        .ok_or_else(|| LedgerError::InvalidSignature("transaction carries no public key".into()))?;
    let pem_bytes = BASE64
        .decode(b64)
        .map_err(|e| LedgerError::InvalidSignature(format!("public key is not base64: {e}")))?;
    let pem = String::from_utf8(pem_bytes)
        .map_err(|_| LedgerError::InvalidSignature("public key PEM is not UTF-8".into()))?;
    parse_public_key_pem(&pem)
}

/// Verify the transaction's signature under its embedded public key.
/// Returns the key so callers can bind it to a registered identity.
pub fn verify_transaction(tx: &Transaction) -> Result<RsaPublicKey, LedgerError> {
    let sig_b64 = tx
        .signature
        .as_ref()
        .ok_or_else(|| LedgerError::InvalidSignature("transaction is unsigned".into()))?;
    let sig_bytes = BASE64
        .decode(sig_b64)
        .map_err(|e| LedgerError::InvalidSignature(format!("signature is not base64: {e}")))?;
    let signature = Signature::try_from(sig_bytes.as_slice())
        .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;

    let public_key = embedded_public_key(tx)?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    verifying_key
        .verify(&signing_bytes(tx)?, &signature)
        .map_err(|_| {
            LedgerError::InvalidSignature(format!(
                "signature does not verify for actor {}",
                tx.actor
            ))
        })?;
    Ok(public_key)
}

/// Identity binding: the verified key must be the registered key for the
/// transaction's claimed actor. A valid signature under someone else's key
/// is an impersonation attempt, not a valid transaction.
pub fn bind_identity(
    store: &KeyStore,
    tx: &Transaction,
    verified_key: &RsaPublicKey,
) -> Result<(), LedgerError> {
    let registered = store.public_key(&tx.actor)?;
    if registered != verified_key {
        return Err(LedgerError::InvalidSignature(format!(
            "public key does not match the registered identity of actor {}",
            tx.actor
        )));
    }
    Ok(())
}
