//! Actor key material.
//!
//! Keys live as PEM files in a directory keyed by actor name:
//! `<actor>_private.pem` / `<actor>_public.pem`. The public half doubles as
//! the actor registry: a transaction's embedded key must match the
//! registered key for its claimed actor, so a valid signature under a
//! foreign key cannot impersonate a registered identity.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use provenant_core::LedgerError;

/// RSA modulus size for all actor identities.
pub const KEY_BITS: usize = 2048;

/// An actor's RSA-2048 key pair.
pub struct KeyPair {
    pub actor: String,
    private: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl KeyPair {
    /// Generate a fresh 2048-bit key pair for `actor`.
    pub fn generate(actor: &str) -> Result<Self, LedgerError> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| LedgerError::Persistence(format!("key generation failed: {e}")))?;
        let public = private.to_public_key();
        Ok(Self {
            actor: actor.to_string(),
            private,
            public,
        })
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// PEM encoding of the public key (SubjectPublicKeyInfo).
    pub fn public_key_pem(&self) -> Result<String, LedgerError> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    /// Write `<actor>_private.pem` and `<actor>_public.pem` into `dir`.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<(), LedgerError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| LedgerError::Persistence(format!("creating key dir: {e}")))?;
        let private_pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        fs::write(dir.join(format!("{}_private.pem", self.actor)), private_pem.as_bytes())
            .map_err(|e| LedgerError::Persistence(format!("writing private key: {e}")))?;
        fs::write(
            dir.join(format!("{}_public.pem", self.actor)),
            self.public_key_pem()?,
        )
        .map_err(|e| LedgerError::Persistence(format!("writing public key: {e}")))?;
        Ok(())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ actor: {} }}", self.actor)
    }
}

/// Parse a PEM public key, accepting both SubjectPublicKeyInfo (PKCS#8
/// style) and PKCS#1 `RSA PUBLIC KEY` encodings.
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, LedgerError> {
    if let Ok(key) = RsaPublicKey::from_public_key_pem(pem) {
        return Ok(key);
    }
    RsaPublicKey::from_pkcs1_pem(pem)
        .map_err(|e| LedgerError::InvalidSignature(format!("unparseable public key PEM: {e}")))
}

fn parse_private_key_pem(pem: &str) -> Result<RsaPrivateKey, LedgerError> {
    if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs1_pem(pem)
        .map_err(|e| LedgerError::KeyNotFound(format!("unparseable private key PEM: {e}")))
}

/// Directory-backed registry of actor public keys.
pub struct KeyStore {
    dir: PathBuf,
    public_keys: HashMap<String, RsaPublicKey>,
}

impl KeyStore {
    /// Scan `dir` for `<actor>_public.pem` files. A missing directory yields
    /// an empty store, which only works with signature checking disabled.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        let mut public_keys = HashMap::new();
        if dir.is_dir() {
            let entries = fs::read_dir(&dir)
                .map_err(|e| LedgerError::Persistence(format!("reading key dir: {e}")))?;
            for entry in entries {
                let entry =
                    entry.map_err(|e| LedgerError::Persistence(format!("reading key dir: {e}")))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                let Some(actor) = name.strip_suffix("_public.pem") else {
                    continue;
                };
                let pem = fs::read_to_string(entry.path())
                    .map_err(|e| LedgerError::Persistence(format!("reading {name}: {e}")))?;
                public_keys.insert(actor.to_string(), parse_public_key_pem(&pem)?);
            }
        }
        Ok(Self { dir, public_keys })
    }

    /// The registered public key for `actor`.
    pub fn public_key(&self, actor: &str) -> Result<&RsaPublicKey, LedgerError> {
        self.public_keys
            .get(actor)
            .ok_or_else(|| LedgerError::UnknownActor(actor.to_string()))
    }

    pub fn has_actor(&self, actor: &str) -> bool {
        self.public_keys.contains_key(actor)
    }

    pub fn actor_count(&self) -> usize {
        self.public_keys.len()
    }

    /// Load the full key pair for `actor` (private half read from disk on
    /// demand; it is never held in the registry).
    pub fn load_keypair(&self, actor: &str) -> Result<KeyPair, LedgerError> {
        let path = self.dir.join(format!("{actor}_private.pem"));
        let pem = fs::read_to_string(&path)
            .map_err(|_| LedgerError::KeyNotFound(actor.to_string()))?;
        let private = parse_private_key_pem(&pem)?;
        let public = private.to_public_key();
        Ok(KeyPair {
            actor: actor.to_string(),
            private,
            public,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::testutil::keypair as test_keypair;

    #[test]
    fn round_trip_through_directory() {
        let dir = std::env::temp_dir().join(format!("provenant_keys_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let kp = test_keypair("Supplier_A");
        kp.write_to_dir(&dir).unwrap();

        let store = KeyStore::open(&dir).unwrap();
        assert!(store.has_actor("Supplier_A"));
        assert!(!store.has_actor("Supplier_B"));
        assert_eq!(store.public_key("Supplier_A").unwrap(), &kp.public);

        let reloaded = store.load_keypair("Supplier_A").unwrap();
        assert_eq!(reloaded.public, kp.public);

        assert!(matches!(
            store.public_key("Nobody"),
            Err(LedgerError::UnknownActor(_))
        ));
        assert!(matches!(
            store.load_keypair("Nobody"),
            Err(LedgerError::KeyNotFound(_))
        ));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_yields_empty_store() {
        let store = KeyStore::open("/nonexistent/provenant/keys").unwrap();
        assert_eq!(store.actor_count(), 0);
    }
}
