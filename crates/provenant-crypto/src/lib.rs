pub mod canonical;
pub mod hashing;
pub mod keys;
pub mod sign;

pub use canonical::{canonical_json, canonical_json_of};
pub use hashing::{block_hash, sha256_hex, signing_bytes, tx_identity};
pub use keys::{parse_public_key_pem, KeyPair, KeyStore};
pub use sign::{bind_identity, embedded_public_key, sign_transaction, verify_transaction};
