use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::action::Action;
use crate::error::LedgerError;
use crate::time;

/// A signed business event submitted by a role façade on behalf of an actor.
///
/// The signature covers the canonical JSON of the *signed fields* — every
/// field except `signature` and `public_key`. The canonical encoding must be
/// byte-identical between signer and verifier; see `provenant-crypto`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Identifies the physical batch traced end-to-end.
    pub batch_id: String,

    /// The business event being recorded.
    pub action: Action,

    /// Identity of the acting party, e.g. `Supplier_A`.
    pub actor: String,

    /// ISO-8601 microsecond UTC timestamp, set by the submitter.
    pub timestamp: String,

    /// Action-specific fields (`{from, to}`, `{location}`, `{result,
    /// inspector}`, …). A sorted map so serialization order is stable.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Base64 RSA PKCS#1 v1.5 signature over the canonical signed fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// Base64-encoded PEM of the signer's public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl Transaction {
    /// The signed fields as a JSON value: everything except `signature` and
    /// `public_key`. This is what gets canonicalized, hashed and signed.
    pub fn signed_fields(&self) -> Value {
        json!({
            "batch_id": self.batch_id,
            "action": self.action,
            "actor": self.actor,
            "timestamp": self.timestamp,
            "metadata": self.metadata,
        })
    }

    /// Shape validation: required fields present and timestamp parseable.
    /// The `action` field is already constrained by its enum type.
    pub fn check_shape(&self) -> Result<(), LedgerError> {
        if self.batch_id.trim().is_empty() {
            return Err(LedgerError::BadRequest("batch_id must not be empty".into()));
        }
        if self.actor.trim().is_empty() {
            return Err(LedgerError::BadRequest("actor must not be empty".into()));
        }
        time::parse_timestamp(&self.timestamp)?;
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}
