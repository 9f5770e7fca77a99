//! The canonical JSON encoding: the one byte-exact serialization used for
//! hashing, signing, and on-disk block storage.
//!
//! Rules: object keys sorted ascending by Unicode code point, no
//! insignificant whitespace, UTF-8, numbers emitted as their raw decimal
//! representation with no normalization, lowercase booleans, recursive over
//! nested objects and arrays. Any two implementations must produce the same
//! bytes for the same logical value — cross-party signatures depend on it.

use serde::Serialize;
use serde_json::Value;

use provenant_core::LedgerError;

/// Canonicalize an in-memory JSON value to its normative string form.
pub fn canonical_json(value: &Value) -> Result<String, LedgerError> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

/// Serialize any value to JSON, then canonicalize.
pub fn canonical_json_of<T: Serialize>(value: &T) -> Result<String, LedgerError> {
    let v = serde_json::to_value(value)
        .map_err(|e| LedgerError::Canonicalization(e.to_string()))?;
    canonical_json(&v)
}

fn write_value(out: &mut String, value: &Value) -> Result<(), LedgerError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        // serde_json preserves the parsed decimal representation of numbers,
        // so Display here is the raw form required by the contract.
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s)?,
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Byte-wise str ordering equals Unicode code point ordering
            // under UTF-8.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key)?;
                out.push(':');
                write_value(out, &map[key])?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_string(out: &mut String, s: &str) -> Result<(), LedgerError> {
    let escaped = serde_json::to_string(s)
        .map_err(|e| LedgerError::Canonicalization(e.to_string()))?;
    out.push_str(&escaped);
    Ok(())
}
