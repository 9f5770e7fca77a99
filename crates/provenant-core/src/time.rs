use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::LedgerError;

/// Format used for every timestamp this node emits: ISO-8601 with
/// microsecond precision, UTC, `Z` suffix.
const EMIT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Current UTC time in the ledger's wire format.
pub fn now() -> String {
    Utc::now().format(EMIT_FORMAT).to_string()
}

/// Parse a submitter-provided timestamp.
///
/// Accepts RFC 3339 (with offset or `Z`) and, for submitters that omit the
/// zone designator, a bare ISO-8601 local form interpreted as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, LedgerError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| LedgerError::BadRequest(format!("unparseable timestamp: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_timestamps_parse_back() {
        let ts = now();
        assert!(parse_timestamp(&ts).is_ok());
        // microsecond precision: six fractional digits before the Z
        let frac = ts.split('.').nth(1).unwrap();
        assert_eq!(frac.len(), "123456Z".len());
    }

    #[test]
    fn accepts_zoneless_iso8601() {
        assert!(parse_timestamp("2026-03-01T08:30:00.123456").is_ok());
        assert!(parse_timestamp("2026-03-01T08:30:00").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("last tuesday").is_err());
        assert!(parse_timestamp("").is_err());
    }
}
