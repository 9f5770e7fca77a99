use std::fmt;

use crate::action::Action;
use crate::error::LedgerError;
use crate::transaction::Transaction;

/// The lifecycle position of a batch, derived by replaying its transactions
/// in chain (then mempool) order.
///
/// ```text
/// ∅ → registered → quality_checked → shipped → received → stored
///   → delivered → received_retail → sold (terminal)
/// ```
///
/// A quality check with `result = "failed"` parks the batch: it stays in
/// `QualityChecked { passed: false }` and cannot be shipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchState {
    Absent,
    Registered,
    QualityChecked { passed: bool },
    Shipped,
    ReceivedDistributor,
    Stored,
    Delivered,
    ReceivedRetail,
    Sold,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchState::Absent => "unregistered",
            BatchState::Registered => "registered",
            BatchState::QualityChecked { passed: true } => "quality checked",
            BatchState::QualityChecked { passed: false } => "quality check failed",
            BatchState::Shipped => "shipped",
            BatchState::ReceivedDistributor => "received by distributor",
            BatchState::Stored => "stored",
            BatchState::Delivered => "delivered",
            BatchState::ReceivedRetail => "received by retailer",
            BatchState::Sold => "sold",
        };
        f.write_str(s)
    }
}

impl BatchState {
    /// Apply one transaction to this state. Returns the successor state, or
    /// `InvalidOrder` with a human-readable reason when the action is not
    /// legal from here.
    pub fn apply(&self, tx: &Transaction) -> Result<BatchState, LedgerError> {
        let batch = &tx.batch_id;
        match (self, tx.action) {
            (BatchState::Absent, Action::Registered) => Ok(BatchState::Registered),
            (BatchState::Absent, action) => Err(LedgerError::InvalidOrder(format!(
                "Cannot record '{action}' for batch {batch} before registration"
            ))),

            (BatchState::Registered, Action::QualityChecked) => {
                let passed = tx.metadata.get("result").map(String::as_str) != Some("failed");
                Ok(BatchState::QualityChecked { passed })
            }

            (BatchState::QualityChecked { passed: true }, Action::Shipped) => {
                Ok(BatchState::Shipped)
            }
            (BatchState::QualityChecked { passed: false }, Action::Shipped) => {
                Err(LedgerError::InvalidOrder(format!(
                    "Cannot ship batch {batch}: quality check failed"
                )))
            }

            (BatchState::Shipped, Action::Received) => Ok(BatchState::ReceivedDistributor),
            (BatchState::ReceivedDistributor, Action::Stored) => Ok(BatchState::Stored),
            (BatchState::Stored, Action::Delivered) => Ok(BatchState::Delivered),
            (BatchState::Delivered, Action::ReceivedRetail) => Ok(BatchState::ReceivedRetail),
            (BatchState::ReceivedRetail, Action::Sold) => Ok(BatchState::Sold),

            (BatchState::Sold, action) => Err(LedgerError::InvalidOrder(format!(
                "Cannot record '{action}' for batch {batch}: already sold"
            ))),

            (state, action) => Err(LedgerError::InvalidOrder(format!(
                "Cannot record '{action}' for batch {batch} in state '{state}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tx(batch: &str, action: Action, metadata: &[(&str, &str)]) -> Transaction {
        Transaction {
            batch_id: batch.into(),
            action,
            actor: "Supplier_A".into(),
            timestamp: "2026-03-01T08:30:00.000000Z".into(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            signature: None,
            public_key: None,
        }
    }

    #[test]
    fn full_lifecycle_is_a_valid_path() {
        let steps = [
            (Action::Registered, vec![]),
            (Action::QualityChecked, vec![("result", "passed")]),
            (Action::Shipped, vec![("from", "Supplier_A"), ("to", "Distributor_B")]),
            (Action::Received, vec![]),
            (Action::Stored, vec![("location", "warehouse 4")]),
            (Action::Delivered, vec![("from", "Distributor_B"), ("to", "Retailer_C")]),
            (Action::ReceivedRetail, vec![]),
            (Action::Sold, vec![]),
        ];
        let mut state = BatchState::Absent;
        for (action, meta) in steps {
            state = state.apply(&tx("B1", action, &meta)).unwrap();
        }
        assert_eq!(state, BatchState::Sold);
    }

    #[test]
    fn ship_before_registration_is_rejected() {
        let err = BatchState::Absent
            .apply(&tx("B2", Action::Shipped, &[]))
            .unwrap_err();
        assert!(err.to_string().contains("Cannot"));
        assert!(err.to_string().contains("before registration"));
    }

    #[test]
    fn failed_quality_check_blocks_shipment() {
        let state = BatchState::Registered
            .apply(&tx("B3", Action::QualityChecked, &[("result", "failed")]))
            .unwrap();
        assert_eq!(state, BatchState::QualityChecked { passed: false });
        let err = state.apply(&tx("B3", Action::Shipped, &[])).unwrap_err();
        assert!(err.to_string().contains("quality check failed"));
    }

    #[test]
    fn sold_is_terminal() {
        let err = BatchState::Sold
            .apply(&tx("B4", Action::Registered, &[]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidOrder(_)));
        assert!(err.to_string().contains("already sold"));
    }

    #[test]
    fn double_registration_is_rejected() {
        let err = BatchState::Registered
            .apply(&tx("B5", Action::Registered, &[]))
            .unwrap_err();
        assert!(err.to_string().starts_with("Cannot"));
    }
}
