use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Every business event recorded on the ledger is one of these actions.
///
/// The wire encoding is snake_case (`"quality_checked"`), matching the JSON
/// submitted by the role façades.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Supplier registers a new physical batch.
    Registered,
    /// Supplier-side quality inspection; `metadata.result` is `passed` or
    /// `failed`. A failed check blocks shipment.
    QualityChecked,
    /// Supplier hands the batch to a distributor (`metadata.{from,to}`).
    Shipped,
    /// Distributor confirms receipt.
    Received,
    /// Distributor places the batch in storage (`metadata.location`).
    Stored,
    /// Distributor hands the batch to a retailer (`metadata.{from,to}`).
    Delivered,
    /// Retailer confirms receipt.
    ReceivedRetail,
    /// Terminal: the batch is sold to an end customer.
    Sold,
}

impl Action {
    /// The snake_case wire name, as it appears in transaction JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Registered => "registered",
            Action::QualityChecked => "quality_checked",
            Action::Shipped => "shipped",
            Action::Received => "received",
            Action::Stored => "stored",
            Action::Delivered => "delivered",
            Action::ReceivedRetail => "received_retail",
            Action::Sold => "sold",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(Action::Registered),
            "quality_checked" => Ok(Action::QualityChecked),
            "shipped" => Ok(Action::Shipped),
            "received" => Ok(Action::Received),
            "stored" => Ok(Action::Stored),
            "delivered" => Ok(Action::Delivered),
            "received_retail" => Ok(Action::ReceivedRetail),
            "sold" => Ok(Action::Sold),
            other => Err(LedgerError::BadRequest(format!("unknown action: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for action in [
            Action::Registered,
            Action::QualityChecked,
            Action::Shipped,
            Action::Received,
            Action::Stored,
            Action::Delivered,
            Action::ReceivedRetail,
            Action::Sold,
        ] {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }
}
