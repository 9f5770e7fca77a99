pub mod action;
pub mod batch;
pub mod block;
pub mod constants;
pub mod error;
pub mod time;
pub mod transaction;

pub use action::Action;
pub use batch::BatchState;
pub use block::{meets_difficulty, Block};
pub use constants::*;
pub use error::LedgerError;
pub use transaction::Transaction;
