pub mod batches;
pub mod chain;
pub mod genesis;

pub use batches::{batch_history, batch_state_of, batch_states, verify_batch, BatchEvent, BatchVerification};
pub use chain::{Chain, ChainFault, FaultKind};
pub use genesis::genesis_block;
