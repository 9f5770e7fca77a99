pub mod config;
pub mod miner;
pub mod node;
pub mod sync;
pub mod tasks;

pub use config::NodeConfig;
pub use node::{LedgerNode, ReceiveOutcome};
pub use sync::SyncOutcome;
pub use tasks::spawn_background_tasks;
