pub mod pool;

pub use pool::{AdmissionContext, Mempool, PendingEntry};
